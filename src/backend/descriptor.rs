// Descriptor pool for UI textures and buffers
//
// Fixed capacity: every descriptor type gets the same budget.

use anyhow::{Context, Result};
use ash::vk;

pub const DESCRIPTORS_PER_TYPE: u32 = 1000;
pub const MAX_SETS: u32 = 10_000;

const POOL_TYPES: [vk::DescriptorType; 10] = [
    vk::DescriptorType::SAMPLER,
    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    vk::DescriptorType::SAMPLED_IMAGE,
    vk::DescriptorType::STORAGE_IMAGE,
    vk::DescriptorType::UNIFORM_TEXEL_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER,
    vk::DescriptorType::STORAGE_BUFFER,
    vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
    vk::DescriptorType::STORAGE_BUFFER_DYNAMIC,
    vk::DescriptorType::INPUT_ATTACHMENT,
];

pub fn pool_sizes() -> [vk::DescriptorPoolSize; 10] {
    POOL_TYPES.map(|ty| vk::DescriptorPoolSize {
        ty,
        descriptor_count: DESCRIPTORS_PER_TYPE,
    })
}

pub fn create_descriptor_pool(device: &ash::Device) -> Result<vk::DescriptorPool> {
    let sizes = pool_sizes();
    let create_info = vk::DescriptorPoolCreateInfo::builder()
        .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        .max_sets(MAX_SETS)
        .pool_sizes(&sizes);

    unsafe {
        device
            .create_descriptor_pool(&create_info, None)
            .context("Failed to create descriptor pool")
    }
}
