// Per-image frame resources and synchronization primitives
//
// One `Frame` per swapchain image: its own command pool so the whole pool
// can be reset each time the image comes round, and a fence guarding reuse.
// Semaphores are indexed separately since the acquire happens before we
// know which image we get.

use anyhow::{Context, Result};
use ash::vk;

pub struct Frame {
    pub command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    pub fence: vk::Fence,
    pub image_view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
}

impl Frame {
    /// Command pool, command buffer and fence for one swapchain image.
    /// The view and framebuffer are attached by the swapchain afterwards.
    pub fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let command_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .context("Failed to create frame command pool")?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = unsafe { device.allocate_command_buffers(&alloc_info) }
            .context("Failed to allocate frame command buffer")?[0];

        // Start signaled so the first wait on this image returns immediately
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);
        let fence = unsafe { device.create_fence(&fence_info, None) }?;

        Ok(Self {
            command_pool,
            command_buffer,
            fence,
            image_view: vk::ImageView::null(),
            framebuffer: vk::Framebuffer::null(),
        })
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_fence(self.fence, None);
            device.free_command_buffers(self.command_pool, &[self.command_buffer]);
            device.destroy_command_pool(self.command_pool, None);
            device.destroy_framebuffer(self.framebuffer, None);
            device.destroy_image_view(self.image_view, None);
        }
    }
}

pub struct FrameSemaphores {
    pub image_acquired: vk::Semaphore,
    pub render_complete: vk::Semaphore,
}

impl FrameSemaphores {
    pub fn new(device: &ash::Device) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();

        unsafe {
            Ok(Self {
                image_acquired: device.create_semaphore(&semaphore_info, None)?,
                render_complete: device.create_semaphore(&semaphore_info, None)?,
            })
        }
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_acquired, None);
            device.destroy_semaphore(self.render_complete, None);
        }
    }
}
