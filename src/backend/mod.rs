// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash, one owner per group of handles

pub mod descriptor;
pub mod device;
pub mod pipeline;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use device::VulkanDevice;
pub use swapchain::{SwapchainSettings, WindowData};
