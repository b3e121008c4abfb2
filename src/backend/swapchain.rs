// Swapchain - Window presentation
//
// `WindowData` owns everything tied to the window surface: the swapchain,
// the render pass, and one set of frame resources per swapchain image.
// The whole per-image set is torn down and rebuilt on resize.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;

use super::pipeline;
use super::surface;
use super::sync::{Frame, FrameSemaphores};
use super::VulkanDevice;

/// Result of talking to the presentation engine. Anything other than these
/// two outcomes is a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Ok,
    /// OUT_OF_DATE or SUBOPTIMAL: the swapchain has to be rebuilt
    OutOfDate,
}

/// What the window wants from its swapchain
pub struct SwapchainSettings {
    pub present_modes: Vec<vk::PresentModeKHR>,
    /// 0 means "derive from the present mode"
    pub min_image_count: u32,
}

pub struct WindowData {
    pub surface: vk::SurfaceKHR,
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub render_pass: vk::RenderPass,
    pub swapchain: vk::SwapchainKHR,
    pub extent: vk::Extent2D,
    pub clear_value: vk::ClearValue,
    /// Image index returned by the last acquire
    pub frame_index: u32,
    /// Which semaphore pair the next acquire uses
    pub semaphore_index: u32,
    pub frames: Vec<Frame>,
    pub semaphores: Vec<FrameSemaphores>,
    pub min_image_count: u32,

    surface_loader: ash::extensions::khr::Surface,
    swapchain_loader: ash::extensions::khr::Swapchain,
    device: Arc<VulkanDevice>,
}

impl WindowData {
    /// Takes ownership of `surface`; it is destroyed with the window data.
    pub fn new(
        device: Arc<VulkanDevice>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        settings: &SwapchainSettings,
    ) -> Result<Self> {
        let surface_loader = ash::extensions::khr::Surface::new(&device.entry, &device.instance);

        // Verify the queue we render on can present to this surface
        let wsi_support = unsafe {
            surface_loader.get_physical_device_surface_support(
                device.physical_device,
                device.graphics_queue_family,
                surface,
            )
        }?;
        if !wsi_support {
            anyhow::bail!("No WSI support on the graphics queue family");
        }

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(device.physical_device, surface)
        }?;
        let surface_format = surface::select_surface_format(
            &formats,
            &surface::REQUESTED_FORMATS,
            surface::REQUESTED_COLOR_SPACE,
        )
        .context("Surface reports no formats")?;

        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(device.physical_device, surface)
        }?;
        let present_mode = surface::select_present_mode(&present_modes, &settings.present_modes);

        log::info!("Surface format: {:?}", surface_format.format);
        log::info!("Selected PresentMode = <{:?}>", present_mode);

        let render_pass = pipeline::create_render_pass(&device.device, surface_format.format)?;
        let swapchain_loader =
            ash::extensions::khr::Swapchain::new(&device.instance, &device.device);

        let mut window = Self {
            surface,
            surface_format,
            present_mode,
            render_pass,
            swapchain: vk::SwapchainKHR::null(),
            extent: vk::Extent2D { width, height },
            clear_value: vk::ClearValue::default(),
            frame_index: 0,
            semaphore_index: 0,
            frames: Vec::new(),
            semaphores: Vec::new(),
            min_image_count: settings.min_image_count,
            surface_loader,
            swapchain_loader,
            device,
        };

        window.create_or_resize(width, height)?;
        Ok(window)
    }

    pub fn image_count(&self) -> u32 {
        self.frames.len() as u32
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_value = vk::ClearValue {
            color: vk::ClearColorValue { float32: rgba },
        };
    }

    /// (Re)create the swapchain and all per-image resources at the given size.
    pub fn create_or_resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.device.wait_idle()?;
        self.destroy_frames();

        let caps = unsafe {
            self.surface_loader.get_physical_device_surface_capabilities(
                self.device.physical_device,
                self.surface,
            )
        }?;

        let min_image_count = if self.min_image_count == 0 {
            surface::min_image_count_for(self.present_mode)
        } else {
            self.min_image_count
        };
        let image_count = clamp_image_count(min_image_count, &caps);
        let extent = swapchain_extent(&caps, width, height);

        log::info!(
            "Creating swapchain: {}x{} ({} images)",
            extent.width,
            extent.height,
            image_count
        );

        let old_swapchain = self.swapchain;
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface)
            .min_image_count(image_count)
            .image_format(self.surface_format.format)
            .image_color_space(self.surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain = unsafe { self.swapchain_loader.create_swapchain(&create_info, None) }
            .context("Failed to create swapchain")?;

        if old_swapchain != vk::SwapchainKHR::null() {
            unsafe { self.swapchain_loader.destroy_swapchain(old_swapchain, None) };
        }
        self.swapchain = swapchain;
        self.extent = extent;

        let images = unsafe { self.swapchain_loader.get_swapchain_images(swapchain) }?;
        log::info!("Created swapchain with {} images", images.len());

        let device = &self.device.device;
        for image in images {
            // Pushed first so a later failure is still cleaned up by destroy_frames
            self.frames.push(Frame::new(device, self.device.graphics_queue_family)?);
            self.semaphores.push(FrameSemaphores::new(device)?);

            let last = self.frames.len() - 1;
            let frame = &mut self.frames[last];
            frame.image_view =
                pipeline::create_image_view(device, image, self.surface_format.format)?;
            frame.framebuffer =
                pipeline::create_framebuffer(device, self.render_pass, frame.image_view, extent)?;
        }

        self.frame_index = 0;
        self.semaphore_index = 0;
        Ok(())
    }

    /// Acquire the next image, signalling the current image-acquired semaphore.
    pub fn acquire_next_image(&mut self) -> Result<FrameStatus> {
        let semaphore = self.semaphores[self.semaphore_index as usize].image_acquired;

        let result = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((_, true)) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(FrameStatus::OutOfDate),
            Ok((index, false)) => {
                self.frame_index = index;
                Ok(FrameStatus::Ok)
            }
            Err(e) => Err(e).context("Failed to acquire swapchain image"),
        }
    }

    /// Wait until the acquired image's previous submission retired, then
    /// start recording its command buffer inside the render pass.
    pub fn begin_frame(&self) -> Result<vk::CommandBuffer> {
        let device = &self.device.device;
        let frame = &self.frames[self.frame_index as usize];

        unsafe {
            device.wait_for_fences(&[frame.fence], true, u64::MAX)?;
            device.reset_fences(&[frame.fence])?;

            device.reset_command_pool(frame.command_pool, vk::CommandPoolResetFlags::empty())?;
            let begin_info = vk::CommandBufferBeginInfo::builder()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(frame.command_buffer, &begin_info)?;

            let clear_values = [self.clear_value];
            let render_pass_info = vk::RenderPassBeginInfo::builder()
                .render_pass(self.render_pass)
                .framebuffer(frame.framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: self.extent,
                })
                .clear_values(&clear_values);
            device.cmd_begin_render_pass(
                frame.command_buffer,
                &render_pass_info,
                vk::SubpassContents::INLINE,
            );
        }

        Ok(frame.command_buffer)
    }

    /// Close the render pass and submit the acquired image's commands.
    pub fn end_frame(&self) -> Result<()> {
        let device = &self.device.device;
        let frame = &self.frames[self.frame_index as usize];
        let semaphores = &self.semaphores[self.semaphore_index as usize];

        let wait_semaphores = [semaphores.image_acquired];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [semaphores.render_complete];
        let command_buffers = [frame.command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            device.cmd_end_render_pass(frame.command_buffer);
            device.end_command_buffer(frame.command_buffer)?;
            device
                .queue_submit(self.device.graphics_queue, &[submit_info.build()], frame.fence)
                .context("Failed to submit frame")?;
        }

        Ok(())
    }

    /// Present the acquired image once rendering completes.
    pub fn present(&mut self) -> Result<FrameStatus> {
        let wait_semaphores = [self.semaphores[self.semaphore_index as usize].render_complete];
        let swapchains = [self.swapchain];
        let image_indices = [self.frame_index];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.swapchain_loader
                .queue_present(self.device.graphics_queue, &present_info)
        };

        match result {
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(FrameStatus::OutOfDate),
            Ok(false) => {
                // Now we can use the next set of semaphores
                self.semaphore_index = (self.semaphore_index + 1) % self.image_count();
                Ok(FrameStatus::Ok)
            }
            Err(e) => Err(e).context("Failed to present"),
        }
    }

    fn destroy_frames(&mut self) {
        let device = &self.device.device;
        for frame in self.frames.drain(..) {
            frame.destroy(device);
        }
        for semaphores in self.semaphores.drain(..) {
            semaphores.destroy(device);
        }
    }
}

impl Drop for WindowData {
    fn drop(&mut self) {
        let _ = self.device.wait_idle();
        self.destroy_frames();

        unsafe {
            self.device.device.destroy_render_pass(self.render_pass, None);
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

/// Honour the surface's limits; a max of 0 means unbounded.
pub fn clamp_image_count(requested: u32, caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = requested.max(caps.min_image_count);
    if caps.max_image_count != 0 && count > caps.max_image_count {
        count = caps.max_image_count;
    }
    count
}

/// The surface dictates the extent unless it reports the 0xFFFFFFFF wildcard.
pub fn swapchain_extent(caps: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if caps.current_extent.width == u32::MAX {
        vk::Extent2D { width, height }
    } else {
        caps.current_extent
    }
}
