// UI layer - Dear ImGui on top of the window surface
//
// Owns the imgui context, the winit platform glue and the Vulkan renderer.
// Frame ordering is dictated by imgui:
//   prepare_frame -> new_frame -> widgets -> prepare_render -> render -> draw

pub mod demo;

use anyhow::{Context, Result};
use ash::vk;
use imgui::{DrawData, FontSource};
use imgui_rs_vulkan_renderer::{Options, Renderer};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use std::time::Instant;
use winit::event::{Event, WindowEvent};
use winit::window::{Window, WindowId};

use crate::backend::{VulkanDevice, WindowData};
use crate::config::Config;
use crate::frame_loop::{FrameStatus, FrameTarget};
use demo::DemoWindow;

pub struct UiLayer {
    pub context: imgui::Context,
    pub platform: WinitPlatform,
    pub renderer: Renderer,
    pub demo: DemoWindow,
    last_frame: Instant,
}

/// Everything the submit step needs once imgui has produced its draw lists
pub struct UiFrame<'a> {
    pub draw_data: &'a DrawData,
    pub renderer: &'a mut Renderer,
    pub clear_color: [f32; 4],
}

impl UiFrame<'_> {
    /// Nothing to draw into while the window has no area
    pub fn is_minimized(&self) -> bool {
        self.draw_data.display_size[0] <= 0.0 || self.draw_data.display_size[1] <= 0.0
    }
}

impl UiLayer {
    pub fn new(
        window: &Window,
        device: &VulkanDevice,
        window_data: &WindowData,
        config: &Config,
    ) -> Result<Self> {
        let mut context = imgui::Context::create();
        context.set_ini_filename(config.ini_file());
        context.style_mut().use_dark_colors();

        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(context.io_mut(), window, HiDpiMode::Default);

        context
            .fonts()
            .add_font(&[FontSource::DefaultFontData { config: None }]);

        // The renderer uploads the font atlas through this pool at creation
        let upload_pool = window_data.frames[window_data.frame_index as usize].command_pool;

        let renderer = Renderer::with_gpu_allocator(
            device.allocator(),
            device.device.clone(),
            device.graphics_queue,
            upload_pool,
            window_data.render_pass,
            &mut context,
            Some(Options {
                in_flight_frames: window_data.image_count() as usize,
                ..Default::default()
            }),
        )
        .context("Failed to create UI renderer")?;

        log::info!("UI renderer ready ({} frames in flight)", window_data.image_count());

        Ok(Self {
            context,
            platform,
            renderer,
            demo: DemoWindow::new(config.graphics.clear_color),
            last_frame: Instant::now(),
        })
    }

    pub fn handle_event(&mut self, window: &Window, window_id: WindowId, event: &WindowEvent) {
        let event: Event<()> = Event::WindowEvent {
            window_id,
            event: event.clone(),
        };
        self.platform
            .handle_event(self.context.io_mut(), window, &event);
    }

    /// Build this frame's widgets and hand the draw data to `submit`.
    pub fn frame<R>(
        &mut self,
        window: &Window,
        submit: impl FnOnce(UiFrame<'_>) -> Result<R>,
    ) -> Result<R> {
        let now = Instant::now();
        self.context.io_mut().update_delta_time(now - self.last_frame);
        self.last_frame = now;

        self.platform
            .prepare_frame(self.context.io_mut(), window)
            .context("Failed to prepare UI frame")?;

        let ui = self.context.new_frame();
        self.demo.draw(ui);
        self.platform.prepare_render(ui, window);

        let clear_color = self.demo.premultiplied_clear_color();
        let draw_data = self.context.render();

        submit(UiFrame {
            draw_data,
            renderer: &mut self.renderer,
            clear_color,
        })
    }
}

/// The window's swapchain paired with the UI renderer for one iteration
pub struct Presenter<'a> {
    pub window: &'a mut WindowData,
    pub renderer: &'a mut Renderer,
}

impl FrameTarget for Presenter<'_> {
    type DrawData = DrawData;

    fn rebuild(&mut self, extent: vk::Extent2D) -> Result<()> {
        self.window.create_or_resize(extent.width, extent.height)
    }

    fn render(&mut self, draw_data: &DrawData) -> Result<FrameStatus> {
        if self.window.acquire_next_image()? == FrameStatus::OutOfDate {
            return Ok(FrameStatus::OutOfDate);
        }

        let command_buffer = self.window.begin_frame()?;
        self.renderer
            .cmd_draw(command_buffer, draw_data)
            .context("Failed to record UI draw data")?;
        self.window.end_frame()?;

        Ok(FrameStatus::Ok)
    }

    fn present(&mut self) -> Result<FrameStatus> {
        self.window.present()
    }
}
