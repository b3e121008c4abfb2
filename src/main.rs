// =============================================================================
// DEAR IMGUI ON VULKAN - Minimal winit + ash demo
// =============================================================================
//
// One window, one render pass, one immediate-mode UI.
//
// ARCHITECTURE OVERVIEW:
// ┌─────────────────────────────────────────────────────────────────┐
// │  winit event loop (ApplicationHandler)                          │
// │    ├── VulkanDevice (instance, GPU, queue, descriptor pool)     │
// │    ├── WindowData (surface, swapchain, per-image frames)        │
// │    └── UiLayer (imgui context, winit platform, Vulkan renderer) │
// └─────────────────────────────────────────────────────────────────┘
//
// FRAME FLOW:
// 1. Forward window events to imgui
// 2. Rebuild the swapchain if it was flagged stale (and the window has area)
// 3. Build the UI frame
// 4. Acquire, record, submit
// 5. Present (skipped while a rebuild is pending)
//
// Any Vulkan failure is fatal: the loop exits and main returns the error.
//
// =============================================================================

mod backend;
mod config;
mod frame_loop;
mod ui;

use anyhow::{Context, Result};
use ash::vk;
use backend::{surface, SwapchainSettings, VulkanDevice, WindowData};
use config::{Config, ConfigWatcher, CONFIG_PATH};
use frame_loop::{FrameLoop, FrameOutcome};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use ui::{Presenter, UiLayer};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Fullscreen, Window, WindowAttributes, WindowId},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let (config, load_error) = Config::load();

    // Initialize logging, then report what went wrong before it existed
    init_logging(&config);
    if let Some(e) = load_error {
        log::warn!("Failed to load {}: {:#}. Using defaults.", CONFIG_PATH, e);
    }
    log::info!("Starting imgui Vulkan demo");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    // Already logged where it happened; returning it sets the exit code
    if let Some(e) = app.fatal.take() {
        return Err(e);
    }

    Ok(())
}

/// Initialize logging, optionally redirected to a file
fn init_logging(config: &Config) {
    use env_logger::{Builder, Target};
    use log::LevelFilter;

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info).parse_default_env();

    if config.debug.log_to_file {
        match std::fs::File::create(&config.debug.log_file) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!(
                "Cannot open log file {}: {}. Logging to stderr.",
                config.debug.log_file, e
            ),
        }
    }

    builder.init();
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Main application struct holding all Vulkan resources.
///
/// IMPORTANT: the UI renderer and window data borrow the device's handles,
/// so `Drop` releases them explicitly before the device goes.
pub struct App {
    config: Config,
    config_watcher: Option<ConfigWatcher>,

    window: Option<Arc<Window>>,
    ui: Option<UiLayer>,
    window_data: Option<WindowData>,
    device: Option<Arc<VulkanDevice>>,

    frame_loop: FrameLoop,
    /// First unrecoverable error; ends the event loop
    fatal: Option<anyhow::Error>,

    // FPS tracking
    frame_count: u32,
    last_fps_update: Instant,
    last_frame_time: Instant,
}

impl App {
    pub fn new(config: Config) -> Self {
        let config_watcher = if config.debug.watch_config && Path::new(CONFIG_PATH).exists() {
            ConfigWatcher::new(CONFIG_PATH)
                .map_err(|e| log::warn!("Config hot reload disabled: {:#}", e))
                .ok()
        } else {
            None
        };

        let now = Instant::now();
        Self {
            config,
            config_watcher,
            window: None,
            ui: None,
            window_data: None,
            device: None,
            frame_loop: FrameLoop::new(),
            fatal: None,
            frame_count: 0,
            last_fps_update: now,
            last_frame_time: now,
        }
    }

    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Context setup, then everything bound to the window.
    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        log::info!("Initializing Vulkan...");

        // Enable validation layers based on config (and debug build)
        let enable_validation = cfg!(debug_assertions) && self.config.debug.validation_layers;
        let extensions = surface::required_extensions(window)?;
        let device = VulkanDevice::new(&self.config.window.title, extensions, enable_validation)?;

        let surface = surface::create_surface(&device.entry, &device.instance, window)?;

        let size = window.inner_size();
        let settings = SwapchainSettings {
            present_modes: self.config.requested_present_modes(),
            min_image_count: self.config.graphics.min_image_count,
        };
        let window_data = WindowData::new(device.clone(), surface, size.width, size.height, &settings)?;

        let ui = UiLayer::new(window, &device, &window_data, &self.config)?;

        self.device = Some(device);
        self.window_data = Some(window_data);
        self.ui = Some(ui);

        log::info!("Vulkan initialized successfully!");
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        if self.fatal.is_none() {
            self.fatal = Some(error);
        }
        event_loop.exit();
    }

    // =========================================================================
    // RENDER LOOP
    // =========================================================================

    /// One iteration: rebuild if pending, build the UI, render and present.
    fn redraw(&mut self) -> Result<()> {
        let (Some(window), Some(window_data), Some(ui)) = (
            self.window.as_ref(),
            self.window_data.as_mut(),
            self.ui.as_mut(),
        ) else {
            return Ok(());
        };
        let frame_loop = &mut self.frame_loop;

        let size = window.inner_size();
        let window_extent = vk::Extent2D {
            width: size.width,
            height: size.height,
        };

        frame_loop.prepare(
            &mut Presenter {
                window: &mut *window_data,
                renderer: &mut ui.renderer,
            },
            window_extent,
        )?;

        let presented = ui.frame(window, |frame| {
            if frame.is_minimized() {
                return Ok(false);
            }

            window_data.set_clear_color(frame.clear_color);
            let outcome = frame_loop.submit(
                &mut Presenter {
                    window: &mut *window_data,
                    renderer: frame.renderer,
                },
                frame.draw_data,
            )?;

            Ok(outcome == FrameOutcome::Presented)
        })?;

        if presented {
            self.update_fps();
        }
        Ok(())
    }

    // =========================================================================
    // CONFIG HOT RELOAD
    // =========================================================================

    fn poll_config(&mut self) {
        let Some(config) = self.config_watcher.as_ref().and_then(|w| w.poll()) else {
            return;
        };

        log::info!("Applying updated {}", CONFIG_PATH);
        let changes = self.config.apply_reload(&config);

        if let (Some(color), Some(ui)) = (changes.clear_color, self.ui.as_mut()) {
            ui.demo.clear_color = color;
        }

        if changes.fps_title_disabled {
            if let Some(window) = self.window.as_ref() {
                window.set_title(&self.config.window.title);
            }
        }
    }

    // =========================================================================
    // FPS TRACKING
    // =========================================================================

    fn update_fps(&mut self) {
        if !self.config.debug.show_fps {
            return;
        }

        let now = Instant::now();
        let frame_time = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.frame_count += 1;

        // Update title every second
        let elapsed = now.duration_since(self.last_fps_update).as_secs_f32();
        if elapsed >= 1.0 {
            let fps = self.frame_count as f32 / elapsed;

            if let Some(ref window) = self.window {
                window.set_title(&format!(
                    "{} - {:.0} FPS ({:.2}ms)",
                    self.config.window.title,
                    fps,
                    frame_time * 1000.0
                ));
            }

            self.frame_count = 0;
            self.last_fps_update = now;
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let mut window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(self.config.window.resizable);

        if self.config.window.fullscreen {
            window_attributes = window_attributes.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }

        let window = match event_loop
            .create_window(window_attributes)
            .context("Failed to create window")
        {
            Ok(w) => Arc::new(w),
            Err(e) => return self.fail(event_loop, e),
        };

        if let Err(e) = self.init_vulkan(&window) {
            return self.fail(event_loop, e.context("Failed to initialize Vulkan"));
        }

        self.window = Some(window);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if let (Some(window), Some(ui)) = (self.window.as_ref(), self.ui.as_mut()) {
            ui.handle_event(window, window_id, &event);
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                self.frame_loop.on_resize(size.width, size.height);
                log::debug!(
                    "Window resized to {}x{} (swapchain {:?})",
                    size.width,
                    size.height,
                    self.frame_loop.state()
                );
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                }
            }

            _ => {}
        }
    }

    /// Called when the event loop is about to block waiting for events.
    /// We use this to request continuous redraws.
    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.poll_config();

        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}

// =============================================================================
// CLEANUP
// =============================================================================

impl Drop for App {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        if let Some(ref device) = self.device {
            // Wait for GPU to finish before destroying anything
            let _ = device.wait_idle();
        }

        // Reverse order of creation; the device goes last
        self.ui = None;
        self.window_data = None;
        self.device = None;

        log::info!("Cleanup complete");
    }
}
