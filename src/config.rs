// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.
// A file watcher can re-apply the runtime-tunable parts while running.

use anyhow::{Context, Result};
use ash::vk;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};

pub const CONFIG_PATH: &str = "config.toml";

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
    pub ui: UiConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Dear ImGui winit+Vulkan example".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
            fullscreen: false,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Prefer tearing-free uncapped modes over vsync
    pub unlimited_frame_rate: bool,
    /// Explicit present mode; overrides `unlimited_frame_rate` when set
    pub present_mode: Option<String>,
    /// 0 derives the count from the selected present mode
    pub min_image_count: u32,
    pub clear_color: [f32; 4],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            unlimited_frame_rate: false,
            present_mode: None,
            min_image_count: 2,
            clear_color: [0.45, 0.55, 0.60, 1.0],
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub log_to_file: bool,
    pub log_file: String,
    pub show_fps: bool,
    pub watch_config: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_to_file: false,
            log_file: "imgui_vulkan_demo.log".to_string(),
            show_fps: false,
            watch_config: true,
        }
    }
}

/// UI settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Where imgui persists window positions; empty disables it
    pub ini_file: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            ini_file: "imgui.ini".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from config.toml, falling back to defaults.
    ///
    /// Runs before the logger exists, so a load failure is handed back
    /// for the caller to report once logging is up.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        Self::load_or_default(CONFIG_PATH)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load_from_path(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Present modes to try, most preferred first. FIFO is always the last
    /// resort since every surface supports it.
    pub fn requested_present_modes(&self) -> Vec<vk::PresentModeKHR> {
        let Some(mode) = self.graphics.present_mode.as_deref() else {
            return if self.graphics.unlimited_frame_rate {
                vec![
                    vk::PresentModeKHR::MAILBOX,
                    vk::PresentModeKHR::IMMEDIATE,
                    vk::PresentModeKHR::FIFO,
                ]
            } else {
                vec![vk::PresentModeKHR::FIFO]
            };
        };

        let preferred = match mode.to_lowercase().as_str() {
            "immediate" => vk::PresentModeKHR::IMMEDIATE,
            "mailbox" => vk::PresentModeKHR::MAILBOX,
            "fifo" => vk::PresentModeKHR::FIFO,
            "fifo_relaxed" => vk::PresentModeKHR::FIFO_RELAXED,
            _ => {
                log::warn!("Unknown present mode '{}', defaulting to FIFO", mode);
                vk::PresentModeKHR::FIFO
            }
        };

        if preferred == vk::PresentModeKHR::FIFO {
            vec![preferred]
        } else {
            vec![preferred, vk::PresentModeKHR::FIFO]
        }
    }

    /// Take over the runtime-tunable settings of a reloaded file.
    pub fn apply_reload(&mut self, reloaded: &Config) -> ReloadChanges {
        let changes = ReloadChanges {
            clear_color: (reloaded.graphics.clear_color != self.graphics.clear_color)
                .then_some(reloaded.graphics.clear_color),
            fps_title_disabled: self.debug.show_fps && !reloaded.debug.show_fps,
        };

        self.graphics.clear_color = reloaded.graphics.clear_color;
        self.debug.show_fps = reloaded.debug.show_fps;
        changes
    }

    pub fn ini_file(&self) -> Option<PathBuf> {
        if self.ui.ini_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.ui.ini_file))
        }
    }
}

// =============================================================================
// HOT RELOAD
// =============================================================================

/// What a reload changed that the running app has to act on
#[derive(Debug, Default, PartialEq)]
pub struct ReloadChanges {
    /// Set only when the file's colour differs from the last applied one,
    /// so edits made in the UI survive unrelated reloads
    pub clear_color: Option<[f32; 4]>,
    /// The FPS title was on and is now off; the plain title must come back
    pub fps_title_disabled: bool,
}

/// Watches the config file and hands freshly parsed configs to the main thread.
///
/// notify delivers events on its own thread; `poll` drains them without
/// blocking so the frame loop can call it once per iteration.
pub struct ConfigWatcher {
    path: PathBuf,
    events: Receiver<notify::Result<notify::Event>>,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (tx, events) = mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // Receiver gone means the app is shutting down
            let _ = tx.send(res);
        })
        .context("Failed to create config watcher")?;

        watcher
            .watch(&path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {:?}", path))?;

        log::info!("Watching {:?} for changes", path);

        Ok(Self {
            path,
            events,
            _watcher: watcher,
        })
    }

    /// Returns the reloaded config if the file changed since the last poll.
    pub fn poll(&self) -> Option<Config> {
        let mut changed = false;
        for res in self.events.try_iter() {
            match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => changed = true,
                Ok(_) => {}
                Err(e) => log::warn!("Config watcher error: {}", e),
            }
        }

        if !changed {
            return None;
        }

        match Config::load_from_path(&self.path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Ignoring config change: {:#}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.graphics.min_image_count, 2);
        assert_eq!(config.graphics.clear_color, [0.45, 0.55, 0.60, 1.0]);
        assert_eq!(config.ini_file(), Some(PathBuf::from("imgui.ini")));
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [window]
            width = 800

            [graphics]
            clear_color = [0.0, 0.0, 0.0, 1.0]

            [ui]
            ini_file = ""
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert!(config.window.resizable);
        assert_eq!(config.graphics.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.ini_file(), None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::parse("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_from_path("does/not/exist/config.toml").unwrap();
        assert_eq!(config.window.title, WindowConfig::default().title);
    }

    #[test]
    fn malformed_file_reports_error_and_uses_defaults() {
        let path = std::env::temp_dir().join(format!("imgui_demo_bad_{}.toml", std::process::id()));
        std::fs::write(&path, "[window]\nwidth = \"wide\"").unwrap();

        let (config, error) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.window.width, 1280);
        let error = error.expect("malformed file must report an error");
        assert!(format!("{:#}", error).contains("Failed to parse config file"));
    }

    #[test]
    fn missing_file_reports_no_error() {
        let (config, error) = Config::load_or_default("does/not/exist/config.toml");
        assert!(error.is_none());
        assert_eq!(config.window.height, 720);
    }

    #[test]
    fn reload_with_same_color_keeps_ui_choice() {
        let mut config = Config::default();
        let reloaded = Config::parse("[debug]\nshow_fps = true").unwrap();

        let changes = config.apply_reload(&reloaded);

        assert_eq!(changes.clear_color, None);
        assert!(!changes.fps_title_disabled);
        assert!(config.debug.show_fps);
    }

    #[test]
    fn reload_with_new_color_reports_it() {
        let mut config = Config::default();
        let reloaded = Config::parse("[graphics]\nclear_color = [0.0, 0.0, 0.0, 1.0]").unwrap();

        let changes = config.apply_reload(&reloaded);

        assert_eq!(changes.clear_color, Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(config.graphics.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.apply_reload(&reloaded), ReloadChanges::default());
    }

    #[test]
    fn turning_fps_off_restores_title() {
        let mut config = Config::parse("[debug]\nshow_fps = true").unwrap();
        let changes = config.apply_reload(&Config::default());
        assert!(changes.fps_title_disabled);
        assert!(!config.debug.show_fps);
    }

    #[test]
    fn vsync_by_default() {
        let config = Config::default();
        assert_eq!(config.requested_present_modes(), vec![vk::PresentModeKHR::FIFO]);
    }

    #[test]
    fn unlimited_frame_rate_prefers_mailbox_then_immediate() {
        let config = Config::parse("[graphics]\nunlimited_frame_rate = true").unwrap();
        assert_eq!(
            config.requested_present_modes(),
            vec![
                vk::PresentModeKHR::MAILBOX,
                vk::PresentModeKHR::IMMEDIATE,
                vk::PresentModeKHR::FIFO,
            ]
        );
    }

    #[test]
    fn explicit_present_mode_wins() {
        let config = Config::parse(
            "[graphics]\nunlimited_frame_rate = true\npresent_mode = \"Immediate\"",
        )
        .unwrap();
        assert_eq!(
            config.requested_present_modes(),
            vec![vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO]
        );
    }

    #[test]
    fn unknown_present_mode_falls_back_to_fifo() {
        let config = Config::parse("[graphics]\npresent_mode = \"turbo\"").unwrap();
        assert_eq!(config.requested_present_modes(), vec![vk::PresentModeKHR::FIFO]);
    }
}
