// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors, and an
// optional watcher that re-reads the file when it changes on disk.

use anyhow::{Context, Result};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use winit::keyboard::KeyCode;

use crate::frame::renderer::DEFAULT_CLEAR_COLOR;

/// Default location, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
    pub controls: ControlsConfig,
}

/// Window settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Wind Renderer".to_string(),
            width: 800,
            height: 600,
            fullscreen: false,
        }
    }
}

/// Graphics settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphicsConfig {
    pub clear_color: [f32; 4],
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            clear_color: DEFAULT_CLEAR_COLOR,
        }
    }
}

/// Debug settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    /// Used when RUST_LOG is not set
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: String,
    pub show_fps: bool,
    pub hot_reload: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            log_level: "info".to_string(),
            log_to_file: false,
            log_file: "wind_renderer.log".to_string(),
            show_fps: true,
            hot_reload: false,
        }
    }
}

/// Control key bindings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControlsConfig {
    pub fullscreen_key: String,
    pub quit_key: String,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            fullscreen_key: "F11".to_string(),
            quit_key: "Escape".to_string(),
        }
    }
}

impl ControlsConfig {
    pub fn fullscreen(&self) -> KeyCode {
        key_code(&self.fullscreen_key).unwrap_or_else(|| {
            log::warn!(
                "Unknown fullscreen key '{}', defaulting to F11",
                self.fullscreen_key
            );
            KeyCode::F11
        })
    }

    pub fn quit(&self) -> KeyCode {
        key_code(&self.quit_key).unwrap_or_else(|| {
            log::warn!("Unknown quit key '{}', defaulting to Escape", self.quit_key);
            KeyCode::Escape
        })
    }
}

impl Config {
    /// Load config.toml, falling back to defaults. Runs before logging is up,
    /// so a load error is handed back for the caller to report.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
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

    /// Level used when RUST_LOG does not override it; `None` if unrecognised
    pub fn log_level(&self) -> Option<log::LevelFilter> {
        self.debug.log_level.parse().ok()
    }
}

/// Map a key name from the config file to a winit key code
pub fn key_code(name: &str) -> Option<KeyCode> {
    let code = match name.to_ascii_lowercase().as_str() {
        "escape" | "esc" => KeyCode::Escape,
        "space" => KeyCode::Space,
        "enter" | "return" => KeyCode::Enter,
        "tab" => KeyCode::Tab,
        "f1" => KeyCode::F1,
        "f2" => KeyCode::F2,
        "f3" => KeyCode::F3,
        "f4" => KeyCode::F4,
        "f5" => KeyCode::F5,
        "f6" => KeyCode::F6,
        "f7" => KeyCode::F7,
        "f8" => KeyCode::F8,
        "f9" => KeyCode::F9,
        "f10" => KeyCode::F10,
        "f11" => KeyCode::F11,
        "f12" => KeyCode::F12,
        "q" => KeyCode::KeyQ,
        "f" => KeyCode::KeyF,
        _ => return None,
    };
    Some(code)
}

// =============================================================================
// HOT RELOAD
// =============================================================================

/// Watches the config file and hands out freshly parsed configs.
///
/// Editors often replace the file instead of writing it, so the parent
/// directory is watched and events are filtered by file name.
pub struct ConfigWatcher {
    rx: mpsc::Receiver<notify::Result<notify::Event>>,
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (tx, rx) = mpsc::channel();

        let mut watcher =
            notify::recommended_watcher(tx).context("Failed to create config watcher")?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch config directory: {}", dir.display()))?;

        log::info!("Watching {} for changes", path.display());

        Ok(Self {
            rx,
            path,
            _watcher: watcher,
        })
    }

    /// Drain pending file events without blocking.
    ///
    /// Returns the reloaded config if the file changed and still parses; a
    /// broken edit is logged and the previous config stays in effect.
    pub fn poll(&self) -> Option<Config> {
        let mut changed = false;
        for event in self.rx.try_iter() {
            match event {
                Ok(event) => {
                    if is_content_change(&event.kind)
                        && event.paths.iter().any(|p| same_file_name(p, &self.path))
                    {
                        changed = true;
                    }
                }
                Err(e) => log::warn!("Config watcher error: {}", e),
            }
        }

        if !changed {
            return None;
        }

        match Config::load_from_path(&self.path) {
            Ok(config) => {
                log::info!("Reloaded {}", self.path.display());
                Some(config)
            }
            Err(e) => {
                log::warn!("Ignoring config change: {:#}", e);
                None
            }
        }
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

fn same_file_name(a: &Path, b: &Path) -> bool {
    a.file_name().is_some() && a.file_name() == b.file_name()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.graphics.clear_color, [0.01, 0.01, 0.01, 1.0]);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::parse(
            r#"
            [window]
            width = 1920

            [graphics]
            clear_color = [0.2, 0.3, 0.4, 1.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1920);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.clear_color, [0.2, 0.3, 0.4, 1.0]);
        assert_eq!(config.debug, DebugConfig::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::parse("[window\nwidth = ").is_err());
        assert!(Config::parse("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = Config::load_from_path("definitely/not/here/config.toml").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn key_names_are_case_insensitive() {
        assert_eq!(key_code("Escape"), Some(KeyCode::Escape));
        assert_eq!(key_code("ESC"), Some(KeyCode::Escape));
        assert_eq!(key_code("f11"), Some(KeyCode::F11));
        assert_eq!(key_code("PrintScreenAndCoffee"), None);
    }

    #[test]
    fn unknown_keys_fall_back_to_defaults() {
        let controls = ControlsConfig {
            fullscreen_key: "nope".to_string(),
            quit_key: "also nope".to_string(),
        };
        assert_eq!(controls.fullscreen(), KeyCode::F11);
        assert_eq!(controls.quit(), KeyCode::Escape);
    }

    #[test]
    fn log_level_parses() {
        let mut config = Config::default();
        assert_eq!(config.log_level(), Some(log::LevelFilter::Info));
        config.debug.log_level = "debug".to_string();
        assert_eq!(config.log_level(), Some(log::LevelFilter::Debug));
        config.debug.log_level = "chatty".to_string();
        assert_eq!(config.log_level(), None);
    }

    #[test]
    fn broken_file_falls_back_and_reports_the_error() {
        let path = std::env::temp_dir().join(format!(
            "wind_renderer_broken_config_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[window]\nwidth = \"wide\"\n").unwrap();

        let (config, error) = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config, Config::default());
        let error = error.expect("parse failure is reported");
        assert!(format!("{error:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn missing_file_reports_nothing() {
        let (config, error) = Config::load_or_default("definitely/not/here/config.toml");
        assert_eq!(config, Config::default());
        assert!(error.is_none());
    }

    #[test]
    fn watcher_filters_by_file_name() {
        assert!(same_file_name(
            Path::new("./config.toml"),
            Path::new("/tmp/x/config.toml")
        ));
        assert!(!same_file_name(
            Path::new("./config.toml.swp"),
            Path::new("config.toml")
        ));
        assert!(is_content_change(&EventKind::Modify(
            notify::event::ModifyKind::Any
        )));
        assert!(!is_content_change(&EventKind::Access(
            notify::event::AccessKind::Any
        )));
    }
}
