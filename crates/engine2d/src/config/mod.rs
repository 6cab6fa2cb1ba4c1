//! # Configuration System
//!
//! File-backed engine settings. Any `Serialize + Deserialize + Default` type
//! can implement [`Config`] to gain TOML / RON loading and saving; the
//! engine's own settings live in [`EngineConfig`].
//!
//! ## Sections
//!
//! - **Window**: title, resolution and presentation flags
//! - **Camera**: pixels per world unit
//! - **Physics**: gravity, solver iterations, debug drawing
//! - **Timing**: update, fixed update and render rates
//! - **Logging / assets**: log level, FPS overlay, loader pool size and root

pub use serde::{Deserialize, Serialize};

use std::path::Path;

use crate::foundation::math::Vector;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match extension(path) {
            Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Some("ron") => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match extension(path) {
            Some("toml") => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Some("ron") => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
            _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A value is out of its allowed range
    #[error("Invalid setting '{field}': {reason}")]
    Invalid {
        /// Setting name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Window settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Title bar text
    pub title: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Start fullscreen
    pub fullscreen: bool,
    /// Allow resizing
    pub resizable: bool,
    /// Wait for vertical sync
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "engine2d".to_string(),
            width: 1280,
            height: 720,
            fullscreen: false,
            resizable: true,
            vsync: true,
        }
    }
}

/// Physics settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// World gravity
    pub gravity: Vector,
    /// Solver velocity iterations per step
    pub velocity_iterations: usize,
    /// Solver position (stabilization) iterations per step
    pub position_iterations: usize,
    /// Dispatch `DrawDebug` after each step
    pub debug_draw: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vector::new(0.0, -10.0),
            velocity_iterations: 10,
            position_iterations: 10,
            debug_draw: false,
        }
    }
}

/// Clock rates, in ticks per second
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Update / LateUpdate rate
    pub update_rate: f32,
    /// FixedUpdate / PhysicsUpdate rate
    pub fixed_rate: f32,
    /// Render rate
    pub render_rate: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            update_rate: 60.0,
            fixed_rate: 50.0,
            render_rate: 60.0,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Pixels per world unit at zoom 1
    pub pixel_ratio: f32,
    /// Physics settings
    pub physics: PhysicsConfig,
    /// Clock rates
    pub timing: TimingConfig,
    /// `log` level name (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
    /// Show an FPS counter through the debug draw batch
    pub show_fps: bool,
    /// Asset loader worker threads
    pub asset_workers: usize,
    /// Directory the default filesystem reads assets from
    pub asset_root: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            pixel_ratio: 64.0,
            physics: PhysicsConfig::default(),
            timing: TimingConfig::default(),
            log_level: "info".to_string(),
            show_fps: false,
            asset_workers: 2,
            asset_root: "assets".to_string(),
        }
    }
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Set the window title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.window.title = title.into();
        self
    }

    /// Set the window resolution
    pub const fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.window.width = width;
        self.window.height = height;
        self
    }

    /// Set fullscreen
    pub const fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.window.fullscreen = fullscreen;
        self
    }

    /// Set pixels per world unit
    pub const fn with_pixel_ratio(mut self, ratio: f32) -> Self {
        self.pixel_ratio = ratio;
        self
    }

    /// Set gravity
    pub const fn with_gravity(mut self, gravity: Vector) -> Self {
        self.physics.gravity = gravity;
        self
    }

    /// Enable physics debug drawing
    pub const fn with_debug_draw(mut self, enabled: bool) -> Self {
        self.physics.debug_draw = enabled;
        self
    }

    /// Set the log level name
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the asset root directory
    pub fn with_asset_root(mut self, root: impl Into<String>) -> Self {
        self.asset_root = root.into();
        self
    }

    /// Resolution as a vector
    #[allow(clippy::cast_precision_loss)]
    pub fn resolution(&self) -> Vector {
        Vector::new(self.window.width as f32, self.window.height as f32)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid {
                field: "window",
                reason: format!("resolution {}x{} is empty", self.window.width, self.window.height),
            });
        }
        if !self.pixel_ratio.is_finite() || self.pixel_ratio <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "pixel_ratio",
                reason: format!("must be finite and positive, got {}", self.pixel_ratio),
            });
        }
        for (field, rate) in [
            ("timing.update_rate", self.timing.update_rate),
            ("timing.fixed_rate", self.timing.fixed_rate),
            ("timing.render_rate", self.timing.render_rate),
        ] {
            if !(rate > 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be positive, got {rate}"),
                });
            }
        }
        if self.physics.velocity_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "physics.velocity_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.physics.position_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "physics.position_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.asset_workers == 0 {
            return Err(ConfigError::Invalid {
                field: "asset_workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(ConfigError::Invalid {
                field: "log_level",
                reason: format!("unknown level '{}'", self.log_level),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("engine2d-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resolution(), Vector::new(1280.0, 720.0));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(matches!(
            EngineConfig::default().with_pixel_ratio(0.0).validate(),
            Err(ConfigError::Invalid { field: "pixel_ratio", .. })
        ));
        assert!(EngineConfig::default().with_resolution(0, 10).validate().is_err());
        assert!(EngineConfig::default().with_log_level("shouty").validate().is_err());
        assert!(EngineConfig::default().with_pixel_ratio(f32::INFINITY).validate().is_err());

        let mut config = EngineConfig::default();
        config.physics.position_iterations = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "physics.position_iterations",
                ..
            })
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let path = temp_path("config.toml");
        let config = EngineConfig::default()
            .with_title("demo")
            .with_gravity(Vector::new(0.0, -3.0));
        config.save_to_file(&path).expect("save");
        let loaded = EngineConfig::load_from_file(&path).expect("load");
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_partial_file_uses_defaults() {
        let path = temp_path("config.ron");
        std::fs::write(&path, "(pixel_ratio: 32.0, window: (title: \"ron\"))").expect("write");
        let loaded = EngineConfig::load_from_file(&path).expect("load");
        let _ = std::fs::remove_file(&path);
        assert!((loaded.pixel_ratio - 32.0).abs() < f32::EPSILON);
        assert_eq!(loaded.window.title, "ron");
        assert_eq!(loaded.window.width, 1280);
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            EngineConfig::default().save_to_file("settings.ini"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
