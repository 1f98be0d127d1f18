//! Configuration for deskstick.
//!
//! Loads configuration from a TOML file at `~/.config/deskstick/config.toml`.
//! Auto-generates the default config file on first run if missing; a file
//! that fails to parse logs a warning and falls back to defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::shared::Rect;
use crate::stick::DEFAULT_STICK_GAP;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub snap: SnapConfig,
    #[serde(default)]
    pub pin: PinConfig,
    #[serde(default, rename = "instance")]
    pub instances: Vec<InstanceConfig>,
}

/// Snapping behavior, shared across all instance windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapConfig {
    pub stick_on_move: bool,
    pub stick_on_resize: bool,
    pub stick_to_screen: bool,
    pub stick_to_other: bool,
    pub stick_gap: i32,
}

impl Default for SnapConfig {
    fn default() -> Self {
        Self {
            stick_on_move: true,
            stick_on_resize: true,
            stick_to_screen: true,
            stick_to_other: true,
            stick_gap: DEFAULT_STICK_GAP,
        }
    }
}

/// Desktop-pinning behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    /// Repeat suppression for the show-desktop gesture, in milliseconds.
    pub show_desktop_cooldown_ms: u64,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            show_desktop_cooldown_ms: 200,
        }
    }
}

/// One pinned desktop window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Window opacity in percent, clamped to 10..=100 when applied.
    #[serde(default = "default_opacity")]
    pub opacity: u8,
}

fn default_opacity() -> u8 {
    100
}

impl InstanceConfig {
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            let config = Self::default_with_instance();
            if let Err(e) = config.save_to(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config = match toml::from_str::<Config>(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to parse config file {:?}: {}, using defaults",
                    config_path, e
                );
                return Ok(Self::default_with_instance());
            }
        };

        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Persist the current configuration (instance geometry included).
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Record new bounds for a named instance. Returns true when the name
    /// matched.
    pub fn update_instance_bounds(&mut self, name: &str, bounds: Rect) -> bool {
        match self.instances.iter_mut().find(|i| i.name == name) {
            Some(instance) => {
                instance.x = bounds.x;
                instance.y = bounds.y;
                instance.width = bounds.width;
                instance.height = bounds.height;
                true
            }
            None => false,
        }
    }

    /// Get the path to the config file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("deskstick");

        Ok(config_dir.join("config.toml"))
    }

    /// A default setup with one instance window, so a fresh install shows
    /// something.
    fn default_with_instance() -> Self {
        Self {
            instances: vec![InstanceConfig {
                name: "main".to_string(),
                x: 40,
                y: 40,
                width: 420,
                height: 560,
                opacity: 100,
            }],
            ..Self::default()
        }
    }

    fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, toml_string).context("Failed to write config file")?;

        info!("Configuration saved to {:?}", path);
        Ok(())
    }
}
