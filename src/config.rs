//! Configuration for the Area window client layer
//!
//! Loads configuration from TOML file at `~/.config/area/client.toml`
//! Auto-generates default config file on first run if missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub behavior: BehaviorConfig,
    pub decorations: DecorationConfig,
    pub liveness: LivenessConfig,
    pub classification: ClassificationConfig,
}

impl Config {
    /// Load configuration from file, or use defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            info!("Config file not found at {:?}, using defaults", config_path);
            if let Err(e) = Self::save_default(&config_path) {
                warn!("Failed to create default config file: {}", e);
            }
            return Ok(Self::default());
        }

        let config = Self::load_from(&config_path)?;
        info!("Configuration loaded from {:?}", config_path);
        debug!("Config: {:?}", config);
        Ok(config)
    }

    /// Parse a configuration file at an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("area");

        Ok(config_dir.join("client.toml"))
    }

    fn save_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(&Self::default())
            .context("Failed to serialize default config")?;

        fs::write(path, toml_string).context("Failed to write default config file")?;

        info!("Created default config file at {:?}", path);
        Ok(())
    }
}

/// Window behavior configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Animate rolling windows up and down
    pub animate_shade: bool,
    /// Shade animation speed: 0 (slowest) to 10 (fastest)
    pub shade_speed: u8,
    /// Number of virtual desktops
    pub desktops: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            animate_shade: true,
            shade_speed: 5,
            desktops: 4,
        }
    }
}

/// Stock decoration geometry and colors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorationConfig {
    /// Titlebar height in pixels
    pub titlebar_height: u32,
    /// Border width in pixels
    pub border_width: u32,
    /// Keep the bottom border while the window is shaded
    pub shaded_bottom_border: bool,
    /// Titlebar color (hex: 0xRRGGBB)
    pub titlebar_color: u32,
    /// Border color (hex: 0xRRGGBB)
    pub border_color: u32,
}

impl Default for DecorationConfig {
    fn default() -> Self {
        Self {
            titlebar_height: 32,
            border_width: 2,
            shaded_bottom_border: false,
            titlebar_color: 0x3b4252, // Polar Night Lighter
            border_color: 0x5e81ac,   // Frost Blue
        }
    }
}

/// Helper programs used when a client stops answering pings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Interactive "application not responding" helper
    pub kill_helper: String,
    /// Remote execution program used to kill clients on other hosts
    pub remote_exec: String,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            kill_helper: "area-kill-helper".to_string(),
            remote_exec: "xon".to_string(),
        }
    }
}

/// Window type classification exceptions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Resource class prefixes (lowercase) whose dialogs are treated as normal windows
    pub dialog_as_normal_classes: Vec<String>,
    /// Treat screen-wide menus sitting just above the screen as top menus
    pub detect_top_menu: bool,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            dialog_as_normal_classes: vec!["openoffice.org".to_string()],
            detect_top_menu: true,
        }
    }
}
