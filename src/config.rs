//! Configuration management for broadcast-stage

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::input::Modifier;
use crate::keying::DEFAULT_THRESHOLD;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Stage geometry and window title
    #[serde(default)]
    pub stage: StageConfig,

    /// Chroma key settings
    #[serde(default)]
    pub keying: KeyingConfig,

    /// Screen share target size
    #[serde(default)]
    pub screen: ScreenConfig,

    /// Input backend and gesture modifiers
    #[serde(default)]
    pub input: InputConfig,

    /// Synthetic source settings
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Stage width in pixels (drag offsets are relative to this)
    #[serde(default = "default_stage_width")]
    pub width: u32,

    /// Stage height in pixels (items are full height)
    #[serde(default = "default_stage_height")]
    pub height: u32,

    /// Window title before any item fragments are appended
    #[serde(default = "default_base_title")]
    pub base_title: String,

    /// Horizontal offset between newly added items, in percent
    #[serde(default = "default_spacing_percent")]
    pub spacing_percent: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyingConfig {
    /// R, G and B must all exceed this for a pixel to be keyed out
    #[serde(default = "default_threshold")]
    pub threshold: u8,

    /// Compositing loop rate in frames per second
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenConfig {
    /// Target screen share width
    #[serde(default = "default_screen_width")]
    pub width: u32,

    /// Target screen share height
    #[serde(default = "default_screen_height")]
    pub height: u32,

    /// Maximum display captures per second
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InputBackendKind {
    /// JSON lines on standard input
    #[default]
    Stdin,
    /// Global keyboard/mouse hook (requires the `global-input` feature)
    Global,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub backend: InputBackendKind,

    /// Modifier that must be held to toggle chroma keying with a click
    #[serde(default = "default_toggle_modifier")]
    pub toggle_modifier: Modifier,

    /// Modifier that sends an item to the back on double click
    #[serde(default = "default_lower_modifier")]
    pub lower_modifier: Modifier,

    /// Maximum gap between two clicks of a double click (ms)
    #[serde(default = "default_double_click_ms")]
    pub double_click_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Labels of the synthetic cameras offered by device enumeration
    #[serde(default = "default_cameras")]
    pub cameras: Vec<String>,

    /// Synthetic camera frame width
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,

    /// Synthetic camera frame height
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
}

// Default value functions
fn default_stage_width() -> u32 {
    1920
}

fn default_stage_height() -> u32 {
    1080
}

fn default_base_title() -> String {
    "broadcast".to_string()
}

fn default_spacing_percent() -> i32 {
    10
}

fn default_threshold() -> u8 {
    DEFAULT_THRESHOLD
}

fn default_frame_rate() -> u32 {
    10
}

fn default_screen_width() -> u32 {
    1512
}

fn default_screen_height() -> u32 {
    1024
}

fn default_toggle_modifier() -> Modifier {
    Modifier::Meta
}

fn default_lower_modifier() -> Modifier {
    Modifier::Shift
}

fn default_double_click_ms() -> u64 {
    500
}

fn default_cameras() -> Vec<String> {
    vec!["FaceTime HD Camera".to_string()]
}

fn default_frame_width() -> u32 {
    1280
}

fn default_frame_height() -> u32 {
    720
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            width: default_stage_width(),
            height: default_stage_height(),
            base_title: default_base_title(),
            spacing_percent: default_spacing_percent(),
        }
    }
}

impl Default for KeyingConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            frame_rate: default_frame_rate(),
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: default_screen_width(),
            height: default_screen_height(),
            frame_rate: default_frame_rate(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            backend: InputBackendKind::default(),
            toggle_modifier: default_toggle_modifier(),
            lower_modifier: default_lower_modifier(),
            double_click_ms: default_double_click_ms(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            cameras: default_cameras(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stage: StageConfig::default(),
            keying: KeyingConfig::default(),
            screen: ScreenConfig::default(),
            input: InputConfig::default(),
            sources: SourcesConfig::default(),
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let mut config = Config::default();
            config.config_path = Some(config_path);
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "broadcast-stage", "stage")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.stage.width, 1920);
        assert_eq!(config.stage.base_title, "broadcast");
        assert_eq!(config.keying.threshold, 244);
        assert_eq!(config.keying.frame_rate, 10);
        assert_eq!((config.screen.width, config.screen.height), (1512, 1024));
        assert_eq!(config.screen.frame_rate, 10);
        assert_eq!(config.input.backend, InputBackendKind::Stdin);
        assert_eq!(config.input.toggle_modifier, Modifier::Meta);
        assert_eq!(config.input.lower_modifier, Modifier::Shift);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [input]
            backend = "global"
            toggle_modifier = "control"

            [sources]
            cameras = ["FaceTime HD Camera", "Studio Display Camera"]
            "#,
        )
        .unwrap();
        assert_eq!(config.input.backend, InputBackendKind::Global);
        assert_eq!(config.input.toggle_modifier, Modifier::Control);
        assert_eq!(config.input.double_click_ms, 500);
        assert_eq!(config.sources.cameras.len(), 2);
        assert_eq!(config.sources.frame_width, 1280);
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut config = Config::default();
        config.stage.base_title = "studio".to_string();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = Config::parse(&text).unwrap();
        assert_eq!(parsed.stage.base_title, "studio");
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        assert!(Config::parse("[keying]\nthreshold = 300\n").is_err());
    }
}
