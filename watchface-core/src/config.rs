use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{format::Units, model::WEATHER_DATA_PATH};

/// Location used when the user never picked one.
pub const DEFAULT_LOCATION: &str = "94043";

/// Shape of the watch screen, reported with the window insets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenShape {
    Round,
    Square,
}

/// Text and image sizes for one screen shape, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDimensions {
    pub time_text_size_interactive: f32,
    pub time_text_size_ambient: f32,
    pub image_size: u32,
    pub date_text_size: f32,
    pub temp_max_text_size: f32,
    pub temp_min_text_size: f32,
}

impl FaceDimensions {
    pub const ROUND: FaceDimensions = FaceDimensions {
        time_text_size_interactive: 48.0,
        time_text_size_ambient: 52.0,
        image_size: 48,
        date_text_size: 22.0,
        temp_max_text_size: 30.0,
        temp_min_text_size: 26.0,
    };

    pub const SQUARE: FaceDimensions = FaceDimensions {
        time_text_size_interactive: 42.0,
        time_text_size_ambient: 46.0,
        image_size: 40,
        date_text_size: 20.0,
        temp_max_text_size: 26.0,
        temp_min_text_size: 22.0,
    };
}

/// Per-shape dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionsConfig {
    pub round: FaceDimensions,
    pub square: FaceDimensions,
}

impl Default for DimensionsConfig {
    fn default() -> Self {
        Self { round: FaceDimensions::ROUND, square: FaceDimensions::SQUARE }
    }
}

impl DimensionsConfig {
    pub fn for_shape(&self, shape: ScreenShape) -> &FaceDimensions {
        match shape {
            ScreenShape::Round => &self.round,
            ScreenShape::Square => &self.square,
        }
    }
}

/// Watch-face behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchFaceConfig {
    /// Repaint interval while visible and interactive.
    pub interactive_update_rate_ms: u64,

    /// Transport path carrying weather snapshots.
    pub snapshot_path: String,
}

impl Default for WatchFaceConfig {
    fn default() -> Self {
        Self { interactive_update_rate_ms: 1000, snapshot_path: WEATHER_DATA_PATH.to_string() }
    }
}

impl WatchFaceConfig {
    pub fn interactive_update_rate(&self) -> Duration {
        Duration::from_millis(self.interactive_update_rate_ms.max(1))
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// preferred_location = "94043"
/// units = "metric"
///
/// [watchface]
/// interactive_update_rate_ms = 1000
/// snapshot_path = "/weather-data"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Location the phone queries weather for.
    pub preferred_location: Option<String>,

    #[serde(default)]
    pub units: Units,

    #[serde(default)]
    pub watchface: WatchFaceConfig,

    #[serde(default)]
    pub dimensions: DimensionsConfig,
}

impl Config {
    /// The configured location, or [`DEFAULT_LOCATION`].
    pub fn location(&self) -> &str {
        self.preferred_location
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_LOCATION)
    }

    pub fn set_location(&mut self, location: impl Into<String>) {
        self.preferred_location = Some(location.into());
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "sunshine", "watchface")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
