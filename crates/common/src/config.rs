//! Application and assembly configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{StoryreelError, StoryreelResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scene assembly settings.
    #[serde(default)]
    pub assembly: AssemblyConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings passed explicitly into an assembly engine.
///
/// Several engines with different configs can coexist in one process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Directory for final videos and exports.
    pub output_dir: PathBuf,

    /// Working directory for intermediate scene files.
    pub temp_dir: PathBuf,

    /// Target resolution for composed scenes.
    pub resolution: ResolutionPreset,

    /// Output frame rate for composed scenes.
    pub fps: u32,

    /// Maximum number of renderer processes running at once.
    pub max_concurrent_renders: usize,

    /// Font used for dialogue text. `None` lets the renderer pick its default.
    #[serde(default)]
    pub font_file: Option<PathBuf>,

    /// Renderer binary.
    pub ffmpeg_binary: String,

    /// Probe binary.
    pub ffprobe_binary: String,
}

/// Named output resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionPreset {
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    FullHd1080,
    #[serde(rename = "1440p")]
    Qhd1440,
    #[serde(rename = "2160p")]
    Uhd2160,
}

impl ResolutionPreset {
    pub const ALL: [ResolutionPreset; 4] = [
        ResolutionPreset::Hd720,
        ResolutionPreset::FullHd1080,
        ResolutionPreset::Qhd1440,
        ResolutionPreset::Uhd2160,
    ];

    /// Width and height in pixels.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Hd720 => (1280, 720),
            Self::FullHd1080 => (1920, 1080),
            Self::Qhd1440 => (2560, 1440),
            Self::Uhd2160 => (3840, 2160),
        }
    }

    /// Nominal video bitrate budget in kbps.
    pub fn bitrate_kbps(self) -> u32 {
        match self {
            Self::Hd720 => 2500,
            Self::FullHd1080 => 5000,
            Self::Qhd1440 => 8000,
            Self::Uhd2160 => 15000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hd720 => "720p",
            Self::FullHd1080 => "1080p",
            Self::Qhd1440 => "1440p",
            Self::Uhd2160 => "2160p",
        }
    }
}

impl std::str::FromStr for ResolutionPreset {
    type Err = StoryreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                StoryreelError::invalid_input(format!(
                    "Unknown resolution: {s}. Use: 720p, 1080p, 1440p, 2160p"
                ))
            })
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "storyreel=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            temp_dir: std::env::temp_dir().join("storyreel"),
            resolution: ResolutionPreset::FullHd1080,
            fps: 24,
            max_concurrent_renders: 2,
            font_file: None,
            ffmpeg_binary: "ffmpeg".to_string(),
            ffprobe_binary: "ffprobe".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AssemblyConfig {
    /// Defaults with explicit output and working directories.
    pub fn with_dirs(output_dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            temp_dir: temp_dir.into(),
            ..Self::default()
        }
    }

    /// Target width and height in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        self.resolution.dimensions()
    }

    /// Reject settings no engine can run with.
    pub fn validate(&self) -> StoryreelResult<()> {
        if self.fps == 0 {
            return Err(StoryreelError::config("fps must be greater than zero"));
        }
        if self.max_concurrent_renders == 0 {
            return Err(StoryreelError::config(
                "max_concurrent_renders must be greater than zero",
            ));
        }
        if self.ffmpeg_binary.trim().is_empty() {
            return Err(StoryreelError::config("ffmpeg_binary must not be empty"));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from `config_path`, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("storyreel").join("config.json")
}

/// Default directory for finished videos.
fn default_output_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("storyreel").join("videos")
}
