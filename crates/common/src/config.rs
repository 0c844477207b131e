//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SpancapError, SpancapResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where recordings are written.
    pub output_dir: PathBuf,

    /// Encoder invocation settings.
    pub encoder: EncoderSettings,

    /// Selection overlay settings.
    pub overlay: OverlaySettings,

    /// Display topology overrides.
    pub topology: TopologySettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Screen grabber used as the encoder's video input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoGrabber {
    /// X11 root window grabbing (`-f x11grab`).
    X11grab,
    /// GDI desktop grabbing on Windows (`-f gdigrab`).
    Gdigrab,
}

impl VideoGrabber {
    /// Grabber native to the platform we were built for.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "windows") {
            Self::Gdigrab
        } else {
            Self::X11grab
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X11grab => "x11grab",
            Self::Gdigrab => "gdigrab",
        }
    }
}

/// Encoder invocation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderSettings {
    /// Encoder executable; a bare name is looked up on `PATH`.
    pub binary: PathBuf,

    /// Capture frame rate.
    pub framerate: u32,

    /// Video input device family.
    pub grabber: VideoGrabber,

    /// Audio input format (`pulse`, `dshow`, ...).
    pub audio_format: String,

    /// Audio input source name as understood by `audio_format`.
    pub audio_source: String,

    /// x264 preset.
    pub preset: String,

    /// x264 constant rate factor.
    pub crf: u32,

    /// Output pixel format.
    pub pixel_format: String,

    /// Audio codec.
    pub audio_codec: String,

    /// Audio bitrate (ffmpeg notation, e.g. `192k`).
    pub audio_bitrate: String,

    /// Output container extension.
    pub container: String,
}

/// Selection overlay parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Pixels trimmed from each edge of the crop so the overlay's own
    /// selection outline never shows up in the recording.
    pub ui_margin_px: u32,
}

/// Display topology overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologySettings {
    /// Scale factor applied to every enumerated display.
    pub scale_factor: Option<f64>,

    /// Fixed display layout. When non-empty, platform enumeration is skipped.
    pub displays: Vec<DisplayOverride>,
}

/// A display declared in configuration instead of enumerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayOverride {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    #[serde(default = "one")]
    pub scale_factor: f64,
    #[serde(default)]
    pub primary: bool,
}

fn one() -> f64 {
    1.0
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "spancap=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_videos_dir(),
            encoder: EncoderSettings::default(),
            overlay: OverlaySettings::default(),
            topology: TopologySettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        let grabber = VideoGrabber::platform_default();
        let (audio_format, audio_source) = match grabber {
            VideoGrabber::X11grab => ("pulse", "default"),
            VideoGrabber::Gdigrab => ("dshow", "audio=virtual-audio-capturer"),
        };
        Self {
            binary: PathBuf::from("ffmpeg"),
            framerate: 60,
            grabber,
            audio_format: audio_format.to_string(),
            audio_source: audio_source.to_string(),
            preset: "ultrafast".to_string(),
            crf: 22,
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            container: "mov".to_string(),
        }
    }
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self { ui_margin_px: 2 }
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

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                Self::default()
            }
        }
    }

    /// Load config from an explicit path. Missing or malformed files are errors.
    pub fn load_from(path: &Path) -> SpancapResult<Self> {
        if !path.exists() {
            return Err(SpancapError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| SpancapError::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject values the encoder invocation cannot be built from.
    pub fn validate(&self) -> SpancapResult<()> {
        if self.encoder.framerate == 0 {
            return Err(SpancapError::config("encoder.framerate must be positive"));
        }
        if self.encoder.container.trim().is_empty() {
            return Err(SpancapError::config("encoder.container must not be empty"));
        }
        if let Some(scale) = self.topology.scale_factor {
            if !(scale.is_finite() && scale > 0.0) {
                return Err(SpancapError::config(format!(
                    "topology.scale_factor must be positive, got {scale}"
                )));
            }
        }
        for display in &self.topology.displays {
            if display.width == 0 || display.height == 0 {
                return Err(SpancapError::config(format!(
                    "display {} has zero size",
                    display.name
                )));
            }
            if !(display.scale_factor.is_finite() && display.scale_factor > 0.0) {
                return Err(SpancapError::config(format!(
                    "display {} scale_factor must be positive, got {}",
                    display.name, display.scale_factor
                )));
            }
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("spancap").join("config.json")
}

/// Default recordings directory.
fn default_videos_dir() -> PathBuf {
    std::env::var("XDG_VIDEOS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join("Videos"))
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
}
