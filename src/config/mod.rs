use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Preset;
use crate::MediaKitError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External executables
    pub tools: ToolsConfig,

    /// Conversion defaults
    pub convert: ConvertConfig,

    /// Download settings
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// FFmpeg program name or path
    pub ffmpeg: String,

    /// ffprobe program name or path
    pub ffprobe: String,

    /// yt-dlp program name or path
    pub yt_dlp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Default CRF quality
    pub quality: i32,

    /// Default encoder preset
    pub preset: Preset,

    /// Default audio codec
    pub audio_codec: String,

    /// Video encoder passed to `-c:v`
    pub video_codec: String,

    /// Extension picked up by batch mode
    pub source_extension: String,

    /// Extension of derived output files
    pub target_extension: String,

    /// Kill the transcoder after this many seconds without output
    pub stall_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Root directory for downloaded media
    pub media_root: PathBuf,

    /// Root directory for metadata records
    pub info_root: PathBuf,

    /// yt-dlp audio quality for MP3 extraction
    pub audio_quality: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            yt_dlp: "yt-dlp".to_string(),
        }
    }
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            quality: 23,
            preset: Preset::Medium,
            audio_codec: "copy".to_string(),
            video_codec: "libx264".to_string(),
            source_extension: "mkv".to_string(),
            target_extension: "mp4".to_string(),
            stall_timeout_secs: None,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("downloads"),
            info_root: PathBuf::from("informations"),
            audio_quality: "192K".to_string(),
        }
    }
}

impl ConvertConfig {
    pub fn stall_timeout(&self) -> Option<Duration> {
        self.stall_timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file does not exist: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::config_path().ok().filter(|path| path.exists()),
        };

        let Some(config_path) = config_path else {
            tracing::debug!("No config file found, using defaults");
            return Ok(Self::default());
        };

        tracing::debug!("Loading config from {}", config_path.display());
        let content = fs_err::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("mediakit.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("mediakit").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let programs = [
            ("tools.ffmpeg", &self.tools.ffmpeg),
            ("tools.ffprobe", &self.tools.ffprobe),
            ("tools.yt_dlp", &self.tools.yt_dlp),
            ("convert.video_codec", &self.convert.video_codec),
            ("convert.source_extension", &self.convert.source_extension),
            ("convert.target_extension", &self.convert.target_extension),
        ];

        for (key, value) in programs {
            if value.trim().is_empty() {
                return Err(MediaKitError::ConfigError(format!("{key} must not be empty")).into());
            }
        }

        if self.convert.stall_timeout_secs == Some(0) {
            return Err(MediaKitError::ConfigError(
                "convert.stall_timeout_secs must be greater than zero".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  FFmpeg: {}", self.tools.ffmpeg);
        println!("  ffprobe: {}", self.tools.ffprobe);
        println!("  yt-dlp: {}", self.tools.yt_dlp);
        println!("  Quality (CRF): {}", self.convert.quality);
        println!("  Preset: {}", self.convert.preset);
        println!("  Audio codec: {}", self.convert.audio_codec);
        println!("  Video codec: {}", self.convert.video_codec);
        println!(
            "  Batch: *.{} -> *.{}",
            self.convert.source_extension, self.convert.target_extension
        );
        match self.convert.stall_timeout_secs {
            Some(secs) => println!("  Stall timeout: {}s", secs),
            None => println!("  Stall timeout: none"),
        }
        println!("  Media folder: {}", self.download.media_root.display());
        println!("  Info folder: {}", self.download.info_root.display());
    }
}
