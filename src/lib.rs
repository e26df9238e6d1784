//! mediakit - A Rust CLI tool for converting and downloading media
//!
//! This library wraps two external tools: FFmpeg (with ffprobe) for converting MKV
//! files to MP4 with a live progress readout, and yt-dlp for fetching videos or
//! playlists together with a metadata record.

pub mod cli;
pub mod config;
pub mod convert;
pub mod download;
pub mod preflight;
pub mod utils;

pub use cli::{Cli, Commands, Preset};
pub use config::Config;
pub use convert::batch::{BatchOrchestrator, BatchResult};
pub use convert::{ConversionReport, ConversionRequest, ConversionRunner, ConvertError, Converter};
pub use download::{DownloadFormat, DownloadPlan, DownloadRequest};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to mediakit
#[derive(thiserror::Error, Debug)]
pub enum MediaKitError {
    #[error("Unsupported URL format: {0}")]
    UnsupportedUrl(String),

    #[error("Invalid download format choice: {0}")]
    InvalidFormatChoice(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
