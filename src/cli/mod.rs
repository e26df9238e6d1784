use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::download::DownloadFormat;

#[derive(Parser)]
#[command(
    name = "mediakit",
    about = "mediakit - Convert MKV files to MP4 with FFmpeg and download media with yt-dlp",
    version,
    long_about = "A CLI tool that converts MKV files to MP4 without size limits using FFmpeg, with a live progress readout and a batch mode, and downloads videos or playlists with yt-dlp alongside a metadata record."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(long, global = true, env = "MEDIAKIT_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert an MKV file to MP4, or every MKV file in the current directory
    Convert {
        /// Input MKV file (not needed with --batch)
        #[arg(value_name = "INPUT_FILE")]
        input_file: Option<PathBuf>,

        /// Output MP4 file (derived from the input name if not specified)
        #[arg(value_name = "OUTPUT_FILE")]
        output_file: Option<PathBuf>,

        /// Video quality as CRF (0=best, 51=worst, default: 23)
        #[arg(short, long, value_name = "CRF", allow_negative_numbers = true)]
        quality: Option<i32>,

        /// Encoding preset (default: medium)
        #[arg(short, long, value_enum)]
        preset: Option<Preset>,

        /// Audio codec (copy, aac, ..., default: copy)
        #[arg(short, long, value_name = "CODEC")]
        audio_codec: Option<String>,

        /// Convert every MKV file in the current directory
        #[arg(short, long)]
        batch: bool,
    },

    /// Download a video or playlist and save its metadata
    Download {
        /// Video or playlist URL (prompted for if not specified)
        #[arg(value_name = "URL")]
        url: Option<String>,

        /// Download format (prompted for if not specified)
        #[arg(short, long, value_enum)]
        format: Option<DownloadFormat>,
    },

    /// Show or create the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write a configuration file with default settings
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

/// x264 encoder presets, fastest first
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Ultrafast => "ultrafast",
            Preset::Superfast => "superfast",
            Preset::Veryfast => "veryfast",
            Preset::Faster => "faster",
            Preset::Fast => "fast",
            Preset::Medium => "medium",
            Preset::Slow => "slow",
            Preset::Slower => "slower",
            Preset::Veryslow => "veryslow",
        }
    }
}

impl Default for Preset {
    fn default() -> Self {
        Preset::Medium
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
