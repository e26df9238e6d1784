//! Video and playlist downloads through yt-dlp.
//!
//! The flow is split so the decisions can be tested without a terminal or a
//! network: [`plan_download`] is a pure function from a [`DownloadRequest`] and
//! the remote info record to a [`DownloadPlan`], and [`execute`] carries it out.

use anyhow::Context;
use clap::ValueEnum;
use console::style;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub mod metadata;
pub mod ytdlp;

use crate::config::DownloadConfig;
use crate::utils::{sanitize_filename, validate_and_normalize_url};
use crate::{MediaKitError, Result};
use metadata::MediaMetadata;
use ytdlp::{RemoteInfo, YtDlp};

/// What to keep from the source
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DownloadFormat {
    /// MP4 video
    #[value(alias = "mp4")]
    Video,
    /// MP3 audio
    #[value(alias = "mp3")]
    Audio,
}

impl DownloadFormat {
    /// Parse an interactive menu answer
    pub fn from_choice(choice: &str) -> Result<Self> {
        match choice.trim().to_lowercase().as_str() {
            "1" | "video" | "mp4" => Ok(DownloadFormat::Video),
            "2" | "audio" | "mp3" => Ok(DownloadFormat::Audio),
            other => Err(MediaKitError::InvalidFormatChoice(other.to_string()).into()),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DownloadFormat::Video => "Downloading video(s) as MP4...",
            DownloadFormat::Audio => "Downloading audio as MP3...",
        }
    }
}

/// A validated download request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub format: DownloadFormat,
}

impl DownloadRequest {
    pub fn new(url: &str, format: DownloadFormat) -> Result<Self> {
        let url = validate_and_normalize_url(url.trim())
            .map_err(|_| MediaKitError::UnsupportedUrl(url.to_string()))?;
        Ok(Self { url, format })
    }
}

/// Everything needed to carry out a download
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadPlan {
    pub url: String,
    pub format: DownloadFormat,
    pub is_playlist: bool,
    /// Folder receiving the media files
    pub media_dir: PathBuf,
    /// Folder receiving the metadata record
    pub info_dir: PathBuf,
    /// Path of the JSON metadata record
    pub metadata_path: PathBuf,
    pub metadata: MediaMetadata,
    /// Arguments for the yt-dlp download run
    pub ytdlp_args: Vec<OsString>,
}

/// Work out folders, the metadata record and yt-dlp arguments for a request
pub fn plan_download(request: &DownloadRequest, info: &RemoteInfo, settings: &DownloadConfig) -> DownloadPlan {
    let is_playlist = info.is_playlist();
    let folder_name = folder_name(info.title.as_deref(), is_playlist);

    let media_dir = settings.media_root.join(&folder_name);
    let info_dir = settings.info_root.join(&folder_name);
    let metadata_path = info_dir.join(format!("{}.json", folder_name));

    let template = if is_playlist {
        "%(playlist_index)s - %(title)s.%(ext)s"
    } else {
        "%(title)s.%(ext)s"
    };

    let mut ytdlp_args: Vec<OsString> = Vec::new();
    let mut push = |arg: &str| ytdlp_args.push(arg.into());
    match request.format {
        DownloadFormat::Video => {
            for arg in ["-f", "bv*+ba/best", "--merge-output-format", "mp4", "--recode-video", "mp4"] {
                push(arg);
            }
        }
        DownloadFormat::Audio => {
            for arg in ["-f", "bestaudio/best", "-x", "--audio-format", "mp3", "--audio-quality"] {
                push(arg);
            }
            push(settings.audio_quality.as_str());
        }
    }
    if !is_playlist {
        push("--no-playlist");
    }
    push("-o");
    ytdlp_args.push(media_dir.join(template).into_os_string());
    ytdlp_args.push(request.url.clone().into());

    DownloadPlan {
        url: request.url.clone(),
        format: request.format,
        is_playlist,
        media_dir,
        info_dir,
        metadata_path,
        metadata: MediaMetadata::from_info(info),
        ytdlp_args,
    }
}

/// Sanitized title, or a placeholder when nothing usable is left
fn folder_name(title: Option<&str>, is_playlist: bool) -> String {
    let sanitized = title.map(sanitize_filename).unwrap_or_default();
    if !sanitized.is_empty() {
        return sanitized;
    }
    if is_playlist {
        "unknown_playlist".to_string()
    } else {
        "unknown_video".to_string()
    }
}

/// Write the metadata record to disk
pub fn write_metadata(plan: &DownloadPlan) -> Result<()> {
    fs_err::create_dir_all(&plan.media_dir)?;
    fs_err::create_dir_all(&plan.info_dir)?;

    let mut content = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut content, formatter);
    plan.metadata
        .serialize(&mut serializer)
        .context("Failed to serialize metadata")?;
    fs_err::write(&plan.metadata_path, content)
        .context("Failed to write metadata file")?;

    Ok(())
}

/// Fetch info, write the metadata record and run the download
pub async fn run(request: &DownloadRequest, ytdlp: &YtDlp, settings: &DownloadConfig) -> Result<DownloadPlan> {
    println!("Fetching information for {}...", request.url);
    let info = ytdlp.fetch_info(&request.url).await?;

    let plan = plan_download(request, &info, settings);
    execute(&plan, ytdlp).await?;
    Ok(plan)
}

/// Carry out a plan: metadata first, then the media itself
pub async fn execute(plan: &DownloadPlan, ytdlp: &YtDlp) -> Result<()> {
    write_metadata(plan)?;

    println!();
    println!("{}", style("Information:").bold());
    for (label, value) in plan.metadata.fields() {
        println!("  • {}: {}", label, value);
    }
    println!();
    println!("Metadata saved to '{}'.", plan.metadata_path.display());

    println!();
    println!("{}", plan.format.description());
    ytdlp.download(&plan.ytdlp_args).await?;

    println!();
    println!("{}", style("Download complete! Files were saved to:").green().bold());
    print_folder(&plan.media_dir, "media");
    print_folder(&plan.info_dir, "information");
    Ok(())
}

fn print_folder(path: &Path, label: &str) {
    println!("  {} ({})", path.display(), label);
}
