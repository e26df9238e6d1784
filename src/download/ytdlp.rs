use serde::Deserialize;
use std::ffi::OsString;
use std::process::Stdio;
use tokio::process::Command;

use crate::utils::display_command;
use crate::{MediaKitError, Result};

/// The subset of yt-dlp's info record mediakit uses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteInfo {
    /// `playlist` for playlists, `video` or absent for single items
    #[serde(rename = "_type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    /// `YYYYMMDD`
    pub upload_date: Option<String>,
    /// Seconds; yt-dlp reports whole or fractional values depending on the site
    pub duration: Option<f64>,
    pub webpage_url: Option<String>,
}

impl RemoteInfo {
    pub fn is_playlist(&self) -> bool {
        self.kind.as_deref() == Some("playlist")
    }
}

/// Thin wrapper around the yt-dlp executable
pub struct YtDlp {
    program: String,
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Fetch the info record without downloading; playlists are listed flat
    pub async fn fetch_info(&self, url: &str) -> Result<RemoteInfo> {
        tracing::debug!("Extracting info for: {}", url);

        let output = Command::new(&self.program)
            .args([
                "--dump-single-json",
                "--flat-playlist",
                "--no-warnings",
                url,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        parse_info(&output.stdout)
    }

    /// Run the download with yt-dlp's own progress output on the terminal
    pub async fn download(&self, args: &[OsString]) -> Result<()> {
        tracing::debug!("Running {}", display_command(&self.program, args));

        let status = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(MediaKitError::DownloadFailed(format!("yt-dlp exited with {}", status)).into());
        }

        Ok(())
    }
}

/// Parse yt-dlp's `--dump-single-json` output
pub fn parse_info(raw: &[u8]) -> Result<RemoteInfo> {
    let info = serde_json::from_slice(raw)?;
    Ok(info)
}
