//! Checks that the external executables a command depends on can be resolved
//! before any work starts.

use console::style;
use std::path::PathBuf;

use crate::config::ToolsConfig;

/// An external executable a command cannot run without
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredTool {
    /// Display name used in messages
    pub name: &'static str,

    /// Program name or path as configured
    pub program: String,

    /// Install hints, one per line
    pub install_hints: &'static [&'static str],
}

const FFMPEG_HINTS: &[&str] = &[
    "Debian/Ubuntu: sudo apt install ffmpeg",
    "Fedora: sudo dnf install ffmpeg",
    "macOS (Homebrew): brew install ffmpeg",
    "Windows: download from https://ffmpeg.org/download.html",
];

const YT_DLP_HINTS: &[&str] = &[
    "Any platform (pip): python3 -m pip install -U yt-dlp",
    "Debian/Ubuntu: sudo apt install yt-dlp",
    "Fedora: sudo dnf install yt-dlp",
    "macOS (Homebrew): brew install yt-dlp",
    "Windows: download from https://github.com/yt-dlp/yt-dlp/releases",
];

impl RequiredTool {
    pub fn ffmpeg(tools: &ToolsConfig) -> Self {
        Self {
            name: "FFmpeg",
            program: tools.ffmpeg.clone(),
            install_hints: FFMPEG_HINTS,
        }
    }

    pub fn ffprobe(tools: &ToolsConfig) -> Self {
        Self {
            name: "FFprobe",
            program: tools.ffprobe.clone(),
            install_hints: FFMPEG_HINTS,
        }
    }

    pub fn yt_dlp(tools: &ToolsConfig) -> Self {
        Self {
            name: "yt-dlp",
            program: tools.yt_dlp.clone(),
            install_hints: YT_DLP_HINTS,
        }
    }

    /// Resolve the program on PATH, or as a path if it contains a separator
    pub fn resolve(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }
}

/// Tools needed by `convert`
pub fn conversion_tools(tools: &ToolsConfig) -> Vec<RequiredTool> {
    vec![RequiredTool::ffmpeg(tools), RequiredTool::ffprobe(tools)]
}

/// Tools needed by `download`
pub fn download_tools(tools: &ToolsConfig) -> Vec<RequiredTool> {
    vec![RequiredTool::yt_dlp(tools), RequiredTool::ffmpeg(tools)]
}

/// Return the tools that cannot be resolved
pub fn missing_tools(required: &[RequiredTool]) -> Vec<&RequiredTool> {
    required
        .iter()
        .filter(|tool| match tool.resolve() {
            Some(path) => {
                tracing::debug!("Found {} at {}", tool.name, path.display());
                false
            }
            None => true,
        })
        .collect()
}

/// Check that every required tool resolves, printing install instructions if not
pub fn check_required_tools(required: &[RequiredTool]) -> bool {
    let missing = missing_tools(required);
    if missing.is_empty() {
        return true;
    }

    eprintln!("{}", style("Error: required tools were not found.").red().bold());
    for tool in &missing {
        eprintln!("  • {} is not installed ({})", tool.name, tool.program);
    }

    // FFmpeg and FFprobe share hints; print them once
    let mut shown: Vec<&'static [&'static str]> = Vec::new();
    for tool in &missing {
        if shown.contains(&tool.install_hints) {
            continue;
        }
        shown.push(tool.install_hints);

        eprintln!();
        eprintln!("To install {}:", tool.name);
        for hint in tool.install_hints {
            eprintln!("  {}", hint);
        }
    }

    false
}
