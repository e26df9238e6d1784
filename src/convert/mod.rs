//! MKV to MP4 conversion through FFmpeg.
//!
//! A conversion probes the input's duration, runs FFmpeg with the requested
//! quality settings and, when the duration is known, turns FFmpeg's
//! `-progress` stream into a single redrawn progress line.

use async_trait::async_trait;
use console::style;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub mod batch;
pub mod probe;
pub mod progress;

use crate::cli::Preset;
use crate::config::{ConvertConfig, ToolsConfig};
use crate::utils::{display_command, display_file_size};
use progress::{ProgressReporter, ProgressTracker, TerminalReporter};

/// Number of trailing transcoder lines kept for failure diagnostics
const DIAGNOSTIC_LINES: usize = 5;

/// Error type for a single conversion
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Input file is not on disk
    #[error("The file '{0}' does not exist")]
    InputMissing(PathBuf),

    /// FFmpeg could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// FFmpeg exited with non-zero status
    #[error("Conversion failed with exit code {0}")]
    Failed(i32),

    /// FFmpeg was terminated by a signal
    #[error("Conversion process was terminated by signal")]
    Terminated,

    /// FFmpeg produced no output for longer than the stall timeout
    #[error("Conversion stalled: no output for {0:?}")]
    Stalled(Duration),

    /// The run was cancelled (Ctrl-C)
    #[error("Conversion interrupted")]
    Interrupted,

    /// IO error while supervising FFmpeg
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parameters for converting one file
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    /// Path to the input file
    pub input: PathBuf,

    /// Explicit output path; derived from the input when absent
    pub output: Option<PathBuf>,

    /// CRF quality, passed through without range checks
    pub quality: i32,

    /// Encoder speed/efficiency preset
    pub preset: Preset,

    /// Audio codec, `copy` for passthrough
    pub audio_codec: String,
}

impl ConversionRequest {
    pub fn new(
        input: impl Into<PathBuf>,
        output: Option<PathBuf>,
        quality: i32,
        preset: Preset,
        audio_codec: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output,
            quality,
            preset,
            audio_codec: audio_codec.into(),
        }
    }

    /// Output path, explicit or derived with the given extension
    pub fn output_path(&self, target_extension: &str) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| derive_output_path(&self.input, target_extension))
    }
}

/// Same directory and stem as the input, with the target extension
pub fn derive_output_path(input: &Path, target_extension: &str) -> PathBuf {
    input.with_extension(target_extension)
}

/// Build FFmpeg's argument list for a conversion
pub fn build_transcode_args(
    request: &ConversionRequest,
    output: &Path,
    video_codec: &str,
    with_progress: bool,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), request.input.clone().into()];

    if with_progress {
        args.extend(["-progress", "-", "-nostats"].map(OsString::from));
    }

    args.extend(
        [
            "-c:v".to_string(),
            video_codec.to_string(),
            "-crf".to_string(),
            request.quality.to_string(),
            "-preset".to_string(),
            request.preset.to_string(),
            "-c:a".to_string(),
            request.audio_codec.clone(),
            // Keep subtitles and every input stream, not just the first audio/video pair
            "-c:s".to_string(),
            "copy".to_string(),
            "-map".to_string(),
            "0".to_string(),
        ]
        .map(OsString::from),
    );

    args.push(output.as_os_str().to_os_string());
    args
}

/// Summary of a successful conversion
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Whether progress was reported (duration probe succeeded)
    pub progress_shown: bool,
}

/// Anything that can run a conversion request
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert one file, returning the detailed outcome
    async fn try_convert(&self, request: &ConversionRequest) -> Result<ConversionReport, ConvertError>;

    /// Output path the converter will write for a request
    fn output_path(&self, request: &ConversionRequest) -> PathBuf;
}

/// Runs FFmpeg conversions one at a time
pub struct ConversionRunner {
    ffmpeg: String,
    ffprobe: String,
    settings: ConvertConfig,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl ConversionRunner {
    pub fn new(tools: &ToolsConfig, settings: &ConvertConfig, quiet: bool) -> Self {
        Self {
            ffmpeg: tools.ffmpeg.clone(),
            ffprobe: tools.ffprobe.clone(),
            settings: settings.clone(),
            reporter: Arc::new(TerminalReporter::new(quiet)),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the probe or kill FFmpeg once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the progress display
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Convert one file, printing the outcome; returns true on success
    pub async fn convert(&self, request: &ConversionRequest) -> bool {
        match self.try_convert(request).await {
            Ok(_) => true,
            Err(e) => {
                eprintln!();
                eprintln!("{} {}", style("ERROR:").red().bold(), e);
                false
            }
        }
    }

    async fn run(&self, request: &ConversionRequest, output: &Path) -> Result<bool, ConvertError> {
        let duration = tokio::select! {
            duration = probe::probe_duration(&self.ffprobe, &request.input) => duration,
            _ = self.cancel.cancelled() => return Err(ConvertError::Interrupted),
        };
        // ffprobe shares the terminal's process group and dies on the same Ctrl-C
        if self.cancel.is_cancelled() {
            return Err(ConvertError::Interrupted);
        }
        if duration.is_none() {
            println!("Could not determine the video duration. Progress will not be shown.");
        }

        let args = build_transcode_args(request, output, &self.settings.video_codec, duration.is_some());

        println!();
        println!("Running command:");
        println!("{}", display_command(&self.ffmpeg, &args));
        println!();
        println!("Converting...");
        tracing::debug!("Spawning {} with {} arguments", self.ffmpeg, args.len());

        let mut child = Command::new(&self.ffmpeg)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConvertError::Spawn {
                program: self.ffmpeg.clone(),
                source,
            })?;

        let mut tracker = duration.map(|total| {
            self.reporter.begin(total);
            ProgressTracker::new(total)
        });

        let supervised = self.supervise(&mut child, tracker.as_mut()).await;
        if tracker.is_some() {
            self.reporter.finish();
        }

        let (status, tail) = supervised?;
        check_exit_status(status, &tail)?;
        Ok(duration.is_some())
    }

    /// Read the merged output stream until it closes, then wait for exit
    async fn supervise(
        &self,
        child: &mut Child,
        mut tracker: Option<&mut ProgressTracker>,
    ) -> Result<(ExitStatus, VecDeque<String>), ConvertError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx.clone());
        }
        drop(tx);

        let stall_timeout = self.settings.stall_timeout();
        let mut tail = VecDeque::with_capacity(DIAGNOSTIC_LINES);

        loop {
            let next = tokio::select! {
                line = next_line(&mut rx, stall_timeout) => line,
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Cancelled, killing {}", self.ffmpeg);
                    kill(child).await;
                    return Err(ConvertError::Interrupted);
                }
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(limit) => {
                    tracing::warn!("No output from {} for {:?}, killing it", self.ffmpeg, limit);
                    kill(child).await;
                    return Err(ConvertError::Stalled(limit));
                }
            };

            if let Some(tracker) = tracker.as_deref_mut() {
                if let Some(sample) = tracker.observe(&line) {
                    self.reporter.update(&sample);
                    continue;
                }
            }

            tracing::trace!("{}: {}", self.ffmpeg, line);
            if tail.len() == DIAGNOSTIC_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }

        let status = child.wait().await?;
        Ok((status, tail))
    }
}

#[async_trait]
impl Converter for ConversionRunner {
    async fn try_convert(&self, request: &ConversionRequest) -> Result<ConversionReport, ConvertError> {
        if !request.input.exists() {
            return Err(ConvertError::InputMissing(request.input.clone()));
        }

        let output = Converter::output_path(self, request);

        println!("Starting conversion:");
        println!("Input file: {}", request.input.display());
        println!("Output file: {}", output.display());
        println!("Quality (CRF): {}", request.quality);
        println!("Preset: {}", request.preset);
        println!("Audio codec: {}", request.audio_codec);

        let progress_shown = self.run(request, &output).await?;

        println!();
        println!("{}", style("Conversion completed successfully!").green().bold());
        println!("Generated file: {}", output.display());
        println!("Original file size: {}", display_file_size(&request.input));
        println!("Converted file size: {}", display_file_size(&output));

        Ok(ConversionReport {
            input: request.input.clone(),
            output,
            progress_shown,
        })
    }

    fn output_path(&self, request: &ConversionRequest) -> PathBuf {
        request.output_path(&self.settings.target_extension)
    }
}

/// Forward lines from one of the child's pipes into the shared channel
fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            match read_segment(&mut reader, &mut buf).await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("Stopped reading transcoder output: {}", e);
                    break;
                }
            }
        }
    });
}

/// Next non-empty segment ending in `\n` or `\r`, decoded lossily
///
/// FFmpeg redraws its stats line with a bare `\r`, so waiting for `\n` alone
/// would hold back output for the whole run. A trailing segment without a
/// terminator is returned at end of stream.
async fn read_segment<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if buf.is_empty() {
                return Ok(None);
            }
            return Ok(Some(String::from_utf8_lossy(buf).into_owned()));
        }

        match available.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(end) => {
                buf.extend_from_slice(&available[..end]);
                reader.consume(end + 1);
                if !buf.is_empty() {
                    return Ok(Some(String::from_utf8_lossy(buf).into_owned()));
                }
            }
            None => {
                let len = available.len();
                buf.extend_from_slice(available);
                reader.consume(len);
            }
        }
    }
}

/// Next line from the merged stream; `Err` carries the timeout that expired
async fn next_line(
    rx: &mut mpsc::UnboundedReceiver<String>,
    stall_timeout: Option<Duration>,
) -> Result<Option<String>, Duration> {
    match stall_timeout {
        Some(limit) => tokio::time::timeout(limit, rx.recv()).await.map_err(|_| limit),
        None => Ok(rx.recv().await),
    }
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill transcoder: {}", e);
    }
}

fn check_exit_status(status: ExitStatus, tail: &VecDeque<String>) -> Result<(), ConvertError> {
    if status.success() {
        return Ok(());
    }

    for line in tail {
        eprintln!("  {}", style(line).dim());
    }

    match status.code() {
        Some(code) => Err(ConvertError::Failed(code)),
        None => Err(ConvertError::Terminated),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(input: &str) -> ConversionRequest {
        ConversionRequest::new(input, None, 23, Preset::Medium, "copy")
    }

    fn to_strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_derive_output_path() {
        assert_eq!(derive_output_path(Path::new("movie.mkv"), "mp4"), PathBuf::from("movie.mp4"));
        assert_eq!(
            derive_output_path(Path::new("/videos/show.s01e01.mkv"), "mp4"),
            PathBuf::from("/videos/show.s01e01.mp4")
        );
        assert_eq!(derive_output_path(Path::new("noext"), "mp4"), PathBuf::from("noext.mp4"));
    }

    #[test]
    fn test_explicit_output_wins() {
        let mut req = request("movie.mkv");
        req.output = Some(PathBuf::from("out/film.mp4"));
        assert_eq!(req.output_path("mp4"), PathBuf::from("out/film.mp4"));
    }

    #[test]
    fn test_transcode_args_without_progress() {
        let req = request("movie.mkv");
        let args = build_transcode_args(&req, &req.output_path("mp4"), "libx264", false);

        assert_eq!(
            to_strings(&args),
            vec![
                "-i", "movie.mkv", "-c:v", "libx264", "-crf", "23", "-preset", "medium", "-c:a",
                "copy", "-c:s", "copy", "-map", "0", "movie.mp4",
            ]
        );
    }

    #[test]
    fn test_transcode_args_with_progress() {
        let req = ConversionRequest::new("in.mkv", Some("out.mp4".into()), 18, Preset::Slow, "aac");
        let args = to_strings(&build_transcode_args(&req, Path::new("out.mp4"), "libx264", true));

        assert_eq!(&args[..5], &["-i", "in.mkv", "-progress", "-", "-nostats"]);
        assert!(args.windows(2).any(|w| w == ["-crf", "18"]));
        assert!(args.windows(2).any(|w| w == ["-preset", "slow"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "aac"]));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[tokio::test]
    async fn test_missing_input_never_spawns() {
        let tools = ToolsConfig {
            ffmpeg: "mediakit-no-such-ffmpeg".to_string(),
            ffprobe: "mediakit-no-such-ffprobe".to_string(),
            ..ToolsConfig::default()
        };
        let runner = ConversionRunner::new(&tools, &ConvertConfig::default(), true);

        let result = runner.try_convert(&request("/nonexistent/mediakit/movie.mkv")).await;
        assert!(matches!(result, Err(ConvertError::InputMissing(_))));
        assert!(!runner.convert(&request("/nonexistent/mediakit/movie.mkv")).await);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("movie.mkv");
        fs_err::write(&input, b"not really video").unwrap();

        let tools = ToolsConfig {
            ffmpeg: "mediakit-no-such-ffmpeg".to_string(),
            ffprobe: "mediakit-no-such-ffprobe".to_string(),
            ..ToolsConfig::default()
        };
        let runner = ConversionRunner::new(&tools, &ConvertConfig::default(), true);

        let result = runner.try_convert(&request(&input.to_string_lossy())).await;
        assert!(matches!(result, Err(ConvertError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_runner_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("movie.mkv");
        fs_err::write(&input, b"not really video").unwrap();

        let tools = ToolsConfig {
            ffmpeg: "mediakit-no-such-ffmpeg".to_string(),
            ffprobe: "mediakit-no-such-ffprobe".to_string(),
            ..ToolsConfig::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let runner = ConversionRunner::new(&tools, &ConvertConfig::default(), true).with_cancellation(cancel);

        // Interrupted rather than Spawn: FFmpeg is never started
        let result = runner.try_convert(&request(&input.to_string_lossy())).await;
        assert!(matches!(result, Err(ConvertError::Interrupted)));
    }

    async fn segments(mut raw: &[u8]) -> Vec<String> {
        let mut buf = Vec::new();
        let mut out = Vec::new();
        while let Some(segment) = read_segment(&mut raw, &mut buf).await.unwrap() {
            out.push(segment);
        }
        out
    }

    #[tokio::test]
    async fn test_segments_split_on_carriage_return() {
        let raw = b"frame=1 fps=25\rframe=2 fps=25\rframe=3 fps=25\r\nvideo:1kB\n";
        assert_eq!(
            segments(raw).await,
            vec!["frame=1 fps=25", "frame=2 fps=25", "frame=3 fps=25", "video:1kB"]
        );
    }

    #[tokio::test]
    async fn test_segments_keep_unterminated_tail() {
        assert_eq!(segments(b"out_time_ms=1\nprogress=end").await, vec!["out_time_ms=1", "progress=end"]);
        assert!(segments(b"").await.is_empty());
        assert!(segments(b"\r\n\n").await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_does_not_end_the_stream() {
        let raw = b"title=Caf\xe9\nInput #0, matroska\nOutput #0, mp4\n";
        assert_eq!(
            segments(raw).await,
            vec!["title=Caf\u{FFFD}", "Input #0, matroska", "Output #0, mp4"]
        );
    }

    #[tokio::test]
    async fn test_forwarder_survives_invalid_utf8() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let raw: &'static [u8] = b"\xff\xfe tag\rstill here\n";
        forward_lines(raw, tx);

        assert_eq!(rx.recv().await.as_deref(), Some("\u{FFFD}\u{FFFD} tag"));
        assert_eq!(rx.recv().await.as_deref(), Some("still here"));
        assert_eq!(rx.recv().await, None);
    }
}
