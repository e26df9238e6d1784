use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use super::{ConversionRequest, ConvertError, Converter};
use crate::cli::Preset;

const SEPARATOR_WIDTH: usize = 60;

/// Tally of one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Converts every eligible file in a directory, one after another
pub struct BatchOrchestrator<C: Converter> {
    converter: C,
    source_extension: String,
    cancel: CancellationToken,
}

impl<C: Converter> BatchOrchestrator<C> {
    pub fn new(converter: C, source_extension: impl Into<String>) -> Self {
        Self {
            converter,
            source_extension: source_extension.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Skip the remaining files once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Convert all matching files in `dir` with the given settings
    pub async fn batch_convert(
        &self,
        dir: &Path,
        quality: i32,
        preset: Preset,
        audio_codec: &str,
    ) -> Result<BatchResult> {
        let inputs = discover_inputs(dir, &self.source_extension)?;
        let label = self.source_extension.to_uppercase();

        if inputs.is_empty() {
            println!("No {} files found in {}.", label, dir.display());
            return Ok(BatchResult::default());
        }

        println!("Batch mode: found {} {} files to convert", inputs.len(), label);

        let mut result = BatchResult::default();
        for input in inputs {
            if self.cancel.is_cancelled() {
                eprintln!("{} batch interrupted, remaining files skipped", style("ERROR:").red().bold());
                break;
            }

            let request = ConversionRequest::new(input, None, quality, preset, audio_codec);
            let output = self.converter.output_path(&request);

            println!();
            println!("{}", "-".repeat(SEPARATOR_WIDTH));
            println!("Converting: {} -> {}", request.input.display(), output.display());

            // Sequential on purpose: concurrent encodes fight over the CPU
            match self.converter.try_convert(&request).await {
                Ok(report) => {
                    tracing::debug!("Converted {}", report.output.display());
                    result.succeeded += 1;
                }
                Err(ConvertError::Interrupted) => {
                    eprintln!("{} batch interrupted, remaining files skipped", style("ERROR:").red().bold());
                    result.failed += 1;
                    break;
                }
                Err(e) => {
                    eprintln!("{} {}", style("ERROR:").red().bold(), e);
                    result.failed += 1;
                }
            }
        }

        println!();
        println!("{}", "-".repeat(SEPARATOR_WIDTH));
        println!("Batch conversion finished.");
        println!("Files converted successfully: {}", result.succeeded);
        println!("Failed conversions: {}", result.failed);

        Ok(result)
    }
}

/// Regular (or symlinked), non-hidden files directly inside `dir` with the given extension, sorted by name
pub fn discover_inputs(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = fs_err::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?;

    let mut inputs = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let path = entry.path();

        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let matches = path.extension().map_or(false, |ext| ext == extension);
        // Follows symlinks, so a linked movie.mkv is converted like a regular one
        if hidden || !matches || !path.is_file() {
            continue;
        }

        inputs.push(strip_current_dir(path));
    }

    inputs.sort();
    Ok(inputs)
}

/// `./movie.mkv` reads better as `movie.mkv`
fn strip_current_dir(path: PathBuf) -> PathBuf {
    match path.strip_prefix(".") {
        Ok(stripped) => stripped.to_path_buf(),
        Err(_) => path,
    }
}
