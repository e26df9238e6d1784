use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// Key FFmpeg uses in `-progress` output for elapsed output time, in microseconds
pub const PROGRESS_MARKER: &str = "out_time_ms";

/// One progress reading derived from the transcoder's output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSample {
    /// Elapsed output time in seconds
    pub elapsed: f64,

    /// Probed total duration in seconds
    pub total: f64,

    /// Completion percentage in [0, 100]
    pub percent: f64,
}

impl ProgressSample {
    pub fn new(elapsed: f64, total: f64) -> Self {
        let percent = (100.0 * elapsed / total).clamp(0.0, 100.0);
        Self { elapsed, total, percent }
    }
}

/// Turns `key=value` lines into progress samples against a known duration
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total: f64,
    last: Option<ProgressSample>,
}

impl ProgressTracker {
    pub fn new(total: f64) -> Self {
        Self { total, last: None }
    }

    /// Feed one output line; returns a sample if the line carries the marker
    pub fn observe(&mut self, line: &str) -> Option<ProgressSample> {
        let micros = parse_marker(line)?;
        let sample = ProgressSample::new(micros / 1_000_000.0, self.total);
        self.last = Some(sample);
        Some(sample)
    }

    pub fn last(&self) -> Option<ProgressSample> {
        self.last
    }
}

/// Extract the elapsed microseconds from an `out_time_ms=<value>` line
pub fn parse_marker(line: &str) -> Option<f64> {
    let (key, value) = line.trim().split_once('=')?;
    if key.trim() != PROGRESS_MARKER {
        return None;
    }
    // FFmpeg prints N/A and negative values before the first frame is written
    let micros = value.trim().parse::<f64>().ok()?;
    micros.is_finite().then_some(micros.max(0.0))
}

/// Receives progress updates for one conversion
pub trait ProgressReporter: Send + Sync {
    /// Called once before the first sample
    fn begin(&self, total_seconds: f64);

    /// Called for every sample, in stream order
    fn update(&self, sample: &ProgressSample);

    /// Called once after the transcoder exits
    fn finish(&self);
}

/// Single-line progress bar on the terminal, redrawn in place
pub struct TerminalReporter {
    hidden: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    pub fn new(hidden: bool) -> Self {
        Self {
            hidden,
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

impl ProgressReporter for TerminalReporter {
    fn begin(&self, total_seconds: f64) {
        let bar = if self.hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(1000)
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message(format!("Progress: 0.0% (0.0s / {:.1}s)", total_seconds));

        if let Ok(mut guard) = self.bar.lock() {
            *guard = Some(bar);
        }
    }

    fn update(&self, sample: &ProgressSample) {
        self.with_bar(|bar| {
            bar.set_position((sample.percent * 10.0).round() as u64);
            bar.set_message(format!(
                "Progress: {:.1}% ({:.1}s / {:.1}s)",
                sample.percent, sample.elapsed, sample.total
            ));
        });
    }

    fn finish(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish();
            }
        }
    }
}
