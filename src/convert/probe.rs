use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Best-effort lookup of a file's container duration in seconds using ffprobe
///
/// Returns `None` on spawn failure, non-zero exit or unusable output. Callers
/// treat a missing duration as "no progress display", never as a failed conversion.
pub async fn probe_duration(ffprobe: &str, input: &Path) -> Option<f64> {
    tracing::debug!("Probing duration of {}", input.display());

    let output = Command::new(ffprobe)
        .args([
            "-v", "error",
            "-show_entries", "format=duration",
            "-of", "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("Failed to run {}: {}", ffprobe, e);
            return None;
        }
    };

    if !output.status.success() {
        tracing::warn!(
            "ffprobe exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ffprobe's bare `format=duration` output
pub fn parse_duration(raw: &str) -> Option<f64> {
    let duration = raw.trim().parse::<f64>().ok()?;
    // A zero duration would make every percentage infinite
    (duration.is_finite() && duration > 0.0).then_some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5400.123000\n"), Some(5400.123));
        assert_eq!(parse_duration("  12  "), Some(12.0));
    }

    #[test]
    fn test_parse_duration_rejects_unusable_values() {
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("0.000000"), None);
        assert_eq!(parse_duration("-3"), None);
        assert_eq!(parse_duration("inf"), None);
    }

    #[tokio::test]
    async fn test_probe_duration_missing_tool_is_soft_failure() {
        let duration = probe_duration("mediakit-no-such-ffprobe", Path::new("movie.mkv")).await;
        assert_eq!(duration, None);
    }
}
