//! Fake `ffmpeg`, `ffprobe` and `yt-dlp` executables for integration tests.
//!
//! Behaviour is keyed on the input file name so one set of scripts serves every
//! test: names containing `fail` exit with status 3, `stall` hangs, `crstats`
//! writes `\r`-terminated stats lines for a few seconds, `noduration` makes
//! ffprobe print `N/A` and `slowinfo` makes ffprobe hang. Every ffmpeg
//! invocation appends its arguments to `ffmpeg.log` next to the input.
//!
//! The fake `yt-dlp` answers `--dump-single-json` with a fixed video record and
//! logs every download run to `yt-dlp.log` in the output folder; URLs
//! containing `fail` make the download exit with status 1.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const FAKE_FFMPEG: &str = r#"#!/bin/sh
input="$2"
echo "$@" >> "$(dirname "$input")/ffmpeg.log"
for last; do :; done
case "$(basename "$input")" in
  *fail*) echo "Conversion failed!" >&2; exit 3 ;;
  *stall*) exec sleep 30 ;;
  *crstats*)
    printf 'title=Caf\351\n' >&2
    i=1
    while [ "$i" -le 8 ]; do
      printf 'frame=%d fps=25 q=28.0 size=%dkB time=00:00:0%d.00 bitrate=N/A speed=1x    \r' "$i" "$i" "$i" >&2
      sleep 0.3
      i=$((i + 1))
    done
    printf '\nvideo:8kB audio:0kB\n' >&2
    printf 'converted' > "$last"
    exit 0 ;;
esac
echo "ffmpeg version n7.0 Copyright (c) the FFmpeg developers" >&2
echo "out_time_ms=N/A"
echo "frame=10"
echo "out_time_ms=2000000"
echo "speed=2.0x"
echo "out_time_ms=5000000"
echo "out_time_ms=12000000"
echo "progress=end"
printf 'converted' > "$last"
exit 0
"#;

const FAKE_FFPROBE: &str = r#"#!/bin/sh
for last; do :; done
case "$(basename "$last")" in
  *slowinfo*) exec sleep 5 ;;
  *noduration*) echo "N/A" ;;
  *) echo "10.000000" ;;
esac
"#;

const FAKE_YT_DLP: &str = r#"#!/bin/sh
if [ "$1" = "--dump-single-json" ]; then
  cat <<'JSON'
{"_type": "video", "title": "Song: Live?", "uploader": "Band", "view_count": 1234567, "like_count": 890, "upload_date": "20240131", "duration": 245, "webpage_url": "https://www.youtube.com/watch?v=abc"}
JSON
  exit 0
fi
out=""
prev=""
for arg; do
  [ "$prev" = "-o" ] && out="$arg"
  prev="$arg"
done
dir="$(dirname "$out")"
echo "$@" >> "$dir/yt-dlp.log"
case "$prev" in
  *fail*) echo "ERROR: Unable to download webpage" >&2; exit 1 ;;
esac
printf 'media' > "$dir/Song Live.mp3"
exit 0
"#;

/// Directory holding `ffmpeg`, `ffprobe` and `yt-dlp`, written once per test binary
///
/// Writing executables while other threads fork can fail with ETXTBSY, so the
/// scripts are created before any test spawns a process.
pub fn fake_tools_dir() -> &'static Path {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = std::env::temp_dir().join(format!("mediakit-fake-tools-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        write_script(&dir.join("ffmpeg"), FAKE_FFMPEG);
        write_script(&dir.join("ffprobe"), FAKE_FFPROBE);
        write_script(&dir.join("yt-dlp"), FAKE_YT_DLP);
        dir
    })
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

pub fn fake_ffmpeg() -> String {
    fake_tools_dir().join("ffmpeg").to_string_lossy().into_owned()
}

pub fn fake_ffprobe() -> String {
    fake_tools_dir().join("ffprobe").to_string_lossy().into_owned()
}

pub fn fake_yt_dlp() -> String {
    fake_tools_dir().join("yt-dlp").to_string_lossy().into_owned()
}

/// Lines of `ffmpeg.log` in `dir`, one per invocation
pub fn ffmpeg_invocations(dir: &Path) -> Vec<String> {
    match std::fs::read_to_string(dir.join("ffmpeg.log")) {
        Ok(log) => log.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

/// Lines of `yt-dlp.log` in `dir`, one per download run
pub fn yt_dlp_invocations(dir: &Path) -> Vec<String> {
    match std::fs::read_to_string(dir.join("yt-dlp.log")) {
        Ok(log) => log.lines().map(str::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"matroska").unwrap();
    path
}
