//! Thin wrappers around the system `ffmpeg`/`ffprobe` binaries. We
//! intentionally drive the CLI tools rather than linking FFmpeg to avoid
//! native dev header/lib requirements.

use std::{ffi::OsStr, path::Path, process::Stdio};

use anyhow::Context as _;

use crate::error::{ScenecastError, ScenecastResult};

pub fn is_ffmpeg_on_path() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> ScenecastResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Run ffmpeg with `-y -loglevel error` prepended; surface stderr verbatim
/// on a non-zero exit.
pub async fn run_ffmpeg<I, S>(args: I) -> ScenecastResult<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = tokio::process::Command::new("ffmpeg");
    cmd.args(["-y", "-loglevel", "error"])
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let output = cmd.output().await.map_err(|e| {
        ScenecastError::encode(format!(
            "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
        ))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScenecastError::encode(format!(
            "ffmpeg exited with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

/// Container duration in seconds via ffprobe.
pub async fn probe_duration_secs(path: &Path) -> ScenecastResult<f64> {
    let output = tokio::process::Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| ScenecastError::encode(format!("failed to spawn ffprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScenecastError::encode(format!(
            "ffprobe failed for '{}': {}",
            path.display(),
            stderr.trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let secs: f64 = text.trim().parse().map_err(|_| {
        ScenecastError::encode(format!(
            "ffprobe returned unparsable duration '{}' for '{}'",
            text.trim(),
            path.display()
        ))
    })?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ScenecastError::encode(format!(
            "ffprobe reported non-positive duration for '{}'",
            path.display()
        )));
    }
    Ok(secs)
}

/// Escape a string for use inside an ffmpeg filter argument (drawtext).
pub fn escape_filter_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            ':' => escaped.push_str("\\:"),
            '%' => escaped.push_str("\\%"),
            ',' => escaped.push_str("\\,"),
            '[' | ']' | ';' | '=' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `#rrggbb` → ffmpeg `0xRRGGBB`, validating the shape.
pub fn color_literal(color: &str) -> ScenecastResult<String> {
    let hex = color.strip_prefix('#').unwrap_or(color);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ScenecastError::validation(format!(
            "invalid color '{color}', expected #rrggbb"
        )));
    }
    Ok(format!("0x{}", hex.to_ascii_uppercase()))
}
