//! First-frame extraction via the ffmpeg CLI
//!
//! Shells out to `ffmpeg -i <video> -vframes 1 <output>` on a blocking
//! thread. The exit status is checked and a nonzero status surfaces the
//! tool's stderr, so a broken or missing video never silently produces a
//! missing frame file downstream.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Frame extraction errors
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Failed to execute ffmpeg: {0}")]
    Launch(String),

    #[error("FFmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("FFmpeg exited cleanly but produced no frame at {0}")]
    MissingOutput(PathBuf),

    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    #[error("Extraction task failed: {0}")]
    TaskJoin(String),
}

/// Frame extraction trait
#[async_trait::async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Write the first frame of `video` to `output` as a still image
    async fn extract_first_frame(&self, video: &Path, output: &Path) -> Result<(), FrameError>;
}

/// ffmpeg CLI implementation
pub struct FfmpegFrameExtractor;

#[async_trait::async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_first_frame(&self, video: &Path, output: &Path) -> Result<(), FrameError> {
        let video = video.to_path_buf();
        let output = output.to_path_buf();

        tokio::task::spawn_blocking(move || run_ffmpeg(&video, &output))
            .await
            .map_err(|e| FrameError::TaskJoin(e.to_string()))?
    }
}

fn run_ffmpeg(video: &Path, output: &Path) -> Result<(), FrameError> {
    let args = first_frame_args(video, output)?;

    let result = Command::new("ffmpeg")
        .args(&args)
        .output()
        .map_err(|e| FrameError::Launch(e.to_string()))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(FrameError::Ffmpeg(stderr.trim().to_string()));
    }

    if !output.exists() {
        return Err(FrameError::MissingOutput(output.to_path_buf()));
    }

    tracing::debug!(
        "extracted first frame of {} to {}",
        video.display(),
        output.display()
    );
    Ok(())
}

/// ffmpeg argument list for a single first-frame grab
fn first_frame_args(video: &Path, output: &Path) -> Result<Vec<String>, FrameError> {
    let video_str = video
        .to_str()
        .ok_or_else(|| FrameError::InvalidPath(video.to_path_buf()))?;
    let output_str = output
        .to_str()
        .ok_or_else(|| FrameError::InvalidPath(output.to_path_buf()))?;

    // "error" loglevel keeps diagnostics on stderr for the failure path
    Ok([
        "-hide_banner",
        "-loglevel",
        "error",
        "-y",
        "-i",
        video_str,
        "-vframes",
        "1",
        output_str,
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect())
}
