use std::path::PathBuf;
use thiserror::Error;

pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found in PATH")]
    BinaryNotFound(String),

    #[error("FFmpeg command failed: {message}{}", diagnostics(.exit_code, .stderr))]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("expected one duration per image, got {images} images and {durations} durations")]
    CountMismatch { images: usize, durations: usize },

    #[error("nothing to assemble: no images supplied")]
    NoImages,

    #[error("entry {index} has invalid duration {duration}")]
    InvalidDuration { index: usize, duration: f64 },

    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    #[error("process claimed success but produced nothing at {0}")]
    EmptyOutput(PathBuf),

    #[error("video is {duration:.3}s long, cannot seek to {offset:.3}s")]
    VideoTooShort { duration: f64, offset: f64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

fn diagnostics(exit_code: &Option<i32>, stderr: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(code) = exit_code {
        out.push_str(&format!(" (exit code {})", code));
    }
    if let Some(stderr) = stderr.as_deref().filter(|s| !s.is_empty()) {
        out.push_str(": ");
        out.push_str(stderr);
    }
    out
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Diagnostic output captured from the failed process, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            MediaError::FfmpegFailed { stderr, .. } | MediaError::FfprobeFailed { stderr, .. } => {
                stderr.as_deref()
            }
            _ => None,
        }
    }
}
