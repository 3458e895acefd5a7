use std::path::PathBuf;

use space_capture::CaptureError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to read config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("ffmpeg is not available at `{0}`")]
    FfmpegUnavailable(String),

    #[error("Failed to initialise logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
