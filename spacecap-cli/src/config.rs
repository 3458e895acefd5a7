//! Effective configuration: defaults, then the JSON file, then environment,
//! then command line flags.

use std::path::{Path, PathBuf};

use space_capture::CaptureConfig;
use tracing::debug;

use crate::cli::Args;
use crate::error::{AppError, Result};

pub const MEDIA_DIR_ENV: &str = "MEDIA_DIR";
pub const FFMPEG_PATH_ENV: &str = "FFMPEG_PATH";

/// Read `path` as a JSON `CaptureConfig`; missing fields keep their defaults.
pub fn load_file(path: &Path) -> Result<CaptureConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| AppError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| AppError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Apply `MEDIA_DIR` / `FFMPEG_PATH` as seen through `lookup`. Empty values are ignored.
pub fn apply_env(mut config: CaptureConfig, lookup: impl Fn(&str) -> Option<String>) -> CaptureConfig {
    let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    if let Some(dir) = lookup(MEDIA_DIR_ENV) {
        config.media_dir = PathBuf::from(dir);
    }
    if let Some(path) = lookup(FFMPEG_PATH_ENV) {
        config.ffmpeg_path = path;
    }
    config
}

pub fn apply_args(mut config: CaptureConfig, args: &Args) -> CaptureConfig {
    if let Some(dir) = &args.media_dir {
        config.media_dir = dir.clone();
    }
    if let Some(path) = &args.ffmpeg_path {
        config.ffmpeg_path = path.clone();
    }
    config
}

/// Build the configuration for this invocation.
pub fn load(args: &Args) -> Result<CaptureConfig> {
    let config = match &args.config {
        Some(path) => load_file(path)?,
        None => CaptureConfig::default(),
    };
    let config = apply_env(config, |key| std::env::var(key).ok());
    let config = apply_args(config, args);
    config.validate()?;
    debug!(?config, "Effective configuration");
    Ok(config)
}
