//! Filesystem helpers that attach operation and path context to IO errors.

use std::path::Path;

use crate::{CaptureError, Result};

/// Ensure a directory exists, creating it (recursively) if needed.
pub async fn ensure_dir_all_with_op(op: &'static str, path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| CaptureError::io_path(op, path, e))
}
