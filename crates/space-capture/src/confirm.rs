//! Bounded wait for the recorded file to become visible.
//!
//! A clean ffmpeg exit does not mean every storage backend already shows the
//! output, so the file is polled for up to a fixed budget.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{CaptureError, Result};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(10_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfirmation {
    poll_interval: Duration,
    max_wait: Duration,
}

impl Default for OutputConfirmation {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL, DEFAULT_MAX_WAIT)
    }
}

impl OutputConfirmation {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Return as soon as `path` exists; fail with `OutputNotFound` once
    /// `max_wait` has passed without seeing it.
    pub async fn confirm(&self, path: &Path) -> Result<()> {
        let started = Instant::now();
        let mut checks = 0u32;
        let mut last_error: Option<std::io::Error> = None;

        loop {
            checks += 1;
            let found = match tokio::fs::try_exists(path).await {
                Ok(found) => found,
                Err(e) => {
                    // Report a new kind of failure once, then keep polling.
                    if last_error.as_ref().map(|prev| prev.kind()) != Some(e.kind()) {
                        warn!(path = %path.display(), "Cannot check output file: {e}");
                    }
                    last_error = Some(e);
                    false
                }
            };
            if found {
                info!(
                    path = %path.display(),
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Audio file saved"
                );
                return Ok(());
            }

            let waited = started.elapsed();
            if waited >= self.max_wait {
                debug!(path = %path.display(), checks, "Output never appeared");
                return Err(CaptureError::OutputNotFound {
                    path: path.to_path_buf(),
                    waited,
                    last_error: last_error.map(|e| e.to_string()),
                });
            }

            let remaining = self.max_wait - waited;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn existing_file_confirms_immediately() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.m4a");
        tokio::fs::write(&path, b"x").await.unwrap();

        let started = std::time::Instant::now();
        OutputConfirmation::default().confirm(&path).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn late_file_confirms_on_next_poll() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.m4a");

        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            tokio::fs::write(writer_path, b"x").await.unwrap();
        });

        let started = std::time::Instant::now();
        OutputConfirmation::default().confirm(&path).await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1200), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(2500), "{elapsed:?}");
    }

    #[tokio::test]
    async fn missing_file_times_out_after_budget() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("never.m4a");
        let confirmation =
            OutputConfirmation::new(Duration::from_millis(50), Duration::from_millis(300));

        let started = std::time::Instant::now();
        let err = confirmation.confirm(&path).await.unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(300));
        match err {
            CaptureError::OutputNotFound {
                path: missing,
                waited,
                last_error,
            } => {
                assert_eq!(missing, path);
                assert!(waited >= Duration::from_millis(300));
                assert!(last_error.is_none());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn failed_checks_are_carried_into_the_error() {
        let dir = TempDir::new().unwrap();
        let occupied = dir.path().join("occupied");
        tokio::fs::write(&occupied, b"x").await.unwrap();
        // A regular file used as a directory: the check fails instead of answering "absent".
        let path = occupied.join("out.m4a");
        let confirmation =
            OutputConfirmation::new(Duration::from_millis(50), Duration::from_millis(200));

        let err = confirmation.confirm(&path).await.unwrap_err();
        match &err {
            CaptureError::OutputNotFound { last_error, .. } => {
                assert!(last_error.is_some(), "{err}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("last check failed"), "{err}");
    }
}
