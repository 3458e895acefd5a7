use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;

/// Result alias used throughout the capture pipeline.
pub type Result<T> = std::result::Result<T, CaptureError>;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to resolve a playable manifest from `{origin}`: {reason}")]
    Resolution { origin: String, reason: String },

    #[error("failed to fetch manifest {url}: {reason}")]
    ManifestFetch {
        url: String,
        status: Option<StatusCode>,
        reason: String,
    },

    /// The resolved manifest URL went away; the cached URL has already been
    /// cleared so the next `download()` re-resolves from the origin.
    #[error("manifest {url} is stale (HTTP 404); resolved URL was reset")]
    StaleManifest { url: String },

    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transcoder exited with {}", describe_exit(*code))]
    ExitCode { code: Option<i32> },

    /// `last_error` holds the most recent failure to check the path, if any.
    #[error(
        "output file not found after {}ms: {}{}",
        waited.as_millis(),
        path.display(),
        last_error.as_ref().map(|e| format!(" (last check failed: {e})")).unwrap_or_default()
    )]
    OutputNotFound {
        path: PathBuf,
        waited: Duration,
        last_error: Option<String>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error while {op} `{}`: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl CaptureError {
    pub fn resolution(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn manifest_status(url: impl Into<String>, status: StatusCode) -> Self {
        Self::ManifestFetch {
            url: url.into(),
            status: Some(status),
            reason: format!("HTTP {status}"),
        }
    }

    pub fn manifest_network(url: impl Into<String>, source: &reqwest::Error) -> Self {
        Self::ManifestFetch {
            url: url.into(),
            status: source.status(),
            reason: source.to_string(),
        }
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the error is the staleness signal.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleManifest { .. })
    }

    /// Whether a manifest fetch failed with HTTP 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ManifestFetch {
                status: Some(StatusCode::NOT_FOUND),
                ..
            }
        )
    }

    /// Exit code carried by an `ExitCode` error.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::ExitCode { code } => *code,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_only_matches_404_manifest_errors() {
        assert!(CaptureError::manifest_status("http://a/b.m3u8", StatusCode::NOT_FOUND).is_not_found());
        assert!(
            !CaptureError::manifest_status("http://a/b.m3u8", StatusCode::FORBIDDEN).is_not_found()
        );
        assert!(!CaptureError::resolution("http://a", "nope").is_not_found());
    }

    #[test]
    fn exit_code_message_mentions_code() {
        let err = CaptureError::ExitCode { code: Some(1) };
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(err.to_string(), "transcoder exited with code 1");

        let killed = CaptureError::ExitCode { code: None };
        assert!(killed.to_string().contains("signal"));
    }
}
