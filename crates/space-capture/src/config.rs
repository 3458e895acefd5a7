use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resolver::ResolverKind;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Literal at the start of a manifest line that marks a media segment reference.
pub const DEFAULT_SEGMENT_MARKER: &str = "chunk";

/// Container extension for the rewritten manifest.
pub const MANIFEST_EXTENSION: &str = "m3u8";

/// Container extension for the recorded audio.
pub const AUDIO_EXTENSION: &str = "m4a";

/// Operator configuration for the capture pipeline.
///
/// Every job created from the same pipeline sees the same snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Root directory under which per-job output directories are created.
    pub media_dir: PathBuf,

    /// Path or name of the ffmpeg binary.
    pub ffmpeg_path: String,

    /// Extra ffmpeg arguments appended after the built-in ones.
    pub ffmpeg_args: Vec<String>,

    /// How origin URLs are turned into manifest URLs.
    pub resolver: ResolverKind,

    /// Manifest line prefix identifying segment references.
    pub segment_marker: String,

    /// Output confirmation poll cadence.
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,

    /// Output confirmation budget.
    #[serde(with = "duration_ms")]
    pub max_wait: Duration,

    /// User agent sent with resolution and manifest requests.
    pub user_agent: String,

    /// Overall HTTP request timeout (0 = none).
    #[serde(with = "duration_ms")]
    pub http_timeout: Duration,

    /// TCP connect timeout for HTTP requests.
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Whether to use system proxy settings if available.
    pub use_system_proxy: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("media"),
            ffmpeg_path: "ffmpeg".to_string(),
            ffmpeg_args: Vec::new(),
            resolver: ResolverKind::default(),
            segment_marker: DEFAULT_SEGMENT_MARKER.to_string(),
            poll_interval: Duration::from_millis(500),
            max_wait: Duration::from_millis(10_000),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_timeout: Duration::ZERO,
            connect_timeout: Duration::from_secs(30),
            use_system_proxy: true,
        }
    }
}

impl CaptureConfig {
    pub fn with_media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media_dir = dir.into();
        self
    }

    pub fn with_ffmpeg_path(mut self, path: impl Into<String>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    pub fn with_ffmpeg_args(mut self, args: Vec<String>) -> Self {
        self.ffmpeg_args = args;
        self
    }

    pub fn with_resolver(mut self, resolver: ResolverKind) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.use_system_proxy = enabled;
        self
    }

    pub fn with_confirmation(mut self, poll_interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.max_wait = max_wait;
        self
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.ffmpeg_path.trim().is_empty() {
            return Err(crate::CaptureError::Configuration(
                "ffmpeg_path must not be empty".to_string(),
            ));
        }
        if self.segment_marker.is_empty() {
            return Err(crate::CaptureError::Configuration(
                "segment_marker must not be empty".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(crate::CaptureError::Configuration(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Durations are written as integer milliseconds in config files.
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
