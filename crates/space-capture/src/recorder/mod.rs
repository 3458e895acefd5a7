//! ffmpeg stream-copy recording of a rewritten manifest.

mod args;
mod diagnostics;
mod process;
mod progress;

use std::path::Path;

use process_utils::LaunchStrategy;
use tracing::{debug, info};

pub use args::{PROTOCOL_WHITELIST, build_transcode_args, display_args};
pub use diagnostics::{DiagnosticLineCodec, DiagnosticsSummary, forward_diagnostics};
pub use process::{ProcessOutcome, ProcessState, TranscodeProcess};
pub use progress::TranscodeProgress;

use crate::Result;
use crate::metadata::MetadataTags;

/// Inputs for one recording.
#[derive(Debug, Clone, Copy)]
pub struct RecordRequest<'a> {
    pub manifest_path: &'a Path,
    pub audio_path: &'a Path,
    pub metadata: &'a MetadataTags,
    pub extra_args: &'a [String],
}

/// Runs ffmpeg against a local manifest and reports how it ended.
///
/// No retries happen here; a failed run is returned as-is.
#[derive(Debug, Clone)]
pub struct FfmpegRecorder {
    binary_path: String,
    strategy: LaunchStrategy,
}

impl FfmpegRecorder {
    /// Recorder using the platform's default launch strategy.
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self::with_strategy(binary_path, LaunchStrategy::detect())
    }

    pub fn with_strategy(binary_path: impl Into<String>, strategy: LaunchStrategy) -> Self {
        Self {
            binary_path: binary_path.into(),
            strategy,
        }
    }

    pub fn binary_path(&self) -> &str {
        &self.binary_path
    }

    pub fn strategy(&self) -> &LaunchStrategy {
        &self.strategy
    }

    /// First line of `ffmpeg -version`, if the binary can be run at all.
    pub fn detect_version(&self) -> Option<String> {
        self.strategy
            .std_command(&self.binary_path, ["-version"])
            .output()
            .ok()
            .filter(|output| output.status.success())
            .and_then(|output| {
                String::from_utf8(output.stdout)
                    .ok()
                    .and_then(|s| s.lines().next().map(|l| l.to_string()))
            })
    }

    /// Record `request.manifest_path` into `request.audio_path`.
    ///
    /// Resolves once ffmpeg exits with code 0. A launch failure becomes
    /// `Spawn`, any other exit becomes `ExitCode`.
    pub async fn record(&self, request: &RecordRequest<'_>) -> Result<()> {
        let args = build_transcode_args(
            request.manifest_path,
            request.audio_path,
            request.metadata,
            request.extra_args,
        );

        if !request.metadata.is_empty() {
            debug!(metadata = ?request.metadata, "Audio metadata");
        }
        info!(path = %request.audio_path.display(), "Audio is saving");
        info!("{}", display_args(&self.binary_path, &args));

        let mut command = self.strategy.tokio_command(&self.binary_path, &args);
        // Keep ffmpeg's messages in a stable, parseable locale.
        command.env("LC_ALL", "C");

        TranscodeProcess::new(self.binary_path.clone())
            .run(command)
            .await
            .into_result(&self.binary_path)
    }
}

impl Default for FfmpegRecorder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_recorder_targets_ffmpeg() {
        let recorder = FfmpegRecorder::default();
        assert_eq!(recorder.binary_path(), "ffmpeg");
        assert_eq!(recorder.strategy(), &LaunchStrategy::detect());
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let recorder = FfmpegRecorder::with_strategy("no-such-ffmpeg-binary", LaunchStrategy::Direct);
        let metadata = MetadataTags::new();
        let err = recorder
            .record(&RecordRequest {
                manifest_path: Path::new("in.m3u8"),
                audio_path: Path::new("out.m4a"),
                metadata: &metadata,
                extra_args: &[],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, crate::CaptureError::Spawn { .. }));
    }

    #[test]
    fn missing_binary_has_no_version() {
        let recorder = FfmpegRecorder::with_strategy("no-such-ffmpeg-binary", LaunchStrategy::Direct);
        assert!(recorder.detect_version().is_none());
    }
}
