//! Capture of live HLS audio streams into a single local file.
//!
//! A [`DownloadJob`] runs four stages in order:
//!
//! 1. [`PlaylistResolver`] turns the origin stream reference into the current
//!    manifest URL (cached on the job until it goes stale).
//! 2. [`ManifestFetcher`] downloads the manifest and prefixes every segment
//!    line with the manifest's directory URL, then saves it next to the output.
//! 3. [`FfmpegRecorder`] stream-copies the saved manifest into the audio file.
//! 4. [`OutputConfirmation`] waits, within a fixed budget, for the file to show up.
//!
//! ```no_run
//! use std::sync::Arc;
//! use space_capture::{CaptureConfig, DownloadJob, JobRequest, MetadataTags, Pipeline};
//!
//! # async fn run() -> space_capture::Result<()> {
//! let pipeline = Arc::new(Pipeline::from_config(&CaptureConfig::default())?);
//! let request = JobRequest::new("https://example.com/live/master_dynamic.m3u8", "20240101-120000")
//!     .with_metadata(MetadataTags::new().with("title", "Weekly sync"));
//! let mut job = DownloadJob::new(request, pipeline)?;
//! let _audio = job.download().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod confirm;
pub mod error;
mod fs;
pub mod http;
pub mod job;
pub mod manifest;
pub mod metadata;
pub mod recorder;
pub mod resolver;

pub use config::CaptureConfig;
pub use confirm::OutputConfirmation;
pub use error::{CaptureError, Result};
pub use job::{
    DownloadJob, JobPaths, JobRequest, JobStatus, Pipeline, ResolvedManifest, default_base_name,
    download_with_retries,
};
pub use manifest::{ManifestFetcher, SavedManifest, rewrite_manifest, segment_prefix};
pub use metadata::MetadataTags;
pub use recorder::{FfmpegRecorder, ProcessOutcome, RecordRequest};
pub use resolver::{MasterPlaylistResolver, PassthroughResolver, PlaylistResolver, ResolverKind};

#[doc(hidden)]
pub use process_utils;
