//! Per-request download job and the pipeline it runs on.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::{AUDIO_EXTENSION, CaptureConfig, MANIFEST_EXTENSION};
use crate::confirm::OutputConfirmation;
use crate::manifest::{ManifestFetcher, SavedManifest};
use crate::metadata::MetadataTags;
use crate::recorder::{FfmpegRecorder, RecordRequest};
use crate::resolver::{MasterPlaylistResolver, PassthroughResolver, PlaylistResolver, ResolverKind};
use crate::{CaptureError, Result};

/// Timestamp used as base name when the caller does not pick one.
pub fn default_base_name() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Cached manifest URL of a job.
///
/// Set once by resolution and cleared only by [`ResolvedManifest::invalidate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedManifest(Option<Url>);

impl ResolvedManifest {
    pub fn get(&self) -> Option<&Url> {
        self.0.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    fn set(&mut self, url: Url) {
        self.0 = Some(url);
    }

    /// Forget the cached URL so the next download resolves from the origin again.
    pub fn invalidate(&mut self) -> Option<Url> {
        self.0.take()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Created,
    ResolvingManifest,
    ManifestSaved,
    Recording,
    ConfirmingOutput,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ResolvingManifest => "resolving_manifest",
            Self::ManifestSaved => "manifest_saved",
            Self::Recording => "recording",
            Self::ConfirmingOutput => "confirming_output",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File locations of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub audio_path: PathBuf,
}

impl JobPaths {
    pub fn new(media_dir: &Path, sub_dir: Option<&str>, base_name: &str) -> Result<Self> {
        validate_base_name(base_name)?;

        let output_dir = match sub_dir.filter(|s| !s.is_empty()) {
            Some(sub_dir) => {
                validate_sub_dir(sub_dir)?;
                media_dir.join(sub_dir)
            }
            None => media_dir.to_path_buf(),
        };

        Ok(Self {
            manifest_path: output_dir.join(format!("{base_name}.{MANIFEST_EXTENSION}")),
            audio_path: output_dir.join(format!("{base_name}.{AUDIO_EXTENSION}")),
            output_dir,
        })
    }
}

fn validate_base_name(base_name: &str) -> Result<()> {
    if base_name.trim().is_empty() {
        return Err(CaptureError::InvalidRequest(
            "base name must not be empty".to_string(),
        ));
    }
    if base_name == "." || base_name == ".." || base_name.contains(['/', '\\']) {
        return Err(CaptureError::InvalidRequest(format!(
            "base name `{base_name}` must be a plain file name"
        )));
    }
    Ok(())
}

fn validate_sub_dir(sub_dir: &str) -> Result<()> {
    let escapes = Path::new(sub_dir)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(CaptureError::InvalidRequest(format!(
            "sub directory `{sub_dir}` must be relative to the media directory"
        )));
    }
    Ok(())
}

/// What a caller asks for.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub origin_url: String,
    pub base_name: String,
    pub sub_dir: Option<String>,
    pub metadata: Option<MetadataTags>,
}

impl JobRequest {
    pub fn new(origin_url: impl Into<String>, base_name: impl Into<String>) -> Self {
        Self {
            origin_url: origin_url.into(),
            base_name: base_name.into(),
            sub_dir: None,
            metadata: None,
        }
    }

    pub fn with_sub_dir(mut self, sub_dir: impl Into<String>) -> Self {
        self.sub_dir = Some(sub_dir.into());
        self
    }

    pub fn with_metadata(mut self, metadata: MetadataTags) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Collaborators and configuration shared read-only by every job.
pub struct Pipeline {
    resolver: Arc<dyn PlaylistResolver>,
    fetcher: ManifestFetcher,
    recorder: FfmpegRecorder,
    confirmation: OutputConfirmation,
    media_dir: PathBuf,
    ffmpeg_args: Vec<String>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("resolver", &self.resolver.name())
            .field("fetcher", &self.fetcher)
            .field("recorder", &self.recorder)
            .field("confirmation", &self.confirmation)
            .field("media_dir", &self.media_dir)
            .field("ffmpeg_args", &self.ffmpeg_args)
            .finish()
    }
}

impl Pipeline {
    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        config.validate()?;
        let client = crate::http::build_client(config)?;

        let resolver: Arc<dyn PlaylistResolver> = match config.resolver {
            ResolverKind::Master => Arc::new(MasterPlaylistResolver::new(client.clone())),
            ResolverKind::Passthrough => Arc::new(PassthroughResolver),
        };

        Ok(Self {
            resolver,
            fetcher: ManifestFetcher::new(client, config.segment_marker.clone()),
            recorder: FfmpegRecorder::new(config.ffmpeg_path.clone()),
            confirmation: OutputConfirmation::new(config.poll_interval, config.max_wait),
            media_dir: config.media_dir.clone(),
            ffmpeg_args: config.ffmpeg_args.clone(),
        })
    }

    /// Swap the resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn PlaylistResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_recorder(mut self, recorder: FfmpegRecorder) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    pub fn recorder(&self) -> &FfmpegRecorder {
        &self.recorder
    }
}

/// One acquisition: resolve → save manifest → record → confirm.
#[derive(Debug)]
pub struct DownloadJob {
    origin_url: String,
    base_name: String,
    manifest: ResolvedManifest,
    paths: JobPaths,
    metadata: MetadataTags,
    status: JobStatus,
    pipeline: Arc<Pipeline>,
}

impl DownloadJob {
    pub fn new(request: JobRequest, pipeline: Arc<Pipeline>) -> Result<Self> {
        let paths = JobPaths::new(
            pipeline.media_dir(),
            request.sub_dir.as_deref(),
            &request.base_name,
        )?;

        debug!(
            origin = %request.origin_url,
            base_name = %request.base_name,
            sub_dir = ?request.sub_dir,
            metadata = ?request.metadata,
            "Created download job"
        );
        debug!(path = %paths.manifest_path.display(), "Playlist path");
        debug!(path = %paths.audio_path.display(), "Audio path");

        Ok(Self {
            origin_url: request.origin_url,
            base_name: request.base_name,
            manifest: ResolvedManifest::default(),
            paths,
            metadata: request.metadata.unwrap_or_default(),
            status: JobStatus::Created,
            pipeline,
        })
    }

    pub fn origin_url(&self) -> &str {
        &self.origin_url
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn manifest(&self) -> &ResolvedManifest {
        &self.manifest
    }

    pub fn paths(&self) -> &JobPaths {
        &self.paths
    }

    pub fn metadata(&self) -> &MetadataTags {
        &self.metadata
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    fn set_status(&mut self, status: JobStatus) {
        debug!(base_name = %self.base_name, from = %self.status, to = %status, "Job status");
        self.status = status;
    }

    /// Run the pipeline once and return the confirmed audio path.
    ///
    /// There is no internal retry. After a [`CaptureError::StaleManifest`]
    /// the cached manifest URL is already cleared, so calling `download`
    /// again resolves from the origin.
    pub async fn download(&mut self) -> Result<PathBuf> {
        debug!(
            origin = %self.origin_url,
            manifest = ?self.manifest.get().map(Url::as_str),
            "download"
        );
        match self.run_stages().await {
            Ok(path) => {
                self.set_status(JobStatus::Completed);
                Ok(path)
            }
            Err(e) => {
                self.set_status(JobStatus::Failed);
                Err(e)
            }
        }
    }

    async fn run_stages(&mut self) -> Result<PathBuf> {
        let manifest_url = self.resolve_manifest().await?;

        crate::fs::ensure_dir_all_with_op("creating media directory", &self.paths.output_dir)
            .await?;

        let saved = self.save_manifest(&manifest_url).await?;
        self.set_status(JobStatus::ManifestSaved);

        self.record(&saved).await?;

        self.set_status(JobStatus::ConfirmingOutput);
        self.pipeline.confirmation.confirm(&self.paths.audio_path).await?;

        Ok(self.paths.audio_path.clone())
    }

    async fn resolve_manifest(&mut self) -> Result<Url> {
        if let Some(url) = self.manifest.get() {
            return Ok(url.clone());
        }

        self.set_status(JobStatus::ResolvingManifest);
        let url = self.pipeline.resolver.resolve(&self.origin_url).await?;
        info!(url = %url, "Final playlist url");
        self.manifest.set(url.clone());
        Ok(url)
    }

    async fn save_manifest(&mut self, manifest_url: &Url) -> Result<SavedManifest> {
        let fetched = self
            .pipeline
            .fetcher
            .fetch_and_save(manifest_url, &self.paths.manifest_path)
            .await;

        match fetched {
            Ok(saved) => Ok(saved),
            Err(e) if e.is_not_found() && !self.is_origin(manifest_url) => {
                self.manifest.invalidate();
                warn!(url = %manifest_url, "Manifest is gone; resolved URL reset");
                Err(CaptureError::StaleManifest {
                    url: manifest_url.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Whether `url` is the origin reference itself, compared after URL
    /// normalisation (scheme/host case, dot segments, empty path).
    fn is_origin(&self, url: &Url) -> bool {
        Url::parse(&self.origin_url).is_ok_and(|origin| &origin == url)
    }

    async fn record(&mut self, saved: &SavedManifest) -> Result<()> {
        self.set_status(JobStatus::Recording);
        let request = RecordRequest {
            manifest_path: &saved.path,
            audio_path: &self.paths.audio_path,
            metadata: &self.metadata,
            extra_args: &self.pipeline.ffmpeg_args,
        };
        self.pipeline.recorder.record(&request).await
    }
}

/// Caller-side retry: re-run `download` while it reports a stale manifest.
///
/// `max_attempts` counts every call to `download`, including the first. Any
/// error other than staleness is returned immediately.
pub async fn download_with_retries(job: &mut DownloadJob, max_attempts: u32) -> Result<PathBuf> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match job.download().await {
            Err(e) if e.is_stale() && attempt < max_attempts => {
                warn!(attempt, max_attempts, "{e}; retrying from origin");
                attempt += 1;
            }
            result => return result,
        }
    }
}
