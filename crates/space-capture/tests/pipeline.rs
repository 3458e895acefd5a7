//! End-to-end jobs against a local origin and a scripted stand-in for ffmpeg.
#![cfg(unix)]

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use space_capture::process_utils::LaunchStrategy;
use space_capture::{
    CaptureConfig, CaptureError, DownloadJob, FfmpegRecorder, JobRequest, JobStatus,
    MetadataTags, Pipeline, ResolverKind, download_with_retries,
};
use tempfile::TempDir;

/// Common prologue: drop the program name, remember the output path (last
/// argument), dump the argument vector and emit a couple of stderr records.
const PROLOGUE: &str = r#"shift
for out; do :; done
printf '%s\n' "$@" > "$out.args"
printf 'Input #0, hls, from playlist:\n' >&2
printf 'size=       1KiB time=00:00:03.00 bitrate=   2.7kbits/s speed=30x\r' >&2
"#;

enum Behaviour {
    /// Write the output and exit 0.
    Writes,
    /// Exit 1 without writing.
    Fails,
    /// Exit 0 and write the output ~1.2 s later.
    WritesLate,
    /// Exit 0 and never write.
    Silent,
}

/// A shell script run as `sh <script> ffmpeg <args...>`.
///
/// Running it through the interpreter also exercises the shell-wrapped launch
/// path: the argument vector seen by the script must be the plain ffmpeg one.
fn fake_ffmpeg(dir: &Path, behaviour: Behaviour) -> FfmpegRecorder {
    let body = match behaviour {
        Behaviour::Writes => r#": > "$out"; exit 0"#,
        Behaviour::Fails => "printf 'Error opening input\\n' >&2; exit 1",
        Behaviour::WritesLate => r#"(sleep 1.2; : > "$out") >/dev/null 2>&1 &
exit 0"#,
        Behaviour::Silent => "exit 0",
    };
    let script = dir.join("fake-ffmpeg.sh");
    std::fs::write(&script, format!("{PROLOGUE}{body}\n")).unwrap();
    FfmpegRecorder::with_strategy("ffmpeg", LaunchStrategy::shell("sh", script))
}

struct Harness {
    _root: TempDir,
    media_dir: PathBuf,
    pipeline: Arc<Pipeline>,
}

fn harness(resolver: ResolverKind, behaviour: Behaviour, config: impl FnOnce(CaptureConfig) -> CaptureConfig) -> Harness {
    let root = TempDir::new().unwrap();
    let media_dir = root.path().join("media");
    let base = CaptureConfig::default()
        .with_media_dir(&media_dir)
        .with_resolver(resolver)
        .with_system_proxy(false);
    let pipeline = Pipeline::from_config(&config(base))
        .unwrap()
        .with_recorder(fake_ffmpeg(root.path(), behaviour));
    Harness {
        _root: root,
        media_dir,
        pipeline: Arc::new(pipeline),
    }
}

fn recorded_args(audio: &Path) -> Vec<String> {
    let dump = PathBuf::from(format!("{}.args", audio.display()));
    std::fs::read_to_string(dump)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn records_media_playlist_with_metadata() {
    let server = common::spawn_origin().await;
    let h = harness(ResolverKind::Passthrough, Behaviour::Writes, |c| {
        c.with_ffmpeg_args(vec!["-loglevel".into(), "error".into()])
    });

    let origin = server.url("/live/v2/playlist.m3u8");
    let metadata = MetadataTags::new()
        .with("title", "Weekly sync")
        .with("artist", "host")
        .with("comment", "");
    let request = JobRequest::new(origin.clone(), "20240101-120000")
        .with_sub_dir("spaces")
        .with_metadata(metadata);
    let mut job = DownloadJob::new(request, h.pipeline.clone()).unwrap();

    let audio = job.download().await.unwrap();
    assert_eq!(audio, h.media_dir.join("spaces/20240101-120000.m4a"));
    assert!(audio.exists());
    assert_eq!(job.status(), JobStatus::Completed);
    assert_eq!(job.manifest().get().map(|u| u.as_str()), Some(origin.as_str()));

    let manifest = std::fs::read_to_string(h.media_dir.join("spaces/20240101-120000.m3u8")).unwrap();
    let prefix = server.url("/live/v2/");
    let segments: Vec<&str> = manifest.lines().filter(|l| l.contains("chunk_")).collect();
    assert_eq!(segments.len(), 2);
    assert!(segments.iter().all(|l| l.starts_with(&prefix)), "{manifest}");

    let manifest_arg = h
        .media_dir
        .join("spaces/20240101-120000.m3u8")
        .display()
        .to_string();
    let audio_arg = audio.display().to_string();
    let expected = vec![
        "-protocol_whitelist",
        "file,https,tls,tcp",
        "-i",
        manifest_arg.as_str(),
        "-c",
        "copy",
        "-metadata",
        "artist=host",
        "-metadata",
        "title=Weekly sync",
        "-loglevel",
        "error",
        audio_arg.as_str(),
    ];
    assert_eq!(recorded_args(&audio), expected);
}

#[tokio::test]
async fn stale_manifest_is_reset_and_next_download_resolves_again() {
    let server = common::spawn_origin().await;
    let h = harness(ResolverKind::Master, Behaviour::Writes, |c| c);

    let request = JobRequest::new(server.url("/live/master.m3u8"), "rotated");
    let mut job = DownloadJob::new(request, h.pipeline.clone()).unwrap();

    let err = job.download().await.unwrap_err();
    assert!(err.is_stale(), "unexpected error: {err}");
    assert!(!job.manifest().is_set());
    assert_eq!(job.status(), JobStatus::Failed);
    assert!(!job.paths().audio_path.exists());

    let audio = job.download().await.unwrap();
    assert!(audio.exists());
    assert_eq!(
        job.manifest().get().map(|u| u.as_str()),
        Some(server.url("/live/v2/playlist.m3u8?type=live").as_str())
    );
    assert_eq!(server.origin.master_hits(), 2);
}

#[tokio::test]
async fn retries_only_through_staleness() {
    let server = common::spawn_origin().await;
    let h = harness(ResolverKind::Master, Behaviour::Writes, |c| c);

    let request = JobRequest::new(server.url("/live/master.m3u8"), "retried");
    let mut job = DownloadJob::new(request, h.pipeline.clone()).unwrap();

    let audio = download_with_retries(&mut job, 3).await.unwrap();
    assert!(audio.exists());
    assert_eq!(server.origin.master_hits(), 2);
}

#[tokio::test]
async fn not_found_on_origin_itself_keeps_resolved_url() {
    let server = common::spawn_origin().await;
    let h = harness(ResolverKind::Passthrough, Behaviour::Writes, |c| c);

    let origin = server.url("/direct/gone.m3u8");
    let mut job = DownloadJob::new(JobRequest::new(origin.clone(), "gone"), h.pipeline.clone()).unwrap();

    let err = job.download().await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert!(!err.is_stale());
    assert_eq!(job.manifest().get().map(|u| u.as_str()), Some(origin.as_str()));

    // Not stale, so the retry helper gives up after one attempt.
    let err = download_with_retries(&mut job, 5).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn origin_is_compared_after_url_normalisation() {
    let server = common::spawn_origin().await;
    let h = harness(ResolverKind::Passthrough, Behaviour::Writes, |c| c);

    // Upper-case scheme and a dot segment: parses to the same URL as the origin.
    let origin = format!("HTTP://{}/direct/./gone.m3u8", server.addr);
    let mut job = DownloadJob::new(JobRequest::new(origin, "unnormalised"), h.pipeline.clone()).unwrap();

    let err = job.download().await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err}");
    assert!(!err.is_stale());
    assert_eq!(
        job.manifest().get().map(|u| u.as_str()),
        Some(server.url("/direct/gone.m3u8").as_str())
    );
}

#[tokio::test]
async fn failed_recording_skips_confirmation() {
    let server = common::spawn_origin().await;
    let h = harness(ResolverKind::Passthrough, Behaviour::Fails, |c| c);

    let request = JobRequest::new(server.url("/direct/ok.m3u8"), "failing");
    let mut job = DownloadJob::new(request, h.pipeline.clone()).unwrap();

    let started = Instant::now();
    let err = job.download().await.unwrap_err();
    assert!(matches!(err, CaptureError::ExitCode { code: Some(1) }), "{err}");
    assert_eq!(err.exit_code(), Some(1));
    // The default confirmation budget is ten seconds; none of it is spent.
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(job.status(), JobStatus::Failed);
    // The manifest stage completed before recording.
    assert!(job.paths().manifest_path.exists());
}

#[tokio::test]
async fn late_output_is_confirmed_by_polling() {
    let server = common::spawn_origin().await;
    let h = harness(ResolverKind::Passthrough, Behaviour::WritesLate, |c| c);

    let request = JobRequest::new(server.url("/direct/ok.m3u8"), "late");
    let mut job = DownloadJob::new(request, h.pipeline.clone()).unwrap();

    let started = Instant::now();
    let audio = job.download().await.unwrap();
    let elapsed = started.elapsed();
    assert!(audio.exists());
    assert!(elapsed >= Duration::from_millis(1200), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
}

#[tokio::test]
async fn missing_output_fails_after_budget() {
    let server = common::spawn_origin().await;
    let h = harness(ResolverKind::Passthrough, Behaviour::Silent, |c| {
        c.with_confirmation(Duration::from_millis(100), Duration::from_millis(800))
    });

    let request = JobRequest::new(server.url("/direct/ok.m3u8"), "silent");
    let mut job = DownloadJob::new(request, h.pipeline.clone()).unwrap();

    let started = Instant::now();
    let err = job.download().await.unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(800));
    match err {
        CaptureError::OutputNotFound { path, waited, .. } => {
            assert_eq!(path, job.paths().audio_path);
            assert!(waited >= Duration::from_millis(800));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(job.status(), JobStatus::Failed);
}

#[tokio::test]
async fn concurrent_jobs_share_one_pipeline() {
    let server = common::spawn_origin().await;
    let h = harness(ResolverKind::Passthrough, Behaviour::Writes, |c| c);

    let origin = server.url("/direct/ok.m3u8");
    let mut first = DownloadJob::new(JobRequest::new(origin.clone(), "first"), h.pipeline.clone()).unwrap();
    let mut second = DownloadJob::new(JobRequest::new(origin, "second"), h.pipeline.clone()).unwrap();

    let (a, b) = tokio::join!(first.download(), second.download());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a, b);
    assert!(a.exists() && b.exists());
}
