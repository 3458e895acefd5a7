//! Manifest fetching and segment-reference rewriting.
//!
//! The saved manifest is read by ffmpeg from local disk, so relative segment
//! references would resolve against the local directory. Each segment line is
//! therefore prefixed with the directory of the manifest's absolute URL.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use url::Url;

use crate::{CaptureError, Result};

/// Absolute directory URL of a manifest: everything up to and including the
/// last `/` of its path. Query and fragment are dropped.
pub fn segment_prefix(manifest_url: &Url) -> Result<String> {
    manifest_url
        .join(".")
        .map(String::from)
        .map_err(|e| CaptureError::ManifestFetch {
            url: manifest_url.to_string(),
            status: None,
            reason: format!("failed to derive segment prefix: {e}"),
        })
}

/// Prefix every line starting with `marker` by `prefix`.
///
/// Line count, order and terminators are preserved and non-matching lines are
/// passed through untouched, so applying this twice is the same as once.
pub fn rewrite_manifest(text: &str, prefix: &str, marker: &str) -> String {
    let mut out = String::with_capacity(text.len() + prefix.len() * 8);
    for line in text.split_inclusive('\n') {
        if line.starts_with(marker) {
            out.push_str(prefix);
        }
        out.push_str(line);
    }
    out
}

/// Number of lines `rewrite_manifest` would touch.
pub fn count_segment_lines(text: &str, marker: &str) -> usize {
    text.split_inclusive('\n')
        .filter(|line| line.starts_with(marker))
        .count()
}

/// A manifest that has been fetched, rewritten and written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedManifest {
    /// URL the manifest was fetched from.
    pub url: Url,
    /// Local file holding the rewritten manifest.
    pub path: PathBuf,
    /// Prefix applied to segment lines.
    pub prefix: String,
    /// Number of rewritten segment lines.
    pub segments: usize,
}

/// Fetches manifests over HTTP and persists their rewritten form.
#[derive(Debug, Clone)]
pub struct ManifestFetcher {
    client: reqwest::Client,
    marker: String,
}

impl ManifestFetcher {
    pub fn new(client: reqwest::Client, marker: impl Into<String>) -> Self {
        Self {
            client,
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Fetch `manifest_url`, rewrite it and write it to `destination`,
    /// replacing any previous file.
    ///
    /// HTTP failures are reported as `ManifestFetch` with the status attached;
    /// deciding whether a 404 means staleness is up to the caller.
    pub async fn fetch_and_save(&self, manifest_url: &Url, destination: &Path) -> Result<SavedManifest> {
        debug!(url = %manifest_url, "--> fetching manifest");
        let response = self
            .client
            .get(manifest_url.clone())
            .send()
            .await
            .map_err(|e| CaptureError::manifest_network(manifest_url.as_str(), &e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(url = %manifest_url, %status, "<-- manifest request failed");
            return Err(CaptureError::manifest_status(manifest_url.as_str(), status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CaptureError::manifest_network(manifest_url.as_str(), &e))?;
        debug!(url = %manifest_url, bytes = body.len(), "<-- fetched manifest");

        let prefix = segment_prefix(manifest_url)?;
        debug!(prefix = %prefix, "Segment prefix");

        let rewritten = rewrite_manifest(&body, &prefix, &self.marker);
        let segments = count_segment_lines(&body, &self.marker);

        tokio::fs::write(destination, rewritten)
            .await
            .map_err(|e| CaptureError::io_path("writing manifest", destination, e))?;
        info!(
            path = %destination.display(),
            segments,
            "Manifest saved"
        );

        Ok(SavedManifest {
            url: manifest_url.clone(),
            path: destination.to_path_buf(),
            prefix,
            segments,
        })
    }
}
