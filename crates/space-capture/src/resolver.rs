//! Turning an origin stream reference into a currently valid manifest URL.

use async_trait::async_trait;
use m3u8_rs::{Playlist, parse_playlist_res};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::{CaptureError, Result};

/// Produces the current absolute manifest URL for an origin stream reference.
///
/// Implementations must be re-invocable: resolving the same origin again after
/// the previous manifest went stale yields whatever is valid *now*.
#[async_trait]
pub trait PlaylistResolver: Send + Sync {
    async fn resolve(&self, origin_url: &str) -> Result<Url>;

    fn name(&self) -> &'static str;
}

/// Which resolver a pipeline is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// Follow a master playlist to its current media playlist.
    #[default]
    Master,
    /// Use the origin URL as the manifest URL.
    Passthrough,
}

fn parse_absolute(origin_url: &str) -> Result<Url> {
    let url = Url::parse(origin_url)
        .map_err(|e| CaptureError::resolution(origin_url, format!("invalid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(CaptureError::resolution(
            origin_url,
            format!("unsupported scheme `{other}`"),
        )),
    }
}

/// Resolver for origins that are already media manifests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughResolver;

#[async_trait]
impl PlaylistResolver for PassthroughResolver {
    async fn resolve(&self, origin_url: &str) -> Result<Url> {
        parse_absolute(origin_url)
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}

/// Resolver for dynamic/master playlists.
///
/// Fetches the origin and, if it is a master playlist, follows its first
/// variant; a live origin lists exactly the media playlist currently being
/// written there. An origin that is itself a media playlist resolves to itself.
#[derive(Debug, Clone)]
pub struct MasterPlaylistResolver {
    client: reqwest::Client,
}

impl MasterPlaylistResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn select_manifest(origin: &Url, body: &[u8]) -> Result<Url> {
        match parse_playlist_res(body) {
            Ok(Playlist::MasterPlaylist(master)) => {
                let variant = master.variants.first().ok_or_else(|| {
                    CaptureError::resolution(origin.as_str(), "master playlist has no variants")
                })?;
                debug!(
                    variants = master.variants.len(),
                    uri = %variant.uri,
                    "Selected first variant from master playlist"
                );
                origin.join(variant.uri.trim()).map_err(|e| {
                    CaptureError::resolution(
                        origin.as_str(),
                        format!("invalid variant URI `{}`: {e}", variant.uri),
                    )
                })
            }
            Ok(Playlist::MediaPlaylist(_)) => Ok(origin.clone()),
            Err(e) => Err(CaptureError::resolution(
                origin.as_str(),
                format!("failed to parse playlist: {e}"),
            )),
        }
    }
}

#[async_trait]
impl PlaylistResolver for MasterPlaylistResolver {
    async fn resolve(&self, origin_url: &str) -> Result<Url> {
        let origin = parse_absolute(origin_url)?;

        debug!(origin = %origin, "--> resolving playlist");
        let response = self
            .client
            .get(origin.clone())
            .send()
            .await
            .map_err(|e| CaptureError::resolution(origin_url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CaptureError::resolution(
                origin_url,
                format!("HTTP {status}"),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CaptureError::resolution(origin_url, e.to_string()))?;
        debug!(origin = %origin, bytes = body.len(), "<-- resolving playlist");

        let manifest_url = Self::select_manifest(&origin, &body)?;
        info!(origin = %origin, manifest = %manifest_url, "Resolved manifest URL");
        Ok(manifest_url)
    }

    fn name(&self) -> &'static str {
        "master"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-VERSION:3\n\
        #EXT-X-STREAM-INF:BANDWIDTH=64000,CODECS=\"mp4a.40.2\"\n\
        transcode/playlist_16012.m3u8?type=live\n";

    const MEDIA: &str = "#EXTM3U\n\
        #EXT-X-VERSION:3\n\
        #EXT-X-TARGETDURATION:3\n\
        #EXTINF:3.0,\n\
        chunk_1.aac\n";

    #[test]
    fn master_resolves_to_first_variant_relative_to_origin() {
        let origin = Url::parse("https://edge.example.com/live/abc/master_dynamic.m3u8").unwrap();
        let url = MasterPlaylistResolver::select_manifest(&origin, MASTER.as_bytes()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://edge.example.com/live/abc/transcode/playlist_16012.m3u8?type=live"
        );
    }

    #[test]
    fn media_playlist_resolves_to_origin() {
        let origin = Url::parse("https://edge.example.com/live/abc/playlist.m3u8").unwrap();
        let url = MasterPlaylistResolver::select_manifest(&origin, MEDIA.as_bytes()).unwrap();
        assert_eq!(url, origin);
    }

    #[tokio::test]
    async fn passthrough_rejects_relative_and_non_http_urls() {
        let resolver = PassthroughResolver;
        assert!(resolver.resolve("playlist.m3u8").await.is_err());
        assert!(matches!(
            resolver.resolve("file:///etc/passwd").await,
            Err(CaptureError::Resolution { .. })
        ));
        assert!(resolver.resolve("https://a.example/x/p.m3u8").await.is_ok());
    }
}
