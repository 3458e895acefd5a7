//! In-process HTTP origin used by the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::net::TcpListener;

pub const MEDIA_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:3\n\
#EXT-X-MEDIA-SEQUENCE:0\n\
#EXTINF:3.000,\n\
chunk_1700000000_0_a.aac\n\
#EXTINF:3.000,\n\
chunk_1700000003_1_a.aac\n\
#EXT-X-ENDLIST\n";

/// Counts how often the master playlist was requested.
#[derive(Default)]
pub struct Origin {
    pub master_hits: AtomicUsize,
}

impl Origin {
    pub fn master_hits(&self) -> usize {
        self.master_hits.load(Ordering::SeqCst)
    }
}

/// First request points at `v1` (which 404s), later ones at `v2`.
async fn master(State(origin): State<Arc<Origin>>) -> String {
    let hit = origin.master_hits.fetch_add(1, Ordering::SeqCst);
    let variant = if hit == 0 { "v1" } else { "v2" };
    format!(
        "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=64000,CODECS=\"mp4a.40.2\"\n{variant}/playlist.m3u8?type=live\n"
    )
}

async fn media() -> &'static str {
    MEDIA_PLAYLIST
}

async fn gone() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn garbage() -> &'static str {
    "<html>not a playlist</html>"
}

pub struct OriginServer {
    pub addr: SocketAddr,
    pub origin: Arc<Origin>,
}

impl OriginServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Serve the fixture origin on an ephemeral local port.
///
/// Routes:
/// - `/live/master.m3u8`: master playlist rotating from `v1` to `v2`
/// - `/live/v1/playlist.m3u8`: 404 (rotated away)
/// - `/live/v2/playlist.m3u8`, `/direct/ok.m3u8`: media playlist
/// - `/direct/gone.m3u8`: 404
/// - `/direct/broken.m3u8`: 500
/// - `/direct/garbage.m3u8`: not a playlist
pub async fn spawn_origin() -> OriginServer {
    let origin = Arc::new(Origin::default());
    let app = Router::new()
        .route("/live/master.m3u8", get(master))
        .route("/live/v1/playlist.m3u8", get(gone))
        .route("/live/v2/playlist.m3u8", get(media))
        .route("/direct/ok.m3u8", get(media))
        .route("/direct/gone.m3u8", get(gone))
        .route("/direct/broken.m3u8", get(broken))
        .route("/direct/garbage.m3u8", get(garbage))
        .with_state(origin.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    OriginServer { addr, origin }
}
