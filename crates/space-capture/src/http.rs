//! HTTP client construction for resolution and manifest requests.

use std::sync::OnceLock;

use tracing::debug;

use crate::config::CaptureConfig;
use crate::{CaptureError, Result};

/// Install the rustls crypto provider once per process.
///
/// reqwest is built without a default provider, so one has to be in place
/// before the first TLS handshake.
pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build the client shared by the resolver and the manifest fetcher.
pub fn build_client(config: &CaptureConfig) -> Result<reqwest::Client> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .connect_timeout(config.connect_timeout);

    // Without `no_proxy()` reqwest picks up the environment's proxy settings.
    if !config.use_system_proxy {
        builder = builder.no_proxy();
    }

    if !config.http_timeout.is_zero() {
        builder = builder.timeout(config.http_timeout);
    }

    builder
        .build()
        .map_err(|e| CaptureError::Configuration(format!("failed to build HTTP client: {e}")))
}
