//! # GCP Authentication
//!
//! Resolves the bearer token used for control-plane calls. Order of
//! precedence:
//! 1. `GOOGLE_OAUTH_ACCESS_TOKEN` environment variable (CI, local runs)
//! 2. The GCE metadata server (running inside GCP)

use crate::constants;
use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
}

/// Fetch an access token for the control plane
pub async fn fetch_access_token(http: &reqwest::Client) -> Result<String> {
    if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
        if !token.trim().is_empty() {
            info!("Using access token from GOOGLE_OAUTH_ACCESS_TOKEN");
            return Ok(token);
        }
    }

    info!("Fetching access token from metadata server");
    let response = http
        .get(constants::METADATA_TOKEN_URL)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .context("Failed to reach the GCE metadata server. Set GOOGLE_OAUTH_ACCESS_TOKEN when running outside GCP.")?;
    let response = response
        .error_for_status()
        .context("Metadata server rejected the token request")?;
    let token: MetadataTokenResponse = response
        .json()
        .await
        .context("Failed to parse metadata server token response")?;
    Ok(token.access_token)
}
