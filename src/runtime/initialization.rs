//! # Initialization
//!
//! Process setup: rustls crypto provider, environment loading, and the
//! tracing subscriber.

use anyhow::Result;

/// Initialize the process runtime
///
/// Must run before any control-plane call:
/// - installs the ring crypto provider (required for rustls 0.23+ when no
///   default provider is set via features)
/// - loads a local `.env` if present (token and endpoint overrides)
/// - sets up the tracing subscriber with an env filter
pub fn initialize() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Optional; absence of a .env file is the normal case
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wif_iam_reconciler=info,wifctl=info".into()),
        )
        .init();

    Ok(())
}
