//! # GCP Provider
//!
//! IAM policy store backed by the GCP REST APIs:
//! - `iam.googleapis.com` for service account policies
//! - `cloudresourcemanager.googleapis.com` for project policies
//!
//! Uses a native REST implementation (reqwest with rustls, no OpenSSL
//! dependencies) so it can also be pointed at an HTTP mock control plane via
//! endpoint overrides.

mod auth;
mod client;

pub use client::IamPolicyRest;

use crate::constants;
use crate::provider::IamPolicyStore;
use anyhow::Result;
use tracing::info;

/// Base URLs for the two policy APIs
///
/// `from_env` honors `WIF_IAM_ENDPOINT` and `WIF_CRM_ENDPOINT` so tests and
/// local runs can target a mock server instead of the live control plane.
#[derive(Debug, Clone)]
pub struct GcpEndpoints {
    pub iam: String,
    pub crm: String,
}

impl Default for GcpEndpoints {
    fn default() -> Self {
        Self {
            iam: constants::DEFAULT_IAM_ENDPOINT.to_owned(),
            crm: constants::DEFAULT_CRM_ENDPOINT.to_owned(),
        }
    }
}

impl GcpEndpoints {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let iam = std::env::var("WIF_IAM_ENDPOINT").unwrap_or(defaults.iam);
        let crm = std::env::var("WIF_CRM_ENDPOINT").unwrap_or(defaults.crm);
        if iam != constants::DEFAULT_IAM_ENDPOINT || crm != constants::DEFAULT_CRM_ENDPOINT {
            info!("Endpoint override active: iam={iam}, crm={crm}");
        }
        Self { iam, crm }
    }
}

/// Create the GCP policy store
///
/// Resolves an access token once at construction (env var first, then the
/// GCE metadata server), which is sufficient for a single CLI run.
pub async fn create_gcp_policy_store() -> Result<Box<dyn IamPolicyStore>> {
    info!("Using GCP REST client (native implementation)");
    Ok(Box::new(
        IamPolicyRest::new(GcpEndpoints::from_env()).await?,
    ))
}
