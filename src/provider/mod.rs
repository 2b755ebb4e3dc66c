//! # Cloud Control Plane Providers
//!
//! The reconciler's only external boundary: an IAM policy store exposing
//! read-policy and add/remove-binding operations with optimistic concurrency
//! via the policy etag. Two implementations:
//! - `gcp`: native REST client against the GCP IAM and Resource Manager APIs
//!   (reqwest with rustls, no OpenSSL dependencies)
//! - `memory`: in-process store with injectable failures for the test suite

pub mod gcp;
pub mod memory;
pub mod retry;

use crate::iam::policy::{Policy, Principal, ResourceId, Role};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a policy store, classified per the handling they need
#[derive(Debug, Error)]
pub enum PolicyStoreError {
    /// The target resource does not exist. Reconciliation requires its
    /// targets to pre-exist; creating them is provisioning, not reconciling.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The caller lacks rights on the resource. Not retried; this usually
    /// means a prerequisite setup step was skipped.
    #[error("permission denied on {resource}: {message}")]
    PermissionDenied { resource: String, message: String },

    /// The write lost the etag race against another writer. Retried by
    /// re-reading and recomputing, never by replaying the stale payload.
    #[error("policy etag conflict on {0}")]
    Conflict(String),

    /// Rate limiting or temporary unavailability. Retried with backoff up to
    /// a bounded attempt budget.
    #[error("transient control plane error: {0}")]
    Transient(String),

    /// The control plane returned a payload this client cannot interpret
    #[error("invalid control plane response: {0}")]
    InvalidResponse(String),
}

impl PolicyStoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied { .. })
    }
}

/// Result of a successful add/remove call
///
/// Adding a principal already present and removing one already absent are
/// no-ops that succeed, reported as `AlreadySatisfied` rather than errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingChange {
    /// The binding was changed; `etag` is the policy version after the write
    Applied { etag: String },
    /// The policy already matched; `etag` is the current policy version
    AlreadySatisfied { etag: String },
}

impl BindingChange {
    pub fn etag(&self) -> &str {
        match self {
            Self::Applied { etag } | Self::AlreadySatisfied { etag } => etag,
        }
    }
}

/// The narrow interface to the IAM policy store
///
/// Writes are read-modify-write against the etag supplied by the caller; a
/// stale etag yields `PolicyStoreError::Conflict` and the caller must
/// re-fetch before retrying.
#[async_trait]
pub trait IamPolicyStore: Send + Sync {
    /// Fetch the current policy for `resource`
    async fn get_policy(&self, resource: &ResourceId) -> Result<Policy, PolicyStoreError>;

    /// Bind `principal` to `role` on `resource`
    async fn add_binding(
        &self,
        resource: &ResourceId,
        role: &Role,
        principal: &Principal,
        expected_etag: &str,
    ) -> Result<BindingChange, PolicyStoreError>;

    /// Unbind `principal` from `role` on `resource`
    async fn remove_binding(
        &self,
        resource: &ResourceId,
        role: &Role,
        principal: &Principal,
        expected_etag: &str,
    ) -> Result<BindingChange, PolicyStoreError>;
}
