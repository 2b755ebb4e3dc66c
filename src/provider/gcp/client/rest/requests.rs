//! # Request Types
//!
//! GCP IAM REST API request structures.
//!
//! These structs represent the JSON payloads sent to the
//! `getIamPolicy`/`setIamPolicy` endpoints of the IAM and Cloud Resource
//! Manager APIs.
//!
//! API Reference: https://cloud.google.com/iam/docs/reference/rest/v1/projects.serviceAccounts/setIamPolicy

use serde::Serialize;

use super::responses::WirePolicy;

/// Request body for `:getIamPolicy`
///
/// Both APIs accept an empty options object; the policy version is pinned so
/// conditional bindings are returned in a stable shape.
#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetPolicyRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<PolicyOptions>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyOptions {
    pub requested_policy_version: i32,
}

impl GetPolicyRequest {
    /// Request the policy at schema version 3 (required to read conditions)
    pub fn versioned() -> Self {
        Self {
            options: Some(PolicyOptions {
                requested_policy_version: 3,
            }),
        }
    }
}

/// Request body for `:setIamPolicy`
///
/// The embedded policy must carry the etag read at fetch time; the control
/// plane rejects the write with a conflict when the etag is stale.
#[derive(Debug, Serialize)]
pub struct SetPolicyRequest {
    pub policy: WirePolicy,
}

impl SetPolicyRequest {
    pub fn new(policy: WirePolicy) -> Self {
        Self { policy }
    }
}
