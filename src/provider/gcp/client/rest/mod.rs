//! # REST Policy Client
//!
//! `IamPolicyStore` implementation over the GCP REST APIs. Service account
//! policies live on `iam.googleapis.com`, project policies on
//! `cloudresourcemanager.googleapis.com`; both expose the same
//! `:getIamPolicy`/`:setIamPolicy` verbs.
//!
//! Writes are read-modify-write: the policy is re-read, mutated, and written
//! back carrying the caller's expected etag. A stale etag surfaces as
//! `PolicyStoreError::Conflict`, which the reconciler resolves by
//! re-reading and recomputing. This client does not retry; transient
//! failures propagate to the retry layer above it.

pub mod requests;
pub mod responses;

use crate::constants;
use crate::iam::policy::{Policy, Principal, ResourceId, Role};
use crate::provider::gcp::{auth, GcpEndpoints};
use crate::provider::{BindingChange, IamPolicyStore, PolicyStoreError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use requests::{GetPolicyRequest, SetPolicyRequest};
use responses::WirePolicy;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// REST client for IAM policies on service accounts and projects
pub struct IamPolicyRest {
    http: reqwest::Client,
    token: String,
    endpoints: GcpEndpoints,
}

impl fmt::Debug for IamPolicyRest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamPolicyRest")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl IamPolicyRest {
    /// Build the client and resolve an access token
    pub async fn new(endpoints: GcpEndpoints) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(constants::DEFAULT_HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        let token = auth::fetch_access_token(&http).await?;
        Ok(Self {
            http,
            token,
            endpoints,
        })
    }

    fn policy_url(&self, resource: &ResourceId, verb: &str) -> String {
        match resource {
            ResourceId::ServiceAccount { project_id, email } => format!(
                "{}/v1/projects/{}/serviceAccounts/{}:{verb}",
                self.endpoints.iam, project_id, email
            ),
            ResourceId::Project { project_id } => {
                format!("{}/v1/projects/{}:{verb}", self.endpoints.crm, project_id)
            }
        }
    }

    async fn fetch_wire_policy(
        &self,
        resource: &ResourceId,
    ) -> Result<WirePolicy, PolicyStoreError> {
        let url = self.policy_url(resource, "getIamPolicy");
        debug!("POST {url}");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&GetPolicyRequest::versioned())
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(classify_status(resource, status, &body));
        }
        serde_json::from_str(&body).map_err(|e| {
            PolicyStoreError::InvalidResponse(format!("getIamPolicy payload for {resource}: {e}"))
        })
    }

    async fn write_wire_policy(
        &self,
        resource: &ResourceId,
        policy: WirePolicy,
    ) -> Result<WirePolicy, PolicyStoreError> {
        let url = self.policy_url(resource, "setIamPolicy");
        debug!("POST {url}");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&SetPolicyRequest::new(policy))
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(classify_status(resource, status, &body));
        }
        serde_json::from_str(&body).map_err(|e| {
            PolicyStoreError::InvalidResponse(format!("setIamPolicy payload for {resource}: {e}"))
        })
    }
}

#[async_trait]
impl IamPolicyStore for IamPolicyRest {
    async fn get_policy(&self, resource: &ResourceId) -> Result<Policy, PolicyStoreError> {
        Ok(self.fetch_wire_policy(resource).await?.to_policy())
    }

    async fn add_binding(
        &self,
        resource: &ResourceId,
        role: &Role,
        principal: &Principal,
        expected_etag: &str,
    ) -> Result<BindingChange, PolicyStoreError> {
        let mut wire = self.fetch_wire_policy(resource).await?;
        if wire.etag_or_empty() != expected_etag {
            return Err(PolicyStoreError::Conflict(resource.to_string()));
        }
        if !wire.add_member(role.as_str(), principal.as_str()) {
            return Ok(BindingChange::AlreadySatisfied {
                etag: wire.etag_or_empty(),
            });
        }
        let written = self.write_wire_policy(resource, wire).await?;
        Ok(BindingChange::Applied {
            etag: written.etag_or_empty(),
        })
    }

    async fn remove_binding(
        &self,
        resource: &ResourceId,
        role: &Role,
        principal: &Principal,
        expected_etag: &str,
    ) -> Result<BindingChange, PolicyStoreError> {
        let mut wire = self.fetch_wire_policy(resource).await?;
        if wire.etag_or_empty() != expected_etag {
            return Err(PolicyStoreError::Conflict(resource.to_string()));
        }
        if !wire.remove_member(role.as_str(), principal.as_str()) {
            return Ok(BindingChange::AlreadySatisfied {
                etag: wire.etag_or_empty(),
            });
        }
        let written = self.write_wire_policy(resource, wire).await?;
        Ok(BindingChange::Applied {
            etag: written.etag_or_empty(),
        })
    }
}

fn transport_error(error: reqwest::Error) -> PolicyStoreError {
    // Connection resets and timeouts are retryable by definition
    PolicyStoreError::Transient(error.to_string())
}

fn classify_status(
    resource: &ResourceId,
    status: reqwest::StatusCode,
    body: &str,
) -> PolicyStoreError {
    let detail = truncate(body, 512);
    match status.as_u16() {
        404 => PolicyStoreError::NotFound(resource.to_string()),
        401 | 403 => PolicyStoreError::PermissionDenied {
            resource: resource.to_string(),
            message: detail,
        },
        // setIamPolicy reports a stale etag as 409 ABORTED
        409 => PolicyStoreError::Conflict(resource.to_string()),
        429 | 500 | 502 | 503 | 504 => {
            PolicyStoreError::Transient(format!("{status} from control plane: {detail}"))
        }
        _ => PolicyStoreError::InvalidResponse(format!("unexpected {status}: {detail}")),
    }
}

fn truncate(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        body.to_owned()
    } else {
        let mut end = limit;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_covers_the_error_taxonomy() {
        let resource = ResourceId::Project {
            project_id: "p".into(),
        };
        assert!(matches!(
            classify_status(&resource, reqwest::StatusCode::NOT_FOUND, ""),
            PolicyStoreError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(&resource, reqwest::StatusCode::FORBIDDEN, "denied"),
            PolicyStoreError::PermissionDenied { .. }
        ));
        assert!(matches!(
            classify_status(&resource, reqwest::StatusCode::CONFLICT, "ABORTED"),
            PolicyStoreError::Conflict(_)
        ));
        assert!(matches!(
            classify_status(&resource, reqwest::StatusCode::TOO_MANY_REQUESTS, ""),
            PolicyStoreError::Transient(_)
        ));
        assert!(matches!(
            classify_status(&resource, reqwest::StatusCode::SERVICE_UNAVAILABLE, ""),
            PolicyStoreError::Transient(_)
        ));
        assert!(matches!(
            classify_status(&resource, reqwest::StatusCode::IM_A_TEAPOT, ""),
            PolicyStoreError::InvalidResponse(_)
        ));
    }

    #[test]
    fn urls_route_to_the_right_api() {
        let endpoints = GcpEndpoints {
            iam: "https://iam.example".into(),
            crm: "https://crm.example".into(),
        };
        let client = IamPolicyRest {
            http: reqwest::Client::new(),
            token: "t".into(),
            endpoints,
        };
        assert_eq!(
            client.policy_url(
                &ResourceId::ServiceAccount {
                    project_id: "p".into(),
                    email: "sa@p.iam.gserviceaccount.com".into()
                },
                "getIamPolicy"
            ),
            "https://iam.example/v1/projects/p/serviceAccounts/sa@p.iam.gserviceaccount.com:getIamPolicy"
        );
        assert_eq!(
            client.policy_url(
                &ResourceId::Project {
                    project_id: "p".into()
                },
                "setIamPolicy"
            ),
            "https://crm.example/v1/projects/p:setIamPolicy"
        );
    }
}
