//! # Verification Pass
//!
//! Read-only safety net run after reconciliation: re-fetch each resource's
//! policy once and assert every expected (role, principal) pair is present.
//! Residual drift (for example from the control plane's eventual-consistency
//! window) is surfaced to the operator, not retried in a loop.

use crate::iam::expansion::ReconcileRequest;
use crate::iam::policy::{Policy, Principal, ResourceId, Role};
use crate::provider::retry::{retry_transient, RetryPolicy};
use crate::provider::{IamPolicyStore, PolicyStoreError};
use std::collections::BTreeMap;
use tracing::info;

/// An expected binding the re-read policy did not contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingBinding {
    pub resource: ResourceId,
    pub role: Role,
    pub principal: Principal,
}

/// Outcome of the verification pass
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    pub missing: Vec<MissingBinding>,
}

impl VerificationReport {
    pub fn converged(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Re-fetch each resource's policy once and report missing expected pairs
pub async fn verify(
    store: &dyn IamPolicyStore,
    requests: &[ReconcileRequest],
    retry: &RetryPolicy,
) -> Result<VerificationReport, PolicyStoreError> {
    let mut policies: BTreeMap<ResourceId, Policy> = BTreeMap::new();
    let mut report = VerificationReport::default();

    for request in requests {
        if !policies.contains_key(&request.resource) {
            let policy =
                retry_transient("get_policy", retry, || store.get_policy(&request.resource))
                    .await?;
            policies.insert(request.resource.clone(), policy);
        }
        let policy = &policies[&request.resource];
        for principal in &request.desired {
            if !policy.contains(&request.role, principal) {
                report.missing.push(MissingBinding {
                    resource: request.resource.clone(),
                    role: request.role.clone(),
                    principal: principal.clone(),
                });
            }
        }
    }

    if report.converged() {
        info!("Verification passed: all expected bindings present");
    } else {
        info!(
            "Verification found {} missing binding(s)",
            report.missing.len()
        );
    }
    Ok(report)
}
