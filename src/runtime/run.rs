//! # Run Orchestration
//!
//! Drives the desired-state expansion through the reconciler, strictly
//! sequentially: one (resource, role, principal) operation completes before
//! the next begins. Requests for different (resource, role) pairs are
//! independent; sequential order here just keeps the etag handling simple.

use crate::config::DesiredState;
use crate::iam::expansion::{self, ReconcileRequest};
use crate::iam::policy::{Policy, ResourceId, Role};
use crate::iam::reconciler::{diff, verify, BindingDiff, ReconcileResult, Reconciler};
use crate::iam::reconciler::VerificationReport;
use crate::provider::retry::{retry_transient, RetryPolicy};
use crate::provider::IamPolicyStore;
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Aggregate outcome of an `apply` run
#[derive(Debug)]
pub struct RunReport {
    pub results: Vec<ReconcileResult>,
    pub verification: VerificationReport,
}

impl RunReport {
    pub fn failed_count(&self) -> usize {
        self.results.iter().map(ReconcileResult::failed_count).sum()
    }

    pub fn has_permission_failures(&self) -> bool {
        self.results
            .iter()
            .any(ReconcileResult::has_permission_failures)
    }

    /// True when every operation succeeded and verification converged
    pub fn succeeded(&self) -> bool {
        self.failed_count() == 0 && self.verification.converged()
    }
}

/// The would-be changes for one (resource, role) pair, computed read-only
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub resource: ResourceId,
    pub role: Role,
    pub changes: BindingDiff,
}

/// Reconcile every (resource, role) pair, then run the verification pass
pub async fn apply(
    store: Arc<dyn IamPolicyStore>,
    desired: &DesiredState,
    retry: RetryPolicy,
) -> Result<RunReport> {
    let requests = expansion::expand(desired);
    info!(
        "Reconciling {} (resource, role) pair(s) for {} repository(ies)",
        requests.len(),
        desired.repositories.len()
    );

    let reconciler = Reconciler::new(
        Arc::clone(&store),
        retry.clone(),
        desired.organization.clone(),
    );
    let mut results = Vec::new();
    for request in &requests {
        results.push(reconciler.reconcile(request).await?);
    }

    let verification = verify(store.as_ref(), &requests, &retry).await?;
    Ok(RunReport {
        results,
        verification,
    })
}

/// Compute the diff for every pair without writing anything
pub async fn plan(
    store: &dyn IamPolicyStore,
    desired: &DesiredState,
    retry: &RetryPolicy,
) -> Result<Vec<PlannedChange>> {
    let requests = expansion::expand(desired);
    let policies = fetch_policies(store, &requests, retry).await?;
    Ok(requests
        .iter()
        .map(|request| {
            let current = policies[&request.resource].principals_for(&request.role);
            PlannedChange {
                resource: request.resource.clone(),
                role: request.role.clone(),
                changes: diff::compute(&current, &request.desired),
            }
        })
        .collect())
}

/// Run only the verification pass against the current remote policies
pub async fn verify_only(
    store: &dyn IamPolicyStore,
    desired: &DesiredState,
    retry: &RetryPolicy,
) -> Result<VerificationReport> {
    let requests = expansion::expand(desired);
    Ok(verify(store, &requests, retry).await?)
}

async fn fetch_policies(
    store: &dyn IamPolicyStore,
    requests: &[ReconcileRequest],
    retry: &RetryPolicy,
) -> Result<BTreeMap<ResourceId, Policy>> {
    let mut policies = BTreeMap::new();
    for request in requests {
        if !policies.contains_key(&request.resource) {
            let policy =
                retry_transient("get_policy", retry, || store.get_policy(&request.resource))
                    .await?;
            policies.insert(request.resource.clone(), policy);
        }
    }
    Ok(policies)
}
