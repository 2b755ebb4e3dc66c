//! # IAM Binding Reconciler
//!
//! Converges one role's principal set on one resource to the declared
//! desired set. The procedure:
//!
//! 1. Fetch the current policy.
//! 2. Extract the principal set bound to the role (empty if absent).
//! 3. Compute `to_add = desired − current`, `to_remove = current − desired`
//!    by exact string equality.
//! 4. Apply removals, then additions, one at a time against the policy etag.
//!
//! Every operation is individually idempotent, so re-running with the same
//! desired set after a partial failure is safe and completes the
//! convergence. A failed operation for one principal never prevents
//! attempts for the remaining principals. No binding of any other role on
//! the resource is touched.

pub mod diff;
pub mod outcome;
pub mod verify;

pub use diff::BindingDiff;
pub use outcome::{BindingAction, OutcomeStatus, PrincipalOutcome, ReconcileResult};
pub use verify::{verify, MissingBinding, VerificationReport};

use crate::iam::expansion::ReconcileRequest;
use crate::iam::policy::{Principal, ResourceId, Role};
use crate::iam::principal::is_legacy_org_wildcard;
use crate::provider::retry::{retry_transient, RetryPolicy};
use crate::provider::{BindingChange, IamPolicyStore, PolicyStoreError};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort a reconcile call before any write is attempted
#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// The caller never expresses "revoke this role entirely" through this
    /// path; an empty desired set is a configuration bug, not a request.
    #[error("empty desired principal set for {role} on {resource}")]
    EmptyDesiredSet { resource: ResourceId, role: Role },

    /// The initial policy fetch failed (not-found targets are fatal:
    /// reconciliation requires its resources to already exist)
    #[error(transparent)]
    PolicyStore(#[from] PolicyStoreError),
}

/// The binding reconciler
///
/// Holds no state across invocations; all idempotency is re-derived by
/// reading the remote policy on every call.
pub struct Reconciler {
    store: Arc<dyn IamPolicyStore>,
    retry: RetryPolicy,
    organization: String,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("retry", &self.retry)
            .field("organization", &self.organization)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(store: Arc<dyn IamPolicyStore>, retry: RetryPolicy, organization: String) -> Self {
        Self {
            store,
            retry,
            organization,
        }
    }

    /// Converge `request.role` on `request.resource` to `request.desired`
    ///
    /// Returns per-principal outcomes; inspect `ReconcileResult::is_clean`
    /// to decide whether the run failed. Principals already converged are
    /// reported as `AlreadySatisfied` without issuing any write.
    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
    ) -> Result<ReconcileResult, ReconcilerError> {
        if request.desired.is_empty() {
            return Err(ReconcilerError::EmptyDesiredSet {
                resource: request.resource.clone(),
                role: request.role.clone(),
            });
        }

        let policy = retry_transient("get_policy", &self.retry, || {
            self.store.get_policy(&request.resource)
        })
        .await?;
        let current = policy.principals_for(&request.role);
        let changes = diff::compute(&current, &request.desired);

        info!(
            "Reconciling {} on {}: {} to add, {} to remove, {} already bound",
            request.role,
            request.resource,
            changes.to_add.len(),
            changes.to_remove.len(),
            current.intersection(&request.desired).count()
        );

        let mut etag = policy.etag().to_owned();
        let mut outcomes = Vec::new();

        // Removals first, so a legacy wildcard principal and its
        // per-repository replacements never settle bound together.
        for principal in &changes.to_remove {
            if is_legacy_org_wildcard(principal, &self.organization) {
                info!(
                    "Migrating legacy org-wildcard principal off {}: {}",
                    request.role, principal
                );
            }
            outcomes.push(
                self.apply_one(request, BindingAction::Remove, principal, &mut etag)
                    .await,
            );
        }
        for principal in &changes.to_add {
            outcomes.push(
                self.apply_one(request, BindingAction::Add, principal, &mut etag)
                    .await,
            );
        }
        for principal in current.intersection(&request.desired) {
            debug!("{} already bound to {}", principal, request.role);
            outcomes.push(PrincipalOutcome {
                principal: principal.clone(),
                action: BindingAction::Add,
                status: OutcomeStatus::AlreadySatisfied,
            });
        }

        Ok(ReconcileResult {
            resource: request.resource.clone(),
            role: request.role.clone(),
            outcomes,
        })
    }

    /// Apply one add/remove, absorbing transient errors and etag conflicts
    ///
    /// A conflict means another writer won the race: re-read the policy,
    /// check whether the operation is still needed, and if so retry against
    /// the fresh etag. The stale payload is never replayed.
    async fn apply_one(
        &self,
        request: &ReconcileRequest,
        action: BindingAction,
        principal: &Principal,
        etag: &mut String,
    ) -> PrincipalOutcome {
        let mut conflict_attempts = 0;
        loop {
            let current_etag = etag.clone();
            let result = retry_transient(&format!("{action}_binding"), &self.retry, || match action
            {
                BindingAction::Add => self.store.add_binding(
                    &request.resource,
                    &request.role,
                    principal,
                    &current_etag,
                ),
                BindingAction::Remove => self.store.remove_binding(
                    &request.resource,
                    &request.role,
                    principal,
                    &current_etag,
                ),
            })
            .await;

            match result {
                Ok(change) => {
                    *etag = change.etag().to_owned();
                    let status = match change {
                        BindingChange::Applied { .. } => OutcomeStatus::Applied,
                        BindingChange::AlreadySatisfied { .. } => OutcomeStatus::AlreadySatisfied,
                    };
                    return PrincipalOutcome {
                        principal: principal.clone(),
                        action,
                        status,
                    };
                }
                Err(error)
                    if error.is_conflict() && conflict_attempts < self.retry.conflict_attempts =>
                {
                    conflict_attempts += 1;
                    warn!(
                        "Etag conflict on {} for {} (attempt {}/{}), re-reading policy",
                        request.resource, principal, conflict_attempts, self.retry.conflict_attempts
                    );
                    match retry_transient("get_policy", &self.retry, || {
                        self.store.get_policy(&request.resource)
                    })
                    .await
                    {
                        Ok(policy) => {
                            *etag = policy.etag().to_owned();
                            let present = policy.contains(&request.role, principal);
                            let satisfied = match action {
                                BindingAction::Add => present,
                                BindingAction::Remove => !present,
                            };
                            if satisfied {
                                return PrincipalOutcome {
                                    principal: principal.clone(),
                                    action,
                                    status: OutcomeStatus::AlreadySatisfied,
                                };
                            }
                        }
                        Err(error) => {
                            return failed_outcome(principal, action, &error);
                        }
                    }
                }
                Err(error) => {
                    return failed_outcome(principal, action, &error);
                }
            }
        }
    }
}

fn failed_outcome(
    principal: &Principal,
    action: BindingAction,
    error: &PolicyStoreError,
) -> PrincipalOutcome {
    warn!("Failed to {} binding for {}: {}", action, principal, error);
    PrincipalOutcome {
        principal: principal.clone(),
        action,
        status: OutcomeStatus::Failed {
            reason: error.to_string(),
            permission_denied: error.is_permission_denied(),
        },
    }
}
