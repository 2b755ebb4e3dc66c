//! # Reconcile Outcomes
//!
//! Per-principal outcome reporting. A failed operation never aborts the
//! batch; the caller inspects the aggregate and decides whether the run's
//! exit status is non-zero.

use crate::iam::policy::{Principal, ResourceId, Role};
use std::fmt;

/// The operation attempted for one principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingAction {
    Add,
    Remove,
}

impl fmt::Display for BindingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => f.write_str("add"),
            Self::Remove => f.write_str("remove"),
        }
    }
}

/// How one principal's operation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The binding was changed
    Applied,
    /// The policy already matched (add of a present principal, remove of an
    /// absent one)
    AlreadySatisfied,
    /// The operation failed after exhausting its retry budget, or hit a
    /// non-retryable error
    Failed {
        reason: String,
        permission_denied: bool,
    },
}

/// Outcome for one (principal, action) within a reconcile call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalOutcome {
    pub principal: Principal,
    pub action: BindingAction,
    pub status: OutcomeStatus,
}

/// Aggregate result of one `Reconcile` call
#[derive(Debug, Clone)]
pub struct ReconcileResult {
    pub resource: ResourceId,
    pub role: Role,
    pub outcomes: Vec<PrincipalOutcome>,
}

impl ReconcileResult {
    pub fn applied_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Applied)
            .count()
    }

    pub fn already_satisfied_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::AlreadySatisfied)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Failed { .. }))
            .count()
    }

    pub fn has_permission_failures(&self) -> bool {
        self.outcomes.iter().any(|o| {
            matches!(
                o.status,
                OutcomeStatus::Failed {
                    permission_denied: true,
                    ..
                }
            )
        })
    }

    /// True when every operation either applied or was already satisfied
    pub fn is_clean(&self) -> bool {
        self.failed_count() == 0
    }
}
