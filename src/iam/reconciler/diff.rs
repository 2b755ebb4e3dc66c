//! # Binding Diff
//!
//! Exact set difference between the current and desired principal sets for
//! one role. Comparison is whole-string equality; a legacy org-wildcard
//! principal never equals a per-repository principal, so it lands in
//! `to_remove` through the same arithmetic as any other stray member.

use crate::iam::policy::Principal;
use std::collections::BTreeSet;

/// The minimal changes converging one role's principal set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindingDiff {
    pub to_add: BTreeSet<Principal>,
    pub to_remove: BTreeSet<Principal>,
}

impl BindingDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Compute `desired − current` and `current − desired`
pub fn compute(current: &BTreeSet<Principal>, desired: &BTreeSet<Principal>) -> BindingDiff {
    BindingDiff {
        to_add: desired.difference(current).cloned().collect(),
        to_remove: current.difference(desired).cloned().collect(),
    }
}
