//! # Policy Model
//!
//! Structured representation of a resource's IAM policy: a map from role to a
//! de-duplicated principal set, plus the opaque etag the control plane uses
//! for optimistic concurrency. Membership checks are exact set operations on
//! whole principal strings, never substring matching, which is fragile when
//! one principal string is a prefix of another.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// An IAM principal identifier, treated as an opaque string
///
/// Either a `principalSet://...` external-identity pattern scoped to one
/// repository, a legacy org-wildcard pattern, or a `serviceAccount:<email>`
/// member. Equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// An IAM role identifier, e.g. `roles/iam.workloadIdentityUser`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Identifier of a resource whose IAM policy is reconciled
///
/// The two reconciliation targets of this system: the workload service
/// account (holds the per-repository WIF principals) and the project (holds
/// the service account's own roles).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceId {
    /// A service account addressed by project id and email
    ServiceAccount { project_id: String, email: String },
    /// A project addressed by project id
    Project { project_id: String },
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceAccount { project_id, email } => {
                write!(f, "projects/{project_id}/serviceAccounts/{email}")
            }
            Self::Project { project_id } => write!(f, "projects/{project_id}"),
        }
    }
}

/// A resource's IAM policy: role bindings plus the concurrency etag
///
/// Within one policy each role appears at most once; duplicate bindings for
/// the same role in the wire payload are merged at construction time, and
/// each principal set is de-duplicated by virtue of being a set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Policy {
    bindings: BTreeMap<Role, BTreeSet<Principal>>,
    etag: String,
}

impl Policy {
    /// Build a policy from (role, principals) pairs, merging duplicate roles
    pub fn from_bindings<I, P>(bindings: I, etag: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (Role, P)>,
        P: IntoIterator<Item = Principal>,
    {
        let mut map: BTreeMap<Role, BTreeSet<Principal>> = BTreeMap::new();
        for (role, principals) in bindings {
            map.entry(role).or_default().extend(principals);
        }
        Self {
            bindings: map,
            etag: etag.into(),
        }
    }

    /// The principal set currently bound to `role` (empty if the role has no
    /// binding yet)
    pub fn principals_for(&self, role: &Role) -> BTreeSet<Principal> {
        self.bindings.get(role).cloned().unwrap_or_default()
    }

    /// All role bindings in the policy
    pub fn bindings(&self) -> &BTreeMap<Role, BTreeSet<Principal>> {
        &self.bindings
    }

    /// The opaque optimistic-concurrency token read with this policy
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Whether `principal` is bound to `role`
    pub fn contains(&self, role: &Role, principal: &Principal) -> bool {
        self.bindings
            .get(role)
            .is_some_and(|members| members.contains(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_roles_merge_into_one_binding() {
        let policy = Policy::from_bindings(
            [
                (Role::from("roles/a"), vec![Principal::from("p1")]),
                (Role::from("roles/a"), vec![Principal::from("p2")]),
            ],
            "etag-1",
        );
        assert_eq!(policy.bindings().len(), 1);
        assert_eq!(policy.principals_for(&Role::from("roles/a")).len(), 2);
    }

    #[test]
    fn duplicate_principals_collapse() {
        let policy = Policy::from_bindings(
            [(
                Role::from("roles/a"),
                vec![Principal::from("p1"), Principal::from("p1")],
            )],
            "etag-1",
        );
        assert_eq!(policy.principals_for(&Role::from("roles/a")).len(), 1);
    }

    #[test]
    fn missing_role_yields_empty_set() {
        let policy = Policy::from_bindings(
            [(Role::from("roles/a"), vec![Principal::from("p1")])],
            "etag-1",
        );
        assert!(policy.principals_for(&Role::from("roles/b")).is_empty());
    }

    #[test]
    fn contains_is_exact_not_prefix() {
        // "p1" must not match "p10" even though it is a prefix
        let policy = Policy::from_bindings(
            [(Role::from("roles/a"), vec![Principal::from("p10")])],
            "etag-1",
        );
        assert!(!policy.contains(&Role::from("roles/a"), &Principal::from("p1")));
        assert!(policy.contains(&Role::from("roles/a"), &Principal::from("p10")));
    }
}
