//! # Response Types
//!
//! Wire representation of an IAM policy as returned by the GCP
//! `getIamPolicy`/`setIamPolicy` endpoints, plus the conversions into the
//! structured domain model. Existence checks go through these structures and
//! exact set membership, never through substring matching on serialized
//! output.
//!
//! API Reference: https://cloud.google.com/iam/docs/reference/rest/v1/Policy

use crate::iam::policy::{Policy, Principal, Role};
use serde::{Deserialize, Serialize};

/// One role binding as it appears on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBinding {
    /// Role identifier, e.g. `roles/iam.workloadIdentityUser`
    pub role: String,
    /// Member strings bound to the role
    #[serde(default)]
    pub members: Vec<String>,
    /// Optional IAM condition, passed through untouched so a conditional
    /// binding written by someone else survives our read-modify-write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

/// The policy document exchanged with the control plane
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WirePolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(default)]
    pub bindings: Vec<WireBinding>,
    /// Optimistic-concurrency token; echoed back on write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl WirePolicy {
    /// The etag, or empty when the control plane omitted one
    pub fn etag_or_empty(&self) -> String {
        self.etag.clone().unwrap_or_default()
    }

    /// Convert into the structured domain policy
    pub fn to_policy(&self) -> Policy {
        Policy::from_bindings(
            self.bindings.iter().map(|binding| {
                (
                    Role::new(binding.role.clone()),
                    binding.members.iter().map(Principal::new),
                )
            }),
            self.etag_or_empty(),
        )
    }

    /// Whether `member` is bound to `role` in any binding
    pub fn has_member(&self, role: &str, member: &str) -> bool {
        self.bindings
            .iter()
            .any(|b| b.role == role && b.members.iter().any(|m| m == member))
    }

    /// Bind `member` to `role`, creating an unconditional binding if needed
    ///
    /// Returns false when the member was already bound.
    pub fn add_member(&mut self, role: &str, member: &str) -> bool {
        if self.has_member(role, member) {
            return false;
        }
        if let Some(binding) = self
            .bindings
            .iter_mut()
            .find(|b| b.role == role && b.condition.is_none())
        {
            binding.members.push(member.to_owned());
        } else {
            self.bindings.push(WireBinding {
                role: role.to_owned(),
                members: vec![member.to_owned()],
                condition: None,
            });
        }
        true
    }

    /// Unbind `member` from `role`, dropping any binding left empty
    ///
    /// Returns false when the member was not bound.
    pub fn remove_member(&mut self, role: &str, member: &str) -> bool {
        let mut removed = false;
        for binding in &mut self.bindings {
            if binding.role == role {
                let before = binding.members.len();
                binding.members.retain(|m| m != member);
                removed |= binding.members.len() != before;
            }
        }
        self.bindings
            .retain(|b| b.role != role || !b.members.is_empty());
        removed
    }
}
