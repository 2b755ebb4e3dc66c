//! # Principal Naming
//!
//! Construction of Workload Identity Federation principal strings and
//! detection of the legacy org-wildcard representation.
//!
//! The template must be reproduced byte-exact for the control plane's
//! matching rules:
//!
//! `principalSet://iam.googleapis.com/projects/<project-number>/locations/global/workloadIdentityPools/<pool-id>/attribute.repository/<org>/<repo>`
//!
//! No wildcard is ever emitted inside the `<org>/<repo>` segment. The control
//! plane accepts a wildcarded binding at write time but does not reliably
//! authorize it, so the per-repository form is the only steady-state
//! representation. The wildcard form still appears in existing policies as a
//! legacy value to be migrated away from.

use crate::iam::policy::Principal;

/// The IAM authority hosting workload identity pools
pub const WIF_AUTHORITY: &str = "iam.googleapis.com";

/// Build the per-repository WIF principal for `org`/`repo`
pub fn repository_principal(
    project_number: &str,
    pool_id: &str,
    org: &str,
    repo: &str,
) -> Principal {
    Principal::new(format!(
        "principalSet://{WIF_AUTHORITY}/projects/{project_number}/locations/global/workloadIdentityPools/{pool_id}/attribute.repository/{org}/{repo}"
    ))
}

/// Build the member string for a service account itself
pub fn service_account_member(email: &str) -> Principal {
    Principal::new(format!("serviceAccount:{email}"))
}

/// Whether `principal` is the legacy org-wildcard pattern for `org`
///
/// The legacy form bound `attribute.repository/<org>/*` as a single literal
/// pattern. It never string-equals any per-repository principal, so plain set
/// difference already schedules it for removal; this helper only exists so
/// the reconciler can log the migration explicitly.
pub fn is_legacy_org_wildcard(principal: &Principal, org: &str) -> bool {
    principal
        .as_str()
        .starts_with(&format!("principalSet://{WIF_AUTHORITY}/"))
        && principal
            .as_str()
            .ends_with(&format!("/attribute.repository/{org}/*"))
}
