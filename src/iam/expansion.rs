//! # Desired-State Expansion
//!
//! Turns the declared configuration (organization, repository list, role
//! lists) into the flat list of reconcile requests, one per (resource, role)
//! pair. Pure function: no I/O, deterministic, independent of input order.
//! Duplicate repository names collapse because the desired principal set is a
//! set.

use crate::config::DesiredState;
use crate::iam::policy::{Principal, ResourceId, Role};
use crate::iam::principal::{repository_principal, service_account_member};
use std::collections::BTreeSet;

/// One unit of reconciliation work: the full desired principal set for one
/// role on one resource (never a delta)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileRequest {
    pub resource: ResourceId,
    pub role: Role,
    pub desired: BTreeSet<Principal>,
}

/// Expand the desired state into reconcile requests
///
/// Service-account roles get one principal per configured repository;
/// project roles get the service account's own member string. Requests for
/// different (resource, role) pairs are independent and may be processed in
/// any order.
pub fn expand(desired: &DesiredState) -> Vec<ReconcileRequest> {
    let repo_principals: BTreeSet<Principal> = desired
        .repositories
        .iter()
        .map(|repo| {
            repository_principal(
                &desired.project_number,
                &desired.pool_id,
                &desired.organization,
                repo,
            )
        })
        .collect();

    let sa_resource = ResourceId::ServiceAccount {
        project_id: desired.project_id.clone(),
        email: desired.service_account_email.clone(),
    };
    let project_resource = ResourceId::Project {
        project_id: desired.project_id.clone(),
    };
    let sa_member: BTreeSet<Principal> =
        std::iter::once(service_account_member(&desired.service_account_email)).collect();

    let mut requests = Vec::new();
    for role in &desired.service_account_roles {
        requests.push(ReconcileRequest {
            resource: sa_resource.clone(),
            role: role.clone(),
            desired: repo_principals.clone(),
        });
    }
    for role in &desired.project_roles {
        requests.push(ReconcileRequest {
            resource: project_resource.clone(),
            role: role.clone(),
            desired: sa_member.clone(),
        });
    }
    requests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DesiredState;

    fn desired_state(repos: &[&str]) -> DesiredState {
        DesiredState {
            organization: "acme".into(),
            repositories: repos.iter().map(|r| (*r).to_owned()).collect(),
            project_id: "acme-prod".into(),
            project_number: "123456".into(),
            pool_id: "github-pool".into(),
            service_account_email: "deployer@acme-prod.iam.gserviceaccount.com".into(),
            service_account_roles: vec![
                Role::from("roles/iam.workloadIdentityUser"),
                Role::from("roles/iam.serviceAccountTokenCreator"),
            ],
            project_roles: vec![Role::from("roles/storage.admin")],
        }
    }

    #[test]
    fn one_request_per_resource_role_pair() {
        let requests = expand(&desired_state(&["r1", "r2"]));
        assert_eq!(requests.len(), 3);
        assert_eq!(
            requests
                .iter()
                .filter(|r| matches!(r.resource, ResourceId::ServiceAccount { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn duplicate_repositories_collapse() {
        let with_dupes = expand(&desired_state(&["r1", "r1", "r2"]));
        let without = expand(&desired_state(&["r1", "r2"]));
        assert_eq!(with_dupes, without);
        assert_eq!(with_dupes[0].desired.len(), 2);
    }

    #[test]
    fn repository_order_is_irrelevant() {
        let forward = expand(&desired_state(&["r1", "r2"]));
        let reverse = expand(&desired_state(&["r2", "r1"]));
        assert_eq!(forward, reverse);
    }

    #[test]
    fn project_roles_bind_the_service_account_member() {
        let requests = expand(&desired_state(&["r1"]));
        let project_request = requests
            .iter()
            .find(|r| matches!(r.resource, ResourceId::Project { .. }))
            .unwrap();
        assert_eq!(project_request.desired.len(), 1);
        assert!(project_request.desired.contains(&Principal::from(
            "serviceAccount:deployer@acme-prod.iam.gserviceaccount.com"
        )));
    }
}
