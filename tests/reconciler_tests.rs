//! # Reconciler Integration Tests
//!
//! Drives the binding reconciler against the in-memory policy store and
//! asserts the convergence, idempotence, and failure-handling guarantees.

use std::collections::BTreeSet;
use std::sync::Arc;

use wif_iam_reconciler::iam::expansion::ReconcileRequest;
use wif_iam_reconciler::iam::policy::{Principal, ResourceId, Role};
use wif_iam_reconciler::iam::reconciler::{OutcomeStatus, Reconciler, ReconcilerError};
use wif_iam_reconciler::provider::memory::{
    FailureAction, FailureKind, MemoryPolicyStore, StoreOp,
};
use wif_iam_reconciler::provider::retry::RetryPolicy;
use wif_iam_reconciler::provider::{IamPolicyStore, PolicyStoreError};

fn sa_resource() -> ResourceId {
    ResourceId::ServiceAccount {
        project_id: "acme-prod".into(),
        email: "deployer@acme-prod.iam.gserviceaccount.com".into(),
    }
}

fn token_creator() -> Role {
    Role::from("roles/iam.serviceAccountTokenCreator")
}

fn principal(repo: &str) -> Principal {
    Principal::new(format!(
        "principalSet://iam.googleapis.com/projects/123456/locations/global/workloadIdentityPools/github-pool/attribute.repository/acme/{repo}"
    ))
}

fn request(role: Role, principals: &[Principal]) -> ReconcileRequest {
    ReconcileRequest {
        resource: sa_resource(),
        role,
        desired: principals.iter().cloned().collect(),
    }
}

fn reconciler(store: &Arc<MemoryPolicyStore>) -> Reconciler {
    reconciler_with_policy(store, RetryPolicy::immediate())
}

fn reconciler_with_policy(store: &Arc<MemoryPolicyStore>, retry: RetryPolicy) -> Reconciler {
    Reconciler::new(
        Arc::clone(store) as Arc<dyn IamPolicyStore>,
        retry,
        "acme".into(),
    )
}

fn write_op_count(store: &MemoryPolicyStore) -> usize {
    store.write_operations().len()
}

#[tokio::test]
async fn fresh_role_gets_both_principals() {
    let store = Arc::new(MemoryPolicyStore::new());
    store.seed_resource(&sa_resource());
    let request = request(token_creator(), &[principal("repo-a"), principal("repo-b")]);

    let result = reconciler(&store).reconcile(&request).await.unwrap();

    assert_eq!(result.applied_count(), 2);
    assert_eq!(result.failed_count(), 0);
    let policy = store.get_policy(&sa_resource()).await.unwrap();
    assert_eq!(policy.principals_for(&token_creator()), request.desired);
}

#[tokio::test]
async fn second_identical_run_issues_no_writes() {
    let store = Arc::new(MemoryPolicyStore::new());
    store.seed_resource(&sa_resource());
    let request = request(token_creator(), &[principal("repo-a"), principal("repo-b")]);
    let reconciler = reconciler(&store);

    reconciler.reconcile(&request).await.unwrap();
    let writes_after_first = write_op_count(&store);

    let result = reconciler.reconcile(&request).await.unwrap();

    assert_eq!(write_op_count(&store), writes_after_first);
    assert_eq!(result.applied_count(), 0);
    assert_eq!(result.already_satisfied_count(), 2);
}

#[tokio::test]
async fn converges_from_arbitrary_starting_policy() {
    let store = Arc::new(MemoryPolicyStore::new());
    store.seed_binding(
        &sa_resource(),
        &token_creator(),
        [principal("repo-a"), principal("stale-1"), principal("stale-2")],
    );
    let request = request(token_creator(), &[principal("repo-a"), principal("repo-c")]);

    let result = reconciler(&store).reconcile(&request).await.unwrap();

    assert!(result.is_clean());
    let policy = store.get_policy(&sa_resource()).await.unwrap();
    assert_eq!(policy.principals_for(&token_creator()), request.desired);
}

#[tokio::test]
async fn other_roles_on_the_resource_are_untouched() {
    let store = Arc::new(MemoryPolicyStore::new());
    let other_role = Role::from("roles/iam.workloadIdentityUser");
    let other_members: BTreeSet<Principal> =
        [principal("other-1"), principal("other-2")].into_iter().collect();
    store.seed_binding(&sa_resource(), &other_role, other_members.clone());
    store.seed_binding(&sa_resource(), &token_creator(), [principal("stale")]);

    let request = request(token_creator(), &[principal("repo-a")]);
    reconciler(&store).reconcile(&request).await.unwrap();

    let policy = store.get_policy(&sa_resource()).await.unwrap();
    assert_eq!(policy.principals_for(&other_role), other_members);
    assert_eq!(policy.principals_for(&token_creator()), request.desired);
}

#[tokio::test]
async fn partial_failure_is_resumable_without_duplicates() {
    let store = Arc::new(MemoryPolicyStore::new());
    store.seed_resource(&sa_resource());
    let p1 = principal("repo-a");
    let p2 = principal("repo-b");
    let retry = RetryPolicy {
        transient_attempts: 2,
        ..RetryPolicy::immediate()
    };
    // Exhaust the transient budget for p2 on the first run
    store.inject_failure(FailureAction::Add, &p2, 2, FailureKind::Transient);

    let request = request(token_creator(), &[p1.clone(), p2.clone()]);
    let reconciler = reconciler_with_policy(&store, retry);

    let first = reconciler.reconcile(&request).await.unwrap();
    assert_eq!(first.applied_count(), 1);
    assert_eq!(first.failed_count(), 1);

    let second = reconciler.reconcile(&request).await.unwrap();
    assert!(second.is_clean());

    let policy = store.get_policy(&sa_resource()).await.unwrap();
    assert_eq!(policy.principals_for(&token_creator()), request.desired);
    // p1 was written exactly once across both runs
    let p1_adds = store
        .write_operations()
        .iter()
        .filter(|op| matches!(op, StoreOp::Add { principal, .. } if *principal == p1.to_string()))
        .count();
    assert_eq!(p1_adds, 1);
}

#[tokio::test]
async fn permission_failure_does_not_stop_the_batch() {
    let store = Arc::new(MemoryPolicyStore::new());
    store.seed_resource(&sa_resource());
    let p1 = principal("repo-a");
    let p2 = principal("repo-b");
    store.inject_failure(FailureAction::Add, &p1, 1, FailureKind::PermissionDenied);

    let request = request(token_creator(), &[p1.clone(), p2.clone()]);
    let result = reconciler(&store).reconcile(&request).await.unwrap();

    assert!(result.has_permission_failures());
    assert_eq!(result.failed_count(), 1);
    // The other principal was still attempted and bound
    let policy = store.get_policy(&sa_resource()).await.unwrap();
    assert!(policy.contains(&token_creator(), &p2));
    assert!(!policy.contains(&token_creator(), &p1));
}

#[tokio::test]
async fn etag_conflict_is_resolved_by_rereading() {
    let store = Arc::new(MemoryPolicyStore::new());
    store.seed_resource(&sa_resource());
    let p1 = principal("repo-a");
    store.inject_failure(FailureAction::Add, &p1, 1, FailureKind::Conflict);

    let request = request(token_creator(), &[p1.clone()]);
    let result = reconciler(&store).reconcile(&request).await.unwrap();

    assert!(result.is_clean());
    assert_eq!(result.applied_count(), 1);
    let policy = store.get_policy(&sa_resource()).await.unwrap();
    assert!(policy.contains(&token_creator(), &p1));
}

#[tokio::test]
async fn stale_etag_write_is_rejected_by_the_store() {
    let store = Arc::new(MemoryPolicyStore::new());
    store.seed_resource(&sa_resource());
    let stale = store.get_policy(&sa_resource()).await.unwrap();
    store.touch(&sa_resource());

    let result = store
        .add_binding(
            &sa_resource(),
            &token_creator(),
            &principal("repo-a"),
            stale.etag(),
        )
        .await;
    assert!(matches!(result, Err(PolicyStoreError::Conflict(_))));
}

#[tokio::test]
async fn missing_resource_is_fatal() {
    let store = Arc::new(MemoryPolicyStore::new());
    let request = request(token_creator(), &[principal("repo-a")]);

    let result = reconciler(&store).reconcile(&request).await;
    assert!(matches!(
        result,
        Err(ReconcilerError::PolicyStore(PolicyStoreError::NotFound(_)))
    ));
}

#[tokio::test]
async fn empty_desired_set_is_rejected() {
    let store = Arc::new(MemoryPolicyStore::new());
    store.seed_resource(&sa_resource());
    let request = ReconcileRequest {
        resource: sa_resource(),
        role: token_creator(),
        desired: BTreeSet::new(),
    };

    let result = reconciler(&store).reconcile(&request).await;
    assert!(matches!(result, Err(ReconcilerError::EmptyDesiredSet { .. })));
}

#[tokio::test]
async fn transient_failure_on_remove_reports_failed_outcome() {
    let store = Arc::new(MemoryPolicyStore::new());
    let stale = principal("stale");
    store.seed_binding(
        &sa_resource(),
        &token_creator(),
        [principal("repo-a"), stale.clone()],
    );
    let retry = RetryPolicy {
        transient_attempts: 2,
        ..RetryPolicy::immediate()
    };
    store.inject_failure(FailureAction::Remove, &stale, 2, FailureKind::Transient);

    let request = request(token_creator(), &[principal("repo-a")]);
    let result = reconciler_with_policy(&store, retry)
        .reconcile(&request)
        .await
        .unwrap();

    assert_eq!(result.failed_count(), 1);
    let failed = result
        .outcomes
        .iter()
        .find(|o| matches!(o.status, OutcomeStatus::Failed { .. }))
        .unwrap();
    assert_eq!(failed.principal, stale);
}
