//! # In-Memory Policy Store
//!
//! An in-process `IamPolicyStore` with the same etag discipline as the real
//! control plane, plus failure injection and an operation log. The test
//! suite drives the reconciler against this store instead of a live API.

use crate::iam::policy::{Policy, Principal, ResourceId, Role};
use crate::provider::{BindingChange, IamPolicyStore, PolicyStoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

/// A recorded store operation, for asserting call counts in tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Get {
        resource: String,
    },
    Add {
        resource: String,
        role: String,
        principal: String,
    },
    Remove {
        resource: String,
        role: String,
        principal: String,
    },
}

/// Which write operations an injected failure applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    Add,
    Remove,
}

/// Error class an injected failure produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    PermissionDenied,
    Conflict,
}

#[derive(Debug)]
struct InjectedFailure {
    action: FailureAction,
    principal: Principal,
    remaining: u32,
    kind: FailureKind,
}

#[derive(Debug)]
struct InjectedReadFailure {
    resource: ResourceId,
    remaining: u32,
    kind: FailureKind,
}

#[derive(Debug, Default)]
struct StoredPolicy {
    bindings: BTreeMap<Role, BTreeSet<Principal>>,
    etag_serial: u64,
}

impl StoredPolicy {
    fn etag(&self) -> String {
        format!("etag-{}", self.etag_serial)
    }
}

#[derive(Debug, Default)]
struct State {
    policies: HashMap<ResourceId, StoredPolicy>,
    log: Vec<StoreOp>,
    failures: Vec<InjectedFailure>,
    read_failures: Vec<InjectedReadFailure>,
}

/// In-memory policy store with failure injection
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    state: Mutex<State>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the resource with an empty policy
    pub fn seed_resource(&self, resource: &ResourceId) {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.policies.entry(resource.clone()).or_default();
    }

    /// Create the resource and bind `principals` to `role`
    pub fn seed_binding<I>(&self, resource: &ResourceId, role: &Role, principals: I)
    where
        I: IntoIterator<Item = Principal>,
    {
        let mut state = self.state.lock().expect("store lock poisoned");
        let policy = state.policies.entry(resource.clone()).or_default();
        policy
            .bindings
            .entry(role.clone())
            .or_default()
            .extend(principals);
    }

    /// Fail the next `times` matching write calls with the given error class
    pub fn inject_failure(
        &self,
        action: FailureAction,
        principal: &Principal,
        times: u32,
        kind: FailureKind,
    ) {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.failures.push(InjectedFailure {
            action,
            principal: principal.clone(),
            remaining: times,
            kind,
        });
    }

    /// Fail the next `times` `get_policy` calls for `resource`
    pub fn inject_read_failure(&self, resource: &ResourceId, times: u32, kind: FailureKind) {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.read_failures.push(InjectedReadFailure {
            resource: resource.clone(),
            remaining: times,
            kind,
        });
    }

    /// Simulate an external writer: bump the etag without changing bindings
    pub fn touch(&self, resource: &ResourceId) {
        let mut state = self.state.lock().expect("store lock poisoned");
        if let Some(policy) = state.policies.get_mut(resource) {
            policy.etag_serial += 1;
        }
    }

    /// All operations recorded since construction
    pub fn operations(&self) -> Vec<StoreOp> {
        self.state.lock().expect("store lock poisoned").log.clone()
    }

    /// Write operations (adds and removes) recorded since construction
    pub fn write_operations(&self) -> Vec<StoreOp> {
        self.operations()
            .into_iter()
            .filter(|op| !matches!(op, StoreOp::Get { .. }))
            .collect()
    }

    fn take_failure(
        state: &mut State,
        action: FailureAction,
        principal: &Principal,
        resource: &ResourceId,
    ) -> Option<PolicyStoreError> {
        let slot = state
            .failures
            .iter_mut()
            .find(|f| f.action == action && f.principal == *principal && f.remaining > 0)?;
        slot.remaining -= 1;
        let kind = slot.kind;
        Some(match kind {
            FailureKind::Transient => {
                PolicyStoreError::Transient(format!("injected transient for {principal}"))
            }
            FailureKind::PermissionDenied => PolicyStoreError::PermissionDenied {
                resource: resource.to_string(),
                message: format!("injected denial for {principal}"),
            },
            FailureKind::Conflict => PolicyStoreError::Conflict(resource.to_string()),
        })
    }

    fn take_read_failure(state: &mut State, resource: &ResourceId) -> Option<PolicyStoreError> {
        let slot = state
            .read_failures
            .iter_mut()
            .find(|f| f.resource == *resource && f.remaining > 0)?;
        slot.remaining -= 1;
        Some(match slot.kind {
            FailureKind::Transient => {
                PolicyStoreError::Transient(format!("injected transient read for {resource}"))
            }
            FailureKind::PermissionDenied => PolicyStoreError::PermissionDenied {
                resource: resource.to_string(),
                message: format!("injected read denial for {resource}"),
            },
            FailureKind::Conflict => PolicyStoreError::Conflict(resource.to_string()),
        })
    }
}

#[async_trait]
impl IamPolicyStore for MemoryPolicyStore {
    async fn get_policy(&self, resource: &ResourceId) -> Result<Policy, PolicyStoreError> {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.log.push(StoreOp::Get {
            resource: resource.to_string(),
        });
        if let Some(error) = Self::take_read_failure(&mut state, resource) {
            return Err(error);
        }
        let policy = state
            .policies
            .get(resource)
            .ok_or_else(|| PolicyStoreError::NotFound(resource.to_string()))?;
        Ok(Policy::from_bindings(
            policy
                .bindings
                .iter()
                .map(|(role, members)| (role.clone(), members.iter().cloned())),
            policy.etag(),
        ))
    }

    async fn add_binding(
        &self,
        resource: &ResourceId,
        role: &Role,
        principal: &Principal,
        expected_etag: &str,
    ) -> Result<BindingChange, PolicyStoreError> {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.log.push(StoreOp::Add {
            resource: resource.to_string(),
            role: role.to_string(),
            principal: principal.to_string(),
        });
        if let Some(error) = Self::take_failure(&mut state, FailureAction::Add, principal, resource)
        {
            return Err(error);
        }
        let policy = state
            .policies
            .get_mut(resource)
            .ok_or_else(|| PolicyStoreError::NotFound(resource.to_string()))?;
        if policy.etag() != expected_etag {
            return Err(PolicyStoreError::Conflict(resource.to_string()));
        }
        let already_bound = policy
            .bindings
            .get(role)
            .is_some_and(|members| members.contains(principal));
        if already_bound {
            return Ok(BindingChange::AlreadySatisfied {
                etag: policy.etag(),
            });
        }
        policy
            .bindings
            .entry(role.clone())
            .or_default()
            .insert(principal.clone());
        policy.etag_serial += 1;
        Ok(BindingChange::Applied {
            etag: policy.etag(),
        })
    }

    async fn remove_binding(
        &self,
        resource: &ResourceId,
        role: &Role,
        principal: &Principal,
        expected_etag: &str,
    ) -> Result<BindingChange, PolicyStoreError> {
        let mut state = self.state.lock().expect("store lock poisoned");
        state.log.push(StoreOp::Remove {
            resource: resource.to_string(),
            role: role.to_string(),
            principal: principal.to_string(),
        });
        if let Some(error) =
            Self::take_failure(&mut state, FailureAction::Remove, principal, resource)
        {
            return Err(error);
        }
        let policy = state
            .policies
            .get_mut(resource)
            .ok_or_else(|| PolicyStoreError::NotFound(resource.to_string()))?;
        if policy.etag() != expected_etag {
            return Err(PolicyStoreError::Conflict(resource.to_string()));
        }
        let removed = policy
            .bindings
            .get_mut(role)
            .is_some_and(|members| members.remove(principal));
        if !removed {
            return Ok(BindingChange::AlreadySatisfied {
                etag: policy.etag(),
            });
        }
        // Drop the binding entirely once its last member is gone
        if policy
            .bindings
            .get(role)
            .is_some_and(std::collections::BTreeSet::is_empty)
        {
            policy.bindings.remove(role);
        }
        policy.etag_serial += 1;
        Ok(BindingChange::Applied {
            etag: policy.etag(),
        })
    }
}
