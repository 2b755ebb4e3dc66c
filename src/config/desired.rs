//! # Desired State
//!
//! The configuration-declared reconciliation target: an organization, the
//! repositories allowed to impersonate the workload service account, and the
//! fixed role lists for the two reconciliation targets (service account and
//! project).

use crate::constants;
use crate::iam::policy::Role;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// The full reconciliation target, supplied fresh on every invocation
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DesiredState {
    /// GitHub organization owning the repositories
    pub organization: String,

    /// Repository names granted workload identity access. Duplicates are
    /// harmless; they collapse into one principal during expansion.
    pub repositories: Vec<String>,

    /// GCP project id hosting the service account and pool
    pub project_id: String,

    /// GCP project number, required by the principal template
    pub project_number: String,

    /// Workload identity pool id
    pub pool_id: String,

    /// Email of the workload service account
    pub service_account_email: String,

    /// Roles every repository principal holds on the service account
    #[serde(default = "default_service_account_roles")]
    pub service_account_roles: Vec<Role>,

    /// Roles the service account itself holds on the project
    #[serde(default = "default_project_roles")]
    pub project_roles: Vec<Role>,
}

fn default_service_account_roles() -> Vec<Role> {
    constants::DEFAULT_SERVICE_ACCOUNT_ROLES
        .iter()
        .map(|role| Role::from(*role))
        .collect()
}

fn default_project_roles() -> Vec<Role> {
    constants::DEFAULT_PROJECT_ROLES
        .iter()
        .map(|role| Role::from(*role))
        .collect()
}

impl DesiredState {
    /// Load from a YAML file and validate
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let state: Self = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        state.validate()?;
        Ok(state)
    }

    /// Reject configurations the control plane would accept but that this
    /// system must never express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.organization.trim().is_empty() {
            return Err(ConfigError::Invalid("organization must not be empty".into()));
        }
        if self.repositories.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one repository is required".into(),
            ));
        }
        for repo in &self.repositories {
            if repo.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "repository names must not be empty".into(),
                ));
            }
            // The control plane accepts a wildcarded principal at write time
            // but does not reliably authorize it, so it is rejected here.
            if repo.contains('*') || repo.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "repository name '{repo}' must be a bare name without '*' or '/'"
                )));
            }
        }
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::Invalid("projectId must not be empty".into()));
        }
        if self.project_number.trim().is_empty()
            || !self.project_number.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ConfigError::Invalid(
                "projectNumber must be a numeric project number".into(),
            ));
        }
        if self.pool_id.trim().is_empty() {
            return Err(ConfigError::Invalid("poolId must not be empty".into()));
        }
        if self.service_account_email.trim().is_empty() || !self.service_account_email.contains('@')
        {
            return Err(ConfigError::Invalid(
                "serviceAccountEmail must be a service account email".into(),
            ));
        }
        if self.service_account_roles.is_empty() {
            return Err(ConfigError::Invalid(
                "serviceAccountRoles must not be empty".into(),
            ));
        }
        if self.project_roles.is_empty() {
            return Err(ConfigError::Invalid("projectRoles must not be empty".into()));
        }
        Ok(())
    }
}
