//! # Constants
//!
//! Default values for retry budgets, backoff, and endpoint URLs.
//! All of these can be overridden via environment variables where noted.

/// Maximum attempts for a single control-plane call hitting transient errors
pub const DEFAULT_TRANSIENT_RETRY_ATTEMPTS: u32 = 5;

/// Maximum attempts for a write losing the policy etag race
///
/// Conflicts are expected whenever something else writes the same policy, so
/// this budget is tracked separately from the transient budget.
pub const DEFAULT_CONFLICT_RETRY_ATTEMPTS: u32 = 8;

/// Fibonacci backoff floor (seconds) for transient retries
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;

/// Fibonacci backoff cap (seconds) for transient retries
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 30;

/// Per-request timeout for control-plane HTTP calls (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// GCP IAM API base URL (service account policies)
/// Override with `WIF_IAM_ENDPOINT` to target a mock control plane.
pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.googleapis.com";

/// GCP Cloud Resource Manager API base URL (project policies)
/// Override with `WIF_CRM_ENDPOINT` to target a mock control plane.
pub const DEFAULT_CRM_ENDPOINT: &str = "https://cloudresourcemanager.googleapis.com";

/// GCE metadata server token URL, used when no token env var is set
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Roles every repository principal must hold on the service account
pub const DEFAULT_SERVICE_ACCOUNT_ROLES: &[&str] = &[
    "roles/iam.workloadIdentityUser",
    "roles/iam.serviceAccountTokenCreator",
];

/// Roles the service account itself must hold on the project
pub const DEFAULT_PROJECT_ROLES: &[&str] = &["roles/storage.admin"];
