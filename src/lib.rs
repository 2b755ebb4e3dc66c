//! WIF IAM Reconciler Library
//!
//! Core functionality for converging GCP IAM policies to a declared set of
//! Workload Identity Federation bindings. Tests live alongside the modules
//! and in the `tests/` directory.

pub mod config;
pub mod constants;
pub mod iam;
pub mod provider;
pub mod runtime;

pub use config::DesiredState;
pub use iam::policy::{Policy, Principal, Role};
pub use iam::reconciler::Reconciler;
