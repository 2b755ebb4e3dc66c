//! # IAM Domain
//!
//! Domain types and the binding reconciler:
//! - `policy`: structured policy model (role bindings + etag)
//! - `principal`: WIF principal naming and legacy wildcard detection
//! - `expansion`: desired-state expansion into reconcile requests
//! - `reconciler`: the convergence algorithm, outcomes, and verification

pub mod expansion;
pub mod policy;
pub mod principal;
pub mod reconciler;
