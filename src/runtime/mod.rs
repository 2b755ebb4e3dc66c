//! # Runtime Module
//!
//! Process setup and run orchestration for the `wifctl` binary.

pub mod initialization;
pub mod run;
pub mod summary;

pub use run::{apply, plan, verify_only, PlannedChange, RunReport};
