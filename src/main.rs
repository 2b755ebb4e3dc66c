//! # wifctl
//!
//! Command-line interface for the WIF IAM Reconciler.
//!
//! Converges GCP IAM policies so the configured GitHub repositories can
//! authenticate through Workload Identity Federation, without static
//! credentials and without ever writing a wildcard principal.
//!
//! ## Usage
//!
//! ```bash
//! # Show what would change, without writing
//! wifctl plan --config wif.yaml
//!
//! # Converge the IAM policies to the configured state
//! wifctl apply --config wif.yaml
//!
//! # Check the current policies against the configured state
//! wifctl verify --config wif.yaml
//! ```
//!
//! `apply` exits non-zero when any operation failed or verification found
//! drift; `verify` exits non-zero on drift so it can gate CI.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use wif_iam_reconciler::config::load_desired_state;
use wif_iam_reconciler::provider::gcp::create_gcp_policy_store;
use wif_iam_reconciler::provider::retry::RetryPolicy;
use wif_iam_reconciler::runtime::{self, initialization, summary};

/// WIF IAM Reconciler CLI
#[derive(Parser)]
#[command(name = "wifctl")]
#[command(about = "Reconcile GCP IAM bindings for GitHub Actions Workload Identity Federation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the desired-state YAML file
    #[arg(short, long, global = true, default_value = "wif.yaml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute and print the would-be changes without writing
    Plan,
    /// Converge the IAM policies to the configured desired state
    Apply,
    /// Check current policies against the desired state (read-only)
    Verify,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    initialization::initialize()?;

    let cli = Cli::parse();
    let desired = load_desired_state(&cli.config)
        .with_context(|| format!("Failed to load desired state from {}", cli.config.display()))?;

    let store = create_gcp_policy_store()
        .await
        .context("Failed to create GCP policy store")?;

    match cli.command {
        Commands::Plan => {
            let changes =
                runtime::plan(store.as_ref(), &desired, &RetryPolicy::default()).await?;
            summary::print_plan(&changes);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Apply => {
            let report = runtime::apply(Arc::from(store), &desired, RetryPolicy::default()).await?;
            summary::print_run_report(&report);
            if report.succeeded() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::Verify => {
            let report =
                runtime::verify_only(store.as_ref(), &desired, &RetryPolicy::default()).await?;
            summary::print_verification(&report);
            if report.converged() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
