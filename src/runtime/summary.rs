//! # Run Summary
//!
//! Human-readable reporting for plan, apply, and verify runs. Output goes to
//! stdout for the operator; structured logs stay on tracing.

use crate::iam::reconciler::{OutcomeStatus, VerificationReport};
use crate::runtime::run::{PlannedChange, RunReport};

/// Print the would-be changes computed by `plan`
pub fn print_plan(changes: &[PlannedChange]) {
    let mut add_total = 0;
    let mut remove_total = 0;
    println!("\nPlanned changes:");
    for change in changes {
        println!("\n  {} / {}", change.resource, change.role);
        if change.changes.is_empty() {
            println!("    (converged, no changes)");
            continue;
        }
        for principal in &change.changes.to_add {
            println!("    + {principal}");
            add_total += 1;
        }
        for principal in &change.changes.to_remove {
            println!("    - {principal}");
            remove_total += 1;
        }
    }
    println!("\nPlan: {add_total} to add, {remove_total} to remove");
}

/// Print per-role outcome counts and the verification report
pub fn print_run_report(report: &RunReport) {
    println!(
        "\n{:<50} {:>8} {:>10} {:>8}",
        "RESOURCE / ROLE", "APPLIED", "SATISFIED", "FAILED"
    );
    println!("{}", "-".repeat(80));
    for result in &report.results {
        println!(
            "{:<50} {:>8} {:>10} {:>8}",
            format!("{} / {}", result.resource, result.role),
            result.applied_count(),
            result.already_satisfied_count(),
            result.failed_count()
        );
        for outcome in &result.outcomes {
            if let OutcomeStatus::Failed {
                reason,
                permission_denied,
            } = &outcome.status
            {
                let kind = if *permission_denied {
                    "permission denied"
                } else {
                    "failed"
                };
                println!(
                    "    ❌ {} {} ({kind}): {reason}",
                    outcome.action, outcome.principal
                );
            }
        }
    }

    print_verification(&report.verification);

    if report.succeeded() {
        println!("\n✅ Reconciliation converged");
    } else {
        println!(
            "\n❌ Reconciliation incomplete: {} failed operation(s), converged={}",
            report.failed_count(),
            report.verification.converged()
        );
    }
    println!("Completed at {}", chrono::Utc::now().to_rfc3339());
}

/// Print the verification report
pub fn print_verification(report: &VerificationReport) {
    if report.converged() {
        println!("\nVerification: all expected bindings present");
        return;
    }
    println!(
        "\nVerification: {} expected binding(s) missing",
        report.missing.len()
    );
    for missing in &report.missing {
        println!(
            "  missing: {} on {} / {}",
            missing.principal, missing.resource, missing.role
        );
    }
}
