//! Doctor command - run the pre-build checks
//!
//! Checks:
//! - SDK versions against the built-in minimums
//! - Installed SDKs against the build mode
//! - Scoped registry scopes
//! - Base SDKs required by installed modules
//! - Runtime config feature flags
//! - Android manifest leftovers
//!
//! Exits with status 1 when the report fails the gate, so CI can run
//! `sdkpm doctor` as a build step.

use anyhow::Result;
use sdkpm::{Project, ValidationReport, ValidationResult, ValidationStatus};
use std::path::Path;

const RESET: &str = "\x1b[0m";

pub fn symbol(status: ValidationStatus) -> &'static str {
    match status {
        ValidationStatus::Valid => "✓",
        ValidationStatus::Warning => "⚠",
        ValidationStatus::Error => "✗",
    }
}

pub fn color_code(status: ValidationStatus) -> &'static str {
    match status {
        ValidationStatus::Valid => "\x1b[32m",   // Green
        ValidationStatus::Warning => "\x1b[33m", // Yellow
        ValidationStatus::Error => "\x1b[31m",   // Red
    }
}

fn print_result(result: &ValidationResult, verbose: bool) {
    println!(
        "  {}{}{} {} - {}",
        color_code(result.status),
        symbol(result.status),
        RESET,
        result.category,
        result.message
    );
    if verbose {
        if let Some(ref hint) = result.hint {
            for line in hint.lines() {
                println!("      {}", line);
            }
        }
    }
}

/// Print every result followed by a one-line summary
pub fn print_report(report: &ValidationReport, verbose: bool) {
    for result in &report.results {
        print_result(result, verbose);
    }

    let ok_count = report.count(ValidationStatus::Valid);
    let warn_count = report.count(ValidationStatus::Warning);
    let error_count = report.count(ValidationStatus::Error);

    println!();
    println!(
        "Summary: {} passed, {} warning{}, {} error{}",
        ok_count,
        warn_count,
        if warn_count == 1 { "" } else { "s" },
        error_count,
        if error_count == 1 { "" } else { "s" }
    );

    if !verbose && (warn_count > 0 || error_count > 0) {
        println!("Run with --verbose to see how to fix each issue.");
    }
}

pub fn run(project_dir: &Path, verbose: bool, fix: bool, json: bool) -> Result<()> {
    let project = Project::open(project_dir)?;

    if !json {
        println!("sdkpm Doctor");
        println!("============");
        println!();
    }

    if fix {
        let outcome = apply_fixes(&project);
        if !json {
            if outcome.applied.is_empty() && outcome.failed.is_empty() {
                println!("Nothing to fix automatically.");
            }
            if !outcome.applied.is_empty() {
                println!("Applied fixes:");
                for description in &outcome.applied {
                    println!("  ✓ {}", description);
                }
            }
            if !outcome.failed.is_empty() {
                println!("Could not apply:");
                for description in &outcome.failed {
                    println!("  ✗ {}", description);
                }
            }
            println!();
        }
    }

    let gate = project.gate();

    if json {
        println!("{}", serde_json::to_string_pretty(&gate)?);
    } else {
        println!("Checking {}...", project.root().display());
        println!();
        print_report(&gate.report, verbose);
        println!();
        if gate.passed {
            println!("✓ Ready to build");
        } else if gate.report.has_errors() {
            println!("✗ Build would fail; fix the errors above first");
        } else {
            println!("✗ Warnings are treated as errors (validation.warnings_as_errors)");
        }
        if !fix && !gate.passed {
            println!("  Some issues can be repaired with: sdkpm doctor --fix");
        }
    }

    if !gate.passed {
        anyhow::bail!("pre-build checks failed");
    }
    Ok(())
}

/// Fixes that were applied and fixes that could not run
#[derive(Default)]
struct FixOutcome {
    applied: Vec<String>,
    failed: Vec<String>,
}

impl FixOutcome {
    fn failed(&mut self, what: &str, error: sdkpm::Error) {
        tracing::warn!(error = %error, "{} failed", what);
        self.failed.push(format!("{}: {}", what, error));
    }
}

/// Runtime config auto-fix, duplicate scope repair, Android manifest cleanup
///
/// A fix that fails is recorded and the rest still run, so the checks that
/// follow always see the project.
fn apply_fixes(project: &Project) -> FixOutcome {
    let mut outcome = FixOutcome::default();

    let manifest = match project.manifest() {
        Ok(manifest) => manifest,
        Err(e) => {
            outcome.failed("Reading the package manifest", e);
            return outcome;
        }
    };

    // Runtime config first: a manifest write can trigger a reload
    match project
        .mode()
        .and_then(|mode| project.fix_runtime_config(&manifest, mode))
    {
        Ok(true) => outcome.applied.push(format!(
            "Synced runtime config with installed SDKs ({})",
            project.runtime_config_path().display()
        )),
        Ok(false) => {}
        Err(e) => outcome.failed("Syncing the runtime config", e),
    }

    match project.repair_scope_conflicts() {
        Ok(repairs) => {
            for repair in repairs.into_iter().filter(|r| r.outcome.changed()) {
                outcome.applied.push(format!(
                    "Removed duplicate scope {} from {}",
                    repair.scope, repair.url
                ));
            }
        }
        Err(e) => outcome.failed("Repairing scoped registries", e),
    }

    match project.sanitizer().sanitize(&manifest) {
        Ok(report) => {
            for (tag, name) in &report.removed {
                outcome
                    .applied
                    .push(format!("Removed stale <{}> {} from the Android manifest", tag, name));
            }
            for name in &report.deduplicated {
                outcome
                    .applied
                    .push(format!("Removed duplicate activity declarations of {}", name));
            }
            if let Some(backup) = &report.backup {
                outcome
                    .applied
                    .push(format!("Backed up the Android manifest to {}", backup.display()));
            }
        }
        Err(e) => outcome.failed("Cleaning the Android manifest", e),
    }

    outcome
}
