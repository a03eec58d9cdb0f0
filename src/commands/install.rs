use anyhow::Result;
use sdkpm::{InstallReport, InstallStep, Mode, MutationOutcome, Project};
use std::path::Path;

/// Mode stored for the project, or an error telling the user to pick one
pub fn require_mode(project: &Project) -> Result<Mode> {
    match project.mode()? {
        Some(mode) => Ok(mode),
        None => anyhow::bail!(
            "No build mode selected\n\nHint: run 'sdkpm mode set prototype' or 'sdkpm mode set full' first"
        ),
    }
}

pub fn print_plan(steps: &[InstallStep]) {
    if steps.is_empty() {
        println!("  Nothing to do");
        return;
    }
    for (i, step) in steps.iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
}

/// Print each step with its outcome; fails if any step failed
pub fn print_report(report: &InstallReport) -> Result<()> {
    if report.steps.is_empty() {
        println!("  Nothing to do");
        return Ok(());
    }
    for result in &report.steps {
        match &result.outcome {
            MutationOutcome::Applied => println!("  ✓ {}", result.step),
            MutationOutcome::Unchanged => println!("  ✓ {} (already up to date)", result.step),
            MutationOutcome::Failed(reason) => println!("  ✗ {}: {}", result.step, reason),
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!(
            "{} manifest update{} failed",
            failed,
            if failed == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

pub fn run(project_dir: &Path, dry_run: bool) -> Result<()> {
    let project = Project::open(project_dir)?;
    let mode = require_mode(&project)?;
    let installer = project.installer();

    if dry_run {
        println!("Would install SDKs for {} mode:", mode);
        print_plan(&installer.plan_install(mode));
        return Ok(());
    }

    println!("Installing SDKs for {} mode...", mode);
    println!();
    let report = installer.install_required(mode);
    print_report(&report)?;

    println!();
    if report.changed() {
        println!("✓ Updated {}", project.package_manifest_path().display());
        println!("  The package manager resolves the new packages on its next refresh.");
    } else {
        println!("✓ All required SDKs already present");
    }
    Ok(())
}
