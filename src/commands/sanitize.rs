//! Sanitize command - clean stale SDK entries out of the Android manifest

use anyhow::Result;
use sdkpm::{Project, SanitizeReport};
use std::path::Path;

fn print_changes(report: &SanitizeReport, verb: &str) {
    for (tag, name) in &report.removed {
        println!("  {} <{}> {}", verb, tag, name);
    }
    for name in &report.deduplicated {
        println!("  {} extra declarations of activity {}", verb, name);
    }
}

/// Print the cleanup that followed an uninstall
pub fn print_outcome(outcome: &std::result::Result<SanitizeReport, String>) {
    match outcome {
        Ok(report) if report.changed() => {
            print_changes(report, "✓ Removed");
            if let Some(backup) = &report.backup {
                println!("  Backup: {}", backup.display());
            }
        }
        Ok(_) => println!("  Nothing to clean"),
        Err(reason) => {
            println!("  ✗ Could not clean the Android manifest: {}", reason);
            println!("  Fix the file, then run: sdkpm sanitize");
        }
    }
}

pub fn run(project_dir: &Path, dry_run: bool) -> Result<()> {
    let project = Project::open(project_dir)?;
    let sanitizer = project.sanitizer();

    if !sanitizer.path().exists() {
        println!("No Android manifest at {}", sanitizer.path().display());
        return Ok(());
    }

    let manifest = project.manifest()?;

    let orphans = sanitizer.detect_orphaned_entries(&manifest)?;
    let duplicates = sanitizer.detect_duplicate_activities()?;

    if orphans.is_empty() && duplicates.is_empty() {
        println!("✓ Android manifest is clean");
        return Ok(());
    }

    println!("Found in {}:", sanitizer.path().display());
    for orphan in &orphans {
        println!(
            "  ✗ {} is not installed but still referenced: {}",
            orphan.sdk,
            orphan.patterns.join(", ")
        );
    }
    for duplicate in &duplicates {
        println!(
            "  ⚠ Activity {} declared {} times",
            duplicate.name, duplicate.count
        );
    }
    println!();

    if dry_run {
        let preview = sanitizer.preview(&manifest)?;
        println!("Would remove:");
        print_changes(&preview, "-");
        return Ok(());
    }

    let report = sanitizer.sanitize(&manifest)?;
    println!("Removed:");
    print_changes(&report, "✓");
    if let Some(backup) = &report.backup {
        println!();
        println!("Original saved to {}", backup.display());
    }

    Ok(())
}
