use super::install::{print_plan, print_report, require_mode};
use anyhow::Result;
use sdkpm::Project;
use std::path::Path;

pub fn run(project_dir: &Path, dry_run: bool) -> Result<()> {
    let project = Project::open(project_dir)?;
    let mode = require_mode(&project)?;

    if dry_run {
        println!("Would remove SDKs not used in {} mode:", mode);
        print_plan(&project.installer().plan_uninstall(mode));
        return Ok(());
    }

    println!("Removing SDKs not used in {} mode...", mode);
    println!();
    let report = project.uninstall(mode);
    let removed = print_report(&report.removed);

    if let Some(sanitize) = &report.sanitize {
        println!();
        println!("Android manifest:");
        super::sanitize::print_outcome(sanitize);
    }

    removed?;
    println!();
    if report.changed() {
        println!("✓ Updated {}", project.package_manifest_path().display());
    } else {
        println!("✓ Nothing to remove");
    }
    Ok(())
}
