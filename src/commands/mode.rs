use anyhow::Result;
use sdkpm::{Mode, Project};
use std::path::Path;

pub fn run_show(project_dir: &Path) -> Result<()> {
    let project = Project::open(project_dir)?;

    match project.mode()? {
        Some(mode) => {
            let overridden = std::env::var("SDKPM_MODE")
                .map(|v| !v.is_empty())
                .unwrap_or(false);
            if overridden {
                println!("{} (from SDKPM_MODE)", mode);
            } else {
                println!("{}", mode);
            }
        }
        None => {
            println!("No mode selected");
            println!();
            println!("Pick one with: sdkpm mode set prototype|full");
        }
    }
    Ok(())
}

pub fn run_set(project_dir: &Path, mode: &str, verbose: bool) -> Result<()> {
    let mode: Mode = mode.parse()?;
    let mut project = Project::open(project_dir)?;

    println!("Switching to {} mode...", mode);
    println!();

    let report = project.set_mode(mode)?;

    if let Some(previous) = report.previous {
        if previous == mode {
            println!("  Mode was already {}; re-applying", mode);
        } else {
            println!("  {} → {}", previous, mode);
        }
    }
    match &report.runtime_config {
        Ok(true) => {
            println!("  ✓ Runtime config synced ({})", project.runtime_config_path().display());
        }
        Ok(false) => {}
        Err(reason) => println!("  ⚠ Runtime config not synced: {}", reason),
    }
    println!();

    println!("Install:");
    let install = super::install::print_report(&report.install);
    println!();
    println!("Uninstall:");
    let uninstall = super::install::print_report(&report.uninstall.removed);
    println!();

    if let Some(sanitize) = &report.uninstall.sanitize {
        println!("Android manifest:");
        super::sanitize::print_outcome(sanitize);
        println!();
    }

    println!("Validation:");
    super::doctor::print_report(&report.validation, verbose);

    install?;
    uninstall?;

    println!();
    println!("✓ Mode set to {}", mode);
    Ok(())
}

pub fn run_clear(project_dir: &Path) -> Result<()> {
    let mut project = Project::open(project_dir)?;
    project.clear_mode()?;
    println!("✓ Mode cleared");
    println!("  Installed SDKs were left as they are.");
    Ok(())
}
