use anyhow::Result;
use sdkpm::{PackageManifest, Project};
use std::path::Path;

pub fn run(project_dir: &Path) -> Result<()> {
    let project = Project::open(project_dir)?;
    let mode = project.mode()?;

    let manifest = match project.manifest() {
        Ok(m) => m,
        Err(e) => {
            tracing::debug!(error = %e, "listing without a package manifest");
            println!("No package manifest at {}", project.package_manifest_path().display());
            println!();
            PackageManifest::new()
        }
    };

    match mode {
        Some(mode) => println!("Mode: {}", mode),
        None => println!("Mode: not set"),
    }
    println!();

    println!(
        "  {:<28} {:<40} {:<15} {:<9} Installed",
        "SDK", "Package", "Level", "Required"
    );
    for descriptor in project.registry().all() {
        let required = match mode {
            Some(mode) if descriptor.level.is_required_for(mode) => "yes",
            Some(mode) if descriptor.level.is_removed_in(mode) => "remove",
            Some(_) => "no",
            None => "-",
        };
        let installed = manifest.dependency(descriptor.package_id).unwrap_or("-");
        println!(
            "  {:<28} {:<40} {:<15} {:<9} {}",
            descriptor.display_name,
            descriptor.package_id,
            descriptor.level.label(),
            required,
            installed
        );
    }

    let installed = project
        .registry()
        .all()
        .filter(|d| manifest.is_installed(d.package_id))
        .count();
    println!();
    println!(
        "Total: {} of {} SDK{} installed",
        installed,
        project.registry().len(),
        if project.registry().len() == 1 { "" } else { "s" }
    );

    Ok(())
}
