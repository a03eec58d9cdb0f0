use anyhow::Result;
use sdkpm::Config;
use std::path::Path;

pub fn run(project_dir: &Path) -> Result<()> {
    let config_path = Config::path_for(project_dir);

    if Config::exists(project_dir) {
        println!("✓ {} already exists", config_path.display());
        println!();
        println!("To reinitialize, delete it and run 'sdkpm init' again.");
        return Ok(());
    }

    println!("Initializing sdkpm...");
    println!();

    let config = Config::default();

    let manifest_path = config.package_manifest_path(project_dir);
    if manifest_path.exists() {
        println!("✓ Found package manifest: {}", manifest_path.display());
    } else {
        println!("⚠ No package manifest at {}", manifest_path.display());
        println!("  Set paths.package_manifest if your project keeps it elsewhere.");
    }

    let platform_path = config.platform_manifest_path(project_dir);
    if platform_path.exists() {
        println!("✓ Found Android manifest: {}", platform_path.display());
    } else {
        println!("  No Android manifest yet; the sanitizer will skip it.");
    }

    config.save(project_dir)?;

    println!();
    println!("✓ Created {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  • Pick a build mode: sdkpm mode set prototype|full");
    println!("  • Check the project: sdkpm doctor");
    println!();

    Ok(())
}
