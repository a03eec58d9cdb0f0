use anyhow::Result;
use sdkpm::Config;
use std::path::Path;

pub fn run(project_dir: &Path, action: &crate::ConfigAction) -> Result<()> {
    use crate::ConfigAction;

    match action {
        ConfigAction::Show => show_config(project_dir),
        ConfigAction::Set { key, value } => set_config(project_dir, key, value),
    }
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "enabled"
    } else {
        "disabled"
    }
}

fn exists_marker(path: &Path) -> &'static str {
    if path.exists() {
        "✓"
    } else {
        "✗"
    }
}

fn show_config(project_dir: &Path) -> Result<()> {
    let config = Config::load(project_dir)?;
    let config_path = Config::path_for(project_dir);

    println!("Config file: {}", config_path.display());
    if !config_path.exists() {
        println!("  (not created yet, showing defaults; run 'sdkpm init')");
    }
    println!();

    match config.mode {
        Some(mode) => println!("mode = {}", mode),
        None => println!("mode = <unset>"),
    }
    println!();

    println!("[paths]");
    let paths = [
        ("package_manifest", &config.paths.package_manifest, config.package_manifest_path(project_dir)),
        ("platform_manifest", &config.paths.platform_manifest, config.platform_manifest_path(project_dir)),
        ("runtime_config", &config.paths.runtime_config, config.runtime_config_path(project_dir)),
    ];
    for (key, value, resolved) in &paths {
        println!("  {} {:<18} = {}", exists_marker(resolved), key, value);
    }
    println!();

    println!("[resolve]");
    println!(
        "  command = {}",
        config.resolve.command.as_deref().unwrap_or("<none>")
    );
    println!();

    println!("[sanitizer]");
    println!("  backup = {}", format_bool(config.sanitizer.backup));
    println!();

    println!("[validation]");
    println!(
        "  warnings_as_errors = {}",
        format_bool(config.validation.warnings_as_errors)
    );

    Ok(())
}

fn parse_bool(value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .map_err(|_| anyhow::anyhow!("Invalid boolean value. Use 'true' or 'false'"))
}

fn set_config(project_dir: &Path, key: &str, value: &str) -> Result<()> {
    // Stored values only; SDKPM_MODE must not leak into the file
    let mut config = Config::load_stored(project_dir)?;

    match key {
        "mode" => {
            anyhow::bail!(
                "The mode is not a plain setting\n\nHint: use 'sdkpm mode set <prototype|full>' so SDKs are installed to match"
            );
        }
        "paths.package_manifest" => config.paths.package_manifest = value.to_string(),
        "paths.platform_manifest" => config.paths.platform_manifest = value.to_string(),
        "paths.runtime_config" => config.paths.runtime_config = value.to_string(),
        "resolve.command" => {
            config.resolve.command = if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            };
        }
        "sanitizer.backup" => config.sanitizer.backup = parse_bool(value)?,
        "validation.warnings_as_errors" => config.validation.warnings_as_errors = parse_bool(value)?,
        _ => {
            println!("Unknown key: {}", key);
            println!();
            println!("Available keys:");
            println!("  • paths.package_manifest");
            println!("  • paths.platform_manifest");
            println!("  • paths.runtime_config");
            println!("  • resolve.command");
            println!("  • sanitizer.backup");
            println!("  • validation.warnings_as_errors");
            println!();
            anyhow::bail!("Invalid configuration key");
        }
    }

    config.save(project_dir)?;
    println!("✓ {} = {}", key, if value.is_empty() { "<cleared>" } else { value });
    Ok(())
}
