//! Project configuration management
//!
//! Configuration is stored in TOML format at `<project>/.sdkpm/config.toml`.
//! It holds the persisted build mode, the locations of the files sdkpm reads
//! and writes, and a few behaviour switches.
//!
//! # Examples
//!
//! ```no_run
//! use sdkpm::{Config, Mode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::load(".")?;
//! println!("Package manifest: {}", config.paths.package_manifest);
//!
//! config.mode = Some(Mode::Full);
//! config.save(".")?;
//! # Ok(())
//! # }
//! ```

use crate::mode::{Mode, ModeStore};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Project configuration file (`.sdkpm/config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Persisted build mode (unset until chosen)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,

    /// File locations, relative to the project root
    #[serde(default)]
    pub paths: PathsConfig,

    /// Package re-resolution settings
    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Platform manifest sanitizer settings
    #[serde(default)]
    pub sanitizer: SanitizerConfig,

    /// Pre-build gate settings
    #[serde(default)]
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Package manager manifest (dependencies + scoped registries)
    #[serde(default = "default_package_manifest")]
    pub package_manifest: String,

    /// Android manifest that SDKs inject entries into
    #[serde(default = "default_platform_manifest")]
    pub platform_manifest: String,

    /// Runtime configuration with per-SDK feature flags
    #[serde(default = "default_runtime_config")]
    pub runtime_config: String,
}

fn default_package_manifest() -> String {
    "Packages/manifest.json".to_string()
}

fn default_platform_manifest() -> String {
    "Assets/Plugins/Android/AndroidManifest.xml".to_string()
}

fn default_runtime_config() -> String {
    "Assets/Resources/SdkRuntimeConfig.json".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            package_manifest: default_package_manifest(),
            platform_manifest: default_platform_manifest(),
            runtime_config: default_runtime_config(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Shell command to spawn after the manifest changes (e.g. a batchmode
    /// editor invocation). Not awaited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizerConfig {
    /// Write a timestamped backup before rewriting the platform manifest
    #[serde(default = "default_backup")]
    pub backup: bool,
}

fn default_backup() -> bool {
    true
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            backup: default_backup(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Treat warnings as build-breaking in the pre-build gate
    #[serde(default)]
    pub warnings_as_errors: bool,
}

impl Config {
    /// Directory holding the config file
    ///
    /// Uses SDKPM_CONFIG_DIR if set, otherwise `<project>/.sdkpm`
    pub fn config_dir<P: AsRef<Path>>(project_dir: P) -> PathBuf {
        // Check for custom config directory (useful for testing)
        if let Ok(config_dir) = std::env::var("SDKPM_CONFIG_DIR") {
            return PathBuf::from(config_dir);
        }
        project_dir.as_ref().join(".sdkpm")
    }

    /// Path of the config file for a project
    pub fn path_for<P: AsRef<Path>>(project_dir: P) -> PathBuf {
        Self::config_dir(project_dir).join("config.toml")
    }

    /// Check if a config file exists for the project
    pub fn exists<P: AsRef<Path>>(project_dir: P) -> bool {
        Self::path_for(project_dir).exists()
    }

    /// Load config from file, or return defaults if it doesn't exist
    ///
    /// Environment variable overrides:
    /// - `SDKPM_MODE`: overrides `mode` for this process
    /// - `SDKPM_CONFIG_DIR`: overrides the config directory location
    pub fn load<P: AsRef<Path>>(project_dir: P) -> Result<Self> {
        let mut config = Self::load_stored(project_dir)?;

        if let Ok(mode) = std::env::var("SDKPM_MODE") {
            if !mode.is_empty() {
                config.mode = Some(mode.parse()?);
            }
        }

        Ok(config)
    }

    /// Load the config exactly as stored on disk, without env overrides
    pub fn load_stored<P: AsRef<Path>>(project_dir: P) -> Result<Self> {
        let path = Self::path_for(project_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, project_dir: P) -> Result<()> {
        let path = Self::path_for(project_dir);

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Resolve a configured path against the project root, expanding `~`
    pub fn resolve_path<P: AsRef<Path>>(project_dir: P, configured: &str) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(configured).to_string());
        if expanded.is_absolute() {
            expanded
        } else {
            project_dir.as_ref().join(expanded)
        }
    }

    pub fn package_manifest_path<P: AsRef<Path>>(&self, project_dir: P) -> PathBuf {
        Self::resolve_path(project_dir, &self.paths.package_manifest)
    }

    pub fn platform_manifest_path<P: AsRef<Path>>(&self, project_dir: P) -> PathBuf {
        Self::resolve_path(project_dir, &self.paths.platform_manifest)
    }

    pub fn runtime_config_path<P: AsRef<Path>>(&self, project_dir: P) -> PathBuf {
        Self::resolve_path(project_dir, &self.paths.runtime_config)
    }
}

/// [`ModeStore`] persisting the mode in the project's config file
///
/// Reads honour the `SDKPM_MODE` override; writes only touch the `mode` key.
#[derive(Debug, Clone)]
pub struct ConfigModeStore {
    project_dir: PathBuf,
}

impl ConfigModeStore {
    pub fn new<P: Into<PathBuf>>(project_dir: P) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }
}

impl ModeStore for ConfigModeStore {
    fn load_mode(&self) -> Result<Option<Mode>> {
        Ok(Config::load(&self.project_dir)?.mode)
    }

    fn store_mode(&mut self, mode: Option<Mode>) -> Result<()> {
        let mut config = Config::load_stored(&self.project_dir)?;
        config.mode = mode;
        config.save(&self.project_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.mode.is_none());
        assert_eq!(config.paths.package_manifest, "Packages/manifest.json");
        assert!(config.sanitizer.backup);
        assert!(!config.validation.warnings_as_errors);
        assert!(config.resolve.command.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"mode = "full"

[paths]
platform_manifest = "Android/AndroidManifest.xml"
"#,
        )
        .unwrap();
        assert_eq!(config.mode, Some(Mode::Full));
        assert_eq!(config.paths.platform_manifest, "Android/AndroidManifest.xml");
        assert_eq!(config.paths.runtime_config, default_runtime_config());
    }

    #[test]
    fn test_resolve_path() {
        let project = Path::new("/work/game");
        assert_eq!(
            Config::resolve_path(project, "Packages/manifest.json"),
            PathBuf::from("/work/game/Packages/manifest.json")
        );
        assert_eq!(
            Config::resolve_path(project, "/abs/manifest.json"),
            PathBuf::from("/abs/manifest.json")
        );
    }

    #[test]
    fn test_serialization_omits_unset_mode() {
        let toml_string = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(!toml_string.contains("mode ="));
        assert!(toml_string.contains("[paths]"));
    }
}
