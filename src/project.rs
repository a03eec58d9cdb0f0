//! One project on disk, with its configuration and collaborators wired up
//!
//! [`Project`] is what the CLI talks to. It reads `.sdkpm/config.toml`, points
//! the manifest mutator, sanitizer and validator at the configured files and
//! runs the multi-step operations (mode switch, repair) in the right order.

use crate::config::{Config, ConfigModeStore};
use crate::installer::{InstallReport, Installer};
use crate::manifest::{urls_match, ManifestMutator, MutationOutcome, PackageManifest};
use crate::mode::{Mode, ModeStore};
use crate::notify::CommandNotifier;
use crate::platform::{PlatformManifest, PlatformManifestSanitizer, SanitizeReport};
use crate::probe::{AssemblyScanProbe, CapabilityProbe};
use crate::registry::SdkRegistry;
use crate::runtime_config::RuntimeConfig;
use crate::validator::{auto_fix, BuildValidator, Document, ValidationReport, ValidationSnapshot};
use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What a mode switch did, step by step
#[derive(Debug)]
pub struct ModeSwitchReport {
    pub previous: Option<Mode>,
    pub mode: Mode,
    /// Whether the runtime config was rewritten, or why it could not be
    pub runtime_config: std::result::Result<bool, String>,
    pub install: InstallReport,
    pub uninstall: UninstallReport,
    pub validation: ValidationReport,
}

/// Removed SDKs plus the Android manifest cleanup the removal triggered
#[derive(Debug)]
pub struct UninstallReport {
    pub removed: InstallReport,
    /// Present only when something was removed and an Android manifest exists
    pub sanitize: Option<std::result::Result<SanitizeReport, String>>,
}

impl UninstallReport {
    pub fn changed(&self) -> bool {
        self.removed.changed()
    }
}

/// Validation report plus the pass/fail decision for a build pipeline
#[derive(Debug, Serialize)]
pub struct GateResult {
    pub passed: bool,
    pub warnings_as_errors: bool,
    #[serde(flatten)]
    pub report: ValidationReport,
}

/// A scope claim removed from a registry that does not own it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRepair {
    pub scope: String,
    pub url: String,
    pub outcome: MutationOutcome,
}

pub struct Project {
    root: PathBuf,
    config: Config,
    registry: &'static SdkRegistry,
    mutator: ManifestMutator,
    probe: Box<dyn CapabilityProbe>,
    mode_store: Box<dyn ModeStore>,
}

impl Project {
    /// Open the project rooted at `root` with the built-in SDK table
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let config = Config::load(&root)?;

        let mut mutator = ManifestMutator::new(config.package_manifest_path(&root));
        if let Some(command) = &config.resolve.command {
            mutator = mutator.with_notifier(Box::new(CommandNotifier::new(command.clone(), &root)));
        }

        let probe = AssemblyScanProbe::scan(&root);
        let mode_store = ConfigModeStore::new(&root);

        tracing::debug!(root = %root.display(), "opened project");
        Ok(Self {
            root,
            config,
            registry: SdkRegistry::builtin(),
            mutator,
            probe: Box::new(probe),
            mode_store: Box::new(mode_store),
        })
    }

    pub fn with_probe(mut self, probe: Box<dyn CapabilityProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_mode_store(mut self, mode_store: Box<dyn ModeStore>) -> Self {
        self.mode_store = mode_store;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &'static SdkRegistry {
        self.registry
    }

    pub fn mutator(&self) -> &ManifestMutator {
        &self.mutator
    }

    pub fn package_manifest_path(&self) -> &Path {
        self.mutator.path()
    }

    pub fn platform_manifest_path(&self) -> PathBuf {
        self.config.platform_manifest_path(&self.root)
    }

    pub fn runtime_config_path(&self) -> PathBuf {
        self.config.runtime_config_path(&self.root)
    }

    pub fn mode(&self) -> Result<Option<Mode>> {
        self.mode_store.load_mode()
    }

    pub fn manifest(&self) -> Result<PackageManifest> {
        self.mutator.load()
    }

    pub fn installer(&self) -> Installer<'_> {
        Installer::new(self.registry, &self.mutator)
    }

    pub fn sanitizer(&self) -> PlatformManifestSanitizer<'_> {
        PlatformManifestSanitizer::new(self.platform_manifest_path(), self.registry, self.probe.as_ref())
            .with_backup(self.config.sanitizer.backup)
    }

    pub fn validator(&self) -> BuildValidator<'_> {
        BuildValidator::new(self.registry, self.probe.as_ref())
    }

    /// Read every validation input once
    pub fn snapshot(&self) -> Result<ValidationSnapshot> {
        let manifest = self.manifest()?;
        let mode = self.mode()?;
        let runtime_config = Document::load(self.runtime_config_path(), |p| RuntimeConfig::load(p));
        let platform_manifest =
            Document::load(self.platform_manifest_path(), |p| PlatformManifest::load(p));
        Ok(ValidationSnapshot::new(manifest, mode)
            .with_runtime_config(runtime_config)
            .with_platform_manifest(platform_manifest))
    }

    /// Run all checks; an unreadable manifest yields one error per category
    pub fn validate(&self) -> ValidationReport {
        match self.snapshot() {
            Ok(snapshot) => self.validator().run_all_checks(&snapshot),
            Err(e) => {
                tracing::warn!(error = %e, "cannot build validation snapshot");
                ValidationReport::unavailable(&e.to_string())
            }
        }
    }

    /// Validate and decide whether a build may proceed
    pub fn gate(&self) -> GateResult {
        let warnings_as_errors = self.config.validation.warnings_as_errors;
        let report = self.validate();
        GateResult {
            passed: report.passes(warnings_as_errors),
            warnings_as_errors,
            report,
        }
    }

    /// Switch off runtime flags for SDKs absent from `manifest` and sync the mode mirror
    ///
    /// A missing runtime config is left alone.
    pub fn fix_runtime_config(&self, manifest: &PackageManifest, mode: Option<Mode>) -> Result<bool> {
        let path = self.runtime_config_path();
        let Some(mut runtime_config) = RuntimeConfig::load_optional(&path)? else {
            return Ok(false);
        };
        if !auto_fix(&mut runtime_config, manifest, self.registry, mode) {
            return Ok(false);
        }
        runtime_config.save(&path)?;
        tracing::info!(path = %path.display(), "runtime config updated");
        Ok(true)
    }

    /// Remove SDKs `mode` does not use, then clean their Android manifest leftovers
    pub fn uninstall(&self, mode: Mode) -> UninstallReport {
        let removed = self.installer().uninstall_unnecessary(mode);
        let sanitize = if removed.changed() && self.platform_manifest_path().exists() {
            let outcome = self
                .manifest()
                .and_then(|manifest| self.sanitizer().sanitize(&manifest))
                .map_err(|e| {
                    tracing::warn!(error = %e, "Android manifest cleanup failed");
                    e.to_string()
                });
            Some(outcome)
        } else {
            None
        };
        UninstallReport { removed, sanitize }
    }

    /// Store `mode` and bring the whole project in line with it
    ///
    /// Order: store mode, settle the runtime config against the manifest the
    /// switch will produce, install, uninstall (with Android manifest cleanup),
    /// then validate. Once the mode is stored every step runs; failures land
    /// in the report.
    pub fn set_mode(&mut self, mode: Mode) -> Result<ModeSwitchReport> {
        let previous = self.mode()?;
        self.mode_store.store_mode(Some(mode))?;
        tracing::info!(?previous, %mode, "build mode stored");

        // Must land before the manifest write, which can reload the editor
        let runtime_config = self
            .manifest()
            .and_then(|manifest| {
                let projected = self.installer().project(&manifest, mode);
                self.fix_runtime_config(&projected, Some(mode))
            })
            .map_err(|e| {
                tracing::warn!(error = %e, "runtime config not synced");
                e.to_string()
            });

        let install = self.installer().install_required(mode);
        let uninstall = self.uninstall(mode);
        let validation = self.validate();

        Ok(ModeSwitchReport {
            previous,
            mode,
            runtime_config,
            install,
            uninstall,
            validation,
        })
    }

    pub fn clear_mode(&mut self) -> Result<()> {
        self.mode_store.store_mode(None)
    }

    /// Remove scope claims held by a registry other than the scope's owner
    ///
    /// The owner is the registry an SDK descriptor assigns the scope to. When
    /// no descriptor claims the scope, the first declaring registry keeps it.
    pub fn repair_scope_conflicts(&self) -> Result<Vec<ScopeRepair>> {
        let manifest = self.manifest()?;
        let mut repairs = Vec::new();

        for (scope, urls) in manifest.conflicting_scopes() {
            let owner = self
                .registry
                .all()
                .filter_map(|d| d.scope)
                .find(|req| req.scope == scope)
                .map(|req| req.registry.url());

            let keep = urls
                .iter()
                .copied()
                .find(|url| owner.map(|o| urls_match(url, o)).unwrap_or(false))
                .or_else(|| urls.first().copied());

            for url in urls.iter().copied().filter(|url| Some(*url) != keep) {
                let outcome = self.mutator.remove_scope_from_registry(url, scope);
                tracing::info!(scope, url, ?outcome, "released duplicate scope claim");
                repairs.push(ScopeRepair {
                    scope: scope.to_string(),
                    url: url.to_string(),
                    outcome,
                });
            }
        }

        Ok(repairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::MemoryModeStore;
    use crate::probe::NullProbe;
    use crate::runtime_config::FeatureFlag;
    use crate::validator::{ValidationCategory, ValidationStatus};
    use std::fs;
    use tempfile::TempDir;

    const ADJUST_ANDROID_MANIFEST: &str = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android">
  <application>
    <receiver android:name="com.adjust.sdk.AdjustReferrerReceiver" android:exported="true"/>
  </application>
</manifest>
"#;

    fn project_with(manifest: &str) -> (TempDir, Project) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("Packages")).unwrap();
        fs::write(dir.path().join("Packages/manifest.json"), manifest).unwrap();
        let project = Project::open(dir.path())
            .unwrap()
            .with_probe(Box::new(NullProbe))
            .with_mode_store(Box::new(MemoryModeStore::default()));
        (dir, project)
    }

    #[test]
    fn test_set_mode_full_then_prototype() {
        let (_dir, mut project) = project_with(r#"{ "dependencies": { "com.tenjin.sdk": "x" } }"#);

        let mut runtime = RuntimeConfig::default();
        runtime.set_flag(FeatureFlag::Tenjin, true);
        runtime.prototype_mode = true;
        runtime.save(project.runtime_config_path()).unwrap();

        let report = project.set_mode(Mode::Full).unwrap();
        assert_eq!(report.previous, None);
        assert_eq!(report.runtime_config, Ok(true));
        assert!(report.install.changed());
        assert!(report.uninstall.changed());
        assert!(report.uninstall.sanitize.is_none());
        assert!(!report.validation.has_errors(), "{:?}", report.validation);

        let runtime = RuntimeConfig::load(project.runtime_config_path()).unwrap();
        assert!(!runtime.flag(FeatureFlag::Tenjin));
        assert!(!runtime.prototype_mode);

        let manifest = project.manifest().unwrap();
        assert!(manifest.is_installed("com.adjust.sdk"));
        assert!(!manifest.is_installed("com.tenjin.sdk"));

        let report = project.set_mode(Mode::Prototype).unwrap();
        assert_eq!(report.previous, Some(Mode::Full));
        let manifest = project.manifest().unwrap();
        assert!(manifest.is_installed("com.tenjin.sdk"));
        assert!(!manifest.is_installed("com.adjust.sdk"));
        assert!(manifest.is_installed("com.google.firebase.app"));
    }

    #[test]
    fn test_set_mode_sanitizes_after_uninstall() {
        let (_dir, mut project) = project_with("{}");
        project.set_mode(Mode::Full).unwrap();

        let platform = project.platform_manifest_path();
        fs::create_dir_all(platform.parent().unwrap()).unwrap();
        fs::write(&platform, ADJUST_ANDROID_MANIFEST).unwrap();

        let report = project.set_mode(Mode::Prototype).unwrap();
        let sanitize = report.uninstall.sanitize.unwrap().unwrap();
        assert!(sanitize.changed());
        assert!(sanitize.backup.is_some());
        assert!(!fs::read_to_string(&platform).unwrap().contains("Adjust"));
        assert!(report
            .validation
            .in_category(ValidationCategory::PlatformManifest)
            .all(|r| r.status == ValidationStatus::Valid));
    }

    fn assert_every_category(report: &ValidationReport) {
        for category in ValidationCategory::ALL {
            assert!(
                report.in_category(category).next().is_some(),
                "no result for {:?}",
                category
            );
        }
    }

    #[test]
    fn test_set_mode_with_unreadable_runtime_config_still_switches() {
        let (_dir, mut project) = project_with(r#"{ "dependencies": { "com.tenjin.sdk": "x" } }"#);
        let runtime = project.runtime_config_path();
        fs::create_dir_all(runtime.parent().unwrap()).unwrap();
        fs::write(&runtime, "{ not json").unwrap();

        let report = project.set_mode(Mode::Full).unwrap();
        assert!(report.runtime_config.is_err());
        assert!(report.install.changed());
        assert!(report.uninstall.changed());
        assert_eq!(project.mode().unwrap(), Some(Mode::Full));

        let manifest = project.manifest().unwrap();
        assert!(manifest.is_installed("com.adjust.sdk"));
        assert!(!manifest.is_installed("com.tenjin.sdk"));

        assert_every_category(&report.validation);
        assert!(report
            .validation
            .in_category(ValidationCategory::ConfigSync)
            .any(|r| r.status == ValidationStatus::Error));
        // untouched on failure
        assert_eq!(fs::read_to_string(&runtime).unwrap(), "{ not json");
    }

    #[test]
    fn test_set_mode_with_unreadable_android_manifest_still_reports() {
        let (_dir, mut project) = project_with("{}");
        project.set_mode(Mode::Full).unwrap();

        let platform = project.platform_manifest_path();
        fs::create_dir_all(platform.parent().unwrap()).unwrap();
        fs::write(&platform, [0xff, 0xfe, 0x00, 0x3c]).unwrap();

        let report = project.set_mode(Mode::Prototype).unwrap();
        assert!(report.uninstall.changed());
        assert!(matches!(report.uninstall.sanitize, Some(Err(_))));

        let manifest = project.manifest().unwrap();
        assert!(manifest.is_installed("com.tenjin.sdk"));
        assert!(!manifest.is_installed("com.adjust.sdk"));

        assert_every_category(&report.validation);
        assert!(report
            .validation
            .in_category(ValidationCategory::PlatformManifest)
            .any(|r| r.status == ValidationStatus::Error));
        assert_eq!(fs::read(&platform).unwrap(), [0xff, 0xfe, 0x00, 0x3c]);
    }

    #[test]
    fn test_uninstall_cleans_android_manifest() {
        let (_dir, project) = project_with(
            r#"{ "dependencies": { "com.adjust.sdk": "x", "com.google.firebase.app": "12.0.0" } }"#,
        );
        let platform = project.platform_manifest_path();
        fs::create_dir_all(platform.parent().unwrap()).unwrap();
        fs::write(&platform, ADJUST_ANDROID_MANIFEST).unwrap();

        let report = project.uninstall(Mode::Prototype);
        assert!(report.changed());
        let sanitize = report.sanitize.unwrap().unwrap();
        assert_eq!(sanitize.removed.len(), 1);
        assert!(!fs::read_to_string(&platform).unwrap().contains("Adjust"));

        let manifest = project.manifest().unwrap();
        assert!(!manifest.is_installed("com.adjust.sdk"));
        assert!(manifest.is_installed("com.google.firebase.app"));

        // nothing removed, nothing sanitized
        assert!(project.uninstall(Mode::Prototype).sanitize.is_none());
    }

    #[test]
    fn test_validate_without_manifest() {
        let dir = TempDir::new().unwrap();
        let project = Project::open(dir.path())
            .unwrap()
            .with_probe(Box::new(NullProbe))
            .with_mode_store(Box::new(MemoryModeStore::new(Some(Mode::Full))));
        let gate = project.gate();
        assert!(!gate.passed);
        assert_eq!(gate.report.count(ValidationStatus::Error), 6);
    }

    #[test]
    fn test_repair_scope_conflicts_keeps_owner() {
        let (_dir, project) = project_with(
            r#"{
  "dependencies": {},
  "scopedRegistries": [
    { "name": "package.openupm.com", "url": "https://package.openupm.com", "scopes": ["com.applovin", "com.gameanalytics"] },
    { "name": "AppLovin MAX Unity", "url": "https://unity.packages.applovin.com/", "scopes": ["com.applovin"] }
  ]
}"#,
        );

        let repairs = project.repair_scope_conflicts().unwrap();
        assert_eq!(repairs.len(), 1);
        assert_eq!(repairs[0].url, "https://package.openupm.com");
        assert_eq!(repairs[0].outcome, MutationOutcome::Applied);

        let manifest = project.manifest().unwrap();
        assert!(manifest.conflicting_scopes().is_empty());
        assert!(manifest
            .find_registry("https://unity.packages.applovin.com")
            .unwrap()
            .scopes
            .contains(&"com.applovin".to_string()));
    }
}
