//! Pre-build validation
//!
//! The validator cross-checks the package manifest against the SDK registry,
//! the build mode, the runtime configuration and the Android manifest. It
//! never writes anything; [`auto_fix`] is the one separate entry point that
//! edits the runtime configuration.
//!
//! A report always carries at least one result per [`ValidationCategory`], so
//! a clean category shows up as `Valid` instead of disappearing.

use crate::manifest::{scope_covers, PackageManifest};
use crate::mode::Mode;
use crate::platform::PlatformManifest;
use crate::probe::CapabilityProbe;
use crate::registry::{SdkDescriptor, SdkId, SdkRegistry};
use crate::runtime_config::RuntimeConfig;
use crate::version::satisfies_minimum;
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationCategory {
    VersionMismatch,
    ModeConsistency,
    ScopedRegistries,
    Coherence,
    ConfigSync,
    PlatformManifest,
}

impl ValidationCategory {
    /// Report order
    pub const ALL: [ValidationCategory; 6] = [
        ValidationCategory::VersionMismatch,
        ValidationCategory::ModeConsistency,
        ValidationCategory::ScopedRegistries,
        ValidationCategory::Coherence,
        ValidationCategory::ConfigSync,
        ValidationCategory::PlatformManifest,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            ValidationCategory::VersionMismatch => "SDK versions",
            ValidationCategory::ModeConsistency => "Mode consistency",
            ValidationCategory::ScopedRegistries => "Scoped registries",
            ValidationCategory::Coherence => "SDK coherence",
            ValidationCategory::ConfigSync => "Runtime config sync",
            ValidationCategory::PlatformManifest => "Android manifest",
        }
    }
}

impl fmt::Display for ValidationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub category: ValidationCategory,
}

impl ValidationResult {
    fn new(status: ValidationStatus, category: ValidationCategory, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            hint: None,
            category,
        }
    }

    pub fn valid(category: ValidationCategory, message: impl Into<String>) -> Self {
        Self::new(ValidationStatus::Valid, category, message)
    }

    pub fn warning(category: ValidationCategory, message: impl Into<String>) -> Self {
        Self::new(ValidationStatus::Warning, category, message)
    }

    pub fn error(category: ValidationCategory, message: impl Into<String>) -> Self {
        Self::new(ValidationStatus::Error, category, message)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Flat, ordered list of results from one validation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub results: Vec<ValidationResult>,
}

impl ValidationReport {
    pub fn count(&self, status: ValidationStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(ValidationStatus::Error) > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.count(ValidationStatus::Warning) > 0
    }

    /// Whether a build pipeline may proceed
    pub fn passes(&self, warnings_as_errors: bool) -> bool {
        !self.has_errors() && !(warnings_as_errors && self.has_warnings())
    }

    pub fn in_category(&self, category: ValidationCategory) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(move |r| r.category == category)
    }

    /// One error per category, for when the manifest itself cannot be read
    pub fn unavailable(reason: &str) -> Self {
        Self {
            results: ValidationCategory::ALL
                .iter()
                .map(|category| {
                    ValidationResult::error(*category, format!("Cannot validate: {}", reason))
                })
                .collect(),
        }
    }
}

/// An optional input document as seen at snapshot time
#[derive(Debug, Clone)]
pub enum Document<T> {
    Missing,
    Present(T),
    Unreadable(String),
}

impl<T> Document<T> {
    pub fn load<P, F>(path: P, loader: F) -> Self
    where
        P: AsRef<Path>,
        F: FnOnce(&Path) -> Result<T>,
    {
        let path = path.as_ref();
        if !path.exists() {
            return Document::Missing;
        }
        match loader(path) {
            Ok(value) => Document::Present(value),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read document");
                Document::Unreadable(e.to_string())
            }
        }
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Document::Present(value) => Some(value),
            _ => None,
        }
    }
}

/// Everything one validation run looks at, read once up front
#[derive(Debug, Clone)]
pub struct ValidationSnapshot {
    pub manifest: PackageManifest,
    pub mode: Option<Mode>,
    pub runtime_config: Document<RuntimeConfig>,
    pub platform_manifest: Document<PlatformManifest>,
}

impl ValidationSnapshot {
    pub fn new(manifest: PackageManifest, mode: Option<Mode>) -> Self {
        Self {
            manifest,
            mode,
            runtime_config: Document::Missing,
            platform_manifest: Document::Missing,
        }
    }

    pub fn with_runtime_config(mut self, runtime_config: Document<RuntimeConfig>) -> Self {
        self.runtime_config = runtime_config;
        self
    }

    pub fn with_platform_manifest(mut self, platform_manifest: Document<PlatformManifest>) -> Self {
        self.platform_manifest = platform_manifest;
        self
    }
}

type Check<'a> = fn(&BuildValidator<'a>, &ValidationSnapshot) -> Result<Vec<ValidationResult>>;

/// Runs the six checks against a [`ValidationSnapshot`]
pub struct BuildValidator<'a> {
    registry: &'a SdkRegistry,
    probe: &'a dyn CapabilityProbe,
}

impl<'a> BuildValidator<'a> {
    pub fn new(registry: &'a SdkRegistry, probe: &'a dyn CapabilityProbe) -> Self {
        Self { registry, probe }
    }

    /// Run every check; a failing check becomes one error in its category
    pub fn run_all_checks(&self, snapshot: &ValidationSnapshot) -> ValidationReport {
        let checks: [(ValidationCategory, Check<'a>); 6] = [
            (ValidationCategory::VersionMismatch, Self::check_version_mismatches),
            (ValidationCategory::ModeConsistency, Self::check_mode_consistency),
            (ValidationCategory::ScopedRegistries, Self::check_scoped_registries),
            (ValidationCategory::Coherence, Self::check_coherence),
            (ValidationCategory::ConfigSync, Self::check_config_sync),
            (ValidationCategory::PlatformManifest, Self::check_platform_manifest),
        ];

        let mut report = ValidationReport::default();
        for (category, check) in checks {
            match check(self, snapshot) {
                Ok(results) if results.is_empty() => {
                    report.results.push(ValidationResult::valid(category, "No issues found"));
                }
                Ok(results) => report.results.extend(results),
                Err(e) => {
                    tracing::warn!(%category, error = %e, "validation check failed");
                    report.results.push(ValidationResult::error(
                        category,
                        format!("Check could not run: {}", e),
                    ));
                }
            }
        }

        tracing::debug!(
            errors = report.count(ValidationStatus::Error),
            warnings = report.count(ValidationStatus::Warning),
            "validation finished"
        );
        report
    }

    /// Registry SDKs present in the manifest, with their dependency value
    fn installed<'m>(&self, manifest: &'m PackageManifest) -> Vec<(&'a SdkDescriptor, &'m str)> {
        self.registry
            .all()
            .filter_map(|d| manifest.dependency(d.package_id).map(|value| (d, value)))
            .collect()
    }

    pub fn check_version_mismatches(&self, snapshot: &ValidationSnapshot) -> Result<Vec<ValidationResult>> {
        let category = ValidationCategory::VersionMismatch;
        let mut results = Vec::new();

        for (descriptor, installed) in self.installed(&snapshot.manifest) {
            let expected = descriptor.expected_version();
            if expected.is_empty() || satisfies_minimum(installed, expected) {
                continue;
            }
            results.push(
                ValidationResult::warning(
                    category,
                    format!(
                        "{} ({}) is older than required: expected at least {}, found {}",
                        descriptor.display_name, descriptor.package_id, expected, installed
                    ),
                )
                .with_hint(format!(
                    "Set \"{}\": \"{}\" in the package manifest",
                    descriptor.package_id,
                    descriptor.dependency_value()
                )),
            );
        }

        if results.is_empty() {
            results.push(ValidationResult::valid(category, "All installed SDKs meet their minimum version"));
        }
        Ok(results)
    }

    pub fn check_mode_consistency(&self, snapshot: &ValidationSnapshot) -> Result<Vec<ValidationResult>> {
        let category = ValidationCategory::ModeConsistency;
        let Some(mode) = snapshot.mode else {
            return Ok(vec![ValidationResult::warning(category, "No build mode selected")
                .with_hint("Run `sdkpm mode set prototype` or `sdkpm mode set full`")]);
        };

        let mut results: Vec<ValidationResult> = self
            .registry
            .to_uninstall_for(mode)
            .filter(|d| snapshot.manifest.is_installed(d.package_id))
            .map(|d| {
                ValidationResult::warning(
                    category,
                    format!(
                        "{} is installed but is {} and not used in {} mode",
                        d.display_name,
                        d.level.label(),
                        mode
                    ),
                )
                .with_hint("Run `sdkpm uninstall` to remove it")
            })
            .collect();

        if results.is_empty() {
            results.push(ValidationResult::valid(
                category,
                format!("Installed SDKs match {} mode", mode),
            ));
        }
        Ok(results)
    }

    pub fn check_scoped_registries(&self, snapshot: &ValidationSnapshot) -> Result<Vec<ValidationResult>> {
        let category = ValidationCategory::ScopedRegistries;
        let manifest = &snapshot.manifest;
        let declared = manifest.declared_scopes();

        // Missing scopes, grouped so SDKs sharing a scope give one error
        let mut missing: Vec<(&str, &str, Vec<&str>)> = Vec::new();
        for (descriptor, _) in self.installed(manifest) {
            let Some(requirement) = descriptor.scope else {
                continue;
            };
            if declared.iter().any(|s| scope_covers(s, requirement.scope)) {
                continue;
            }
            match missing.iter_mut().find(|(scope, _, _)| *scope == requirement.scope) {
                Some((_, _, sdks)) => sdks.push(descriptor.display_name),
                None => missing.push((
                    requirement.scope,
                    requirement.registry.name(),
                    vec![descriptor.display_name],
                )),
            }
        }

        let mut results: Vec<ValidationResult> = missing
            .into_iter()
            .map(|(scope, registry, sdks)| {
                ValidationResult::error(
                    category,
                    format!(
                        "Scope {} is not declared by any scoped registry (needed by {})",
                        scope,
                        sdks.join(", ")
                    ),
                )
                .with_hint(format!("Run `sdkpm install` to add it to the {} registry", registry))
            })
            .collect();

        for (scope, urls) in manifest.conflicting_scopes() {
            results.push(
                ValidationResult::error(
                    category,
                    format!("Scope {} is claimed by several registries: {}", scope, urls.join(", ")),
                )
                .with_hint("Run `sdkpm doctor --fix` to keep only the owning registry's claim"),
            );
        }

        if results.is_empty() {
            results.push(ValidationResult::valid(category, "All required scopes are declared"));
        }
        Ok(results)
    }

    pub fn check_coherence(&self, snapshot: &ValidationSnapshot) -> Result<Vec<ValidationResult>> {
        let category = ValidationCategory::Coherence;
        let manifest = &snapshot.manifest;
        let mut results = Vec::new();

        for rule in self.registry.coherence_rules() {
            let base = self
                .registry
                .get(rule.base)
                .ok_or_else(|| Error::UnknownSdk(rule.base.to_string()))?;

            let modules: Vec<&str> = rule
                .modules
                .iter()
                .filter_map(|id| self.registry.get(*id))
                .filter(|d| manifest.is_installed(d.package_id))
                .map(|d| d.display_name)
                .collect();

            if modules.is_empty() || manifest.is_installed(base.package_id) {
                results.push(ValidationResult::valid(
                    category,
                    format!("{} dependencies are consistent", base.display_name),
                ));
            } else {
                results.push(
                    ValidationResult::error(
                        category,
                        format!(
                            "{} is missing but required by {}",
                            base.display_name,
                            modules.join(", ")
                        ),
                    )
                    .with_hint(format!(
                        "Add \"{}\": \"{}\" to the package manifest",
                        base.package_id,
                        base.dependency_value()
                    )),
                );
            }
        }

        Ok(results)
    }

    pub fn check_config_sync(&self, snapshot: &ValidationSnapshot) -> Result<Vec<ValidationResult>> {
        let category = ValidationCategory::ConfigSync;
        let config = match &snapshot.runtime_config {
            Document::Missing => {
                return Ok(vec![ValidationResult::warning(category, "Runtime config not found")
                    .with_hint("Create it or set [paths].runtime_config in .sdkpm/config.toml")]);
            }
            Document::Unreadable(reason) => {
                return Err(Error::Other(format!("runtime config is unreadable: {}", reason)));
            }
            Document::Present(config) => config,
        };

        let mut results: Vec<ValidationResult> = config
            .enabled_flags()
            .filter(|flag| !self.is_installed(&snapshot.manifest, flag.sdk()))
            .map(|flag| {
                let name = self
                    .registry
                    .get(flag.sdk())
                    .map(|d| d.display_name)
                    .unwrap_or_else(|| flag.key());
                ValidationResult::error(
                    category,
                    format!("Feature `{}` is enabled but {} is not installed", flag.key(), name),
                )
                .with_hint("Run `sdkpm doctor --fix` to switch it off")
            })
            .collect();

        if let Some(mode) = snapshot.mode {
            if !config.mirrors(mode) {
                results.push(
                    ValidationResult::warning(
                        category,
                        format!(
                            "Runtime config has prototypeMode = {} but the build mode is {}",
                            config.prototype_mode, mode
                        ),
                    )
                    .with_hint("Run `sdkpm doctor --fix` to sync it"),
                );
            }
        }

        if results.is_empty() {
            results.push(ValidationResult::valid(category, "Runtime config matches installed SDKs"));
        }
        Ok(results)
    }

    pub fn check_platform_manifest(&self, snapshot: &ValidationSnapshot) -> Result<Vec<ValidationResult>> {
        let category = ValidationCategory::PlatformManifest;
        let platform = match &snapshot.platform_manifest {
            Document::Missing => {
                return Ok(vec![ValidationResult::valid(category, "No Android manifest to check")]);
            }
            Document::Unreadable(reason) => {
                return Err(Error::PlatformManifest(reason.clone()));
            }
            Document::Present(platform) => platform,
        };

        let mut results: Vec<ValidationResult> = platform
            .find_orphans(&snapshot.manifest, self.registry, self.probe)
            .into_iter()
            .map(|orphan| {
                let name = self
                    .registry
                    .get(orphan.sdk)
                    .map(|d| d.display_name.to_string())
                    .unwrap_or_else(|| orphan.sdk.to_string());
                ValidationResult::error(
                    category,
                    format!(
                        "{} is not installed but the Android manifest still references {}; the app will crash at startup",
                        name,
                        orphan.patterns.join(", ")
                    ),
                )
                .with_hint("Run `sdkpm sanitize` to remove the stale entries")
            })
            .collect();

        for duplicate in platform.find_duplicate_activities() {
            results.push(
                ValidationResult::warning(
                    category,
                    format!("Activity {} is declared {} times", duplicate.name, duplicate.count),
                )
                .with_hint("Run `sdkpm sanitize` to keep a single declaration"),
            );
        }

        if results.is_empty() {
            results.push(ValidationResult::valid(category, "Android manifest is clean"));
        }
        Ok(results)
    }

    fn is_installed(&self, manifest: &PackageManifest, id: SdkId) -> bool {
        self.registry
            .get(id)
            .map(|d| manifest.is_installed(d.package_id))
            .unwrap_or(false)
    }
}

/// Switch off flags for absent SDKs and sync the mode mirror
///
/// Returns whether `config` changed. Callers persist it before touching the
/// package manifest, since a manifest write can trigger a reload.
pub fn auto_fix(
    config: &mut RuntimeConfig,
    manifest: &PackageManifest,
    registry: &SdkRegistry,
    mode: Option<Mode>,
) -> bool {
    let mut changed = false;

    let stale: Vec<_> = config
        .enabled_flags()
        .filter(|flag| {
            !registry
                .get(flag.sdk())
                .map(|d| manifest.is_installed(d.package_id))
                .unwrap_or(false)
        })
        .collect();
    for flag in stale {
        tracing::info!(flag = flag.key(), "disabling feature for missing SDK");
        config.set_flag(flag, false);
        changed = true;
    }

    if let Some(mode) = mode {
        if !config.mirrors(mode) {
            config.prototype_mode = mode == Mode::Prototype;
            changed = true;
        }
    }

    changed
}
