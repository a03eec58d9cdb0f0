//! Bringing the package manifest in line with the build mode
//!
//! The installer turns the registry's answer for a mode into an ordered list
//! of [`InstallStep`]s and applies each one as a single manifest transaction.
//!
//! Step order for an SDK served by a dedicated registry is fixed:
//!
//! 1. remove the SDK's scope from the shared registry, if it claims it
//! 2. add (or extend) the dedicated registry
//! 3. add the dependency
//!
//! The package manager refuses to resolve when two registries claim the same
//! scope, so step 1 must land before step 2.
//!
//! # Examples
//!
//! ```no_run
//! use sdkpm::{Installer, ManifestMutator, Mode, SdkRegistry};
//!
//! let mutator = ManifestMutator::new("Packages/manifest.json");
//! let installer = Installer::new(SdkRegistry::builtin(), &mutator);
//!
//! for step in installer.plan_install(Mode::Full) {
//!     println!("{}", step);
//! }
//! let report = installer.install_required(Mode::Full);
//! println!("changed: {}", report.changed());
//! ```

use crate::manifest::{
    add_missing_dependencies, add_or_update_registry, remove_dependency_keys,
    remove_registry_scope, Dependencies, ManifestMutator, MutationOutcome, PackageManifest,
    ScopedRegistry,
};
use crate::mode::Mode;
use crate::registry::{RegistryRef, SdkRegistry, SHARED_REGISTRY_NAME, SHARED_REGISTRY_URL};
use std::fmt;

/// One manifest transaction planned by the installer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStep {
    /// Drop a scope from the shared registry so a dedicated one can own it
    ReleaseSharedScope { scope: &'static str },
    /// Add a scoped registry or union scopes into it
    AddRegistry {
        name: &'static str,
        url: &'static str,
        scopes: Vec<&'static str>,
    },
    /// Add dependencies that are not yet present
    AddDependencies(Vec<(&'static str, &'static str)>),
    /// Remove dependencies
    RemoveDependencies(Vec<&'static str>),
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallStep::ReleaseSharedScope { scope } => {
                write!(f, "release scope {} from {}", scope, SHARED_REGISTRY_NAME)
            }
            InstallStep::AddRegistry { name, scopes, .. } => {
                write!(f, "ensure registry {} [{}]", name, scopes.join(", "))
            }
            InstallStep::AddDependencies(entries) => {
                let ids: Vec<&str> = entries.iter().map(|(id, _)| *id).collect();
                write!(f, "add dependencies {}", ids.join(", "))
            }
            InstallStep::RemoveDependencies(ids) => {
                write!(f, "remove dependencies {}", ids.join(", "))
            }
        }
    }
}

/// A step together with what happened when it ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub step: InstallStep,
    pub outcome: MutationOutcome,
}

/// Ordered record of the transactions an install or uninstall ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub mode: Mode,
    pub steps: Vec<StepResult>,
}

impl InstallReport {
    /// True if any step rewrote the manifest
    pub fn changed(&self) -> bool {
        self.steps.iter().any(|s| s.outcome.changed())
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepResult> {
        self.steps.iter().filter(|s| s.outcome.is_failed())
    }

    pub fn is_ok(&self) -> bool {
        self.failures().next().is_none()
    }
}

impl InstallStep {
    /// Apply this step to in-memory manifest parts, reporting whether it changed them
    pub fn apply_to(
        &self,
        dependencies: &mut Dependencies,
        registries: &mut Vec<ScopedRegistry>,
    ) -> bool {
        match self {
            InstallStep::ReleaseSharedScope { scope } => {
                remove_registry_scope(registries, SHARED_REGISTRY_URL, scope)
            }
            InstallStep::AddRegistry { name, url, scopes } => {
                add_or_update_registry(registries, name, url, scopes)
            }
            InstallStep::AddDependencies(entries) => add_missing_dependencies(dependencies, entries),
            InstallStep::RemoveDependencies(ids) => remove_dependency_keys(dependencies, ids),
        }
    }
}

/// Applies registry requirements to the manifest through the mutator
pub struct Installer<'a> {
    registry: &'a SdkRegistry,
    mutator: &'a ManifestMutator,
}

impl<'a> Installer<'a> {
    pub fn new(registry: &'a SdkRegistry, mutator: &'a ManifestMutator) -> Self {
        Self { registry, mutator }
    }

    /// Ordered transactions that install every SDK required in `mode`
    pub fn plan_install(&self, mode: Mode) -> Vec<InstallStep> {
        let mut dedicated: Vec<(&'static str, &'static str, &'static str)> = Vec::new();
        let mut shared_scopes: Vec<&'static str> = Vec::new();
        let mut dependencies: Vec<(&'static str, &'static str)> = Vec::new();

        for descriptor in self.registry.required_for(mode) {
            if let Some(requirement) = descriptor.scope {
                match requirement.registry {
                    RegistryRef::Shared => {
                        if !shared_scopes.contains(&requirement.scope) {
                            shared_scopes.push(requirement.scope);
                        }
                    }
                    RegistryRef::Dedicated { name, url } => {
                        let entry = (name, url, requirement.scope);
                        if !dedicated.contains(&entry) {
                            dedicated.push(entry);
                        }
                    }
                }
            }
            dependencies.push((descriptor.package_id, descriptor.dependency_value()));
        }

        let mut steps = Vec::new();
        for (name, url, scope) in dedicated {
            steps.push(InstallStep::ReleaseSharedScope { scope });
            steps.push(InstallStep::AddRegistry {
                name,
                url,
                scopes: vec![scope],
            });
        }
        if !shared_scopes.is_empty() {
            steps.push(InstallStep::AddRegistry {
                name: SHARED_REGISTRY_NAME,
                url: SHARED_REGISTRY_URL,
                scopes: shared_scopes,
            });
        }
        if !dependencies.is_empty() {
            steps.push(InstallStep::AddDependencies(dependencies));
        }
        steps
    }

    /// Transactions that remove every SDK not allowed in `mode`
    ///
    /// Only `PrototypeOnly` / `FullOnly` SDKs ever appear here.
    pub fn plan_uninstall(&self, mode: Mode) -> Vec<InstallStep> {
        let ids: Vec<&'static str> = self
            .registry
            .to_uninstall_for(mode)
            .map(|d| d.package_id)
            .collect();
        if ids.is_empty() {
            Vec::new()
        } else {
            vec![InstallStep::RemoveDependencies(ids)]
        }
    }

    /// The manifest as it will look after install and uninstall for `mode`
    ///
    /// Nothing is written; used to settle the runtime config before the real
    /// manifest changes.
    pub fn project(&self, manifest: &PackageManifest, mode: Mode) -> PackageManifest {
        let mut projected = manifest.clone();
        let mut registries = projected.scoped_registries.take().unwrap_or_default();
        for step in self.plan_install(mode).iter().chain(self.plan_uninstall(mode).iter()) {
            step.apply_to(&mut projected.dependencies, &mut registries);
        }
        projected.scoped_registries = Some(registries);
        projected
    }

    pub fn install_required(&self, mode: Mode) -> InstallReport {
        self.run(mode, self.plan_install(mode))
    }

    pub fn uninstall_unnecessary(&self, mode: Mode) -> InstallReport {
        self.run(mode, self.plan_uninstall(mode))
    }

    fn run(&self, mode: Mode, plan: Vec<InstallStep>) -> InstallReport {
        let steps = plan
            .into_iter()
            .map(|step| {
                let outcome = self.apply(&step);
                tracing::debug!(step = %step, outcome = ?outcome, "install step finished");
                StepResult { step, outcome }
            })
            .collect();
        InstallReport { mode, steps }
    }

    fn apply(&self, step: &InstallStep) -> MutationOutcome {
        match step {
            InstallStep::ReleaseSharedScope { scope } => self
                .mutator
                .remove_scope_from_registry(SHARED_REGISTRY_URL, scope),
            InstallStep::AddRegistry { name, url, scopes } => self
                .mutator
                .add_or_update_scoped_registry(name, url, scopes),
            InstallStep::AddDependencies(entries) => self.mutator.add_dependencies(entries),
            InstallStep::RemoveDependencies(ids) => self.mutator.remove_dependencies(ids),
        }
    }
}
