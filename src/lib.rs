//! sdkpm - keeps third-party mobile SDK dependencies consistent with the build mode
//!
//! A game project switches between a lightweight *prototype* build and a
//! *full* production build, and each mode needs a different set of vendor
//! SDKs. sdkpm owns that decision:
//!
//! - a static table of supported SDKs and when each one is required
//! - idempotent edits of the package manager's `Packages/manifest.json`
//! - a pre-build validator that cross-checks the manifest, the runtime
//!   config and the Android manifest for drift
//! - cleanup of Android manifest entries left behind by removed SDKs
//!
//! It does not fetch packages or resolve transitive dependencies; the
//! external package manager does that after sdkpm edits the manifest.
//!
//! # Examples
//!
//! ```no_run
//! use sdkpm::{Mode, Project};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut project = Project::open(".")?;
//! let report = project.set_mode(Mode::Full)?;
//! println!("install changed manifest: {}", report.install.changed());
//!
//! let gate = project.gate();
//! if !gate.passed {
//!     std::process::exit(1);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`registry`] - Built-in SDK table and requirement levels
//! - [`manifest`] - Package manifest document and the single-write mutator
//! - [`installer`] - Install / uninstall plans for a mode
//! - [`validator`] - Pre-build checks and runtime config auto-fix
//! - [`platform`] - Android manifest orphan and duplicate cleanup
//! - [`version`] - Lenient version and git tag comparison
//! - [`project`] - Everything above wired to one project directory
//! - [`config`] - `.sdkpm/config.toml`
//! - [`error`] - Error types and result handling

pub mod config;
pub mod error;
pub mod installer;
pub mod manifest;
pub mod mode;
pub mod notify;
pub mod platform;
pub mod probe;
pub mod project;
pub mod registry;
pub mod runtime_config;
pub mod validator;
pub mod version;

pub use config::{Config, ConfigModeStore};
pub use error::{Error, Result};
pub use installer::{InstallReport, InstallStep, Installer, StepResult};
pub use manifest::{Dependencies, ManifestMutator, MutationOutcome, PackageManifest, ScopedRegistry};
pub use mode::{MemoryModeStore, Mode, ModeStore};
pub use notify::{CommandNotifier, NoopNotifier, ResolveNotifier};
pub use platform::{
    DuplicateActivity, OrphanedEntry, PlatformManifest, PlatformManifestSanitizer, SanitizeReport,
};
pub use probe::{AssemblyScanProbe, CapabilityProbe, NullProbe};
pub use project::{GateResult, ModeSwitchReport, Project, ScopeRepair, UninstallReport};
pub use registry::{
    RequirementLevel, SdkDescriptor, SdkId, SdkRegistry, SHARED_REGISTRY_NAME, SHARED_REGISTRY_URL,
};
pub use runtime_config::{FeatureFlag, RuntimeConfig};
pub use validator::{
    auto_fix, BuildValidator, ValidationCategory, ValidationReport, ValidationResult,
    ValidationSnapshot, ValidationStatus,
};
pub use version::{compare_versions, satisfies_minimum};
