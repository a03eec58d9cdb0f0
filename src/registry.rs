//! Static SDK table and requirement rules
//!
//! Every supported vendor SDK is described once by an [`SdkDescriptor`]. The
//! table is validated when the [`SdkRegistry`] is built and never changes
//! afterwards; everything else in the crate asks it which SDKs a mode needs.
//!
//! # Examples
//!
//! ```
//! use sdkpm::{Mode, SdkId, SdkRegistry};
//!
//! let registry = SdkRegistry::builtin();
//! let full: Vec<SdkId> = registry.required_for(Mode::Full).map(|d| d.id).collect();
//! assert!(full.contains(&SdkId::Adjust));
//!
//! let removed: Vec<SdkId> = registry.to_uninstall_for(Mode::Prototype).map(|d| d.id).collect();
//! assert!(removed.contains(&SdkId::Adjust));
//! assert!(!removed.contains(&SdkId::FirebaseApp));
//! ```

use crate::mode::Mode;
use crate::version::tag_of;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

/// Name of the shared scoped registry most SDKs are published to
pub const SHARED_REGISTRY_NAME: &str = "package.openupm.com";

/// URL of the shared scoped registry
pub const SHARED_REGISTRY_URL: &str = "https://package.openupm.com";

/// Stable identity of a supported SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SdkId {
    ExternalDependencyManager,
    GameAnalytics,
    Facebook,
    Tenjin,
    Adjust,
    AppLovinMax,
    FirebaseApp,
    FirebaseAnalytics,
    FirebaseCrashlytics,
    FirebaseRemoteConfig,
    UnityPurchasing,
}

impl SdkId {
    pub const ALL: [SdkId; 11] = [
        SdkId::ExternalDependencyManager,
        SdkId::GameAnalytics,
        SdkId::Facebook,
        SdkId::Tenjin,
        SdkId::Adjust,
        SdkId::AppLovinMax,
        SdkId::FirebaseApp,
        SdkId::FirebaseAnalytics,
        SdkId::FirebaseCrashlytics,
        SdkId::FirebaseRemoteConfig,
        SdkId::UnityPurchasing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SdkId::ExternalDependencyManager => "ExternalDependencyManager",
            SdkId::GameAnalytics => "GameAnalytics",
            SdkId::Facebook => "Facebook",
            SdkId::Tenjin => "Tenjin",
            SdkId::Adjust => "Adjust",
            SdkId::AppLovinMax => "AppLovinMax",
            SdkId::FirebaseApp => "FirebaseApp",
            SdkId::FirebaseAnalytics => "FirebaseAnalytics",
            SdkId::FirebaseCrashlytics => "FirebaseCrashlytics",
            SdkId::FirebaseRemoteConfig => "FirebaseRemoteConfig",
            SdkId::UnityPurchasing => "UnityPurchasing",
        }
    }
}

impl fmt::Display for SdkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When an SDK must be present, relative to the build mode
///
/// `PrototypeOnly` and `FullOnly` SDKs are actively removed in the other mode.
/// `FullRequired` SDKs are installed for full builds but tolerated in
/// prototype builds; they are never removed automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequirementLevel {
    /// Required in every mode
    Core,
    /// Required in prototype builds, removed from full builds
    PrototypeOnly,
    /// Required in full builds, removed from prototype builds
    FullOnly,
    /// Required in full builds, optional in prototype builds
    FullRequired,
    /// Never installed or removed automatically
    Optional,
}

impl RequirementLevel {
    pub fn is_required_for(&self, mode: Mode) -> bool {
        match self {
            RequirementLevel::Core => true,
            RequirementLevel::PrototypeOnly => mode == Mode::Prototype,
            RequirementLevel::FullOnly | RequirementLevel::FullRequired => mode == Mode::Full,
            RequirementLevel::Optional => false,
        }
    }

    /// Whether an installed SDK of this level must be removed in `mode`
    pub fn is_removed_in(&self, mode: Mode) -> bool {
        match self {
            RequirementLevel::PrototypeOnly => mode == Mode::Full,
            RequirementLevel::FullOnly => mode == Mode::Prototype,
            RequirementLevel::Core | RequirementLevel::FullRequired | RequirementLevel::Optional => {
                false
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RequirementLevel::Core => "core",
            RequirementLevel::PrototypeOnly => "prototype-only",
            RequirementLevel::FullOnly => "full-only",
            RequirementLevel::FullRequired => "full-required",
            RequirementLevel::Optional => "optional",
        }
    }
}

/// Where an SDK's package comes from
///
/// A descriptor carries either a version or an install URL, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageSource {
    /// Registry version, e.g. `8.0.1`
    Version(&'static str),
    /// Git install URL, optionally pinned with a `#tag` suffix
    Url(&'static str),
}

impl PackageSource {
    /// The value written into the manifest's dependency map
    pub fn dependency_value(&self) -> &'static str {
        match *self {
            PackageSource::Version(v) => v,
            PackageSource::Url(u) => u,
        }
    }

    /// The comparable minimum version, empty when none can be enforced
    pub fn expected_version(&self) -> &'static str {
        match *self {
            PackageSource::Version(v) => v,
            PackageSource::Url(u) => match tag_of(u) {
                Some(_) => u,
                None => "",
            },
        }
    }
}

/// Which registry serves a required scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryRef {
    /// The shared scoped registry ([`SHARED_REGISTRY_URL`])
    Shared,
    /// A vendor-operated registry that must own the scope exclusively
    Dedicated {
        name: &'static str,
        url: &'static str,
    },
}

impl RegistryRef {
    pub fn name(&self) -> &'static str {
        match *self {
            RegistryRef::Shared => SHARED_REGISTRY_NAME,
            RegistryRef::Dedicated { name, .. } => name,
        }
    }

    pub fn url(&self) -> &'static str {
        match *self {
            RegistryRef::Shared => SHARED_REGISTRY_URL,
            RegistryRef::Dedicated { url, .. } => url,
        }
    }
}

/// A scope prefix an SDK needs declared by some scoped registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeRequirement {
    pub scope: &'static str,
    pub registry: RegistryRef,
}

/// Static metadata for one vendor SDK
#[derive(Debug, Clone)]
pub struct SdkDescriptor {
    pub id: SdkId,
    pub display_name: &'static str,
    pub package_id: &'static str,
    pub source: PackageSource,
    pub scope: Option<ScopeRequirement>,
    /// Assembly or type name substrings that prove the SDK's code is present
    pub detection: &'static [&'static str],
    /// Text fragments the SDK leaves in the Android manifest
    pub platform_patterns: &'static [&'static str],
    pub level: RequirementLevel,
}

impl SdkDescriptor {
    pub fn dependency_value(&self) -> &'static str {
        self.source.dependency_value()
    }

    pub fn expected_version(&self) -> &'static str {
        self.source.expected_version()
    }
}

/// A base SDK that must be installed whenever any of its modules is
#[derive(Debug, Clone)]
pub struct CoherenceRule {
    pub base: SdkId,
    pub modules: &'static [SdkId],
}

fn shared(scope: &'static str) -> Option<ScopeRequirement> {
    Some(ScopeRequirement {
        scope,
        registry: RegistryRef::Shared,
    })
}

fn builtin_descriptors() -> Vec<SdkDescriptor> {
    vec![
        SdkDescriptor {
            id: SdkId::ExternalDependencyManager,
            display_name: "External Dependency Manager",
            package_id: "com.google.external-dependency-manager",
            source: PackageSource::Version("1.2.183"),
            scope: shared("com.google.external-dependency-manager"),
            detection: &["Google.VersionHandler", "Google.JarResolver"],
            platform_patterns: &[],
            level: RequirementLevel::Core,
        },
        SdkDescriptor {
            id: SdkId::GameAnalytics,
            display_name: "GameAnalytics",
            package_id: "com.gameanalytics.sdk",
            source: PackageSource::Version("7.10.3"),
            scope: shared("com.gameanalytics"),
            detection: &["GameAnalyticsSDK"],
            platform_patterns: &[],
            level: RequirementLevel::Core,
        },
        SdkDescriptor {
            id: SdkId::Facebook,
            display_name: "Facebook SDK",
            package_id: "com.facebook.sdk",
            source: PackageSource::Version("17.0.1"),
            scope: shared("com.facebook"),
            detection: &["Facebook.Unity"],
            platform_patterns: &[
                "com.facebook.FacebookContentProvider",
                "com.facebook.unity.FBUnityLoginActivity",
                "com.facebook.sdk.ApplicationId",
            ],
            level: RequirementLevel::Core,
        },
        SdkDescriptor {
            id: SdkId::Tenjin,
            display_name: "Tenjin",
            package_id: "com.tenjin.sdk",
            source: PackageSource::Url("https://github.com/tenjin/tenjin-unity-sdk.git#1.14.3"),
            scope: None,
            detection: &["TenjinSDK", "BaseTenjin"],
            platform_patterns: &["com.tenjin.android"],
            level: RequirementLevel::PrototypeOnly,
        },
        SdkDescriptor {
            id: SdkId::Adjust,
            display_name: "Adjust",
            package_id: "com.adjust.sdk",
            source: PackageSource::Url(
                "https://github.com/adjust/unity_sdk.git?path=Assets/Adjust#5.0.3",
            ),
            scope: None,
            detection: &["AdjustSdk", "com.adjust.sdk"],
            platform_patterns: &["com.adjust.sdk.AdjustReferrerReceiver"],
            level: RequirementLevel::FullOnly,
        },
        SdkDescriptor {
            id: SdkId::AppLovinMax,
            display_name: "AppLovin MAX",
            package_id: "com.applovin.mediation.ads",
            source: PackageSource::Version("8.0.1"),
            scope: Some(ScopeRequirement {
                scope: "com.applovin",
                registry: RegistryRef::Dedicated {
                    name: "AppLovin MAX Unity",
                    url: "https://unity.packages.applovin.com/",
                },
            }),
            detection: &["MaxSdk", "MaxSdkBase"],
            platform_patterns: &["com.applovin.sdk.AppLovinInitProvider", "applovin.sdk.key"],
            level: RequirementLevel::FullOnly,
        },
        SdkDescriptor {
            id: SdkId::FirebaseApp,
            display_name: "Firebase App (Core)",
            package_id: "com.google.firebase.app",
            source: PackageSource::Version("12.0.0"),
            scope: shared("com.google.firebase"),
            detection: &["Firebase.App", "Firebase.FirebaseApp"],
            platform_patterns: &["com.google.firebase.provider.FirebaseInitProvider"],
            level: RequirementLevel::FullRequired,
        },
        SdkDescriptor {
            id: SdkId::FirebaseAnalytics,
            display_name: "Firebase Analytics",
            package_id: "com.google.firebase.analytics",
            source: PackageSource::Version("12.0.0"),
            scope: shared("com.google.firebase"),
            detection: &["Firebase.Analytics"],
            platform_patterns: &[],
            level: RequirementLevel::FullRequired,
        },
        SdkDescriptor {
            id: SdkId::FirebaseCrashlytics,
            display_name: "Firebase Crashlytics",
            package_id: "com.google.firebase.crashlytics",
            source: PackageSource::Version("12.0.0"),
            scope: shared("com.google.firebase"),
            detection: &["Firebase.Crashlytics"],
            platform_patterns: &[],
            level: RequirementLevel::FullRequired,
        },
        SdkDescriptor {
            id: SdkId::FirebaseRemoteConfig,
            display_name: "Firebase Remote Config",
            package_id: "com.google.firebase.remote-config",
            source: PackageSource::Version("12.0.0"),
            scope: shared("com.google.firebase"),
            detection: &["Firebase.RemoteConfig"],
            platform_patterns: &[],
            level: RequirementLevel::Optional,
        },
        SdkDescriptor {
            id: SdkId::UnityPurchasing,
            display_name: "Unity IAP",
            package_id: "com.unity.purchasing",
            source: PackageSource::Version("4.12.2"),
            scope: None,
            detection: &["UnityEngine.Purchasing"],
            platform_patterns: &[],
            level: RequirementLevel::Optional,
        },
    ]
}

fn builtin_coherence_rules() -> Vec<CoherenceRule> {
    vec![CoherenceRule {
        base: SdkId::FirebaseApp,
        modules: &[
            SdkId::FirebaseAnalytics,
            SdkId::FirebaseCrashlytics,
            SdkId::FirebaseRemoteConfig,
        ],
    }]
}

/// Read-only table of SDK descriptors, in declaration order
#[derive(Debug, Clone)]
pub struct SdkRegistry {
    descriptors: Vec<SdkDescriptor>,
    coherence: Vec<CoherenceRule>,
}

impl SdkRegistry {
    /// Build a registry, rejecting duplicate identities or package ids and
    /// coherence rules that name SDKs missing from the table
    pub fn new(descriptors: Vec<SdkDescriptor>, coherence: Vec<CoherenceRule>) -> Result<Self> {
        let mut ids = HashSet::new();
        let mut packages = HashSet::new();
        for descriptor in &descriptors {
            if !ids.insert(descriptor.id) {
                return Err(Error::InvalidRegistry(format!(
                    "duplicate SDK identity {}",
                    descriptor.id
                )));
            }
            if !packages.insert(descriptor.package_id) {
                return Err(Error::InvalidRegistry(format!(
                    "package id {} is declared twice",
                    descriptor.package_id
                )));
            }
        }

        for rule in &coherence {
            for id in std::iter::once(&rule.base).chain(rule.modules) {
                if !ids.contains(id) {
                    return Err(Error::InvalidRegistry(format!(
                        "coherence rule references {} which is not in the table",
                        id
                    )));
                }
            }
        }

        Ok(Self {
            descriptors,
            coherence,
        })
    }

    /// The built-in SDK table, validated on first use
    pub fn builtin() -> &'static SdkRegistry {
        static BUILTIN: OnceLock<SdkRegistry> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            match SdkRegistry::new(builtin_descriptors(), builtin_coherence_rules()) {
                Ok(registry) => registry,
                Err(e) => panic!("built-in SDK table is misconfigured: {}", e),
            }
        })
    }

    pub fn get(&self, id: SdkId) -> Option<&SdkDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    pub fn all(&self) -> impl Iterator<Item = &SdkDescriptor> {
        self.descriptors.iter()
    }

    /// SDKs that must be installed in `mode`
    pub fn required_for(&self, mode: Mode) -> impl Iterator<Item = &SdkDescriptor> {
        self.descriptors
            .iter()
            .filter(move |d| d.level.is_required_for(mode))
    }

    /// SDKs that must be removed in `mode`
    pub fn to_uninstall_for(&self, mode: Mode) -> impl Iterator<Item = &SdkDescriptor> {
        self.descriptors
            .iter()
            .filter(move |d| d.level.is_removed_in(mode))
    }

    pub fn coherence_rules(&self) -> &[CoherenceRule] {
        &self.coherence
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
