//! Runtime configuration read by the game at startup
//!
//! The game ships a small JSON document that switches each SDK integration
//! on or off and mirrors the build mode. A flag left on for an SDK that is
//! not installed crashes or no-ops at runtime, so the validator cross-checks
//! it against the package manifest.

use crate::mode::Mode;
use crate::registry::SdkId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// A per-SDK switch in the runtime configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureFlag {
    Adjust,
    AppLovin,
    Firebase,
    Facebook,
    GameAnalytics,
    Tenjin,
}

impl FeatureFlag {
    pub const ALL: [FeatureFlag; 6] = [
        FeatureFlag::Adjust,
        FeatureFlag::AppLovin,
        FeatureFlag::Firebase,
        FeatureFlag::Facebook,
        FeatureFlag::GameAnalytics,
        FeatureFlag::Tenjin,
    ];

    /// The SDK that must be installed while this flag is on
    pub fn sdk(&self) -> SdkId {
        match self {
            FeatureFlag::Adjust => SdkId::Adjust,
            FeatureFlag::AppLovin => SdkId::AppLovinMax,
            FeatureFlag::Firebase => SdkId::FirebaseApp,
            FeatureFlag::Facebook => SdkId::Facebook,
            FeatureFlag::GameAnalytics => SdkId::GameAnalytics,
            FeatureFlag::Tenjin => SdkId::Tenjin,
        }
    }

    /// Key of the flag inside the `features` object
    pub fn key(&self) -> &'static str {
        match self {
            FeatureFlag::Adjust => "adjust",
            FeatureFlag::AppLovin => "appLovin",
            FeatureFlag::Firebase => "firebase",
            FeatureFlag::Facebook => "facebook",
            FeatureFlag::GameAnalytics => "gameAnalytics",
            FeatureFlag::Tenjin => "tenjin",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    #[serde(default)]
    pub adjust: bool,
    #[serde(default)]
    pub app_lovin: bool,
    #[serde(default)]
    pub firebase: bool,
    #[serde(default)]
    pub facebook: bool,
    #[serde(default)]
    pub game_analytics: bool,
    #[serde(default)]
    pub tenjin: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The runtime configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Mirror of the build mode, read by game code
    #[serde(default)]
    pub prototype_mode: bool,

    #[serde(default)]
    pub features: FeatureFlags,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RuntimeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content).map_err(|e| {
            Error::Other(format!(
                "Failed to parse runtime config {}: {}",
                path.as_ref().display(),
                e
            ))
        })
    }

    /// Load the document if the file exists
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        if !path.as_ref().exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn flag(&self, flag: FeatureFlag) -> bool {
        match flag {
            FeatureFlag::Adjust => self.features.adjust,
            FeatureFlag::AppLovin => self.features.app_lovin,
            FeatureFlag::Firebase => self.features.firebase,
            FeatureFlag::Facebook => self.features.facebook,
            FeatureFlag::GameAnalytics => self.features.game_analytics,
            FeatureFlag::Tenjin => self.features.tenjin,
        }
    }

    pub fn set_flag(&mut self, flag: FeatureFlag, enabled: bool) {
        let slot = match flag {
            FeatureFlag::Adjust => &mut self.features.adjust,
            FeatureFlag::AppLovin => &mut self.features.app_lovin,
            FeatureFlag::Firebase => &mut self.features.firebase,
            FeatureFlag::Facebook => &mut self.features.facebook,
            FeatureFlag::GameAnalytics => &mut self.features.game_analytics,
            FeatureFlag::Tenjin => &mut self.features.tenjin,
        };
        *slot = enabled;
    }

    /// Flags currently switched on
    pub fn enabled_flags(&self) -> impl Iterator<Item = FeatureFlag> + '_ {
        FeatureFlag::ALL.into_iter().filter(|f| self.flag(*f))
    }

    /// Whether the mirrored mode agrees with `mode`
    pub fn mirrors(&self, mode: Mode) -> bool {
        self.prototype_mode == (mode == Mode::Prototype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_with_unknown_keys() {
        let json = r#"{
            "prototypeMode": true,
            "features": { "adjust": true, "appLovin": false, "customSdk": true },
            "appVersion": "1.4.2"
        }"#;
        let config: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert!(config.prototype_mode);
        assert!(config.flag(FeatureFlag::Adjust));
        assert!(!config.flag(FeatureFlag::Firebase));
        assert_eq!(config.features.extra["customSdk"], Value::Bool(true));
        assert_eq!(config.extra["appVersion"], Value::String("1.4.2".to_string()));
    }

    #[test]
    fn test_set_flag_and_enabled_flags() {
        let mut config = RuntimeConfig::default();
        config.set_flag(FeatureFlag::Firebase, true);
        config.set_flag(FeatureFlag::Tenjin, true);
        let enabled: Vec<_> = config.enabled_flags().collect();
        assert_eq!(enabled, vec![FeatureFlag::Firebase, FeatureFlag::Tenjin]);
    }

    #[test]
    fn test_mirrors() {
        let config = RuntimeConfig {
            prototype_mode: true,
            ..Default::default()
        };
        assert!(config.mirrors(Mode::Prototype));
        assert!(!config.mirrors(Mode::Full));
    }

    #[test]
    fn test_save_and_load_optional() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Resources").join("SdkRuntimeConfig.json");
        assert!(RuntimeConfig::load_optional(&path).unwrap().is_none());

        let mut config = RuntimeConfig::default();
        config.set_flag(FeatureFlag::AppLovin, true);
        config.save(&path).unwrap();

        let loaded = RuntimeConfig::load_optional(&path).unwrap().unwrap();
        assert!(loaded.flag(FeatureFlag::AppLovin));
        assert!(fs::read_to_string(&path).unwrap().contains("\"appLovin\": true"));
    }
}
