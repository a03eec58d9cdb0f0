//! Test utilities and helpers for sdkpm integration tests.
//!
//! [`TestProject`] lays out a throwaway game project in a temp directory with
//! the files sdkpm reads: `Packages/manifest.json`, the runtime config and the
//! Android manifest.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PACKAGE_MANIFEST: &str = "Packages/manifest.json";
pub const PLATFORM_MANIFEST: &str = "Assets/Plugins/Android/AndroidManifest.xml";
pub const RUNTIME_CONFIG: &str = "Assets/Resources/SdkRuntimeConfig.json";

/// A manifest as a fresh project ships it, before any SDK is added
pub const BASE_MANIFEST: &str = r#"{
  "dependencies": {
    "com.unity.textmeshpro": "3.0.6",
    "com.unity.ugui": "1.0.0"
  },
  "testables": ["com.unity.ugui"]
}
"#;

/// Isolated project directory
pub struct TestProject {
    pub temp_dir: TempDir,
    pub project_path: PathBuf,
}

impl TestProject {
    /// Create a new project with [`BASE_MANIFEST`]
    pub fn new() -> Self {
        let project = Self::empty();
        project.write_manifest(BASE_MANIFEST);
        project
    }

    /// Create a project directory with no files at all
    pub fn empty() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let project_path = temp_dir.path().to_path_buf();
        Self {
            temp_dir,
            project_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.project_path
    }

    pub fn config_dir(&self) -> PathBuf {
        self.project_path.join(".sdkpm")
    }

    fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.project_path.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write fixture file");
        path
    }

    pub fn write_manifest(&self, content: &str) -> PathBuf {
        self.write(PACKAGE_MANIFEST, content)
    }

    pub fn read_manifest(&self) -> String {
        fs::read_to_string(self.project_path.join(PACKAGE_MANIFEST))
            .expect("Failed to read manifest")
    }

    pub fn manifest_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.read_manifest()).expect("Manifest is not valid JSON")
    }

    pub fn has_dependency(&self, package_id: &str) -> bool {
        self.manifest_json()["dependencies"]
            .get(package_id)
            .is_some()
    }

    pub fn write_platform_manifest(&self, content: &str) -> PathBuf {
        self.write(PLATFORM_MANIFEST, content)
    }

    pub fn read_platform_manifest(&self) -> String {
        fs::read_to_string(self.project_path.join(PLATFORM_MANIFEST))
            .expect("Failed to read Android manifest")
    }

    pub fn write_runtime_config(&self, content: &str) -> PathBuf {
        self.write(RUNTIME_CONFIG, content)
    }

    pub fn runtime_config_json(&self) -> serde_json::Value {
        let content = fs::read_to_string(self.project_path.join(RUNTIME_CONFIG))
            .expect("Failed to read runtime config");
        serde_json::from_str(&content).expect("Runtime config is not valid JSON")
    }

    /// Write `.sdkpm/config.toml`
    pub fn write_config(&self, content: &str) -> PathBuf {
        self.write(".sdkpm/config.toml", content)
    }

    /// Files next to the Android manifest whose name marks them as backups
    pub fn platform_backups(&self) -> Vec<PathBuf> {
        let dir = self
            .project_path
            .join(PLATFORM_MANIFEST)
            .parent()
            .map(Path::to_path_buf)
            .expect("Android manifest has a parent directory");
        if !dir.exists() {
            return vec![];
        }
        fs::read_dir(dir)
            .expect("Failed to read Android plugin directory")
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.contains(".backup_"))
                    .unwrap_or(false)
            })
            .collect()
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Android manifest with entries from Facebook, AppLovin and Adjust, plus a
/// duplicated Facebook login activity
pub const ANDROID_MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.studio.game">
  <application android:label="@string/app_name">
    <activity android:name="com.unity3d.player.UnityPlayerActivity" android:exported="true">
      <intent-filter>
        <action android:name="android.intent.action.MAIN" />
        <category android:name="android.intent.category.LAUNCHER" />
      </intent-filter>
    </activity>
    <activity android:name="com.facebook.unity.FBUnityLoginActivity" />
    <activity android:name="com.facebook.unity.FBUnityLoginActivity" android:exported="true" />
    <meta-data android:name="com.facebook.sdk.ApplicationId" android:value="fb1234" />
    <meta-data android:name="applovin.sdk.key" android:value="key" />
    <receiver android:name="com.adjust.sdk.AdjustReferrerReceiver" android:exported="true">
      <intent-filter>
        <action android:name="com.android.vending.INSTALL_REFERRER" />
      </intent-filter>
    </receiver>
  </application>
</manifest>
"#;
