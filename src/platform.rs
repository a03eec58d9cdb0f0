//! Android manifest inspection and cleanup
//!
//! SDK import scripts inject `<activity>`, `<provider>`, `<receiver>` and
//! `<meta-data>` entries into the project's Android manifest. When the SDK is
//! later removed those entries stay behind and crash the app at startup with
//! a `ClassNotFoundException`. Re-importing an SDK can also duplicate its
//! activities, which breaks the manifest merge.
//!
//! This module finds both problems and can rewrite the file without them.
//! Only elements below `<application>` are touched, and everything outside
//! the removed spans is kept byte for byte.
//!
//! # Examples
//!
//! ```
//! use sdkpm::{NullProbe, PackageManifest, PlatformManifest, SdkId, SdkRegistry};
//!
//! let xml = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android">
//!   <application>
//!     <receiver android:name="com.adjust.sdk.AdjustReferrerReceiver" android:exported="true"/>
//!   </application>
//! </manifest>"#;
//!
//! let platform = PlatformManifest::parse(xml);
//! let orphans = platform.find_orphans(&PackageManifest::new(), SdkRegistry::builtin(), &NullProbe);
//! assert_eq!(orphans.len(), 1);
//! assert_eq!(orphans[0].sdk, SdkId::Adjust);
//! ```

use crate::manifest::PackageManifest;
use crate::probe::CapabilityProbe;
use crate::registry::{SdkId, SdkRegistry};
use crate::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Attribute namespace prefix used by Android manifests
pub const ANDROID_NS: &str = "android:";

/// Attributes searched for orphaned SDK patterns
const MATCHED_ATTRIBUTES: &[&str] = &["name", "authorities", "value"];

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?s)<!--.*?-->|<\?.*?\?>|<!\[CDATA\[.*?\]\]>|<![^>]*>|<(/?)([A-Za-z_][\w.:\-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#,
        )
        .expect("tag pattern is valid")
    })
}

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_][\w.:\-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
            .expect("attribute pattern is valid")
    })
}

/// An element below `<application>`, located by byte span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    /// Byte offset of `<`
    pub start: usize,
    /// Byte offset just past the closing `>`
    pub end: usize,
}

impl Element {
    /// Value of an `android:`-namespaced attribute
    pub fn android_attr(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .get(&format!("{}{}", ANDROID_NS, local_name))
            .map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.android_attr("name")
    }

    pub fn is_exported(&self) -> bool {
        self.android_attr("exported")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn matches_any(&self, patterns: &[&str]) -> bool {
        MATCHED_ATTRIBUTES.iter().any(|attr| {
            self.android_attr(attr)
                .map(|value| patterns.iter().any(|p| value.contains(p)))
                .unwrap_or(false)
        })
    }

    fn contains(&self, other: &Element) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Manifest fragments left behind by an SDK that is no longer installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanedEntry {
    pub sdk: SdkId,
    pub patterns: Vec<String>,
}

/// An activity declared more than once
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateActivity {
    pub name: String,
    pub count: usize,
}

/// What a sanitize pass removed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeReport {
    /// `(tag, android:name)` of each element dropped for an orphaned pattern
    pub removed: Vec<(String, String)>,
    /// Activities that had extra declarations dropped
    pub deduplicated: Vec<String>,
    /// Backup written before the file was replaced
    pub backup: Option<PathBuf>,
}

impl SanitizeReport {
    pub fn changed(&self) -> bool {
        !self.removed.is_empty() || !self.deduplicated.is_empty()
    }
}

/// Raw text of an Android manifest plus the elements found in it
#[derive(Debug, Clone)]
pub struct PlatformManifest {
    text: String,
    elements: Vec<Element>,
}

impl PlatformManifest {
    pub fn parse(text: impl Into<String>) -> Self {
        let text = text.into();
        let elements = scan_application_elements(&text);
        Self { text, elements }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::PlatformManifest(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Ok(Self::parse(text))
    }

    /// Load the manifest if the file exists
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        if !path.as_ref().exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Every element nested anywhere under `<application>`, in document order
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn activities(&self) -> impl Iterator<Item = &Element> {
        self.elements.iter().filter(|e| e.tag == "activity")
    }

    /// SDKs that are not installed but still have patterns in the manifest
    ///
    /// An SDK counts as installed if the package manifest lists it or the
    /// probe detects its code.
    pub fn find_orphans(
        &self,
        manifest: &PackageManifest,
        registry: &SdkRegistry,
        probe: &dyn CapabilityProbe,
    ) -> Vec<OrphanedEntry> {
        registry
            .all()
            .filter(|d| !d.platform_patterns.is_empty())
            .filter(|d| !manifest.is_installed(d.package_id) && !probe.is_loaded(d.detection))
            .filter_map(|d| {
                let patterns: Vec<String> = d
                    .platform_patterns
                    .iter()
                    .filter(|p| self.text.contains(*p))
                    .map(|p| p.to_string())
                    .collect();
                if patterns.is_empty() {
                    None
                } else {
                    Some(OrphanedEntry {
                        sdk: d.id,
                        patterns,
                    })
                }
            })
            .collect()
    }

    /// Activities declared more than once, by `android:name`
    pub fn find_duplicate_activities(&self) -> Vec<DuplicateActivity> {
        self.activity_groups()
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(name, members)| DuplicateActivity {
                name,
                count: members.len(),
            })
            .collect()
    }

    /// Text with orphaned elements and duplicate activities removed
    ///
    /// From each duplicate group the exported declaration is kept, otherwise
    /// the first one.
    pub fn sanitized(&self, orphans: &[OrphanedEntry]) -> (String, SanitizeReport) {
        let patterns: Vec<&str> = orphans
            .iter()
            .flat_map(|o| o.patterns.iter().map(String::as_str))
            .collect();

        let mut report = SanitizeReport::default();
        let mut doomed: Vec<&Element> = Vec::new();

        if !patterns.is_empty() {
            for element in self.elements.iter().filter(|e| e.matches_any(&patterns)) {
                if doomed.iter().any(|d| d.contains(element)) {
                    continue;
                }
                report.removed.push((
                    element.tag.clone(),
                    element.name().unwrap_or_default().to_string(),
                ));
                doomed.push(element);
            }
        }

        for (name, members) in self.activity_groups() {
            if members.len() < 2 {
                continue;
            }
            let keep = members
                .iter()
                .position(|e| e.is_exported())
                .unwrap_or(0);
            let mut dropped = false;
            for (i, element) in members.into_iter().enumerate() {
                if i == keep || doomed.iter().any(|d| d.contains(element)) {
                    continue;
                }
                doomed.push(element);
                dropped = true;
            }
            if dropped {
                report.deduplicated.push(name);
            }
        }

        // Only outermost spans; a nested span goes with its parent
        let mut outermost: Vec<&Element> = doomed
            .iter()
            .copied()
            .filter(|e| {
                !doomed
                    .iter()
                    .any(|d| !std::ptr::eq(*d, *e) && d.contains(e))
            })
            .collect();

        // Cut from the back so earlier offsets stay valid
        outermost.sort_by_key(|e| std::cmp::Reverse(e.start));
        let mut text = self.text.clone();
        for element in outermost {
            let (start, end) = removal_span(&self.text, element.start, element.end);
            text.replace_range(start..end, "");
        }

        (text, report)
    }

    fn activity_groups(&self) -> Vec<(String, Vec<&Element>)> {
        let mut groups: Vec<(String, Vec<&Element>)> = Vec::new();
        for activity in self.activities() {
            let Some(name) = activity.name() else {
                continue;
            };
            match groups.iter_mut().find(|(n, _)| n == name) {
                Some((_, members)) => members.push(activity),
                None => groups.push((name.to_string(), vec![activity])),
            }
        }
        groups
    }
}

/// Widen an element span to its whole line when nothing else shares it
fn removal_span(text: &str, start: usize, end: usize) -> (usize, usize) {
    let line_start = text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let leading_blank = text[line_start..start].chars().all(|c| c == ' ' || c == '\t');

    let rest = &text[end..];
    let line_end = rest.find('\n').map(|i| end + i + 1).unwrap_or(text.len());
    let trailing_blank = text[end..line_end].trim().is_empty();

    if leading_blank && trailing_blank {
        (line_start, line_end)
    } else {
        (start, end)
    }
}

fn parse_attributes(raw: &str) -> BTreeMap<String, String> {
    attribute_regex()
        .captures_iter(raw)
        .map(|cap| {
            let value = cap
                .get(2)
                .or_else(|| cap.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            (cap[1].to_string(), value.to_string())
        })
        .collect()
}

struct OpenTag {
    tag: String,
    attributes: BTreeMap<String, String>,
    start: usize,
    in_application: bool,
}

fn scan_application_elements(text: &str) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut stack: Vec<OpenTag> = Vec::new();

    for cap in tag_regex().captures_iter(text) {
        let (Some(whole), Some(name)) = (cap.get(0), cap.get(2)) else {
            // comment, processing instruction, CDATA or doctype
            continue;
        };
        let closing = cap.get(1).map(|m| !m.as_str().is_empty()).unwrap_or(false);
        let body = cap.get(3).map(|m| m.as_str()).unwrap_or_default();
        let tag = name.as_str();

        if closing {
            let Some(depth) = stack.iter().rposition(|open| open.tag == tag) else {
                continue;
            };
            // Unclosed children are dropped along with their parent
            stack.truncate(depth + 1);
            if let Some(open) = stack.pop() {
                if open.in_application {
                    elements.push(Element {
                        tag: open.tag,
                        attributes: open.attributes,
                        start: open.start,
                        end: whole.end(),
                    });
                }
            }
            continue;
        }

        let in_application = stack
            .iter()
            .any(|open| open.tag == "application");
        let self_closing = body.trim_end().ends_with('/');

        if self_closing {
            if in_application {
                elements.push(Element {
                    tag: tag.to_string(),
                    attributes: parse_attributes(body),
                    start: whole.start(),
                    end: whole.end(),
                });
            }
        } else {
            stack.push(OpenTag {
                tag: tag.to_string(),
                attributes: parse_attributes(body),
                start: whole.start(),
                in_application,
            });
        }
    }

    elements.sort_by_key(|e| e.start);
    elements
}

/// Detects and removes stale SDK entries from the Android manifest on disk
pub struct PlatformManifestSanitizer<'a> {
    path: PathBuf,
    registry: &'a SdkRegistry,
    probe: &'a dyn CapabilityProbe,
    backup: bool,
}

impl<'a> PlatformManifestSanitizer<'a> {
    pub fn new<P: Into<PathBuf>>(
        path: P,
        registry: &'a SdkRegistry,
        probe: &'a dyn CapabilityProbe,
    ) -> Self {
        Self {
            path: path.into(),
            registry,
            probe,
            backup: true,
        }
    }

    /// Enable or disable the timestamped backup (on by default)
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Orphaned entries in the file; empty when the file does not exist
    pub fn detect_orphaned_entries(&self, manifest: &PackageManifest) -> Result<Vec<OrphanedEntry>> {
        Ok(match PlatformManifest::load_optional(&self.path)? {
            Some(platform) => platform.find_orphans(manifest, self.registry, self.probe),
            None => Vec::new(),
        })
    }

    pub fn detect_duplicate_activities(&self) -> Result<Vec<DuplicateActivity>> {
        Ok(match PlatformManifest::load_optional(&self.path)? {
            Some(platform) => platform.find_duplicate_activities(),
            None => Vec::new(),
        })
    }

    /// What [`sanitize`](Self::sanitize) would remove, without writing
    pub fn preview(&self, manifest: &PackageManifest) -> Result<SanitizeReport> {
        Ok(match PlatformManifest::load_optional(&self.path)? {
            Some(platform) => {
                let orphans = platform.find_orphans(manifest, self.registry, self.probe);
                platform.sanitized(&orphans).1
            }
            None => SanitizeReport::default(),
        })
    }

    /// Remove orphaned entries and duplicate activities from the file
    ///
    /// The original is copied to a timestamped backup before being replaced.
    /// Nothing is written when there is nothing to remove.
    pub fn sanitize(&self, manifest: &PackageManifest) -> Result<SanitizeReport> {
        let Some(platform) = PlatformManifest::load_optional(&self.path)? else {
            return Ok(SanitizeReport::default());
        };

        let orphans = platform.find_orphans(manifest, self.registry, self.probe);
        let (text, mut report) = platform.sanitized(&orphans);
        if !report.changed() {
            return Ok(report);
        }

        if self.backup {
            let backup = backup_path(&self.path);
            fs::write(&backup, platform.text())?;
            tracing::info!(backup = %backup.display(), "platform manifest backed up");
            report.backup = Some(backup);
        }

        fs::write(&self.path, text)?;
        tracing::info!(
            path = %self.path.display(),
            removed = report.removed.len(),
            deduplicated = report.deduplicated.len(),
            "platform manifest sanitized"
        );
        Ok(report)
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "AndroidManifest.xml".to_string());
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");

    let mut candidate = path.with_file_name(format!("{}.backup_{}", file_name, stamp));
    let mut counter = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{}.backup_{}_{}", file_name, stamp, counter));
        counter += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{AssemblyScanProbe, NullProbe};
    use tempfile::TempDir;

    const ANDROID_MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.studio.game">
  <!-- <activity android:name="commented.Out"/> -->
  <application android:label="@string/app_name">
    <activity android:name="com.unity3d.player.UnityPlayerActivity" android:exported="true">
      <intent-filter>
        <action android:name="android.intent.action.MAIN" />
      </intent-filter>
    </activity>
    <activity android:name="com.facebook.unity.FBUnityLoginActivity" android:exported="false" />
    <activity android:name="com.facebook.unity.FBUnityLoginActivity" android:exported="true" />
    <provider android:name="com.facebook.FacebookContentProvider" android:authorities="com.facebook.app.FacebookContentProvider123" android:exported="true" />
    <meta-data android:name="applovin.sdk.key" android:value="abc123" />
    <receiver android:name="com.adjust.sdk.AdjustReferrerReceiver" android:exported="true">
      <intent-filter>
        <action android:name="com.android.vending.INSTALL_REFERRER" />
      </intent-filter>
    </receiver>
  </application>
</manifest>
"#;

    fn manifest_with(ids: &[&str]) -> PackageManifest {
        let mut manifest = PackageManifest::new();
        for id in ids {
            manifest.dependencies.insert(id.to_string(), "1.0.0".into());
        }
        manifest
    }

    #[test]
    fn test_scan_elements() {
        let platform = PlatformManifest::parse(ANDROID_MANIFEST);
        assert_eq!(platform.activities().count(), 3);
        let receiver = platform.elements().iter().find(|e| e.tag == "receiver").unwrap();
        assert_eq!(receiver.name(), Some("com.adjust.sdk.AdjustReferrerReceiver"));
        assert!(receiver.is_exported());
        assert!(platform.text()[receiver.start..receiver.end].ends_with("</receiver>"));
        assert!(!platform.elements().iter().any(|e| e.name() == Some("commented.Out")));
    }

    #[test]
    fn test_find_orphans_respects_manifest_and_probe() {
        let platform = PlatformManifest::parse(ANDROID_MANIFEST);
        let registry = SdkRegistry::builtin();

        let manifest = manifest_with(&["com.facebook.sdk"]);
        let orphans = platform.find_orphans(&manifest, registry, &NullProbe);
        let sdks: Vec<SdkId> = orphans.iter().map(|o| o.sdk).collect();
        assert_eq!(sdks, vec![SdkId::Adjust, SdkId::AppLovinMax]);

        let probe = AssemblyScanProbe::from_names(["MaxSdk.Scripts"]);
        let orphans = platform.find_orphans(&manifest, registry, &probe);
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].sdk, SdkId::Adjust);
        assert_eq!(orphans[0].patterns, vec!["com.adjust.sdk.AdjustReferrerReceiver"]);
    }

    #[test]
    fn test_find_duplicate_activities() {
        let platform = PlatformManifest::parse(ANDROID_MANIFEST);
        let duplicates = platform.find_duplicate_activities();
        assert_eq!(
            duplicates,
            vec![DuplicateActivity {
                name: "com.facebook.unity.FBUnityLoginActivity".to_string(),
                count: 2,
            }]
        );
    }

    #[test]
    fn test_sanitized_removes_orphans_and_keeps_exported_duplicate() {
        let platform = PlatformManifest::parse(ANDROID_MANIFEST);
        let manifest = manifest_with(&["com.facebook.sdk"]);
        let orphans = platform.find_orphans(&manifest, SdkRegistry::builtin(), &NullProbe);
        let (text, report) = platform.sanitized(&orphans);

        assert!(report.changed());
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.deduplicated, vec!["com.facebook.unity.FBUnityLoginActivity"]);

        assert!(!text.contains("AdjustReferrerReceiver"));
        assert!(!text.contains("INSTALL_REFERRER"));
        assert!(!text.contains("applovin.sdk.key"));
        assert!(!text.contains(r#"FBUnityLoginActivity" android:exported="false""#));
        assert!(text.contains(r#"FBUnityLoginActivity" android:exported="true""#));
        assert!(text.contains("FacebookContentProvider"));
        assert!(text.contains("UnityPlayerActivity"));

        let reparsed = PlatformManifest::parse(text);
        assert!(reparsed.find_duplicate_activities().is_empty());
        assert!(reparsed
            .find_orphans(&manifest, SdkRegistry::builtin(), &NullProbe)
            .is_empty());
    }

    #[test]
    fn test_sanitized_keeps_first_when_none_exported() {
        let xml = r#"<manifest><application>
  <activity android:name="a.B" android:theme="first"/>
  <activity android:name="a.B" android:theme="second"/>
</application></manifest>"#;
        let (text, report) = PlatformManifest::parse(xml).sanitized(&[]);
        assert_eq!(report.deduplicated, vec!["a.B"]);
        assert!(text.contains("first"));
        assert!(!text.contains("second"));
    }

    #[test]
    fn test_removal_span_takes_whole_line() {
        let text = "a\n    <x/>\nb";
        let start = text.find("<x").unwrap();
        assert_eq!(removal_span(text, start, start + 4), (2, 11));
    }

    #[test]
    fn test_sanitize_writes_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("AndroidManifest.xml");
        fs::write(&path, ANDROID_MANIFEST).unwrap();

        let registry = SdkRegistry::builtin();
        let sanitizer = PlatformManifestSanitizer::new(&path, registry, &NullProbe);
        let manifest = manifest_with(&["com.facebook.sdk"]);

        let report = sanitizer.sanitize(&manifest).unwrap();
        assert!(report.changed());
        let backup = report.backup.unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), ANDROID_MANIFEST);
        assert!(!fs::read_to_string(&path).unwrap().contains("AdjustReferrerReceiver"));

        let again = sanitizer.sanitize(&manifest).unwrap();
        assert!(!again.changed());
        assert!(again.backup.is_none());
    }

    #[test]
    fn test_sanitizer_missing_file_is_clean() {
        let dir = TempDir::new().unwrap();
        let sanitizer = PlatformManifestSanitizer::new(
            dir.path().join("AndroidManifest.xml"),
            SdkRegistry::builtin(),
            &NullProbe,
        );
        let manifest = PackageManifest::new();
        assert!(sanitizer.detect_orphaned_entries(&manifest).unwrap().is_empty());
        assert!(sanitizer.detect_duplicate_activities().unwrap().is_empty());
        assert!(!sanitizer.sanitize(&manifest).unwrap().changed());
    }
}
