//! Package manifest handling (`Packages/manifest.json`)
//!
//! The package manager's manifest holds a dependency map and a list of scoped
//! registries. sdkpm edits only those two structures; every other key in the
//! document is carried through untouched.
//!
//! All writes go through [`ManifestMutator::modify`], which loads the file,
//! runs one in-memory transformation and writes back only if the
//! transformation reports a change. The derived operations (add dependencies,
//! add or extend a scoped registry, ...) are each a single `modify` call.
//!
//! # Examples
//!
//! ```no_run
//! use sdkpm::ManifestMutator;
//!
//! let mutator = ManifestMutator::new("Packages/manifest.json");
//! let outcome = mutator.add_or_update_scoped_registry(
//!     "package.openupm.com",
//!     "https://package.openupm.com",
//!     &["com.gameanalytics"],
//! );
//! println!("registry update: {:?}", outcome);
//!
//! mutator.add_dependencies(&[("com.gameanalytics.sdk", "7.10.3")]);
//! ```

use crate::notify::{NoopNotifier, ResolveNotifier};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Package id -> version or install URL, in document order
pub type Dependencies = Map<String, Value>;
use std::fs;
use std::path::{Path, PathBuf};

/// The package manifest document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub dependencies: Dependencies,

    /// Scoped registries, absent from many manifests
    #[serde(
        rename = "scopedRegistries",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub scoped_registries: Option<Vec<ScopedRegistry>>,

    /// Keys sdkpm does not manage (testables, enableLockFile, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A named package source restricted to a set of scope prefixes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedRegistry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScopedRegistry {
    pub fn new(name: &str, url: &str, scopes: &[&str]) -> Self {
        let mut registry = Self {
            name: name.to_string(),
            url: url.to_string(),
            scopes: Vec::new(),
            extra: Map::new(),
        };
        for scope in scopes {
            if !registry.scopes.iter().any(|s| s == scope) {
                registry.scopes.push(scope.to_string());
            }
        }
        registry
    }

    pub fn has_url(&self, url: &str) -> bool {
        urls_match(&self.url, url)
    }
}

impl PackageManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and parse the manifest at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ManifestNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::InvalidManifest(e.to_string()))
    }

    /// Serialize with two-space indentation and a trailing newline
    pub fn to_json_string(&self) -> Result<String> {
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        Ok(content)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.to_json_string()?)?;
        Ok(())
    }

    pub fn is_installed(&self, package_id: &str) -> bool {
        self.dependencies.contains_key(package_id)
    }

    pub fn dependency(&self, package_id: &str) -> Option<&str> {
        self.dependencies.get(package_id).and_then(Value::as_str)
    }

    pub fn registries(&self) -> &[ScopedRegistry] {
        self.scoped_registries.as_deref().unwrap_or(&[])
    }

    pub fn find_registry(&self, url: &str) -> Option<&ScopedRegistry> {
        self.registries().iter().find(|r| r.has_url(url))
    }

    /// Union of the scopes declared by every registry
    pub fn declared_scopes(&self) -> BTreeSet<&str> {
        self.registries()
            .iter()
            .flat_map(|r| r.scopes.iter().map(String::as_str))
            .collect()
    }

    /// Scopes claimed by more than one registry, with the claiming registry URLs
    pub fn conflicting_scopes(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut claims: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for registry in self.registries() {
            let unique: BTreeSet<&str> = registry.scopes.iter().map(String::as_str).collect();
            for scope in unique {
                claims.entry(scope).or_default().push(registry.url.as_str());
            }
        }
        claims.retain(|_, urls| urls.len() > 1);
        claims
    }
}

/// Whether a declared scope makes packages under `required` resolvable
///
/// Scopes are package-name prefixes matched on `.` boundaries.
pub fn scope_covers(declared: &str, required: &str) -> bool {
    declared == required
        || (required.starts_with(declared)
            && required.as_bytes().get(declared.len()) == Some(&b'.'))
}

/// Compare registry URLs ignoring case of scheme/host and trailing slashes
pub fn urls_match(a: &str, b: &str) -> bool {
    normalize_url(a) == normalize_url(b)
}

fn normalize_url(raw: &str) -> String {
    let raw = raw.trim();
    match url::Url::parse(raw) {
        Ok(parsed) => {
            let port = parsed
                .port_or_known_default()
                .map(|p| format!(":{}", p))
                .unwrap_or_default();
            format!(
                "{}://{}{}{}",
                parsed.scheme(),
                parsed.host_str().unwrap_or_default(),
                port,
                parsed.path().trim_end_matches('/')
            )
        }
        Err(_) => raw.trim_end_matches('/').to_ascii_lowercase(),
    }
}

// In-memory edits. Each returns true only if it changed something.

/// Append a registry for `url`, or union `scopes` into the existing one
pub fn add_or_update_registry(
    registries: &mut Vec<ScopedRegistry>,
    name: &str,
    url: &str,
    scopes: &[&str],
) -> bool {
    match registries.iter_mut().find(|r| r.has_url(url)) {
        Some(existing) => {
            let mut changed = false;
            for scope in scopes {
                if !existing.scopes.iter().any(|s| s == scope) {
                    existing.scopes.push(scope.to_string());
                    changed = true;
                }
            }
            changed
        }
        None => {
            registries.push(ScopedRegistry::new(name, url, scopes));
            true
        }
    }
}

/// Insert entries whose key is absent; existing entries are never overwritten
pub fn add_missing_dependencies(
    dependencies: &mut Dependencies,
    entries: &[(&str, &str)],
) -> bool {
    let mut changed = false;
    for (package_id, value) in entries {
        if !dependencies.contains_key(*package_id) {
            dependencies.insert(package_id.to_string(), Value::from(*value));
            changed = true;
        }
    }
    changed
}

/// Delete the listed keys; absent keys are ignored and the rest keep their order
pub fn remove_dependency_keys(
    dependencies: &mut Dependencies,
    package_ids: &[&str],
) -> bool {
    let mut changed = false;
    for package_id in package_ids {
        changed |= dependencies.shift_remove(*package_id).is_some();
    }
    changed
}

/// Remove one scope from the registry at `url`
pub fn remove_registry_scope(registries: &mut [ScopedRegistry], url: &str, scope: &str) -> bool {
    match registries.iter_mut().find(|r| r.has_url(url)) {
        Some(registry) => {
            let before = registry.scopes.len();
            registry.scopes.retain(|s| s != scope);
            registry.scopes.len() != before
        }
        None => false,
    }
}

/// Result of one manifest transaction
///
/// `Unchanged` and `Failed` are kept apart so callers can tell "nothing to
/// do" from "could not read or write the manifest".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The transformation changed the document and it was written
    Applied,
    /// The transformation declined to change anything; no write happened
    Unchanged,
    /// The manifest could not be loaded, parsed or written
    Failed(String),
}

impl MutationOutcome {
    /// True only when the file was rewritten
    pub fn changed(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, MutationOutcome::Failed(_))
    }
}

/// Single chokepoint for writing the package manifest
pub struct ManifestMutator {
    path: PathBuf,
    notifier: Box<dyn ResolveNotifier>,
}

impl ManifestMutator {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            notifier: Box::new(NoopNotifier),
        }
    }

    /// Use `notifier` to request re-resolution after each write
    pub fn with_notifier(mut self, notifier: Box<dyn ResolveNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current manifest without modifying it
    pub fn load(&self) -> Result<PackageManifest> {
        PackageManifest::load(&self.path)
    }

    /// Load, transform and conditionally write the manifest
    ///
    /// `transform` receives the dependency map and the scoped registry list and
    /// returns whether it changed them. Errors never escape: they come back
    /// as [`MutationOutcome::Failed`].
    pub fn modify<F>(&self, transform: F) -> MutationOutcome
    where
        F: FnOnce(&mut Dependencies, &mut Vec<ScopedRegistry>) -> bool,
    {
        let mut manifest = match self.load() {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot load package manifest");
                return MutationOutcome::Failed(e.to_string());
            }
        };

        let had_registries = manifest.scoped_registries.is_some();
        let mut registries = manifest.scoped_registries.take().unwrap_or_default();

        if !transform(&mut manifest.dependencies, &mut registries) {
            tracing::debug!(path = %self.path.display(), "manifest already up to date");
            return MutationOutcome::Unchanged;
        }

        manifest.scoped_registries = if registries.is_empty() && !had_registries {
            None
        } else {
            Some(registries)
        };

        if let Err(e) = manifest.save(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "cannot write package manifest");
            return MutationOutcome::Failed(e.to_string());
        }
        tracing::info!(path = %self.path.display(), "package manifest updated");

        if let Err(e) = self.notifier.request_resolve() {
            tracing::warn!(error = %e, "package re-resolution request failed");
        }

        MutationOutcome::Applied
    }

    pub fn add_or_update_scoped_registry(
        &self,
        name: &str,
        url: &str,
        scopes: &[&str],
    ) -> MutationOutcome {
        self.modify(|_, registries| add_or_update_registry(registries, name, url, scopes))
    }

    pub fn add_dependencies(&self, entries: &[(&str, &str)]) -> MutationOutcome {
        self.modify(|dependencies, _| add_missing_dependencies(dependencies, entries))
    }

    pub fn remove_dependencies(&self, package_ids: &[&str]) -> MutationOutcome {
        self.modify(|dependencies, _| remove_dependency_keys(dependencies, package_ids))
    }

    pub fn remove_scope_from_registry(&self, url: &str, scope: &str) -> MutationOutcome {
        self.modify(|_, registries| remove_registry_scope(registries, url, scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
  "dependencies": {
    "com.unity.ugui": "1.0.0",
    "com.gameanalytics.sdk": "7.9.0"
  },
  "scopedRegistries": [
    {
      "name": "package.openupm.com",
      "url": "https://package.openupm.com",
      "scopes": ["com.gameanalytics"]
    }
  ],
  "testables": ["com.example.tests"]
}"#;

    fn write_manifest(content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    struct CountingNotifier(Rc<Cell<u32>>);

    impl ResolveNotifier for CountingNotifier {
        fn request_resolve(&self) -> Result<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn test_parse_keeps_unknown_keys() {
        let manifest = PackageManifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.registries().len(), 1);
        assert!(manifest.extra.contains_key("testables"));

        let json = manifest.to_json_string().unwrap();
        let reparsed = PackageManifest::parse(&json).unwrap();
        assert_eq!(reparsed, manifest);
    }

    #[test]
    fn test_manifest_without_registries_serializes_without_key() {
        let manifest = PackageManifest::parse(r#"{"dependencies": {}}"#).unwrap();
        assert!(manifest.scoped_registries.is_none());
        assert!(!manifest.to_json_string().unwrap().contains("scopedRegistries"));
    }

    #[test]
    fn test_scope_covers() {
        assert!(scope_covers("com.google.firebase", "com.google.firebase"));
        assert!(scope_covers("com.google", "com.google.firebase"));
        assert!(!scope_covers("com.goo", "com.google.firebase"));
        assert!(!scope_covers("com.google.firebase.app", "com.google.firebase"));
    }

    #[test]
    fn test_urls_match() {
        assert!(urls_match("https://package.openupm.com", "https://package.openupm.com/"));
        assert!(urls_match("HTTPS://Package.OpenUPM.com", "https://package.openupm.com"));
        assert!(!urls_match("https://package.openupm.com", "https://unity.packages.applovin.com/"));
    }

    #[test]
    fn test_conflicting_scopes() {
        let mut manifest = PackageManifest::parse(SAMPLE).unwrap();
        manifest.scoped_registries.as_mut().unwrap().push(ScopedRegistry::new(
            "other",
            "https://example.com",
            &["com.gameanalytics", "com.example"],
        ));
        let conflicts = manifest.conflicting_scopes();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts["com.gameanalytics"].len(), 2);
    }

    #[test]
    fn test_add_or_update_registry_is_idempotent() {
        let mut registries = Vec::new();
        assert!(add_or_update_registry(&mut registries, "r", "https://r.io", &["a", "b"]));
        assert!(!add_or_update_registry(&mut registries, "r", "https://r.io/", &["a", "b"]));
        assert!(add_or_update_registry(&mut registries, "r", "https://r.io", &["c"]));
        assert_eq!(registries.len(), 1);
        assert_eq!(registries[0].scopes, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_add_missing_dependencies_never_overwrites() {
        let mut deps = Dependencies::new();
        deps.insert("com.a".to_string(), "2.0.0-local".into());
        assert!(add_missing_dependencies(&mut deps, &[("com.a", "1.0.0"), ("com.b", "1.0.0")]));
        assert_eq!(deps["com.a"], "2.0.0-local");
        assert!(!add_missing_dependencies(&mut deps, &[("com.b", "9.9.9")]));
    }

    #[test]
    fn test_writes_keep_dependency_order() {
        let (_dir, path) = write_manifest(
            r#"{ "dependencies": { "z.pkg": "1.0.0", "m.pkg": "1.0.0", "a.pkg": "1.0.0" } }"#,
        );
        let mutator = ManifestMutator::new(&path);

        assert!(mutator.add_dependencies(&[("b.pkg", "2.0.0")]).changed());
        assert!(mutator.remove_dependencies(&["m.pkg"]).changed());

        let manifest = PackageManifest::load(&path).unwrap();
        let keys: Vec<&str> = manifest.dependencies.keys().map(String::as_str).collect();
        assert_eq!(keys, ["z.pkg", "a.pkg", "b.pkg"]);
        assert_eq!(manifest.dependency("b.pkg"), Some("2.0.0"));
    }

    #[test]
    fn test_modify_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let mutator = ManifestMutator::new(dir.path().join("manifest.json"));
        let outcome = mutator.modify(|_, _| true);
        assert!(outcome.is_failed());
        assert!(!outcome.changed());
    }

    #[test]
    fn test_modify_unparseable_file_fails_without_write() {
        let (_dir, path) = write_manifest("{ not json");
        let mutator = ManifestMutator::new(&path);
        assert!(mutator.add_dependencies(&[("com.a", "1.0.0")]).is_failed());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_modify_declined_does_not_write_or_notify() {
        let (_dir, path) = write_manifest(SAMPLE);
        let calls = Rc::new(Cell::new(0));
        let mutator =
            ManifestMutator::new(&path).with_notifier(Box::new(CountingNotifier(calls.clone())));

        assert_eq!(mutator.modify(|_, _| false), MutationOutcome::Unchanged);
        assert_eq!(fs::read_to_string(&path).unwrap(), SAMPLE);
        assert_eq!(calls.get(), 0);

        assert!(mutator.add_dependencies(&[("com.a", "1.0.0")]).changed());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_add_registry_to_manifest_without_registries() {
        let (_dir, path) = write_manifest(r#"{"dependencies": {"com.unity.ugui": "1.0.0"}}"#);
        let mutator = ManifestMutator::new(&path);

        let outcome = mutator.add_or_update_scoped_registry("Example", "https://example.com", &["com.example"]);
        assert_eq!(outcome, MutationOutcome::Applied);

        let manifest = PackageManifest::load(&path).unwrap();
        assert_eq!(manifest.registries().len(), 1);
        assert_eq!(manifest.registries()[0].url, "https://example.com");
        assert!(manifest.registries()[0].scopes.contains(&"com.example".to_string()));
    }

    #[test]
    fn test_add_then_remove_restores_dependencies() {
        let (_dir, path) = write_manifest(SAMPLE);
        let mutator = ManifestMutator::new(&path);
        let before = PackageManifest::load(&path).unwrap();

        assert!(mutator.add_dependencies(&[("com.adjust.sdk", "https://x.git#5.0.3")]).changed());
        assert!(mutator.remove_dependencies(&["com.adjust.sdk"]).changed());

        let after = PackageManifest::load(&path).unwrap();
        assert_eq!(after.dependencies, before.dependencies);
        assert_eq!(after.extra, before.extra);
        assert_eq!(mutator.remove_dependencies(&["com.adjust.sdk"]), MutationOutcome::Unchanged);
    }

    #[test]
    fn test_remove_scope_from_registry() {
        let (_dir, path) = write_manifest(SAMPLE);
        let mutator = ManifestMutator::new(&path);

        assert!(mutator
            .remove_scope_from_registry("https://package.openupm.com/", "com.gameanalytics")
            .changed());
        assert_eq!(
            mutator.remove_scope_from_registry("https://package.openupm.com", "com.gameanalytics"),
            MutationOutcome::Unchanged
        );
        assert_eq!(
            mutator.remove_scope_from_registry("https://nowhere.example", "com.gameanalytics"),
            MutationOutcome::Unchanged
        );

        let manifest = PackageManifest::load(&path).unwrap();
        assert!(manifest.registries()[0].scopes.is_empty());
    }
}
