//! Detecting whether an SDK's code is present in the project
//!
//! SDKs are sometimes imported as loose plugins instead of packages, so a
//! missing manifest entry does not prove the SDK is gone. A
//! [`CapabilityProbe`] answers that question from whatever evidence it has.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Answers "is code matching any of these signatures loaded?"
pub trait CapabilityProbe {
    fn is_loaded(&self, signature: &[&str]) -> bool;
}

/// Never reports anything as loaded
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProbe;

impl CapabilityProbe for NullProbe {
    fn is_loaded(&self, _signature: &[&str]) -> bool {
        false
    }
}

/// Directories scanned for assemblies, relative to the project root
const SCAN_ROOTS: &[&str] = &["Assets", "Library/ScriptAssemblies"];

/// Extensions of files whose stem names an assembly
const ASSEMBLY_EXTENSIONS: &[&str] = &["dll", "asmdef"];

/// Probe that looks for assembly files by name
///
/// The project tree is scanned once on construction; a signature matches when
/// any `.dll` or `.asmdef` file stem contains it.
#[derive(Debug, Clone, Default)]
pub struct AssemblyScanProbe {
    assemblies: BTreeSet<String>,
}

impl AssemblyScanProbe {
    pub fn scan<P: AsRef<Path>>(project_dir: P) -> Self {
        let roots: Vec<PathBuf> = SCAN_ROOTS
            .iter()
            .map(|root| project_dir.as_ref().join(root))
            .collect();
        Self::scan_roots(&roots)
    }

    pub fn scan_roots(roots: &[PathBuf]) -> Self {
        let mut assemblies = BTreeSet::new();

        for root in roots.iter().filter(|r| r.exists()) {
            for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
                if !entry.file_type().is_file() {
                    continue;
                }
                let path = entry.path();
                let is_assembly = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| ASSEMBLY_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
                    .unwrap_or(false);
                if !is_assembly {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    assemblies.insert(stem.to_string());
                }
            }
        }

        tracing::debug!(count = assemblies.len(), "scanned project assemblies");
        Self { assemblies }
    }

    /// Build a probe from known assembly names
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            assemblies: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl CapabilityProbe for AssemblyScanProbe {
    fn is_loaded(&self, signature: &[&str]) -> bool {
        signature.iter().any(|needle| {
            !needle.is_empty() && self.assemblies.iter().any(|name| name.contains(needle))
        })
    }
}
