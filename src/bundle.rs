//! Artifact bundle manifests.
//!
//! A bundle is a directory (conventionally shipped zipped) carrying an
//! `info.json` manifest: a schema version plus a map of artifact name to
//! version, type and per-platform variants with relative binary paths.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::Deserialize;
use walkdir::WalkDir;

pub const BUNDLE_MANIFEST_FILE: &str = "info.json";
pub const BUNDLE_DIR_EXTENSION: &str = "artifactbundle";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    pub schema_version: String,
    pub artifacts: BTreeMap<String, BundleArtifact>,
}

#[derive(Debug, Deserialize)]
pub struct BundleArtifact {
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub variants: Vec<ArtifactVariant>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVariant {
    pub path: String,
    #[serde(default)]
    pub supported_triples: Vec<String>,
}

/// A binary selected out of a bundle for the current platform.
#[derive(Debug, Clone)]
pub struct BundleBinary {
    pub artifact_name: String,
    pub artifact_version: String,
    /// Absolute path inside the unpacked bundle.
    pub binary_path: PathBuf,
}

/// Finds artifact bundle directories below `root`: any directory with an
/// `.artifactbundle` extension, or `root` itself when it carries a
/// manifest directly.
pub fn find_bundle_dirs(root: &Path) -> Vec<PathBuf> {
    if root.join(BUNDLE_MANIFEST_FILE).is_file() {
        return vec![root.to_path_buf()];
    }
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_dir()
                && entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == BUNDLE_DIR_EXTENSION)
        })
        .map(|entry| entry.into_path())
        .collect()
}

pub fn load_manifest(bundle_dir: &Path) -> Result<BundleManifest> {
    let path = bundle_dir.join(BUNDLE_MANIFEST_FILE);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("could not read bundle manifest {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("could not parse bundle manifest {}", path.display()))
}

/// Picks, per executable artifact, the variant whose supported-triple
/// list contains the exact current triple. No fuzzy matching: a bundle
/// with no exact variant contributes nothing.
pub fn select_binaries(
    bundle_dir: &Path,
    manifest: &BundleManifest,
    triple: &str,
) -> Vec<BundleBinary> {
    manifest
        .artifacts
        .iter()
        .filter(|(_, artifact)| artifact.kind == "executable")
        .filter_map(|(name, artifact)| {
            artifact
                .variants
                .iter()
                .find(|variant| variant.supported_triples.iter().any(|t| t == triple))
                .map(|variant| BundleBinary {
                    artifact_name: name.clone(),
                    artifact_version: artifact.version.clone(),
                    binary_path: bundle_dir.join(&variant.path),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MANIFEST: &str = r#"{
        "schemaVersion": "1.0",
        "artifacts": {
            "foo": {
                "version": "1.0.0",
                "type": "executable",
                "variants": [
                    {
                        "path": "foo-1.0.0-x86_64-unknown-linux-gnu/bin/foo",
                        "supportedTriples": ["x86_64-unknown-linux-gnu"]
                    },
                    {
                        "path": "foo-1.0.0-arm64-apple-macosx/bin/foo",
                        "supportedTriples": ["arm64-apple-macosx"]
                    }
                ]
            }
        }
    }"#;

    #[test]
    fn test_load_and_select_exact_triple() {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("foo.artifactbundle");
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(bundle.join(BUNDLE_MANIFEST_FILE), MANIFEST).unwrap();

        let manifest = load_manifest(&bundle).unwrap();
        assert_eq!(manifest.schema_version, "1.0");

        let selected = select_binaries(&bundle, &manifest, "x86_64-unknown-linux-gnu");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].artifact_name, "foo");
        assert!(selected[0]
            .binary_path
            .ends_with("foo-1.0.0-x86_64-unknown-linux-gnu/bin/foo"));

        assert!(select_binaries(&bundle, &manifest, "riscv64-unknown-linux-gnu").is_empty());
    }

    #[test]
    fn test_find_bundle_dirs() {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("unpacked").join("foo.artifactbundle");
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(bundle.join(BUNDLE_MANIFEST_FILE), MANIFEST).unwrap();

        let found = find_bundle_dirs(dir.path());
        assert_eq!(found, vec![bundle.clone()]);

        // A root that is itself a bundle is returned directly.
        let found = find_bundle_dirs(&bundle);
        assert_eq!(found, vec![bundle]);
    }
}
