use std::path::Path;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The declarative manifest pinning which tools a machine should carry.
///
/// YAML on disk. `nestPath` optionally overrides the store root; the key
/// name is kept for compatibility with existing manifest files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nest_path: Option<String>,
    #[serde(default)]
    pub targets: Vec<Target>,
}

/// One declared tool. The bare-string form is a legacy zip spelling:
/// read-only, always normalized to [`Target::Zip`] on rewrite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Repository(RepositoryTarget),
    Zip(ZipTarget),
    DeprecatedZip(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryTarget {
    pub reference: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZipTarget {
    #[serde(rename = "zipURL")]
    pub zip_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl Manifest {
    pub fn new() -> Manifest {
        Manifest {
            nest_path: None,
            targets: Vec::new(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Manifest> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("could not read manifest {}", path.as_ref().display()))?;
        serde_yaml_ng::from_str(&content)
            .with_context(|| format!("could not parse manifest {}", path.as_ref().display()))
    }

    /// Saves as YAML, normalizing legacy bare-string targets first.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let normalized = self.normalized();
        let content = serde_yaml_ng::to_string(&normalized)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("could not write manifest {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Rewrites deprecated bare-string zip targets to the structured
    /// form; everything else is untouched.
    pub fn normalized(&self) -> Manifest {
        Manifest {
            nest_path: self.nest_path.clone(),
            targets: self
                .targets
                .iter()
                .map(|target| match target {
                    Target::DeprecatedZip(url) => Target::Zip(ZipTarget {
                        zip_url: url.clone(),
                        checksum: None,
                    }),
                    other => other.clone(),
                })
                .collect(),
        }
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const MANIFEST_YAML: &str = r#"
nestPath: ./store
targets:
  - reference: owner/repo
    version: 1.0.0
    assetName: foo.artifactbundle.zip
    checksum: abc123
  - zipURL: https://example.com/tool.artifactbundle.zip
  - https://example.com/legacy.zip
"#;

    #[test]
    fn test_parses_all_target_forms() {
        let manifest: Manifest = serde_yaml_ng::from_str(MANIFEST_YAML).unwrap();
        assert_eq!(manifest.nest_path.as_deref(), Some("./store"));
        assert_eq!(manifest.targets.len(), 3);
        assert!(matches!(manifest.targets[0], Target::Repository(_)));
        assert!(matches!(manifest.targets[1], Target::Zip(_)));
        assert!(matches!(manifest.targets[2], Target::DeprecatedZip(_)));
    }

    #[test]
    fn test_save_normalizes_deprecated_zip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.yaml");
        let manifest: Manifest = serde_yaml_ng::from_str(MANIFEST_YAML).unwrap();
        manifest.save(&path).unwrap();

        let reloaded = Manifest::load(&path).unwrap();
        assert_eq!(
            reloaded.targets[2],
            Target::Zip(ZipTarget {
                zip_url: "https://example.com/legacy.zip".to_string(),
                checksum: None,
            })
        );
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.yaml");
        let mut manifest = Manifest::new();
        manifest.targets.push(Target::Repository(RepositoryTarget {
            reference: "owner/repo".to_string(),
            version: Some("1.0.0".to_string()),
            asset_name: None,
            checksum: None,
        }));
        manifest.save(&path).unwrap();
        assert_eq!(Manifest::load(&path).unwrap(), manifest);
    }
}
