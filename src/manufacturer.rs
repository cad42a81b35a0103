use std::fmt;
use serde::{Deserialize, Serialize};

use crate::identity::RepositoryIdentity;

/// Repository and version an artifact bundle was published for. Absent
/// for bundles installed straight from a bare zip URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub repository: RepositoryIdentity,
    pub version: String,
}

/// Provenance of an installed binary.
///
/// A closed tagged union: either the binary came out of an artifact
/// bundle downloaded from a zip URL (optionally tied to the repository
/// release it was published from), or it was built locally from source.
/// Serializes as a single-key object (`artifactBundle` / `localBuild`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Manufacturer {
    #[serde(rename_all = "camelCase")]
    ArtifactBundle {
        #[serde(rename = "zipURL")]
        zip_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<SourceInfo>,
    },
    #[serde(rename_all = "camelCase")]
    LocalBuild {
        repository: RepositoryIdentity,
        version: String,
    },
}

impl Manufacturer {
    /// The source repository, when provenance records one.
    pub fn repository(&self) -> Option<&RepositoryIdentity> {
        match self {
            Manufacturer::ArtifactBundle { source, .. } => {
                source.as_ref().map(|s| &s.repository)
            }
            Manufacturer::LocalBuild { repository, .. } => Some(repository),
        }
    }

    pub fn is_local_build(&self) -> bool {
        matches!(self, Manufacturer::LocalBuild { .. })
    }
}

impl fmt::Display for Manufacturer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Manufacturer::ArtifactBundle { zip_url, source } => match source {
                Some(source) => write!(
                    f,
                    "artifact bundle ({}@{})",
                    source.repository.reference_name(),
                    source.version
                ),
                None => write!(f, "artifact bundle ({zip_url})"),
            },
            Manufacturer::LocalBuild {
                repository,
                version,
            } => write!(f, "local build ({}@{})", repository.reference_name(), version),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_single_key_object() {
        let repo = RepositoryIdentity::parse("owner/repo").unwrap();
        let bundle = Manufacturer::ArtifactBundle {
            zip_url: "https://example.com/foo.artifactbundle.zip".to_string(),
            source: Some(SourceInfo {
                repository: repo.clone(),
                version: "1.0.0".to_string(),
            }),
        };
        let json: serde_json::Value = serde_json::to_value(&bundle).unwrap();
        assert!(json.get("artifactBundle").is_some());
        assert_eq!(json.as_object().unwrap().len(), 1);

        let build = Manufacturer::LocalBuild {
            repository: repo,
            version: "1.0.0".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&build).unwrap();
        assert!(json.get("localBuild").is_some());
    }

    #[test]
    fn test_round_trips() {
        let m = Manufacturer::ArtifactBundle {
            zip_url: "https://example.com/foo.zip".to_string(),
            source: None,
        };
        let json = serde_json::to_string(&m).unwrap();
        let back: Manufacturer = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
