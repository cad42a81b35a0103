use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::identity::RepositoryIdentity;
use crate::manufacturer::Manufacturer;

pub const REGISTRY_SCHEMA_VERSION: &str = "1";

/// One installed binary for a command name.
///
/// `binary_path` and `resource_paths` are always relative to the
/// artifacts directory, so the registry stays portable when the store
/// root is relocated. Whether a record is the currently selected version
/// is never stored here; it is derived from the live symlink target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub version: String,
    pub binary_path: String,
    #[serde(default)]
    pub resource_paths: Vec<String>,
    pub manufacturer: Manufacturer,
}

impl CommandRecord {
    /// Basenames this record's resources occupy in the shared bin
    /// directory, used for conflict detection.
    pub fn resource_basenames(&self) -> Vec<String> {
        self.resource_paths
            .iter()
            .filter_map(|p| p.rsplit('/').next())
            .map(|s| s.to_string())
            .collect()
    }
}

/// The persisted registry: sole source of truth for what is installed.
///
/// Loaded fresh for every read-modify-write cycle; a missing or corrupt
/// backing file reads as an empty registry, while any other filesystem
/// error propagates unchanged. There is no cross-process locking;
/// concurrent invocations race with last-writer-wins semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    pub version: String,
    #[serde(default)]
    pub commands: BTreeMap<String, Vec<CommandRecord>>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry {
            version: REGISTRY_SCHEMA_VERSION.to_string(),
            commands: BTreeMap::new(),
        }
    }
}

impl Registry {
    pub fn load<P: AsRef<Path>>(path: P) -> std::io::Result<Registry> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Registry::default()),
            Err(e) => Err(e),
        }
    }

    /// UTF-8 JSON with sorted keys; pretty-printed only in debug builds.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let content = if cfg!(debug_assertions) {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
        .map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Upserts a record: replaces any record sharing the same binary
    /// path under that name, otherwise appends. The record list is kept
    /// sorted by version descending, lexicographically.
    pub fn add(&mut self, name: &str, record: CommandRecord) {
        let records = self.commands.entry(name.to_string()).or_default();
        match records.iter_mut().find(|r| r.binary_path == record.binary_path) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        sort_records(records);
    }

    /// Drops all records of the given version; removing the last record
    /// for a name deletes the name's key entirely.
    pub fn remove(&mut self, name: &str, version: &str) {
        if let Some(records) = self.commands.get_mut(name) {
            records.retain(|r| r.version != version);
            if records.is_empty() {
                self.commands.remove(name);
            }
        }
    }

    pub fn records(&self, name: &str) -> &[CommandRecord] {
        self.commands.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Finds installed records for a repository at an exact version.
    ///
    /// Tries the command key matching the repository's short name first
    /// (case-insensitive), then falls back to a linear scan over every
    /// record's own provenance. Both paths require matching provenance,
    /// so unrelated tools that happen to share a binary name are never
    /// confused.
    pub fn fetch_command(
        &self,
        identity: &RepositoryIdentity,
        version: &str,
    ) -> Vec<(String, CommandRecord)> {
        let short = identity.short_name();
        if let Some((name, records)) = self
            .commands
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(short))
        {
            let matched: Vec<(String, CommandRecord)> = records
                .iter()
                .filter(|r| r.version == version && record_matches(r, identity))
                .map(|r| (name.clone(), r.clone()))
                .collect();
            if !matched.is_empty() {
                return matched;
            }
        }
        self.commands
            .iter()
            .flat_map(|(name, records)| {
                records
                    .iter()
                    .filter(|r| r.version == version && record_matches(r, identity))
                    .map(|r| (name.clone(), r.clone()))
            })
            .collect()
    }

    /// True when any other surviving record still references the given
    /// stored resource path. Uninstall uses this to keep resources that
    /// sibling commands from the same bundle depend on.
    pub fn resource_still_referenced(
        &self,
        resource_path: &str,
        except_name: &str,
        except_version: &str,
    ) -> bool {
        self.commands.iter().any(|(name, records)| {
            records.iter().any(|r| {
                !(name == except_name && r.version == except_version)
                    && r.resource_paths.iter().any(|p| p == resource_path)
            })
        })
    }
}

fn record_matches(record: &CommandRecord, identity: &RepositoryIdentity) -> bool {
    record
        .manufacturer
        .repository()
        .is_some_and(|repo| repo.matches(identity))
}

/// Version-descending, plain string comparison. Deliberately not
/// semver-aware; existing stores depend on the current ordering.
fn sort_records(records: &mut [CommandRecord]) {
    records.sort_by(|a, b| b.version.cmp(&a.version));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manufacturer::SourceInfo;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn record(version: &str, binary_path: &str) -> CommandRecord {
        CommandRecord {
            version: version.to_string(),
            binary_path: binary_path.to_string(),
            resource_paths: vec![],
            manufacturer: Manufacturer::ArtifactBundle {
                zip_url: "https://example.com/foo.artifactbundle.zip".to_string(),
                source: Some(SourceInfo {
                    repository: RepositoryIdentity::parse("owner/repo").unwrap(),
                    version: version.to_string(),
                }),
            },
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let registry = Registry::load(dir.path().join("info.json")).unwrap();
        assert_eq!(registry.version, REGISTRY_SCHEMA_VERSION);
        assert!(registry.commands.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("info.json");
        fs::write(&path, "{not json").unwrap();
        let registry = Registry::load(&path).unwrap();
        assert!(registry.commands.is_empty());
    }

    #[test]
    fn test_load_propagates_read_errors() {
        // A directory at the registry path is an I/O failure, not a
        // missing file, and must not read as an empty registry.
        let dir = tempdir().unwrap();
        let path = dir.path().join("info.json");
        fs::create_dir(&path).unwrap();
        assert!(Registry::load(&path).is_err());
    }

    #[test]
    fn test_add_replaces_same_binary_path() {
        let mut registry = Registry::default();
        registry.add("foo", record("1.0.0", "slug/1.0.0/foo/foo"));
        registry.add("foo", record("1.0.0", "slug/1.0.0/foo/foo"));
        assert_eq!(registry.records("foo").len(), 1);
    }

    #[test]
    fn test_records_sorted_version_descending() {
        let mut registry = Registry::default();
        registry.add("foo", record("0.9.0", "slug/0.9.0/foo/foo"));
        registry.add("foo", record("1.0.0", "slug/1.0.0/foo/foo"));
        let versions: Vec<&str> = registry
            .records("foo")
            .iter()
            .map(|r| r.version.as_str())
            .collect();
        assert_eq!(versions, vec!["1.0.0", "0.9.0"]);
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        // Documented defect: string comparison puts "2.0.0" ahead of
        // "10.0.0". Pinned here so it cannot change silently.
        let mut registry = Registry::default();
        registry.add("foo", record("2.0.0", "slug/2.0.0/foo/foo"));
        registry.add("foo", record("10.0.0", "slug/10.0.0/foo/foo"));
        let versions: Vec<&str> = registry
            .records("foo")
            .iter()
            .map(|r| r.version.as_str())
            .collect();
        assert_eq!(versions, vec!["2.0.0", "10.0.0"]);
    }

    #[test]
    fn test_remove_last_record_drops_key() {
        let mut registry = Registry::default();
        registry.add("foo", record("1.0.0", "slug/1.0.0/foo/foo"));
        registry.remove("foo", "1.0.0");
        assert!(!registry.commands.contains_key("foo"));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut registry = Registry::default();
        registry.remove("foo", "1.0.0");
        assert!(registry.commands.is_empty());
    }

    #[test]
    fn test_fetch_command_by_short_name_key() {
        let mut registry = Registry::default();
        registry.add("repo", record("1.0.0", "slug/1.0.0/foo/repo"));
        let identity = RepositoryIdentity::parse("owner/repo").unwrap();
        let found = registry.fetch_command(&identity, "1.0.0");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "repo");
    }

    #[test]
    fn test_fetch_command_falls_back_to_provenance_scan() {
        // Command name differs from the repository short name.
        let mut registry = Registry::default();
        registry.add("foo", record("1.0.0", "slug/1.0.0/foo/foo"));
        let identity = RepositoryIdentity::parse("owner/repo").unwrap();
        let found = registry.fetch_command(&identity, "1.0.0");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "foo");
    }

    #[test]
    fn test_fetch_command_requires_exact_version() {
        let mut registry = Registry::default();
        registry.add("foo", record("1.0.0", "slug/1.0.0/foo/foo"));
        let identity = RepositoryIdentity::parse("owner/repo").unwrap();
        assert!(registry.fetch_command(&identity, "2.0.0").is_empty());
    }

    #[test]
    fn test_fetch_command_ignores_other_provenance() {
        let mut registry = Registry::default();
        registry.add("foo", record("1.0.0", "slug/1.0.0/foo/foo"));
        let other = RepositoryIdentity::parse("someone/else").unwrap();
        assert!(registry.fetch_command(&other, "1.0.0").is_empty());
    }

    #[test]
    fn test_round_trip_is_field_equal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("info.json");
        let mut registry = Registry::default();
        registry.add("b", record("1.0.0", "slug/1.0.0/foo/b"));
        registry.add("a", record("2.0.0", "slug/2.0.0/foo/a"));
        registry.save(&path).unwrap();
        let loaded = Registry::load(&path).unwrap();
        assert_eq!(registry, loaded);
    }

    #[test]
    fn test_serialized_shape() {
        let mut registry = Registry::default();
        registry.add("foo", record("1.0.0", "slug/1.0.0/foo/foo"));
        let json: serde_json::Value = serde_json::to_value(&registry).unwrap();
        assert_eq!(json["version"], "1");
        let rec = &json["commands"]["foo"][0];
        assert_eq!(rec["binaryPath"], "slug/1.0.0/foo/foo");
        assert!(rec["manufacturer"].get("artifactBundle").is_some());
    }
}
