//! The install engine: copies binaries and their resources into the
//! store, keeps the registry in step, and manages the shared-bin
//! symlinks with resource-conflict detection.
//!
//! Copy and link are individually idempotent, so a failure between them
//! leaves recoverable state that a retry repairs. The conflict check
//! always runs before any symlink is touched.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use crate::config::Config;
use crate::layout;
use crate::manufacturer::Manufacturer;
use crate::registry::{CommandRecord, Registry};

/// Extensions marking sibling entries of a binary as resource bundles
/// that must travel with it into the store and the shared bin dir.
pub const RESOURCE_EXTENSIONS: &[&str] = &["bundle", "resources"];

/// A binary ready to be installed: where it currently lives, what it is
/// called, and where it came from. Transient; never persisted directly.
#[derive(Debug, Clone)]
pub struct ExecutableBinary {
    pub command_name: String,
    /// Absolute path of the source binary (unpacked bundle or build
    /// products directory).
    pub binary_path: PathBuf,
    pub version: String,
    pub manufacturer: Manufacturer,
}

#[derive(Debug, Clone)]
pub struct ResourceConflict {
    pub command: String,
    pub resources: Vec<String>,
}

#[derive(Debug, Error)]
pub enum InstallError {
    /// Two linked commands may never place the same resource basename in
    /// the shared bin directory. Fatal; no partial link is applied.
    #[error("resource conflict with {}", describe_conflicts(.conflicts))]
    ResourceConflict { conflicts: Vec<ResourceConflict> },
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn describe_conflicts(conflicts: &[ResourceConflict]) -> String {
    conflicts
        .iter()
        .map(|c| format!("`{}` (overlapping: {})", c.command, c.resources.join(", ")))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct Installer<'a> {
    config: &'a Config,
}

impl<'a> Installer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Installer { config }
    }

    /// Installs a binary: copy into the store, record in the registry,
    /// then re-point the shared-bin symlinks at the fresh copy.
    ///
    /// Identical (command, version, manufacturer, content) installs are
    /// idempotent: the store path is a pure function of the input and
    /// the registry dedupes by path equality.
    pub fn install(&self, binary: &ExecutableBinary) -> Result<CommandRecord, InstallError> {
        let rel_dir = layout::binary_dir(&binary.manufacturer, &binary.version);
        let target_dir = self.config.resolve(&rel_dir);
        fs::create_dir_all(&target_dir)?;

        let resources = discover_resources(&binary.binary_path)?;
        let basenames: BTreeSet<String> = resources
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect();
        self.check_conflicts(&binary.command_name, &basenames)?;

        let stored_binary = target_dir.join(&binary.command_name);
        overwrite_copy(&binary.binary_path, &stored_binary)?;
        let mut stored_resources = Vec::new();
        for resource in &resources {
            let name = resource
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let dest = target_dir.join(&name);
            overwrite_copy(resource, &dest)?;
            stored_resources.push((name, dest));
        }

        let record = CommandRecord {
            version: binary.version.clone(),
            binary_path: rel_to_string(&rel_dir.join(&binary.command_name)),
            resource_paths: stored_resources
                .iter()
                .map(|(name, _)| rel_to_string(&rel_dir.join(name)))
                .collect(),
            manufacturer: binary.manufacturer.clone(),
        };
        let mut registry = Registry::load(self.config.registry_path())?;
        registry.add(&binary.command_name, record.clone());
        registry.save(self.config.registry_path())?;

        self.relink(&binary.command_name, &stored_binary, &stored_resources)?;
        log::debug!(
            "installed {} {} -> {}",
            binary.command_name,
            binary.version,
            record.binary_path
        );
        Ok(record)
    }

    /// Switches the shared-bin symlinks to an already-stored binary
    /// without copying, subject to the same conflict check as install.
    pub fn link(&self, name: &str, record: &CommandRecord) -> Result<(), InstallError> {
        let binary = self.config.resolve(&record.binary_path);
        if !binary.exists() {
            return Err(InstallError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("stored binary missing: {}", binary.display()),
            )));
        }
        let basenames: BTreeSet<String> = record.resource_basenames().into_iter().collect();
        self.check_conflicts(name, &basenames)?;
        let resources: Vec<(String, PathBuf)> = record
            .resource_paths
            .iter()
            .filter_map(|rel| {
                rel.rsplit('/')
                    .next()
                    .map(|base| (base.to_string(), self.config.resolve(rel)))
            })
            .collect();
        self.relink(name, &binary, &resources)
    }

    /// Removes every record of `name` at exactly `version`: shared-bin
    /// symlinks for linked records, the stored binary, resources no
    /// surviving record references, and any now-empty ancestor
    /// directories below the artifacts root. Absent command/version is
    /// a no-op.
    pub fn uninstall(&self, name: &str, version: &str) -> Result<(), InstallError> {
        let mut registry = Registry::load(self.config.registry_path())?;
        let records: Vec<CommandRecord> = registry
            .records(name)
            .iter()
            .filter(|r| r.version == version)
            .cloned()
            .collect();
        if records.is_empty() {
            return Ok(());
        }

        for record in &records {
            if self.is_linked(name, record) {
                remove_if_exists(&self.config.bin_dir().join(name))?;
                for base in record.resource_basenames() {
                    remove_if_exists(&self.config.bin_dir().join(base))?;
                }
            }

            let binary = self.config.resolve(&record.binary_path);
            remove_if_exists(&binary)?;
            for rel in &record.resource_paths {
                if !registry.resource_still_referenced(rel, name, version) {
                    remove_if_exists(&self.config.resolve(rel))?;
                }
            }
            if let Some(dir) = binary.parent() {
                self.prune_empty_dirs(dir)?;
            }
        }

        registry.remove(name, version);
        registry.save(self.config.registry_path())?;
        log::debug!("uninstalled {name} {version}");
        Ok(())
    }

    /// Whether the shared-bin symlink for a record's command currently
    /// resolves to that record's stored path. Always recomputed from the
    /// filesystem; a cached flag could drift from symlink truth.
    pub fn is_linked(&self, name: &str, record: &CommandRecord) -> bool {
        let link = self.config.bin_dir().join(name);
        match fs::read_link(&link) {
            Ok(target) => target == self.config.resolve(&record.binary_path),
            Err(_) => false,
        }
    }

    /// The currently selected record for a command, if any.
    pub fn linked_record<'r>(
        &self,
        name: &str,
        records: &'r [CommandRecord],
    ) -> Option<&'r CommandRecord> {
        records.iter().find(|r| self.is_linked(name, r))
    }

    /// Fails when any *other* currently linked command would share a
    /// resource basename with the incoming set. Reports every
    /// conflicting command together with the overlapping names.
    fn check_conflicts(
        &self,
        command_name: &str,
        incoming: &BTreeSet<String>,
    ) -> Result<(), InstallError> {
        if incoming.is_empty() {
            return Ok(());
        }
        let registry = Registry::load(self.config.registry_path())?;
        let mut conflicts = Vec::new();
        for (name, records) in &registry.commands {
            if name == command_name {
                continue;
            }
            for record in records {
                if !self.is_linked(name, record) {
                    continue;
                }
                let overlap: Vec<String> = record
                    .resource_basenames()
                    .into_iter()
                    .filter(|base| incoming.contains(base))
                    .collect();
                if !overlap.is_empty() {
                    conflicts.push(ResourceConflict {
                        command: name.clone(),
                        resources: overlap,
                    });
                }
            }
        }
        if conflicts.is_empty() {
            Ok(())
        } else {
            Err(InstallError::ResourceConflict { conflicts })
        }
    }

    fn relink(
        &self,
        name: &str,
        binary: &Path,
        resources: &[(String, PathBuf)],
    ) -> Result<(), InstallError> {
        let bin_dir = self.config.bin_dir();
        fs::create_dir_all(&bin_dir)?;
        replace_symlink(&bin_dir.join(name), binary)?;
        for (base, target) in resources {
            replace_symlink(&bin_dir.join(base), target)?;
        }
        Ok(())
    }

    /// Removes empty directories upward from `dir`, stopping before the
    /// artifacts root.
    fn prune_empty_dirs(&self, dir: &Path) -> io::Result<()> {
        let root = self.config.artifacts_dir();
        let mut current = dir.to_path_buf();
        while current != root && current.starts_with(&root) {
            if !current.exists() {
                // already gone; keep walking up
            } else if fs::read_dir(&current)?.next().is_some() {
                break;
            } else {
                fs::remove_dir(&current)?;
            }
            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => break,
            }
        }
        Ok(())
    }
}

/// Sibling entries of the source binary carrying a resource-bundle
/// extension, excluding the binary itself. Sorted for determinism.
pub fn discover_resources(binary: &Path) -> io::Result<Vec<PathBuf>> {
    let Some(parent) = binary.parent() else {
        return Ok(Vec::new());
    };
    let mut resources = Vec::new();
    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        let path = entry.path();
        if path == binary {
            continue;
        }
        let is_resource = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| RESOURCE_EXTENSIONS.contains(&ext));
        if is_resource {
            resources.push(path);
        }
    }
    resources.sort();
    Ok(resources)
}

/// Registry-relative path string with `/` separators on every platform.
fn rel_to_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Overwrite, not merge: any pre-existing entry at `dest` is removed
/// before copying the file or directory.
fn overwrite_copy(src: &Path, dest: &Path) -> io::Result<()> {
    remove_if_exists(dest)?;
    if src.is_dir() {
        copy_dir(src, dest)
    } else {
        fs::copy(src, dest).map(|_| ())
    }
}

fn copy_dir(src: &Path, dest: &Path) -> io::Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) => {
            if meta.is_dir() {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn replace_symlink(link: &Path, target: &Path) -> io::Result<()> {
    remove_if_exists(link)?;
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link)
    }
    #[cfg(windows)]
    {
        if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        }
    }
}
