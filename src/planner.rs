//! The resolution planner: decides how to satisfy a requested
//! (repository, version) by reusing an existing install, fetching an
//! artifact bundle from a release, or building from source, and drives
//! the install engine over whatever it prepared.
//!
//! Fallback policy: anything that makes the bundle path unusable
//! (missing release, no candidate asset, no variant for this platform,
//! even an unexpected download failure) is logged and falls through to
//! the source build. Only a checksum mismatch is fatal on that path;
//! nothing is ever dropped silently.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

use crate::archive::{self, ArchiveError};
use crate::bundle;
use crate::config::Config;
use crate::github::{FetchError, ReleaseAsset, ReleaseClient, VersionSelector};
use crate::identity::{sanitize, RepositoryIdentity};
use crate::installer::{ExecutableBinary, InstallError, Installer};
use crate::manufacturer::{Manufacturer, SourceInfo};
use crate::registry::Registry;
use crate::source_build::{BuildError, SourceBuilder};

/// What to do about a downloaded asset's checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChecksumPolicy {
    Skip,
    /// Mismatch is fatal; no fallback.
    Expect(String),
    /// No expected value: compute and surface the actual checksum
    /// without failing.
    Report,
}

/// A binary the planner settled on, plus whether it was resolved from
/// the registry rather than freshly fetched or built.
#[derive(Debug, Clone)]
pub struct PreparedBinary {
    pub binary: ExecutableBinary,
    pub already_installed: bool,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no candidate artifact bundle asset for {reference}")]
    NoCandidateAsset { reference: String },
    #[error("no bundle variant supports the current platform ({triple})")]
    UnsupportedTriple { triple: String },
    #[error("version {version} is already installed")]
    AlreadyInstalled { version: String },
    #[error("checksum mismatch: expected {expected}, actual {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Bundle(#[from] anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct Planner<'a> {
    config: &'a Config,
    client: &'a dyn ReleaseClient,
    builder: &'a dyn SourceBuilder,
    triple: String,
    scratch: TempDir,
}

impl<'a> Planner<'a> {
    pub fn new(
        config: &'a Config,
        client: &'a dyn ReleaseClient,
        builder: &'a dyn SourceBuilder,
        triple: String,
    ) -> std::io::Result<Self> {
        Ok(Planner {
            config,
            client,
            builder,
            triple,
            scratch: TempDir::new()?,
        })
    }

    /// Resolves a repository request into binaries ready to install.
    ///
    /// A concrete requested version already present in the registry
    /// short-circuits before any collaborator call. SSH references have
    /// no addressable HTTP asset URL and go straight to the source
    /// build.
    pub fn fetch_or_build(
        &self,
        identity: &RepositoryIdentity,
        selector: &VersionSelector,
        asset_hint: Option<&str>,
        checksum: &ChecksumPolicy,
    ) -> Result<Vec<PreparedBinary>, PlanError> {
        if let Some(version) = selector.tag() {
            if let Some(found) = self.resolve_installed(identity, version)? {
                log::info!("{} {version} already installed", identity.reference_name());
                return Ok(found);
            }
        }

        if !identity.is_ssh() {
            match self.fetch_bundle(identity, selector, asset_hint, checksum) {
                Ok(prepared) => return Ok(prepared),
                Err(e @ PlanError::ChecksumMismatch { .. }) => return Err(e),
                Err(
                    e @ (PlanError::Fetch(FetchError::NotFound { .. })
                    | PlanError::NoCandidateAsset { .. }
                    | PlanError::UnsupportedTriple { .. }),
                ) => {
                    log::info!(
                        "{}: {e}; building from source instead",
                        identity.reference_name()
                    );
                }
                Err(e) => {
                    log::warn!(
                        "could not fetch artifact bundle for {}: {e}; building from source instead",
                        identity.reference_name()
                    );
                }
            }
        }

        match self.build_from_source(identity, selector) {
            Ok(prepared) => Ok(prepared),
            Err(PlanError::AlreadyInstalled { version }) => {
                log::info!("{} {version} already installed", identity.reference_name());
                match self.resolve_installed(identity, &version)? {
                    Some(found) => Ok(found),
                    // The records vanished between registry loads
                    // (concurrent uninstall); surface the state instead
                    // of returning an empty plan.
                    None => Err(PlanError::AlreadyInstalled { version }),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Installs straight from a bare bundle zip URL, with no repository
    /// provenance attached.
    pub fn fetch_zip(
        &self,
        zip_url: &str,
        checksum: &ChecksumPolicy,
    ) -> Result<Vec<PreparedBinary>, PlanError> {
        let scratch = self.scratch_dir(&sanitize(zip_url))?;
        let zip_path = self.client.download(zip_url, &scratch)?;
        self.verify_checksum(&zip_path, checksum)?;
        let manufacturer = Manufacturer::ArtifactBundle {
            zip_url: zip_url.to_string(),
            source: None,
        };
        let binaries =
            self.extract_binaries(&zip_path, &scratch.join("unpacked"), &manufacturer, None)?;
        Ok(binaries
            .into_iter()
            .map(|binary| PreparedBinary {
                binary,
                already_installed: false,
            })
            .collect())
    }

    /// Runs the full plan-then-install pipeline for one repository
    /// request, logging each binary's outcome.
    pub fn install_binaries(
        &self,
        installer: &Installer,
        identity: &RepositoryIdentity,
        selector: &VersionSelector,
        asset_hint: Option<&str>,
        checksum: &ChecksumPolicy,
    ) -> Result<(), PlanError> {
        let prepared = self.fetch_or_build(identity, selector, asset_hint, checksum)?;
        self.install_prepared(installer, prepared)
    }

    pub fn install_zip(
        &self,
        installer: &Installer,
        zip_url: &str,
        checksum: &ChecksumPolicy,
    ) -> Result<(), PlanError> {
        let prepared = self.fetch_zip(zip_url, checksum)?;
        self.install_prepared(installer, prepared)
    }

    fn install_prepared(
        &self,
        installer: &Installer,
        prepared: Vec<PreparedBinary>,
    ) -> Result<(), PlanError> {
        for item in prepared {
            if item.already_installed {
                log::info!(
                    "{} {} is already installed, skipping",
                    item.binary.command_name,
                    item.binary.version
                );
            } else {
                installer.install(&item.binary)?;
                log::info!(
                    "installed {} {}",
                    item.binary.command_name,
                    item.binary.version
                );
            }
        }
        Ok(())
    }

    /// Existing registry records for this identity and exact version,
    /// mapped back to their stored binaries.
    fn resolve_installed(
        &self,
        identity: &RepositoryIdentity,
        version: &str,
    ) -> Result<Option<Vec<PreparedBinary>>, PlanError> {
        let registry = Registry::load(self.config.registry_path())?;
        let matched = registry.fetch_command(identity, version);
        if matched.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            matched
                .into_iter()
                .map(|(name, record)| PreparedBinary {
                    binary: ExecutableBinary {
                        command_name: name,
                        binary_path: self.config.resolve(&record.binary_path),
                        version: record.version.clone(),
                        manufacturer: record.manufacturer,
                    },
                    already_installed: true,
                })
                .collect(),
        ))
    }

    fn fetch_bundle(
        &self,
        identity: &RepositoryIdentity,
        selector: &VersionSelector,
        asset_hint: Option<&str>,
        checksum: &ChecksumPolicy,
    ) -> Result<Vec<PreparedBinary>, PlanError> {
        let release = self.client.fetch_release(identity, selector)?;
        if let Some(found) = self.resolve_installed(identity, &release.tag)? {
            log::info!(
                "{} {} already installed",
                identity.reference_name(),
                release.tag
            );
            return Ok(found);
        }
        let asset = select_asset(&release.assets, asset_hint, &identity.reference_name())?;
        let scratch = self.scratch_dir(&format!("{}_{}", identity.slug(), sanitize(&release.tag)))?;
        let zip_path = self.client.download(&asset.download_url, &scratch)?;
        self.verify_checksum(&zip_path, checksum)?;
        let manufacturer = Manufacturer::ArtifactBundle {
            zip_url: asset.download_url.clone(),
            source: Some(SourceInfo {
                repository: identity.clone(),
                version: release.tag.clone(),
            }),
        };
        let binaries = self.extract_binaries(
            &zip_path,
            &scratch.join("unpacked"),
            &manufacturer,
            Some(&release.tag),
        )?;
        Ok(binaries
            .into_iter()
            .map(|binary| PreparedBinary {
                binary,
                already_installed: false,
            })
            .collect())
    }

    fn build_from_source(
        &self,
        identity: &RepositoryIdentity,
        selector: &VersionSelector,
    ) -> Result<Vec<PreparedBinary>, PlanError> {
        let (tag, version) = match selector {
            VersionSelector::Tag(tag) => (Some(tag.clone()), tag.clone()),
            VersionSelector::Latest => match self.client.fetch_release(identity, selector) {
                Ok(release) => (Some(release.tag.clone()), release.tag),
                Err(FetchError::NotFound { .. }) => {
                    log::info!(
                        "{} has no releases, building the default branch",
                        identity.reference_name()
                    );
                    (None, "latest".to_string())
                }
                Err(e) => return Err(e.into()),
            },
        };

        let registry = Registry::load(self.config.registry_path())?;
        if !registry.fetch_command(identity, &version).is_empty() {
            return Err(PlanError::AlreadyInstalled { version });
        }

        let checkout = self.scratch_dir(&format!("{}_src_{}", identity.slug(), sanitize(&version)))?;
        self.builder.clone_repository(identity, tag.as_deref(), &checkout)?;
        let executables = self.builder.build_release(&checkout)?;
        Ok(executables
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_string_lossy().to_string();
                Some(PreparedBinary {
                    binary: ExecutableBinary {
                        command_name: name,
                        binary_path: path,
                        version: version.clone(),
                        manufacturer: Manufacturer::LocalBuild {
                            repository: identity.clone(),
                            version: version.clone(),
                        },
                    },
                    already_installed: false,
                })
            })
            .collect())
    }

    /// Unpacks a bundle zip and extracts the binaries matching the
    /// current platform triple. `version_override` pins every binary to
    /// the release tag; without it each binary keeps its bundle-declared
    /// artifact version.
    fn extract_binaries(
        &self,
        zip_path: &Path,
        unpack_dir: &Path,
        manufacturer: &Manufacturer,
        version_override: Option<&str>,
    ) -> Result<Vec<ExecutableBinary>, PlanError> {
        archive::unpack_zip(zip_path, unpack_dir)?;
        let bundle_dirs = bundle::find_bundle_dirs(unpack_dir);
        if bundle_dirs.is_empty() {
            return Err(PlanError::NoCandidateAsset {
                reference: zip_path.display().to_string(),
            });
        }
        let mut binaries = Vec::new();
        for dir in bundle_dirs {
            let manifest = bundle::load_manifest(&dir)?;
            for selected in bundle::select_binaries(&dir, &manifest, &self.triple) {
                binaries.push(ExecutableBinary {
                    command_name: selected.artifact_name,
                    binary_path: selected.binary_path,
                    version: version_override
                        .map(|v| v.to_string())
                        .unwrap_or(selected.artifact_version),
                    manufacturer: manufacturer.clone(),
                });
            }
        }
        if binaries.is_empty() {
            return Err(PlanError::UnsupportedTriple {
                triple: self.triple.clone(),
            });
        }
        Ok(binaries)
    }

    fn verify_checksum(&self, path: &Path, policy: &ChecksumPolicy) -> Result<(), PlanError> {
        match policy {
            ChecksumPolicy::Skip => Ok(()),
            ChecksumPolicy::Expect(expected) => {
                let actual = archive::compute_checksum(path)?;
                if archive::normalize_checksum(expected) == actual {
                    Ok(())
                } else {
                    Err(PlanError::ChecksumMismatch {
                        expected: expected.clone(),
                        actual,
                    })
                }
            }
            ChecksumPolicy::Report => {
                let actual = archive::compute_checksum(path)?;
                log::info!("checksum for {}: {actual}", path.display());
                Ok(())
            }
        }
    }

    fn scratch_dir(&self, name: &str) -> std::io::Result<PathBuf> {
        let dir = self.scratch.path().join(name);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Asset selection rule: an explicit file-name hint must match exactly
/// one asset; otherwise the first asset whose name contains
/// `artifactbundle` wins.
pub fn select_asset<'r>(
    assets: &'r [ReleaseAsset],
    hint: Option<&str>,
    reference: &str,
) -> Result<&'r ReleaseAsset, PlanError> {
    match hint {
        Some(hint) => {
            let mut matches = assets.iter().filter(|a| a.file_name == hint);
            match (matches.next(), matches.next()) {
                (Some(asset), None) => Ok(asset),
                _ => Err(PlanError::NoCandidateAsset {
                    reference: reference.to_string(),
                }),
            }
        }
        None => assets
            .iter()
            .find(|a| a.file_name.contains("artifactbundle"))
            .ok_or_else(|| PlanError::NoCandidateAsset {
                reference: reference.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str) -> ReleaseAsset {
        ReleaseAsset {
            file_name: name.to_string(),
            download_url: format!("https://example.com/{name}"),
        }
    }

    #[test]
    fn test_select_asset_prefers_artifactbundle_substring() {
        let assets = vec![asset("notes.txt"), asset("foo.artifactbundle.zip")];
        let selected = select_asset(&assets, None, "owner/repo").unwrap();
        assert_eq!(selected.file_name, "foo.artifactbundle.zip");
    }

    #[test]
    fn test_select_asset_hint_requires_exact_unique_match() {
        let assets = vec![asset("foo.zip"), asset("foo.artifactbundle.zip")];
        let selected = select_asset(&assets, Some("foo.zip"), "owner/repo").unwrap();
        assert_eq!(selected.file_name, "foo.zip");
        assert!(select_asset(&assets, Some("missing.zip"), "owner/repo").is_err());
    }

    #[test]
    fn test_select_asset_none_available() {
        let assets = vec![asset("notes.txt")];
        assert!(matches!(
            select_asset(&assets, None, "owner/repo"),
            Err(PlanError::NoCandidateAsset { .. })
        ));
    }
}
