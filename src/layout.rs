//! Pure path computation for the artifact store.
//!
//! Every function here maps (manufacturer, version, command name) to a
//! path relative to the artifacts directory without touching the
//! filesystem. Identical inputs always yield identical paths, which is
//! what makes re-installs idempotent: the registry dedupes records by
//! path equality, not by content hashing.

use std::path::PathBuf;

use crate::identity::sanitize;
use crate::manufacturer::Manufacturer;

/// Directory component used for binaries built from source, so a local
/// build never collides with an artifact-bundle install of the same
/// repository and version.
pub const LOCAL_BUILD_DIR: &str = "local_build";

/// Root directory for all versions of artifacts from one origin.
pub fn artifact_root(manufacturer: &Manufacturer) -> PathBuf {
    let slug = match manufacturer {
        Manufacturer::ArtifactBundle { zip_url, source } => match source {
            Some(source) => source.repository.slug(),
            None => zip_url_slug(zip_url),
        },
        Manufacturer::LocalBuild { repository, .. } => repository.slug(),
    };
    PathBuf::from(slug)
}

pub fn version_dir(manufacturer: &Manufacturer, version: &str) -> PathBuf {
    artifact_root(manufacturer).join(version)
}

/// `versionDir/<bundle file stem>` for bundles, `versionDir/local_build`
/// for source builds.
pub fn binary_dir(manufacturer: &Manufacturer, version: &str) -> PathBuf {
    let discriminator = match manufacturer {
        Manufacturer::ArtifactBundle { zip_url, .. } => bundle_stem(zip_url),
        Manufacturer::LocalBuild { .. } => LOCAL_BUILD_DIR.to_string(),
    };
    version_dir(manufacturer, version).join(discriminator)
}

pub fn binary_path(manufacturer: &Manufacturer, version: &str, command_name: &str) -> PathBuf {
    binary_dir(manufacturer, version).join(command_name)
}

/// File stem of a bundle zip URL with the `.zip` and `.artifactbundle`
/// suffixes stripped, e.g. `.../foo.artifactbundle.zip` yields `foo`.
pub fn bundle_stem(zip_url: &str) -> String {
    let last = zip_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(zip_url);
    let last = last.split(['?', '#']).next().unwrap_or(last);
    let stem = last
        .trim_end_matches(".zip")
        .trim_end_matches(".artifactbundle");
    if stem.is_empty() {
        "bundle".to_string()
    } else {
        stem.to_string()
    }
}

/// Slug for a bare zip URL, derived from host and path segments.
pub fn zip_url_slug(zip_url: &str) -> String {
    let rest = zip_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(zip_url);
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    let parts: Vec<String> = rest
        .split('/')
        .filter(|s| !s.is_empty())
        .map(sanitize)
        .collect();
    if parts.is_empty() {
        "zip".to_string()
    } else {
        parts.join("_")
    }
}
