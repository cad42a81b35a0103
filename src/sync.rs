//! Manifest sync: refreshing a manifest's pinned versions, asset names
//! and checksums against remote release metadata.
//!
//! Targets resolve concurrently on a bounded worker pool. Tasks share no
//! mutable state; each produces a new target value and the results are
//! rejoined in the original input order. Any single failure aborts the
//! whole operation, so a partially-updated manifest is never written.

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::archive;
use crate::github::{ReleaseClient, VersionSelector};
use crate::identity::RepositoryIdentity;
use crate::manifest::{Manifest, RepositoryTarget, Target, ZipTarget};
use crate::planner::{select_asset, PlanError};

pub const SYNC_WORKERS: usize = 4;

/// Re-resolves every non-excluded target to its latest release,
/// refreshing version, asset name and checksum. Excluded targets are
/// carried through untouched.
pub fn update(
    manifest: &Manifest,
    excluded: &[String],
    client: &dyn ReleaseClient,
) -> Result<Manifest> {
    let targets = run_targets(&manifest.targets, |target| {
        if is_excluded(target, excluded) {
            return Ok(target.clone());
        }
        match target {
            Target::Repository(repo) => {
                resolve_repository(client, repo, &VersionSelector::Latest, None)
            }
            Target::Zip(zip) => refresh_zip(client, &zip.zip_url),
            Target::DeprecatedZip(url) => refresh_zip(client, url),
        }
    })?;
    Ok(Manifest {
        nest_path: manifest.nest_path.clone(),
        targets,
    })
}

/// Like [`update`], but only targets with no pinned version move to the
/// latest release. Pinned targets keep their version while their asset
/// name and checksum are refreshed against that exact tag.
pub fn resolve(manifest: &Manifest, client: &dyn ReleaseClient) -> Result<Manifest> {
    let targets = run_targets(&manifest.targets, |target| match target {
        Target::Repository(repo) => match &repo.version {
            Some(version) => resolve_repository(
                client,
                repo,
                &VersionSelector::Tag(version.clone()),
                repo.asset_name.as_deref(),
            ),
            None => resolve_repository(client, repo, &VersionSelector::Latest, None),
        },
        Target::Zip(zip) => match &zip.checksum {
            Some(_) => Ok(target.clone()),
            None => refresh_zip(client, &zip.zip_url),
        },
        Target::DeprecatedZip(url) => refresh_zip(client, url),
    })?;
    Ok(Manifest {
        nest_path: manifest.nest_path.clone(),
        targets,
    })
}

/// Runs one task per target on a fixed-size pool; results come back in
/// input order, and the first failure fails the whole batch.
fn run_targets<F>(targets: &[Target], task: F) -> Result<Vec<Target>>
where
    F: Fn(&Target) -> Result<Target> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(SYNC_WORKERS)
        .build()
        .context("could not build sync worker pool")?;
    pool.install(|| {
        targets
            .par_iter()
            .enumerate()
            .map(|(index, target)| {
                task(target).with_context(|| format!("target #{index} failed to resolve"))
            })
            .collect()
    })
}

fn resolve_repository(
    client: &dyn ReleaseClient,
    target: &RepositoryTarget,
    selector: &VersionSelector,
    asset_hint: Option<&str>,
) -> Result<Target> {
    let identity = RepositoryIdentity::parse(&target.reference)?;
    let release = client.fetch_release(&identity, selector)?;
    let asset = match select_asset(&release.assets, asset_hint, &identity.reference_name()) {
        Ok(asset) => Some(asset),
        // No bundle asset: the target will be built from source at
        // install time, so there is no asset name or checksum to pin.
        Err(PlanError::NoCandidateAsset { .. }) => None,
        Err(e) => return Err(e.into()),
    };
    let (asset_name, checksum) = match asset {
        Some(asset) => {
            let scratch = tempfile::tempdir()?;
            let path = client.download(&asset.download_url, scratch.path())?;
            let checksum = archive::compute_checksum(&path)?;
            (Some(asset.file_name.clone()), Some(checksum))
        }
        None => (None, None),
    };
    log::info!("resolved {} at {}", target.reference, release.tag);
    Ok(Target::Repository(RepositoryTarget {
        reference: target.reference.clone(),
        version: Some(release.tag),
        asset_name,
        checksum,
    }))
}

fn refresh_zip(client: &dyn ReleaseClient, zip_url: &str) -> Result<Target> {
    let scratch = tempfile::tempdir()?;
    let path = client.download(zip_url, scratch.path())?;
    let checksum = archive::compute_checksum(&path)?;
    Ok(Target::Zip(ZipTarget {
        zip_url: zip_url.to_string(),
        checksum: Some(checksum),
    }))
}

fn is_excluded(target: &Target, excluded: &[String]) -> bool {
    match target {
        Target::Repository(repo) => excluded.iter().any(|entry| {
            if entry.eq_ignore_ascii_case(&repo.reference) {
                return true;
            }
            RepositoryIdentity::parse(&repo.reference).is_ok_and(|identity| {
                identity.reference_name().eq_ignore_ascii_case(entry)
                    || identity.short_name().eq_ignore_ascii_case(entry)
            })
        }),
        Target::Zip(zip) => excluded.iter().any(|entry| entry == &zip.zip_url),
        Target::DeprecatedZip(url) => excluded.iter().any(|entry| entry == url),
    }
}
