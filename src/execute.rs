use std::path::Path;
use anyhow::{bail, Context, Result};
use colored::Colorize;
use roost::config::Config;
use roost::github::{GitHubClient, VersionSelector};
use roost::identity::RepositoryIdentity;
use roost::installer::Installer;
use roost::manifest::{Manifest, Target};
use roost::planner::{ChecksumPolicy, Planner};
use roost::platform;
use roost::registry::Registry;
use roost::source_build::SwiftBuilder;
use roost::sync;
use crate::cli::{RoostCommand, CLI};

const DEFAULT_MANIFEST: &str = "roost.yaml";

pub fn execute(cli: CLI) -> Result<()> {
    match cli.command {
        RoostCommand::Install {
            target,
            version,
            asset,
            checksum,
        } => execute_install(&target, version, asset, checksum),
        RoostCommand::Uninstall { name, version } => execute_uninstall(&name, version),
        RoostCommand::Switch { name, version } => execute_switch(&name, &version),
        RoostCommand::List => execute_list(),
        RoostCommand::Bootstrap { manifest } => execute_bootstrap(&manifest),
        RoostCommand::Update { manifest, exclude } => execute_update(&manifest, &exclude),
        RoostCommand::Resolve { manifest } => execute_resolve(&manifest),
        RoostCommand::Init => execute_init(),
    }
}

fn config_for_manifest(manifest: &Manifest) -> Result<Config> {
    match &manifest.nest_path {
        Some(path) => Ok(Config::new(path)),
        None => Config::default_root(),
    }
}

fn execute_install(
    target: &str,
    version: Option<String>,
    asset: Option<String>,
    checksum: Option<String>,
) -> Result<()> {
    let config = Config::default_root()?;
    config.ensure_dirs()?;
    let installer = Installer::new(&config);
    let client = GitHubClient::new();
    let builder = SwiftBuilder;
    let planner = Planner::new(&config, &client, &builder, platform::current_triple())?;

    if target.ends_with(".zip") {
        let policy = match checksum {
            Some(sum) => ChecksumPolicy::Expect(sum),
            None => ChecksumPolicy::Report,
        };
        planner.install_zip(&installer, target, &policy)?;
    } else {
        let identity = RepositoryIdentity::parse(target)?;
        let selector = match version {
            Some(tag) => VersionSelector::Tag(tag),
            None => VersionSelector::Latest,
        };
        let policy = match checksum {
            Some(sum) => ChecksumPolicy::Expect(sum),
            None => ChecksumPolicy::Skip,
        };
        planner.install_binaries(&installer, &identity, &selector, asset.as_deref(), &policy)?;
    }
    Ok(())
}

fn execute_uninstall(name: &str, version: Option<String>) -> Result<()> {
    let config = Config::default_root()?;
    let installer = Installer::new(&config);
    let versions: Vec<String> = match version {
        Some(version) => vec![version],
        None => {
            let registry = Registry::load(config.registry_path())?;
            let mut versions: Vec<String> = registry
                .records(name)
                .iter()
                .map(|r| r.version.clone())
                .collect();
            versions.dedup();
            versions
        }
    };
    if versions.is_empty() {
        println!("{name} is not installed");
        return Ok(());
    }
    for version in versions {
        installer.uninstall(name, &version)?;
        println!("uninstalled {} {}", name.bold(), version);
    }
    Ok(())
}

fn execute_switch(name: &str, version: &str) -> Result<()> {
    let config = Config::default_root()?;
    let installer = Installer::new(&config);
    let registry = Registry::load(config.registry_path())?;
    let record = registry
        .records(name)
        .iter()
        .find(|r| r.version == version)
        .cloned();
    match record {
        Some(record) => {
            installer.link(name, &record)?;
            println!("{} now points at {}", name.bold(), version);
            Ok(())
        }
        None => bail!("{name} {version} is not installed"),
    }
}

fn execute_list() -> Result<()> {
    let config = Config::default_root()?;
    let installer = Installer::new(&config);
    let registry = Registry::load(config.registry_path())?;
    if registry.commands.is_empty() {
        println!("No commands installed");
        return Ok(());
    }
    for (name, records) in &registry.commands {
        println!("{}", name.bold());
        for record in records {
            let marker = if installer.is_linked(name, record) {
                "*".green().to_string()
            } else {
                " ".to_string()
            };
            println!("  {marker} {}  {}", record.version, record.manufacturer);
        }
    }
    Ok(())
}

fn execute_bootstrap(path: &Path) -> Result<()> {
    let manifest = Manifest::load(path)?;
    let config = config_for_manifest(&manifest)?;
    config.ensure_dirs()?;
    let installer = Installer::new(&config);
    let client = GitHubClient::new();
    let builder = SwiftBuilder;
    let planner = Planner::new(&config, &client, &builder, platform::current_triple())?;

    for target in manifest.normalized().targets {
        match target {
            Target::Repository(repo) => {
                let identity = RepositoryIdentity::parse(&repo.reference)?;
                let selector = match &repo.version {
                    Some(version) => VersionSelector::Tag(version.clone()),
                    None => VersionSelector::Latest,
                };
                let policy = match &repo.checksum {
                    Some(sum) => ChecksumPolicy::Expect(sum.clone()),
                    None => ChecksumPolicy::Skip,
                };
                planner.install_binaries(
                    &installer,
                    &identity,
                    &selector,
                    repo.asset_name.as_deref(),
                    &policy,
                )?;
            }
            Target::Zip(zip) => {
                let policy = match &zip.checksum {
                    Some(sum) => ChecksumPolicy::Expect(sum.clone()),
                    None => ChecksumPolicy::Report,
                };
                planner.install_zip(&installer, &zip.zip_url, &policy)?;
            }
            Target::DeprecatedZip(_) => unreachable!("normalized() rewrites legacy targets"),
        }
    }
    Ok(())
}

fn execute_update(path: &Path, exclude: &[String]) -> Result<()> {
    let manifest = Manifest::load(path)?;
    let client = GitHubClient::new();
    let updated = sync::update(&manifest, exclude, &client)?;
    updated.save(path)?;
    println!("updated {}", path.display());
    Ok(())
}

fn execute_resolve(path: &Path) -> Result<()> {
    let manifest = Manifest::load(path)?;
    let client = GitHubClient::new();
    let resolved = sync::resolve(&manifest, &client)?;
    resolved.save(path)?;
    println!("resolved {}", path.display());
    Ok(())
}

fn execute_init() -> Result<()> {
    let path = std::env::current_dir()?.join(DEFAULT_MANIFEST);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    Manifest::new()
        .save(&path)
        .with_context(|| format!("could not write {}", path.display()))?;
    println!("created {}", path.display());
    Ok(())
}
