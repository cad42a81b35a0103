//! # Roost Core Library
//!
//! This crate contains the core logic and building blocks of the `roost`
//! tool – a manager for versioned CLI tools installed from prebuilt
//! artifact bundles on git-hosted release pages, or built from source
//! when no bundle exists.
//!
//! `roost` keeps a per-machine store of installed binaries with a JSON
//! registry as the single source of truth, shared-bin symlinks selecting
//! the active version of each command, and a YAML manifest for
//! reproducible, pinned installs.
//!
//! This library is built for the `roost` CLI, but you can also reuse it
//! as a backend in other tools.
//!
//! ## Modules Overview
//! - [`identity`] – Normalizing repository references (HTTPS, shorthand, SSH)
//! - [`manufacturer`] – Provenance of installed binaries
//! - [`layout`] – Pure store-path computation
//! - [`registry`] – The persisted registry of installed commands
//! - [`installer`] – Copying, linking and uninstalling binaries
//! - [`planner`] – Deciding between reuse, bundle fetch and source build
//! - [`manifest`] – The declarative YAML manifest
//! - [`sync`] – Concurrent manifest update/resolve
//! - [`github`] – Release metadata retrieval
//! - [`source_build`] – Clone-and-build fallback
//! - [`archive`] – Download, unpack and checksum plumbing
//! - [`bundle`] – Artifact bundle manifests
//! - [`config`] – Store root configuration
//! - [`platform`] – Platform triple detection

pub mod archive;
pub mod bundle;
pub mod config;
pub mod github;
pub mod identity;
pub mod installer;
pub mod layout;
pub mod manifest;
pub mod manufacturer;
pub mod planner;
pub mod platform;
pub mod registry;
pub mod source_build;
pub mod sync;

pub use config::Config;
pub use identity::RepositoryIdentity;
pub use installer::{ExecutableBinary, InstallError, Installer};
pub use manifest::{Manifest, Target};
pub use manufacturer::Manufacturer;
pub use planner::{ChecksumPolicy, PlanError, Planner, PreparedBinary};
pub use registry::{CommandRecord, Registry};
