use std::path::PathBuf;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
pub struct CLI {
    #[command(subcommand)]
    pub(crate) command: RoostCommand,
}

#[derive(Debug, Subcommand)]
pub enum RoostCommand {
    /// Install a tool from a repository reference or a bundle zip URL
    Install {
        /// Repository reference (`owner/repo`, HTTPS URL, SSH spec) or a
        /// `.zip` bundle URL
        target: String,
        /// Release tag to install; defaults to the latest release
        #[clap(short, long)]
        version: Option<String>,
        /// Exact release asset file name to pick
        #[clap(long)]
        asset: Option<String>,
        /// Expected SHA-256 of the downloaded asset
        #[clap(long)]
        checksum: Option<String>,
    },
    /// Uninstall a command. Without `--version`, removes every version
    Uninstall {
        name: String,
        #[clap(short, long)]
        version: Option<String>,
    },
    /// Re-point a command at an already-installed version
    Switch { name: String, version: String },
    /// List installed commands, marking the selected version
    List,
    /// Install every target the manifest declares
    Bootstrap {
        #[clap(default_value = "roost.yaml")]
        manifest: PathBuf,
    },
    /// Re-resolve manifest targets to their latest releases
    Update {
        #[clap(default_value = "roost.yaml")]
        manifest: PathBuf,
        /// Targets to leave untouched (reference, short name, or zip URL)
        #[clap(long)]
        exclude: Vec<String>,
    },
    /// Pin unpinned manifest targets and refresh checksums
    Resolve {
        #[clap(default_value = "roost.yaml")]
        manifest: PathBuf,
    },
    /// Write a starter manifest in the current directory
    Init,
}
