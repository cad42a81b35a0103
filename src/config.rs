use std::path::{Path, PathBuf};
use anyhow::{anyhow, Result};
use directories::ProjectDirs;

/// Explicit configuration for one invocation: where the store lives.
///
/// Passed through constructors and call sites instead of living in any
/// process-wide global, so tests and the manifest's store-root override
/// can point different operations at different stores.
#[derive(Debug, Clone)]
pub struct Config {
    store_root: PathBuf,
}

impl Config {
    pub fn new<P: AsRef<Path>>(store_root: P) -> Self {
        Config {
            store_root: store_root.as_ref().to_path_buf(),
        }
    }

    /// Store root in the platform data directory, overridable with the
    /// `ROOST_PATH` environment variable.
    pub fn default_root() -> Result<Config> {
        if let Ok(path) = std::env::var("ROOST_PATH") {
            if !path.is_empty() {
                return Ok(Config::new(path));
            }
        }
        let dirs = ProjectDirs::from("sh", "roost", "roost")
            .ok_or_else(|| anyhow!("could not determine project directories"))?;
        Ok(Config::new(dirs.data_dir()))
    }

    pub fn store_root(&self) -> &Path {
        &self.store_root
    }

    /// Shared bin directory holding the symlinks on `PATH`.
    pub fn bin_dir(&self) -> PathBuf {
        self.store_root.join("bin")
    }

    /// Root of the per-origin artifact tree.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.store_root.join("artifacts")
    }

    /// The registry file tracking every installed command.
    pub fn registry_path(&self) -> PathBuf {
        self.store_root.join("info.json")
    }

    /// Resolves a registry-relative path to an absolute store path.
    pub fn resolve<P: AsRef<Path>>(&self, relative: P) -> PathBuf {
        self.artifacts_dir().join(relative)
    }

    /// Creates the store skeleton. Idempotent.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.bin_dir())?;
        std::fs::create_dir_all(self.artifacts_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dirs_creates_store_skeleton() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().join("store"));
        config.ensure_dirs().unwrap();
        assert!(config.bin_dir().exists());
        assert!(config.artifacts_dir().exists());
        config.ensure_dirs().unwrap();
    }

    #[test]
    fn test_resolve_joins_artifacts_dir() {
        let config = Config::new("/store");
        assert_eq!(
            config.resolve("slug/1.0.0/foo/foo"),
            PathBuf::from("/store/artifacts/slug/1.0.0/foo/foo")
        );
    }
}
