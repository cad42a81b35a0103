//! Build-from-source fallback: cloning a repository and running its
//! release build, used when no artifact bundle can be fetched.

use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

use crate::identity::RepositoryIdentity;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("`{program}` failed{}", format_stderr(.stderr))]
    CommandFailed { program: String, stderr: String },
    #[error("build produced no executables in {dir}")]
    NoExecutables { dir: PathBuf },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

/// Source checkout and release building, behind a trait so the planner
/// can be exercised without a toolchain.
pub trait SourceBuilder: Send + Sync {
    fn clone_repository(
        &self,
        identity: &RepositoryIdentity,
        tag: Option<&str>,
        dest: &Path,
    ) -> Result<(), BuildError>;

    /// Runs the project's release build and returns absolute paths to
    /// the executables it produced.
    fn build_release(&self, project_dir: &Path) -> Result<Vec<PathBuf>, BuildError>;
}

/// Shells out to `git` and `swift build -c release`, the release-build
/// tool for artifact-bundle-publishing packages.
pub struct SwiftBuilder;

impl SwiftBuilder {
    fn run(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<Vec<u8>, BuildError> {
        let mut command = Command::new(program);
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }
        let output = command.output()?;
        if !output.status.success() {
            return Err(BuildError::CommandFailed {
                program: program.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl SourceBuilder for SwiftBuilder {
    fn clone_repository(
        &self,
        identity: &RepositoryIdentity,
        tag: Option<&str>,
        dest: &Path,
    ) -> Result<(), BuildError> {
        let url = identity.canonical();
        let dest = dest.to_string_lossy().to_string();
        let mut args = vec!["clone", "--recursive", "--depth", "1"];
        if let Some(tag) = tag {
            args.push("--branch");
            args.push(tag);
        }
        args.push(&url);
        args.push(&dest);
        Self::run("git", &args, None)?;
        Ok(())
    }

    fn build_release(&self, project_dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
        Self::run("swift", &["build", "-c", "release"], Some(project_dir))?;
        let stdout = Self::run(
            "swift",
            &["build", "-c", "release", "--show-bin-path"],
            Some(project_dir),
        )?;
        let bin_dir = PathBuf::from(String::from_utf8_lossy(&stdout).trim().to_string());
        let executables = find_executables(&bin_dir)?;
        if executables.is_empty() {
            return Err(BuildError::NoExecutables { dir: bin_dir });
        }
        Ok(executables)
    }
}

/// Top-level executable files of a build products directory.
pub fn find_executables(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut executables = Vec::new();
    if !dir.exists() {
        return Ok(executables);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && path.extension().is_none() && is_executable(&path) {
            executables.push(path);
        }
    }
    executables.sort();
    Ok(executables)
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(windows)]
pub fn is_executable(path: &Path) -> bool {
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        let ext = ext.to_ascii_lowercase();
        matches!(ext.as_str(), "exe" | "bat" | "cmd")
    } else {
        false
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    #[test]
    fn test_find_executables_skips_plain_files() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("tool");
        std::fs::write(&exe, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&exe, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(dir.path().join("notes"), b"text").unwrap();
        std::fs::write(dir.path().join("lib.dylib"), b"").unwrap();

        let found = find_executables(dir.path()).unwrap();
        assert_eq!(found, vec![exe]);
    }

    #[test]
    fn test_find_executables_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let found = find_executables(&dir.path().join("absent")).unwrap();
        assert!(found.is_empty());
    }
}
