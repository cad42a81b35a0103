//! Download, unpack and checksum plumbing for artifact bundle zips.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("could not determine a file name for `{url}`")]
    BadUrl { url: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Downloads `url` into `dest_dir`, named after the URL's last path
/// segment. No retries; an HTTP error status fails immediately.
pub fn download_to(url: &str, dest_dir: &Path) -> Result<PathBuf, ArchiveError> {
    let file_name = url_file_name(url).ok_or_else(|| ArchiveError::BadUrl {
        url: url.to_string(),
    })?;
    let response = reqwest::blocking::get(url)?.error_for_status()?;
    let bytes = response.bytes()?;
    std::fs::create_dir_all(dest_dir)?;
    let path = dest_dir.join(file_name);
    let mut file = File::create(&path)?;
    file.write_all(&bytes)?;
    Ok(path)
}

pub fn unpack_zip(zip_path: &Path, dest_dir: &Path) -> Result<(), ArchiveError> {
    std::fs::create_dir_all(dest_dir)?;
    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    archive.extract(dest_dir)?;
    Ok(())
}

/// SHA-256 of a file, as a lowercase hex string without prefix.
pub fn compute_checksum(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Strips an optional `sha256:` prefix so stored and computed checksums
/// compare uniformly.
pub fn normalize_checksum(checksum: &str) -> &str {
    checksum.strip_prefix("sha256:").unwrap_or(checksum)
}

fn url_file_name(url: &str) -> Option<String> {
    let rest = url.split(['?', '#']).next().unwrap_or(url);
    let name = rest.trim_end_matches('/').rsplit('/').next()?;
    if name.is_empty() || name.contains("://") {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_compute_checksum_stable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data");
        std::fs::write(&path, b"hello").unwrap();
        let first = compute_checksum(&path).unwrap();
        let second = compute_checksum(&path).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_normalize_checksum_strips_prefix() {
        assert_eq!(normalize_checksum("sha256:abc"), "abc");
        assert_eq!(normalize_checksum("abc"), "abc");
    }

    #[test]
    fn test_url_file_name() {
        assert_eq!(
            url_file_name("https://x.com/a/foo.zip?token=1"),
            Some("foo.zip".to_string())
        );
        assert_eq!(url_file_name("https://"), None);
    }

    #[test]
    fn test_unpack_zip_round_trip() {
        let dir = tempdir().unwrap();
        let zip_path = dir.path().join("bundle.zip");
        let file = std::fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.add_directory("inner", options).unwrap();
        writer.start_file("inner/hello.txt", options).unwrap();
        writer.write_all(b"hi").unwrap();
        writer.finish().unwrap();

        let out = dir.path().join("out");
        unpack_zip(&zip_path, &out).unwrap();
        assert_eq!(std::fs::read_to_string(out.join("inner/hello.txt")).unwrap(), "hi");
    }
}
