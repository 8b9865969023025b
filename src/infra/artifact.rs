use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;
use crate::types::ArtifactRecord;

pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Stream a file through SHA-256 and return the lowercase hex digest
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Digest a freshly written file and log it as a stage artifact
pub fn record_artifact(path: &Path, rows: usize) -> Result<ArtifactRecord> {
    let sha256 = sha256_file(path)?;
    info!("Wrote {} ({} rows, sha256 {})", path.display(), rows, sha256);
    Ok(ArtifactRecord {
        path: path.to_path_buf(),
        rows,
        sha256,
    })
}

/// Create the parent directory of an output path if needed
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Sibling of `path` that a new artifact is written to before it replaces `path`
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Hand `write` a staging file next to `path` and rename it over `path` once
/// it succeeds. On failure the staging file is removed and `path` is untouched.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()>,
{
    ensure_parent(path)?;
    let staging = staging_path(path);
    let file = File::create(&staging)?;
    if let Err(e) = write(file) {
        if let Err(cleanup) = std::fs::remove_file(&staging) {
            warn!("Could not remove staging file {}: {}", staging.display(), cleanup);
        }
        return Err(e);
    }
    std::fs::rename(&staging, path)?;
    Ok(())
}
