//! Remote file operations.
//!
//! SFTP push/pull with progress, sequential transfer jobs, the directory
//! browser of the client form, and the POSIX path helpers used for
//! client-side paths.

pub mod browser;
pub mod job;
pub mod sftp;

pub use browser::{BrowserAction, BrowserRow, BrowserState, DirBrowser, RemoteEntry, list_remote_dir};
pub use job::{Direction, JobEvent, JobReport, TransferItem, TransferJob, run_job};
pub use sftp::{CHUNK_SIZE, LocalDirFs, RemoteFs, TransferError, copy_with_progress, pull, push};

use std::collections::HashSet;

/// Joins a remote directory and a name with `/`.
#[must_use]
pub fn remote_join(base: &str, name: &str) -> String {
    if base.is_empty() {
        return name.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// Parent of a remote path, or None for a bare name or the root.
#[must_use]
pub fn remote_parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&trimmed[..idx]),
        None => None,
    }
}

/// Names of the regular files in a remote directory.
///
/// A directory that does not exist yet is reported as empty.
pub fn list_client_names<F: RemoteFs>(fs: &F, dir: &str) -> Result<HashSet<String>, TransferError> {
    if !fs.is_dir(dir) {
        return Ok(HashSet::new());
    }
    let names = fs.list_files(dir).map_err(|source| TransferError::Io {
        context: "listing",
        path: dir.to_string(),
        source,
    })?;
    Ok(names.into_iter().collect())
}
