//! SFTP file transfer.
//!
//! Streams files between the local library and a client in fixed-size
//! chunks, reporting progress after every chunk written.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use ssh2::{Session, Sftp};
use thiserror::Error;

use crate::remote::browser::RemoteEntry;
use crate::remote::remote_parent;
use crate::ssh::session::{ErrorClass, SessionError};

/// Copy buffer size.
pub const CHUNK_SIZE: usize = 32 * 1024;

/// Mode used for directories created on the client.
const DIR_MODE: i32 = 0o755;

/// Errors raised by transfers.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Local or remote I/O failed.
    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },

    /// No session could be acquired.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The SFTP subsystem could not be started.
    #[error("opening SFTP channel: {0}")]
    Channel(String),

    /// A job item failed.
    #[error("{name}: {source}")]
    Item {
        name: String,
        #[source]
        source: Box<TransferError>,
    },
}

impl TransferError {
    /// Session failure class, when the error came from acquiring a session.
    #[must_use]
    pub fn session_class(&self) -> Option<ErrorClass> {
        match self {
            Self::Session(e) => Some(e.class()),
            Self::Item { source, .. } => source.session_class(),
            Self::Io { .. } | Self::Channel(_) => None,
        }
    }

    fn io(context: &'static str, path: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            context,
            path,
            source,
        }
    }
}

/// File-system operations on a client.
///
/// Paths are POSIX strings on the client side.
pub trait RemoteFs {
    /// Reader for a remote file.
    type Reader: Read;
    /// Writer for a remote file.
    type Writer: Write;

    /// Opens a file for reading.
    fn open(&self, path: &str) -> io::Result<Self::Reader>;

    /// Creates or truncates a file for writing.
    fn create(&self, path: &str) -> io::Result<Self::Writer>;

    /// Size of a file in bytes.
    fn size(&self, path: &str) -> io::Result<u64>;

    /// Creates one directory level.
    fn mkdir(&self, path: &str) -> io::Result<()>;

    /// Returns true if `path` is an existing directory.
    fn is_dir(&self, path: &str) -> bool;

    /// Names of the regular files in a directory.
    fn list_files(&self, path: &str) -> io::Result<Vec<String>>;

    /// Every entry of a directory, unsorted.
    fn list_entries(&self, path: &str) -> io::Result<Vec<RemoteEntry>>;

    /// Directory a session starts in.
    fn home_dir(&self) -> io::Result<String>;
}

impl RemoteFs for Sftp {
    type Reader = ssh2::File;
    type Writer = ssh2::File;

    fn open(&self, path: &str) -> io::Result<ssh2::File> {
        Ok(Sftp::open(self, Path::new(path))?)
    }

    fn create(&self, path: &str) -> io::Result<ssh2::File> {
        Ok(Sftp::create(self, Path::new(path))?)
    }

    fn size(&self, path: &str) -> io::Result<u64> {
        Ok(self.stat(Path::new(path))?.size.unwrap_or(0))
    }

    fn mkdir(&self, path: &str) -> io::Result<()> {
        Ok(Sftp::mkdir(self, Path::new(path), DIR_MODE)?)
    }

    fn is_dir(&self, path: &str) -> bool {
        self.stat(Path::new(path)).is_ok_and(|stat| stat.is_dir())
    }

    fn list_files(&self, path: &str) -> io::Result<Vec<String>> {
        Ok(self
            .readdir(Path::new(path))?
            .into_iter()
            .filter(|(_, stat)| stat.is_file())
            .filter_map(|(entry, _)| entry.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect())
    }

    fn list_entries(&self, path: &str) -> io::Result<Vec<RemoteEntry>> {
        Ok(self
            .readdir(Path::new(path))?
            .into_iter()
            .filter_map(|(entry, stat)| {
                let name = entry.file_name()?.to_string_lossy().to_string();
                Some(RemoteEntry {
                    name,
                    is_dir: stat.is_dir(),
                    size: stat.size.unwrap_or(0),
                })
            })
            .collect())
    }

    fn home_dir(&self) -> io::Result<String> {
        Ok(self.realpath(Path::new("."))?.to_string_lossy().to_string())
    }
}

/// A local directory standing in for a client's file system.
///
/// Remote paths are resolved below `root`.
#[derive(Debug, Clone)]
pub struct LocalDirFs {
    root: PathBuf,
}

impl LocalDirFs {
    /// Creates a file system rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Local path backing a remote path.
    #[must_use]
    pub fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl RemoteFs for LocalDirFs {
    type Reader = File;
    type Writer = File;

    fn open(&self, path: &str) -> io::Result<File> {
        File::open(self.resolve(path))
    }

    fn create(&self, path: &str) -> io::Result<File> {
        File::create(self.resolve(path))
    }

    fn size(&self, path: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.resolve(path))?.len())
    }

    fn mkdir(&self, path: &str) -> io::Result<()> {
        fs::create_dir(self.resolve(path))
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).is_dir()
    }

    fn list_files(&self, path: &str) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        Ok(names)
    }

    fn list_entries(&self, path: &str) -> io::Result<Vec<RemoteEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            entries.push(RemoteEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                is_dir: metadata.is_dir(),
                size: metadata.len(),
            });
        }
        Ok(entries)
    }

    /// The root stands in for the login directory.
    fn home_dir(&self) -> io::Result<String> {
        Ok("/".to_string())
    }
}

/// Opens the SFTP subsystem of a session.
pub fn open_sftp(session: &Session) -> Result<Sftp, TransferError> {
    session
        .sftp()
        .map_err(|e| TransferError::Channel(e.to_string()))
}

/// Copies `reader` into `writer` in `CHUNK_SIZE` chunks.
///
/// `on_progress(transferred, total)` runs after every chunk is written.
/// Returns the number of bytes copied once the reader is drained.
pub fn copy_with_progress<R, W, P>(
    reader: &mut R,
    writer: &mut W,
    total: u64,
    on_progress: &mut P,
) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    P: FnMut(u64, u64) + ?Sized,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut transferred = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        transferred += n as u64;
        on_progress(transferred, total);
    }

    writer.flush()?;
    Ok(transferred)
}

/// Creates `path` and every missing parent on the client.
pub fn mkdir_all<F: RemoteFs + ?Sized>(remote_fs: &F, path: &str) -> io::Result<()> {
    let mut current = String::new();
    for part in path.split('/') {
        if part.is_empty() {
            if current.is_empty() && path.starts_with('/') {
                current.push('/');
            }
            continue;
        }
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(part);

        if !remote_fs.is_dir(&current) {
            // Another writer may have created it in the meantime.
            if let Err(e) = remote_fs.mkdir(&current) {
                if !remote_fs.is_dir(&current) {
                    return Err(e);
                }
            }
        }
    }
    Ok(())
}

/// Uploads a local file to `remote`, creating the remote parent directory.
pub fn push<F, P>(remote_fs: &F, local: &Path, remote: &str, on_progress: &mut P) -> Result<u64, TransferError>
where
    F: RemoteFs + ?Sized,
    P: FnMut(u64, u64) + ?Sized,
{
    let local_name = local.display().to_string();
    let mut source = File::open(local).map_err(TransferError::io("opening", &local_name))?;
    let total = source
        .metadata()
        .map_err(TransferError::io("reading metadata of", &local_name))?
        .len();

    if let Some(parent) = remote_parent(remote) {
        mkdir_all(remote_fs, parent).map_err(TransferError::io("creating directory", parent))?;
    }

    let mut dest = remote_fs
        .create(remote)
        .map_err(TransferError::io("creating", remote))?;
    copy_with_progress(&mut source, &mut dest, total, on_progress)
        .map_err(TransferError::io("writing", remote))
}

/// Downloads `remote` to a local file, creating the local parent directory.
pub fn pull<F, P>(remote_fs: &F, remote: &str, local: &Path, on_progress: &mut P) -> Result<u64, TransferError>
where
    F: RemoteFs + ?Sized,
    P: FnMut(u64, u64) + ?Sized,
{
    let local_name = local.display().to_string();
    let total = remote_fs
        .size(remote)
        .map_err(TransferError::io("reading size of", remote))?;
    let mut source = remote_fs.open(remote).map_err(TransferError::io("opening", remote))?;

    if let Some(parent) = local.parent() {
        fs::create_dir_all(parent)
            .map_err(TransferError::io("creating directory", parent.display().to_string()))?;
    }

    let mut dest = File::create(local).map_err(TransferError::io("creating", &local_name))?;
    copy_with_progress(&mut source, &mut dest, total, on_progress)
        .map_err(TransferError::io("writing", &local_name))
}
