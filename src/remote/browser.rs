//! Remote directory browser.
//!
//! Used by the client form to pick the ROM directory on the device. The
//! listing runs on a worker; [`DirBrowser`] only holds what was listed and
//! where the cursor is.

use tracing::debug;

use crate::remote::{remote_join, remote_parent};
use crate::remote::sftp::{RemoteFs, TransferError};

/// One entry of a remote directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// File or directory name.
    pub name: String,
    /// True for directories.
    pub is_dir: bool,
    /// Size in bytes.
    pub size: u64,
}

impl RemoteEntry {
    /// Creates a directory entry.
    #[must_use]
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
            size: 0,
        }
    }

    /// Creates a file entry.
    #[must_use]
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
            size,
        }
    }
}

/// Lists a client directory, directories first, each group sorted by name.
///
/// Without a path the listing starts in the login directory, or `/` when
/// the server cannot resolve it. Returns the listed path with the entries.
pub fn list_remote_dir<F: RemoteFs + ?Sized>(
    remote_fs: &F,
    path: Option<&str>,
) -> Result<(String, Vec<RemoteEntry>), TransferError> {
    let path = match path.map(str::trim) {
        Some(path) if !path.is_empty() => path.to_string(),
        _ => remote_fs.home_dir().unwrap_or_else(|e| {
            debug!("Resolving login directory failed, starting at /: {}", e);
            "/".to_string()
        }),
    };

    let mut entries = remote_fs
        .list_entries(&path)
        .map_err(|source| TransferError::Io {
            context: "listing",
            path: path.clone(),
            source,
        })?;
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok((path, entries))
}

/// Listing state of the browser.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BrowserState {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// Waiting for a listing.
    Loading,
    /// `path` and `entries` hold the last listing.
    Ready,
    /// The last request failed; an earlier listing may still be shown.
    Failed(String),
}

/// A row of the browser list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserRow<'a> {
    /// Picks the current directory.
    UseThis,
    /// Goes one level up.
    Parent,
    /// A listed entry.
    Entry(&'a RemoteEntry),
}

/// What activating the row under the cursor asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserAction {
    /// Nothing to do.
    None,
    /// Use this directory.
    Select(String),
    /// List this directory.
    Open(String),
}

/// Remote directory browser state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirBrowser {
    path: String,
    entries: Vec<RemoteEntry>,
    cursor: usize,
    state: BrowserState,
    /// Id of the request in flight; other results are stale.
    request: u64,
}

impl DirBrowser {
    /// Directory currently listed.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Listing state.
    #[must_use]
    pub fn state(&self) -> &BrowserState {
        &self.state
    }

    /// Cursor into [`rows`](Self::rows).
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns true once a listing arrived and no request is in flight.
    #[must_use]
    pub fn is_navigable(&self) -> bool {
        self.state != BrowserState::Loading && !self.path.is_empty()
    }

    /// Marks request `request` as in flight.
    pub fn start(&mut self, request: u64) {
        self.request = request;
        self.state = BrowserState::Loading;
    }

    /// Applies a listing. Returns false if `request` is stale.
    pub fn listed(&mut self, request: u64, path: String, entries: Vec<RemoteEntry>) -> bool {
        if request != self.request {
            return false;
        }
        self.path = path;
        self.entries = entries;
        self.cursor = 0;
        self.state = BrowserState::Ready;
        true
    }

    /// Records a failed request, keeping the previous listing.
    pub fn failed(&mut self, request: u64, error: String) -> bool {
        if request != self.request {
            return false;
        }
        self.state = BrowserState::Failed(error);
        true
    }

    fn parent(&self) -> Option<&str> {
        if self.path == "/" {
            return None;
        }
        remote_parent(&self.path)
    }

    /// Rows in display order.
    #[must_use]
    pub fn rows(&self) -> Vec<BrowserRow<'_>> {
        let mut rows = vec![BrowserRow::UseThis];
        if self.parent().is_some() {
            rows.push(BrowserRow::Parent);
        }
        rows.extend(self.entries.iter().map(BrowserRow::Entry));
        rows
    }

    /// Moves the cursor up.
    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Moves the cursor down.
    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.rows().len() {
            self.cursor += 1;
        }
    }

    /// Action for the row under the cursor. Files do nothing.
    #[must_use]
    pub fn activate(&self) -> BrowserAction {
        match self.rows().get(self.cursor) {
            Some(BrowserRow::UseThis) => BrowserAction::Select(self.path.clone()),
            Some(BrowserRow::Parent) => self.go_up(),
            Some(BrowserRow::Entry(entry)) if entry.is_dir => {
                BrowserAction::Open(remote_join(&self.path, &entry.name))
            }
            _ => BrowserAction::None,
        }
    }

    /// Action for leaving the current directory.
    #[must_use]
    pub fn go_up(&self) -> BrowserAction {
        match self.parent() {
            Some(parent) => BrowserAction::Open(parent.to_string()),
            None => BrowserAction::None,
        }
    }
}
