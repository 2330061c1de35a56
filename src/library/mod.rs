//! Server-side ROM library.
//!
//! Lists the ROM files of a collection on the local server store and
//! classifies them against the names present on a client.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{Collection, Config, expand_home};

/// A ROM file on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryItem {
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Absolute path on the server.
    pub path: PathBuf,
}

/// Where an item currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Only in the server library.
    ServerOnly,
    /// On the server and on the client.
    OnBoth,
}

/// A server item classified against a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStatus {
    /// File name.
    pub name: String,
    /// Classification.
    pub location: Location,
    /// Size on the server.
    pub size: u64,
    /// Path on the server.
    pub path: PathBuf,
}

/// Lists the console directories of the server library that contain files.
///
/// Known consoles keep their extension filters; unknown directories accept
/// every file. Falls back to the configured consoles when nothing is found.
#[must_use]
pub fn discover_collections(config: &Config) -> Vec<Collection> {
    let root = expand_home(&config.server.rom_dir);
    let Ok(entries) = fs::read_dir(&root) else {
        return config.server.consoles.clone();
    };

    let mut dirs: Vec<String> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|e| dir_has_files(&e.path()))
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    dirs.sort();

    let collections: Vec<Collection> = dirs
        .into_iter()
        .map(|dir| {
            config
                .server
                .consoles
                .iter()
                .find(|c| c.dir == dir)
                .cloned()
                .unwrap_or_else(|| Collection {
                    name: dir.clone(),
                    dir,
                    extensions: Vec::new(),
                })
        })
        .collect();

    if collections.is_empty() {
        config.server.consoles.clone()
    } else {
        collections
    }
}

/// Lists the ROM files of a collection directory.
///
/// A missing directory yields an empty list.
pub fn list_server_items(dir: &Path, collection: &Collection) -> io::Result<Vec<LibraryItem>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let extensions: Vec<String> = collection
        .extensions
        .iter()
        .map(|e| e.to_lowercase())
        .collect();

    let mut items = Vec::new();
    for entry in entries.flatten() {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if !extensions.is_empty() && !extensions.contains(&extension_of(&name)) {
            continue;
        }

        items.push(LibraryItem {
            name,
            size: metadata.len(),
            path: entry.path(),
        });
    }

    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}

/// Classifies server items against the file names present on a client.
///
/// Items present on both sides sort first, then by name.
#[must_use]
pub fn diff(items: Vec<LibraryItem>, client_names: &HashSet<String>) -> Vec<ItemStatus> {
    let mut statuses: Vec<ItemStatus> = items
        .into_iter()
        .map(|item| ItemStatus {
            location: if client_names.contains(&item.name) {
                Location::OnBoth
            } else {
                Location::ServerOnly
            },
            name: item.name,
            size: item.size,
            path: item.path,
        })
        .collect();

    statuses.sort_by(|a, b| {
        let rank = |s: &ItemStatus| u8::from(s.location != Location::OnBoth);
        rank(a).cmp(&rank(b)).then_with(|| a.name.cmp(&b.name))
    });
    statuses
}

/// Lower-cased extension including the dot ("" when there is none).
fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx..].to_lowercase(),
        _ => String::new(),
    }
}

fn dir_has_files(path: &Path) -> bool {
    fs::read_dir(path).is_ok_and(|entries| {
        entries
            .flatten()
            .any(|e| e.file_type().is_ok_and(|t| !t.is_dir()))
    })
}

/// First-letter filter of the ROM list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LetterFilter {
    /// Every item.
    #[default]
    All,
    /// Items whose name starts with this letter (A-Z).
    Letter(char),
}

impl LetterFilter {
    /// Moves one step towards Z.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::All => Self::Letter('A'),
            Self::Letter('Z') => Self::Letter('Z'),
            Self::Letter(c) => Self::Letter((c as u8 + 1) as char),
        }
    }

    /// Moves one step towards ALL.
    #[must_use]
    pub fn prev(self) -> Self {
        match self {
            Self::All | Self::Letter('A') => Self::All,
            Self::Letter(c) => Self::Letter((c as u8 - 1) as char),
        }
    }

    /// Returns true if `name` passes the filter.
    #[must_use]
    pub fn matches(self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Letter(letter) => name
                .chars()
                .next()
                .is_some_and(|c| c.to_ascii_uppercase() == letter),
        }
    }

    /// Label shown in the filter bar.
    #[must_use]
    pub fn label(self) -> String {
        match self {
            Self::All => "ALL".to_string(),
            Self::Letter(c) => c.to_string(),
        }
    }
}
