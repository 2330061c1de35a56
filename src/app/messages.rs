//! Messages consumed by the event loop and commands it emits.
//!
//! Every state change flows through `App::update(Msg) -> Vec<Command>`.
//! Commands run off the UI thread and report back as messages.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use crossterm::event::KeyEvent;

use crate::config::{ClientProfile, Collection, Config};
use crate::library::ItemStatus;
use crate::remote::{Direction, JobEvent, JobReport, RemoteEntry, TransferError, TransferItem};
use crate::ssh::{Device, ScanError, SessionError};

/// Operation deferred until a password is entered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PendingAction {
    /// Nothing pending.
    #[default]
    None,
    /// Reload the item list of the selected collection.
    LoadItems,
    /// Push the named items of the selected collection.
    Transfer(Vec<String>),
}

impl PendingAction {
    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Input to the event loop.
#[derive(Debug)]
pub enum Msg {
    /// Key press.
    Key(KeyEvent),

    /// Server items listed and classified against the client.
    ItemsLoaded {
        client: String,
        collection: String,
        items: Vec<ItemStatus>,
        /// Set when the client side could not be listed.
        client_error: Option<TransferError>,
    },

    /// The server library could not be listed.
    ItemsLoadFailed {
        client: String,
        collection: String,
        error: String,
    },

    /// Progress of a running transfer job.
    TransferProgress { job_id: u64, event: JobEvent },

    /// A transfer job ended.
    TransferDone { job_id: u64, report: JobReport },

    /// A discovery scan ended.
    ScanComplete {
        scan_id: u64,
        result: Result<Vec<Device>, ScanError>,
    },

    /// A connection test succeeded.
    SessionReady { client: String },

    /// A connection test failed.
    SessionError { client: String, error: SessionError },

    /// A remote directory was listed for the form's browser.
    DirListed {
        request: u64,
        path: String,
        entries: Vec<RemoteEntry>,
    },

    /// A remote directory could not be listed.
    DirListFailed { request: u64, error: TransferError },

    /// An operation needs a password that is not known yet.
    PasswordRequired { client: String, action: PendingAction },

    /// The configuration was written; collections were rediscovered.
    ConfigChanged { collections: Vec<Collection> },

    /// Failure reported by a worker.
    Error(String),

    /// Clears the status error if it is still the one numbered `seq`.
    ClearError { seq: u64 },

    /// Transfer overlay refresh.
    TransferTick { job_id: u64 },

    /// Closes the transfer overlay of `job_id`.
    CloseOverlay { job_id: u64 },
}

/// Work requested by the event loop.
#[derive(Debug)]
pub enum Command {
    /// List server items and the client's copies.
    LoadItems {
        /// Profile with any runtime password applied.
        profile: ClientProfile,
        collection: Collection,
        server_dir: PathBuf,
        client_dir: String,
    },

    /// Run a transfer job.
    Transfer {
        job_id: u64,
        /// Profile with any runtime password applied.
        profile: ClientProfile,
        direction: Direction,
        items: Vec<TransferItem>,
        /// Raised to keep further items from starting.
        stop: Arc<AtomicBool>,
    },

    /// Scan the local subnet.
    Scan {
        scan_id: u64,
        cancel: Arc<AtomicBool>,
        deadline: Duration,
    },

    /// Open (or reuse) a session to test a profile.
    Connect { profile: ClientProfile },

    /// List a client directory for the form's browser.
    BrowseDir {
        request: u64,
        /// Profile built from the form, runtime password applied.
        profile: ClientProfile,
        /// Directory to list; None starts in the login directory.
        path: Option<String>,
        /// Use the pooled session; false when the form differs from the
        /// saved profile.
        pooled: bool,
    },

    /// Persist the configuration.
    SaveConfig { config: Config },

    /// Close the pooled session of a client.
    ReleaseSession { client: String },

    /// Deliver `msg` after `delay`.
    Schedule { delay: Duration, msg: Box<Msg> },
}

impl Command {
    /// Schedules `msg` after `delay`.
    #[must_use]
    pub fn schedule(delay: Duration, msg: Msg) -> Self {
        Self::Schedule {
            delay,
            msg: Box::new(msg),
        }
    }
}
