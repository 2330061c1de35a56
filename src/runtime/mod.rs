//! Command execution off the UI thread.
//!
//! The event loop hands every [`Command`] to a [`CommandExecutor`]. The
//! worker executor runs them on a tokio runtime and reports back through an
//! `mpsc` channel the loop drains between frames.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Sender;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, warn};

use crate::app::{Command, Msg};
use crate::config::{ClientProfile, Collection, Config};
use crate::library::{diff, discover_collections, list_server_items};
use crate::remote::sftp::open_sftp;
use crate::remote::{
    Direction, JobReport, TransferError, TransferItem, list_client_names, list_remote_dir, run_job,
};
use crate::ssh::scanner::{SSH_PORT, local_subnet, scan};
use crate::ssh::{SessionManager, TcpProber};

/// Time given to in-flight workers when shutting down.
const SHUTDOWN_GRACE_MS: u64 = 500;

/// Runs commands emitted by the event loop.
pub trait CommandExecutor {
    /// Starts `command`. Must not block.
    fn execute(&self, command: Command);
}

/// Executor backed by a multi-thread tokio runtime.
pub struct WorkerExecutor {
    runtime: Runtime,
    sessions: Arc<SessionManager>,
    tx: Sender<Msg>,
    config_path: PathBuf,
}

impl WorkerExecutor {
    /// Creates the runtime. Results are sent on `tx`.
    pub fn new(sessions: Arc<SessionManager>, tx: Sender<Msg>, config_path: PathBuf) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .thread_name("romsync-worker")
            .build()?;
        Ok(Self {
            runtime,
            sessions,
            tx,
            config_path,
        })
    }

    /// Session pool shared with the workers.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Closes every session and stops the runtime.
    pub fn shutdown(self) {
        info!("Shutting down workers");
        self.sessions.release_all();
        self.runtime
            .shutdown_timeout(Duration::from_millis(SHUTDOWN_GRACE_MS));
    }

    fn spawn_blocking<F>(&self, work: F)
    where
        F: FnOnce(&SessionManager, &Sender<Msg>) + Send + 'static,
    {
        let sessions = Arc::clone(&self.sessions);
        let tx = self.tx.clone();
        self.runtime.spawn_blocking(move || work(sessions.as_ref(), &tx));
    }
}

impl CommandExecutor for WorkerExecutor {
    fn execute(&self, command: Command) {
        match command {
            Command::LoadItems {
                profile,
                collection,
                server_dir,
                client_dir,
            } => self.spawn_blocking(move |sessions, tx| {
                let msg = load_items(sessions, &profile, &collection, &server_dir, &client_dir);
                post(tx, msg);
            }),

            Command::Transfer {
                job_id,
                profile,
                direction,
                items,
                stop,
            } => self.spawn_blocking(move |sessions, tx| {
                let report = transfer(sessions, tx, job_id, &profile, direction, &items, &stop);
                post(tx, Msg::TransferDone { job_id, report });
            }),

            Command::Scan {
                scan_id,
                cancel,
                deadline,
            } => {
                let tx = self.tx.clone();
                self.runtime.spawn(async move {
                    let deadline = tokio::time::Instant::now() + deadline;
                    let result = match local_subnet() {
                        Ok(prefix) => {
                            Ok(scan(Arc::new(TcpProber::new()), prefix, SSH_PORT, deadline, cancel).await)
                        }
                        Err(e) => Err(e),
                    };
                    post(&tx, Msg::ScanComplete { scan_id, result });
                });
            }

            Command::Connect { profile } => self.spawn_blocking(move |sessions, tx| {
                let client = profile.name.clone();
                let msg = match sessions.check(&profile) {
                    Ok(()) => Msg::SessionReady { client },
                    Err(error) => Msg::SessionError { client, error },
                };
                post(tx, msg);
            }),

            Command::BrowseDir {
                request,
                profile,
                path,
                pooled,
            } => self.spawn_blocking(move |sessions, tx| {
                let listing = sessions
                    .with_session(&profile, pooled, |session| {
                        open_sftp(session).and_then(|sftp| list_remote_dir(&sftp, path.as_deref()))
                    })
                    .map_err(TransferError::from)
                    .and_then(|listing| listing);
                let msg = match listing {
                    Ok((path, entries)) => {
                        debug!("Listed {} on {}: {} entries", path, profile.name, entries.len());
                        Msg::DirListed {
                            request,
                            path,
                            entries,
                        }
                    }
                    Err(error) => Msg::DirListFailed { request, error },
                };
                post(tx, msg);
            }),

            Command::SaveConfig { config } => {
                let path = self.config_path.clone();
                self.spawn_blocking(move |_, tx| post(tx, save_config(&config, &path)));
            }

            Command::ReleaseSession { client } => {
                self.spawn_blocking(move |sessions, _| sessions.release(&client));
            }

            Command::Schedule { delay, msg } => {
                let tx = self.tx.clone();
                self.runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    post(&tx, *msg);
                });
            }
        }
    }
}

fn post(tx: &Sender<Msg>, msg: Msg) {
    if tx.send(msg).is_err() {
        debug!("Event loop gone, dropping worker message");
    }
}

/// Lists the server side, then the client side, and classifies the items.
///
/// A client failure still yields the server items, all marked server-only.
fn load_items(
    sessions: &SessionManager,
    profile: &ClientProfile,
    collection: &Collection,
    server_dir: &Path,
    client_dir: &str,
) -> Msg {
    let server_items = match list_server_items(server_dir, collection) {
        Ok(items) => items,
        Err(e) => {
            warn!("Listing {} failed: {}", server_dir.display(), e);
            return Msg::ItemsLoadFailed {
                client: profile.name.clone(),
                collection: collection.name.clone(),
                error: e.to_string(),
            };
        }
    };

    let client_names = sessions
        .acquire(profile)
        .map_err(TransferError::from)
        .and_then(|session| open_sftp(&session))
        .and_then(|sftp| list_client_names(&sftp, client_dir));

    let (names, client_error) = match client_names {
        Ok(names) => (names, None),
        Err(e) => (HashSet::new(), Some(e)),
    };
    debug!(
        "{}: {} server item(s), {} on {}",
        collection.name,
        server_items.len(),
        names.len(),
        profile.name
    );

    Msg::ItemsLoaded {
        client: profile.name.clone(),
        collection: collection.name.clone(),
        items: diff(server_items, &names),
        client_error,
    }
}

fn transfer(
    sessions: &SessionManager,
    tx: &Sender<Msg>,
    job_id: u64,
    profile: &ClientProfile,
    direction: Direction,
    items: &[TransferItem],
    stop: &AtomicBool,
) -> JobReport {
    let sftp = match sessions
        .acquire(profile)
        .map_err(TransferError::from)
        .and_then(|session| open_sftp(&session))
    {
        Ok(sftp) => sftp,
        Err(e) => {
            return JobReport {
                completed: 0,
                stopped: false,
                result: Err(e),
            };
        }
    };

    run_job(&sftp, direction, items, stop, |event| {
        post(tx, Msg::TransferProgress { job_id, event });
    })
}

fn save_config(config: &Config, path: &Path) -> Msg {
    match config.save(path) {
        Ok(()) => Msg::ConfigChanged {
            collections: discover_collections(config),
        },
        Err(e) => {
            warn!("Saving configuration failed: {}", e);
            Msg::Error(format!("Saving configuration failed: {}", e))
        }
    }
}
