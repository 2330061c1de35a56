//! Multi-item transfer jobs.
//!
//! Items run strictly one after another over a single file-transfer channel.
//! The first failure aborts the job and is reported with the item's name.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::remote::sftp::{RemoteFs, TransferError, pull, push};

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Server library to client.
    #[default]
    Push,
    /// Client to server library.
    Pull,
}

impl Direction {
    /// Verb shown in the overlay title.
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            Self::Push => "Pushing",
            Self::Pull => "Pulling",
        }
    }
}

/// One file of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferItem {
    /// File name, used in progress and errors.
    pub name: String,
    /// Path in the server library.
    pub local: PathBuf,
    /// Path on the client.
    pub remote: String,
}

/// Event emitted by a running job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// The item at `index` is about to start.
    Started { index: usize },
    /// Bytes written for the item at `index`.
    Progress {
        index: usize,
        transferred: u64,
        total: u64,
    },
    /// The item at `index` finished.
    ItemDone { index: usize },
}

/// Final result of a job.
#[derive(Debug)]
pub struct JobReport {
    /// Items fully transferred.
    pub completed: usize,
    /// True if the stop flag kept remaining items from starting.
    pub stopped: bool,
    /// First failure, wrapped with its item name.
    pub result: Result<(), TransferError>,
}

/// Runs `items` in order.
///
/// `stop` is checked before each item; an item in flight always runs to
/// completion or failure.
pub fn run_job<F, E>(
    remote_fs: &F,
    direction: Direction,
    items: &[TransferItem],
    stop: &AtomicBool,
    mut on_event: E,
) -> JobReport
where
    F: RemoteFs + ?Sized,
    E: FnMut(JobEvent),
{
    let mut completed = 0;

    for (index, item) in items.iter().enumerate() {
        if stop.load(Ordering::Relaxed) {
            info!("Transfer stopped before {} ({} of {} done)", item.name, completed, items.len());
            return JobReport {
                completed,
                stopped: true,
                result: Ok(()),
            };
        }

        debug!("{} {} ({}/{})", direction.verb(), item.name, index + 1, items.len());
        on_event(JobEvent::Started { index });
        let mut on_progress = |transferred: u64, total: u64| {
            on_event(JobEvent::Progress {
                index,
                transferred,
                total,
            });
        };
        let outcome = match direction {
            Direction::Push => push(remote_fs, &item.local, &item.remote, &mut on_progress),
            Direction::Pull => pull(remote_fs, &item.remote, &item.local, &mut on_progress),
        };

        if let Err(e) = outcome {
            warn!("Transfer of {} failed: {}", item.name, e);
            return JobReport {
                completed,
                stopped: false,
                result: Err(TransferError::Item {
                    name: item.name.clone(),
                    source: Box::new(e),
                }),
            };
        }

        completed += 1;
        on_event(JobEvent::ItemDone { index });
    }

    info!("Transfer finished: {} item(s)", completed);
    JobReport {
        completed,
        stopped: false,
        result: Ok(()),
    }
}

/// Loop-side view of a running job, shown by the transfer overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    /// Job id; messages for other ids are ignored.
    pub id: u64,
    /// Transfer direction.
    pub direction: Direction,
    /// Item names in transfer order.
    pub items: Vec<String>,
    /// Index of the item in flight.
    pub cursor: usize,
    /// Items completed so far.
    pub completed: usize,
    /// Bytes written for the item in flight.
    pub transferred: u64,
    /// Size of the item in flight.
    pub total: u64,
    /// Set once the worker reported the end of the job.
    pub finished: bool,
    /// Terminal error text.
    pub error: Option<String>,
}

impl TransferJob {
    /// Creates a job that has not started yet.
    #[must_use]
    pub fn new(id: u64, direction: Direction, items: Vec<String>) -> Self {
        Self {
            id,
            direction,
            items,
            cursor: 0,
            completed: 0,
            transferred: 0,
            total: 0,
            finished: false,
            error: None,
        }
    }

    /// Applies a worker event.
    pub fn apply(&mut self, event: JobEvent) {
        match event {
            JobEvent::Started { index } => {
                self.cursor = index;
                self.transferred = 0;
                self.total = 0;
            }
            JobEvent::Progress {
                index,
                transferred,
                total,
            } => {
                self.cursor = index;
                self.transferred = transferred;
                self.total = total;
            }
            JobEvent::ItemDone { index } => {
                self.cursor = index;
                self.completed = index + 1;
            }
        }
    }

    /// Marks the job finished.
    pub fn finish(&mut self, completed: usize, error: Option<String>) {
        self.completed = completed;
        self.finished = true;
        self.error = error;
    }

    /// Name of the item in flight.
    #[must_use]
    pub fn current_name(&self) -> Option<&str> {
        self.items.get(self.cursor).map(String::as_str)
    }

    /// Progress of the item in flight in `0.0..=1.0`.
    #[must_use]
    pub fn item_ratio(&self) -> f64 {
        if self.total == 0 {
            return if self.finished { 1.0 } else { 0.0 };
        }
        (self.transferred as f64 / self.total as f64).clamp(0.0, 1.0)
    }

    /// Returns true if the job ended with an error.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}
