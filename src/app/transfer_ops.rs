//! Transfer jobs and their overlay.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::remote::{Direction, JobEvent, JobReport, TransferItem, TransferJob, remote_join};
use crate::ssh::ErrorClass;

use super::{
    App, CLOSE_DELAY_ERR, CLOSE_DELAY_OK, Command, Msg, Overlay, PendingAction, TRANSFER_TICK,
};

impl App {
    /// Requests a push of `names`, asking for a password first if needed.
    pub(super) fn request_transfer(&mut self, names: Vec<String>) -> Vec<Command> {
        if names.is_empty() {
            return Vec::new();
        }
        let Some(client) = self.selected_client.clone() else {
            return Vec::new();
        };
        let Some(profile) = self.effective_profile(&client) else {
            return self.set_error(format!("Unknown client '{}'", client));
        };

        if self.needs_password(&profile) {
            return self.update(Msg::PasswordRequired {
                client,
                action: PendingAction::Transfer(names),
            });
        }
        self.start_transfer(names)
    }

    /// Opens the transfer overlay and starts the job with its refresh tick.
    fn start_transfer(&mut self, names: Vec<String>) -> Vec<Command> {
        let (Some(client), Some(collection)) =
            (self.selected_client.clone(), self.selected_collection.clone())
        else {
            return Vec::new();
        };
        let Some(profile) = self.effective_profile(&client) else {
            return Vec::new();
        };

        let server_dir = self.config.server_collection_dir(&collection);
        let client_dir = profile.collection_dir(&collection);
        let items: Vec<TransferItem> = names
            .iter()
            .map(|name| TransferItem {
                name: name.clone(),
                local: server_dir.join(name),
                remote: remote_join(&client_dir, name),
            })
            .collect();

        self.next_job_id += 1;
        let job_id = self.next_job_id;
        let direction = Direction::Push;
        let stop = Arc::new(AtomicBool::new(false));
        self.transfer_stop = Some(Arc::clone(&stop));
        self.overlay = Overlay::Transfer(TransferJob::new(job_id, direction, names));

        info!(
            "Starting transfer job {}: {} item(s) to {}",
            job_id,
            items.len(),
            client
        );
        vec![
            Command::Transfer {
                job_id,
                profile,
                direction,
                items,
                stop,
            },
            Command::schedule(TRANSFER_TICK, Msg::TransferTick { job_id }),
        ]
    }

    fn active_job(&mut self, job_id: u64) -> Option<&mut TransferJob> {
        match &mut self.overlay {
            Overlay::Transfer(job) if job.id == job_id => Some(job),
            _ => None,
        }
    }

    pub(super) fn on_transfer_progress(&mut self, job_id: u64, event: JobEvent) {
        if let Some(job) = self.active_job(job_id) {
            job.apply(event);
        }
    }

    pub(super) fn on_transfer_done(&mut self, job_id: u64, report: JobReport) -> Vec<Command> {
        if self.active_job(job_id).is_none() {
            debug!("Ignoring result of closed transfer job {}", job_id);
            return Vec::new();
        }

        let error = report.result.err();
        if let Some(e) = &error {
            warn!("Transfer job {} failed: {}", job_id, e);
            if e.session_class() == Some(ErrorClass::Auth) {
                if let Some(client) = self.selected_client.clone() {
                    self.forget_password(&client);
                }
            }
        }

        let delay = if error.is_some() {
            CLOSE_DELAY_ERR
        } else {
            CLOSE_DELAY_OK
        };
        self.transfer_stop = None;
        if let Some(job) = self.active_job(job_id) {
            job.finish(report.completed, error.map(|e| e.to_string()));
        }
        vec![Command::schedule(delay, Msg::CloseOverlay { job_id })]
    }

    pub(super) fn on_transfer_tick(&mut self, job_id: u64) -> Vec<Command> {
        match self.active_job(job_id) {
            Some(job) if !job.finished => {
                vec![Command::schedule(TRANSFER_TICK, Msg::TransferTick { job_id })]
            }
            _ => Vec::new(),
        }
    }

    pub(super) fn on_close_overlay(&mut self, job_id: u64) -> Vec<Command> {
        if self.active_job(job_id).is_none() {
            return Vec::new();
        }
        self.close_transfer()
    }

    /// Stops listening to the running job and keeps its next item from
    /// starting. The item in flight runs to completion.
    pub(super) fn cancel_transfer(&mut self) -> Vec<Command> {
        if let Some(stop) = self.transfer_stop.take() {
            info!("Transfer cancelled from the overlay");
            stop.store(true, Ordering::Relaxed);
        }
        self.close_transfer()
    }

    /// Closes the transfer overlay, clears the selection and reloads items.
    fn close_transfer(&mut self) -> Vec<Command> {
        self.overlay = Overlay::None;
        self.items.clear_selection();
        self.load_items()
    }
}
