//! Discovery scans.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

use crate::config::ClientProfile;
use crate::ssh::{Device, ScanError};

use super::{App, Command, EditForm, Overlay, Panel, SCAN_DEADLINE};

impl App {
    /// Starts a scan unless one is already running.
    pub(super) fn start_scan(&mut self) -> Vec<Command> {
        if self.scan.scanning {
            return Vec::new();
        }

        self.scan.id += 1;
        let cancel = Arc::new(AtomicBool::new(false));
        self.scan.cancel = Some(Arc::clone(&cancel));
        self.scan.scanning = true;
        self.scan.devices.clear();
        self.scan.cursor = 0;
        self.panel = Panel::Scan;

        info!("Starting scan {}", self.scan.id);
        vec![Command::Scan {
            scan_id: self.scan.id,
            cancel,
            deadline: SCAN_DEADLINE,
        }]
    }

    /// Stops issuing probes; the partial result still arrives.
    pub(super) fn cancel_scan(&mut self) {
        if let Some(cancel) = &self.scan.cancel {
            info!("Cancelling scan {}", self.scan.id);
            cancel.store(true, Ordering::Relaxed);
        }
    }

    pub(super) fn on_scan_complete(
        &mut self,
        scan_id: u64,
        result: Result<Vec<Device>, ScanError>,
    ) -> Vec<Command> {
        if scan_id != self.scan.id {
            return Vec::new();
        }
        self.scan.scanning = false;
        self.scan.cancel = None;

        match result {
            Ok(devices) => {
                info!("Scan {} found {} device(s)", scan_id, devices.len());
                self.scan.devices = devices;
                self.scan.cursor = 0;
                Vec::new()
            }
            Err(e) => {
                warn!("Scan {} failed: {}", scan_id, e);
                self.set_error(format!("Scan failed: {}", e))
            }
        }
    }

    /// Opens the client form prefilled from the highlighted device.
    pub(super) fn add_scanned_device(&mut self) {
        let Some(device) = self.scan.devices.get(self.scan.cursor) else {
            return;
        };
        let profile = ClientProfile::new(device.display_name(), device.addr.to_string(), "");
        self.overlay = Overlay::Edit(EditForm::new(Some(&profile), None));
    }
}
