//! Application state and the message loop.
//!
//! `App` owns every piece of orchestration state. Input and worker results
//! arrive as [`Msg`]; `update` mutates state synchronously and returns the
//! [`Command`]s to run. Nothing in this module performs I/O except the
//! initial collection discovery in [`App::new`].

mod browse_ops;
mod input;
mod library_ops;
pub mod messages;
mod overlay_ops;
pub mod overlays;
mod scan_ops;
mod transfer_ops;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{ClientProfile, Collection, Config};
use crate::library::{ItemStatus, LetterFilter, Location, discover_collections};
use crate::ssh::Device;

pub use messages::{Command, Msg, PendingAction};
pub use overlays::{ConnectionTest, EditField, EditForm, Overlay, PasswordPrompt, SettingsForm, TextInput};

/// Refresh interval of the transfer overlay.
pub const TRANSFER_TICK: Duration = Duration::from_millis(100);

/// Delay before a successful transfer overlay closes.
pub const CLOSE_DELAY_OK: Duration = Duration::from_millis(500);

/// Delay before a failed transfer overlay closes.
pub const CLOSE_DELAY_ERR: Duration = Duration::from_secs(2);

/// Lifetime of a status-line error.
pub const ERROR_LIFETIME: Duration = Duration::from_secs(5);

/// Overall deadline of a discovery scan.
pub const SCAN_DEADLINE: Duration = Duration::from_secs(crate::ssh::scanner::SCAN_DEADLINE_SECS);

/// Interaction mode, derived from the active overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Panels receive input.
    #[default]
    Normal,
    /// Client form is open.
    Editing,
    /// Transfer progress is shown.
    Transfer,
    /// Server settings are open.
    Settings,
    /// Waiting for a password.
    Password,
}

/// Panel focused in normal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Panel {
    /// Configured clients.
    #[default]
    Devices,
    /// Discovery results.
    Scan,
    /// Collections of the server library.
    Consoles,
    /// Items of the selected collection.
    Roms,
}

impl Panel {
    const ORDER: [Self; 4] = [Self::Devices, Self::Scan, Self::Consoles, Self::Roms];

    fn index(self) -> usize {
        Self::ORDER.iter().position(|p| *p == self).unwrap_or(0)
    }

    /// Next panel in tab order.
    #[must_use]
    pub fn next(self) -> Self {
        Self::ORDER[(self.index() + 1) % Self::ORDER.len()]
    }

    /// Previous panel in tab order.
    #[must_use]
    pub fn prev(self) -> Self {
        Self::ORDER[(self.index() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    /// Panel title.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Devices => "Devices",
            Self::Scan => "Scan",
            Self::Consoles => "Consoles",
            Self::Roms => "ROMs",
        }
    }
}

/// Discovery state.
#[derive(Debug, Default)]
pub struct ScanState {
    /// Devices found by the last scan.
    pub devices: Vec<Device>,
    /// Highlighted device.
    pub cursor: usize,
    /// True while a scan is running.
    pub scanning: bool,
    /// Id of the latest scan; older results are ignored.
    pub id: u64,
    cancel: Option<Arc<AtomicBool>>,
}

/// Items of the selected collection with filter and selection.
#[derive(Debug, Default)]
pub struct ItemList {
    items: Vec<ItemStatus>,
    filter: LetterFilter,
    cursor: usize,
    selected: HashSet<String>,
    /// True while a listing is in flight.
    pub loading: bool,
}

impl ItemList {
    /// Every item, unfiltered.
    #[must_use]
    pub fn all(&self) -> &[ItemStatus] {
        &self.items
    }

    /// Items passing the letter filter.
    #[must_use]
    pub fn visible(&self) -> Vec<&ItemStatus> {
        self.items
            .iter()
            .filter(|item| self.filter.matches(&item.name))
            .collect()
    }

    /// Active letter filter.
    #[must_use]
    pub fn filter(&self) -> LetterFilter {
        self.filter
    }

    /// Cursor into the visible items.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Item under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&ItemStatus> {
        self.visible().get(self.cursor).copied()
    }

    /// Returns true if `name` is selected.
    #[must_use]
    pub fn is_selected(&self, name: &str) -> bool {
        self.selected.contains(name)
    }

    /// Number of selected items.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Number of items already on the client.
    #[must_use]
    pub fn synced_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.location == Location::OnBoth)
            .count()
    }

    /// Selected names in list order.
    #[must_use]
    pub fn selected_in_order(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| self.selected.contains(&item.name))
            .map(|item| item.name.clone())
            .collect()
    }

    /// Moves the cursor up.
    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Moves the cursor down.
    pub fn move_down(&mut self) {
        let len = self.visible().len();
        if self.cursor + 1 < len {
            self.cursor += 1;
        }
    }

    /// Changes the letter filter and resets the cursor.
    pub fn set_filter(&mut self, filter: LetterFilter) {
        self.filter = filter;
        self.cursor = 0;
    }

    /// Toggles selection of the item under the cursor.
    pub fn toggle_current(&mut self) {
        let Some(name) = self.current().map(|item| item.name.clone()) else {
            return;
        };
        if !self.selected.remove(&name) {
            self.selected.insert(name);
        }
    }

    /// Clears the selection.
    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Replaces the items, keeping selected names that still exist.
    pub fn replace(&mut self, items: Vec<ItemStatus>) {
        self.items = items;
        let names: HashSet<&str> = self.items.iter().map(|i| i.name.as_str()).collect();
        self.selected.retain(|name| names.contains(name.as_str()));
        let len = self.visible().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
        self.loading = false;
    }

    /// Drops items, selection and filter.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Application state.
pub struct App {
    config: Config,
    config_path: PathBuf,
    collections: Vec<Collection>,
    panel: Panel,
    overlay: Overlay,
    device_cursor: usize,
    console_cursor: usize,
    scan: ScanState,
    items: ItemList,
    selected_client: Option<String>,
    selected_collection: Option<Collection>,
    /// Passwords entered this run, by client name. Never persisted.
    passwords: HashMap<String, String>,
    next_job_id: u64,
    /// Id of the latest browser listing.
    next_browse_id: u64,
    transfer_stop: Option<Arc<AtomicBool>>,
    error: Option<String>,
    error_seq: u64,
    show_help: bool,
    running: bool,
}

impl App {
    /// Creates the application and discovers the server collections.
    #[must_use]
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        let collections = discover_collections(&config);
        info!(
            "Loaded {} client(s) and {} collection(s)",
            config.clients.len(),
            collections.len()
        );

        Self {
            config,
            config_path,
            collections,
            panel: Panel::default(),
            overlay: Overlay::None,
            device_cursor: 0,
            console_cursor: 0,
            scan: ScanState::default(),
            items: ItemList::default(),
            selected_client: None,
            selected_collection: None,
            passwords: HashMap::new(),
            next_job_id: 0,
            next_browse_id: 0,
            transfer_stop: None,
            error: None,
            error_seq: 0,
            show_help: false,
            running: true,
        }
    }

    /// Handles one message and returns the work it triggers.
    pub fn update(&mut self, msg: Msg) -> Vec<Command> {
        match msg {
            Msg::Key(key) => self.handle_key(key),
            Msg::ItemsLoaded {
                client,
                collection,
                items,
                client_error,
            } => self.on_items_loaded(&client, &collection, items, client_error),
            Msg::ItemsLoadFailed {
                client,
                collection,
                error,
            } => self.on_items_load_failed(&client, &collection, error),
            Msg::TransferProgress { job_id, event } => {
                self.on_transfer_progress(job_id, event);
                Vec::new()
            }
            Msg::TransferDone { job_id, report } => self.on_transfer_done(job_id, report),
            Msg::ScanComplete { scan_id, result } => self.on_scan_complete(scan_id, result),
            Msg::SessionReady { client } => self.on_session_ready(&client),
            Msg::SessionError { client, error } => self.on_session_error(&client, error),
            Msg::DirListed {
                request,
                path,
                entries,
            } => {
                self.on_dir_listed(request, path, entries);
                Vec::new()
            }
            Msg::DirListFailed { request, error } => {
                self.on_dir_list_failed(request, error);
                Vec::new()
            }
            Msg::PasswordRequired { client, action } => self.open_password_prompt(&client, action),
            Msg::ConfigChanged { collections } => {
                self.on_config_changed(collections);
                Vec::new()
            }
            Msg::Error(error) => self.set_error(error),
            Msg::ClearError { seq } => {
                if seq == self.error_seq {
                    self.error = None;
                }
                Vec::new()
            }
            Msg::TransferTick { job_id } => self.on_transfer_tick(job_id),
            Msg::CloseOverlay { job_id } => self.on_close_overlay(job_id),
        }
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        match self.overlay {
            Overlay::None => Mode::Normal,
            Overlay::Edit(_) => Mode::Editing,
            Overlay::Settings(_) => Mode::Settings,
            Overlay::Password(_) => Mode::Password,
            Overlay::Transfer(_) => Mode::Transfer,
        }
    }

    /// Operation waiting for a password. Only set in password mode.
    #[must_use]
    pub fn pending_action(&self) -> PendingAction {
        match &self.overlay {
            Overlay::Password(prompt) => prompt.pending.clone(),
            _ => PendingAction::None,
        }
    }

    /// Active overlay.
    #[must_use]
    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    /// Focused panel.
    #[must_use]
    pub fn panel(&self) -> Panel {
        self.panel
    }

    /// Loaded configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path the configuration is saved to.
    #[must_use]
    pub fn config_path(&self) -> &std::path::Path {
        &self.config_path
    }

    /// Collections of the server library.
    #[must_use]
    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    /// Highlighted client.
    #[must_use]
    pub fn device_cursor(&self) -> usize {
        self.device_cursor
    }

    /// Highlighted collection.
    #[must_use]
    pub fn console_cursor(&self) -> usize {
        self.console_cursor
    }

    /// Discovery state.
    #[must_use]
    pub fn scan(&self) -> &ScanState {
        &self.scan
    }

    /// Item list of the selected collection.
    #[must_use]
    pub fn items(&self) -> &ItemList {
        &self.items
    }

    /// Name of the selected client.
    #[must_use]
    pub fn selected_client(&self) -> Option<&str> {
        self.selected_client.as_deref()
    }

    /// Selected collection.
    #[must_use]
    pub fn selected_collection(&self) -> Option<&Collection> {
        self.selected_collection.as_ref()
    }

    /// Password entered this run for `client`.
    #[must_use]
    pub fn runtime_password(&self, client: &str) -> Option<&str> {
        self.passwords.get(client).map(String::as_str)
    }

    /// Status-line error.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns true while the help overlay is shown.
    #[must_use]
    pub fn show_help(&self) -> bool {
        self.show_help
    }

    /// Returns true until the user quits.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stops the loop and any background work that can still be stopped.
    pub fn quit(&mut self) {
        info!("Quit requested");
        self.running = false;
        if let Some(cancel) = self.scan.cancel.take() {
            cancel.store(true, Ordering::Relaxed);
        }
        if let Some(stop) = self.transfer_stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
    }

    /// Shows `error` on the status line and schedules its removal.
    pub(crate) fn set_error(&mut self, error: impl Into<String>) -> Vec<Command> {
        let error = error.into();
        debug!("Status error: {}", error);
        self.error_seq += 1;
        self.error = Some(error);
        vec![Command::schedule(
            ERROR_LIFETIME,
            Msg::ClearError {
                seq: self.error_seq,
            },
        )]
    }

    /// Profile of `name` with the runtime password applied.
    fn effective_profile(&self, name: &str) -> Option<ClientProfile> {
        let mut profile = self.config.client(name)?.clone();
        if profile.uses_password() {
            if let Some(password) = self.passwords.get(name) {
                profile.auth.password = Some(password.clone());
            }
        }
        Some(profile)
    }

    /// Returns true if using `profile` needs a password nobody supplied yet.
    ///
    /// A password stored in the configuration counts as supplied.
    fn needs_password(&self, profile: &ClientProfile) -> bool {
        profile.uses_password()
            && !self.passwords.contains_key(&profile.name)
            && profile.auth.password.as_deref().is_none_or(str::is_empty)
    }

    /// Drops the runtime password of a password client after an auth failure.
    fn forget_password(&mut self, client: &str) -> bool {
        let uses_password = self
            .config
            .client(client)
            .is_some_and(ClientProfile::uses_password);
        if uses_password && self.passwords.remove(client).is_some() {
            info!("Discarded runtime password for {}", client);
        }
        uses_password
    }

    fn on_config_changed(&mut self, collections: Vec<Collection>) {
        info!("Configuration saved, {} collection(s)", collections.len());
        self.collections = collections;
        self.console_cursor = self
            .console_cursor
            .min(self.collections.len().saturating_sub(1));

        let still_present = self
            .selected_collection
            .as_ref()
            .is_some_and(|c| self.collections.iter().any(|known| known.dir == c.dir));
        if !still_present && self.selected_collection.take().is_some() {
            self.items.clear();
        }
    }
}
