//! Remote directory browsing from the client form.

use crossterm::event::{KeyCode, KeyEvent};
use tracing::{debug, info, warn};

use crate::config::ClientProfile;
use crate::remote::{BrowserAction, RemoteEntry, TransferError};

use super::{App, Command, EditField, Overlay};

impl App {
    /// Profile described by the form, and whether the pooled session of
    /// that name may serve it.
    fn browse_profile(&self) -> Option<(ClientProfile, bool)> {
        let Overlay::Edit(form) = &self.overlay else {
            return None;
        };
        let mut profile = form.build_profile().ok()?;
        if profile.uses_password() && profile.auth.password.is_none() {
            profile.auth.password = self.passwords.get(&profile.name).cloned();
        }
        let pooled = self
            .effective_profile(&profile.name)
            .is_some_and(|saved| saved == profile);
        Some((profile, pooled))
    }

    /// Lists `path` (or the starting directory) in the form's browser.
    pub(super) fn browse_to(&mut self, path: Option<String>) -> Vec<Command> {
        let Some((profile, pooled)) = self.browse_profile() else {
            return Vec::new();
        };
        self.next_browse_id += 1;
        let request = self.next_browse_id;
        if let Some(form) = self.edit_form() {
            form.browser.start(request);
        }
        debug!("Browsing {:?} on {} (pooled: {})", path, profile.name, pooled);
        vec![Command::BrowseDir {
            request,
            profile,
            path,
            pooled,
        }]
    }

    /// Starts the browser in the form's ROM directory, or the login
    /// directory when that field is empty.
    pub(super) fn start_browser(&mut self) -> Vec<Command> {
        let Overlay::Edit(form) = &self.overlay else {
            return Vec::new();
        };
        let rom_dir = form.input(EditField::RomDir).value().trim().to_string();
        self.browse_to((!rom_dir.is_empty()).then_some(rom_dir))
    }

    /// Routes a key while the browser has focus.
    pub(super) fn handle_browser_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let Some(form) = self.edit_form() else {
            return Vec::new();
        };
        if key.code == KeyCode::Esc {
            form.focus_fields();
            return Vec::new();
        }
        if !form.browser.is_navigable() {
            return Vec::new();
        }

        let action = match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                form.browser.move_up();
                BrowserAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                form.browser.move_down();
                BrowserAction::None
            }
            KeyCode::Enter => form.browser.activate(),
            KeyCode::Backspace | KeyCode::Left => form.browser.go_up(),
            _ => BrowserAction::None,
        };

        match action {
            BrowserAction::None => Vec::new(),
            BrowserAction::Select(path) => {
                info!("Picked remote ROM directory {}", path);
                form.set_rom_dir(&path);
                form.focus_fields();
                Vec::new()
            }
            BrowserAction::Open(path) => self.browse_to(Some(path)),
        }
    }

    pub(super) fn on_dir_listed(&mut self, request: u64, path: String, entries: Vec<RemoteEntry>) {
        let applied = self
            .edit_form()
            .is_some_and(|form| form.browser.listed(request, path, entries));
        if !applied {
            debug!("Ignoring stale directory listing {}", request);
        }
    }

    pub(super) fn on_dir_list_failed(&mut self, request: u64, error: TransferError) {
        warn!("Directory listing {} failed: {}", request, error);
        let message = error.to_string();
        let applied = self
            .edit_form()
            .is_some_and(|form| form.browser.failed(request, message));
        if !applied {
            debug!("Ignoring stale directory error {}", request);
        }
    }
}
