//! Overlay key handling and the operations overlays trigger.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{info, warn};

use crate::ssh::{ErrorClass, SessionError};

use super::{
    App, Command, ConnectionTest, EditForm, Mode, Overlay, PasswordPrompt, PendingAction,
    SettingsForm,
};

impl App {
    /// Routes a key to the active overlay.
    pub(super) fn handle_overlay_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match self.mode() {
            Mode::Editing => self.handle_edit_key(key),
            Mode::Settings => self.handle_settings_key(key),
            Mode::Password => self.handle_password_key(key),
            Mode::Transfer => match key.code {
                KeyCode::Esc => self.cancel_transfer(),
                _ => Vec::new(),
            },
            Mode::Normal => Vec::new(),
        }
    }

    /// Opens an empty client form.
    pub(super) fn open_add_form(&mut self) {
        self.overlay = Overlay::Edit(EditForm::new(None, None));
    }

    /// Opens the form for the client at `index`.
    pub(super) fn open_edit_form(&mut self, index: usize) {
        if let Some(profile) = self.config.clients.get(index) {
            self.overlay = Overlay::Edit(EditForm::new(Some(profile), Some(index)));
        }
    }

    /// Opens the server settings.
    pub(super) fn open_settings(&mut self) {
        self.overlay = Overlay::Settings(SettingsForm::new(&self.config.server.rom_dir));
    }

    /// Deletes the client at `index` and saves the configuration.
    pub(super) fn delete_client(&mut self, index: usize) -> Vec<Command> {
        if index >= self.config.clients.len() {
            return Vec::new();
        }
        let removed = self.config.clients.remove(index);
        info!("Deleted client {}", removed.name);

        self.passwords.remove(&removed.name);
        if self.selected_client.as_deref() == Some(removed.name.as_str()) {
            self.selected_client = None;
            self.selected_collection = None;
            self.items.clear();
        }
        self.device_cursor = self
            .device_cursor
            .min(self.config.clients.len().saturating_sub(1));

        vec![
            Command::ReleaseSession {
                client: removed.name,
            },
            Command::SaveConfig {
                config: self.config.clone(),
            },
        ]
    }

    pub(super) fn edit_form(&mut self) -> Option<&mut EditForm> {
        match &mut self.overlay {
            Overlay::Edit(form) => Some(form),
            _ => None,
        }
    }

    fn handle_edit_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('t') => return self.test_connection(),
                KeyCode::Char('b') => {
                    if let Some(form) = self.edit_form() {
                        form.toggle_browser_focus();
                    }
                    return Vec::new();
                }
                _ => {}
            }
        }

        let Some(form) = self.edit_form() else {
            return Vec::new();
        };
        if form.browser_focused() {
            return self.handle_browser_key(key);
        }
        match key.code {
            KeyCode::Esc => {
                self.overlay = Overlay::None;
                Vec::new()
            }
            KeyCode::Enter => self.save_edit_form(),
            KeyCode::Tab | KeyCode::Down => {
                form.next_field();
                Vec::new()
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.prev_field();
                Vec::new()
            }
            _ => {
                form.handle_input_key(key);
                Vec::new()
            }
        }
    }

    /// Validates the form and writes the client into the configuration.
    fn save_edit_form(&mut self) -> Vec<Command> {
        let Overlay::Edit(form) = &self.overlay else {
            return Vec::new();
        };
        let edit_index = form.edit_index;
        let profile = match form.build_profile() {
            Ok(profile) => profile,
            Err(e) => return self.set_error(e),
        };

        let duplicate = self
            .config
            .clients
            .iter()
            .enumerate()
            .any(|(i, c)| c.name == profile.name && Some(i) != edit_index);
        if duplicate {
            return self.set_error(format!("A client named '{}' already exists", profile.name));
        }

        let mut commands = Vec::new();
        let new_name = profile.name.clone();
        match edit_index.and_then(|i| self.config.clients.get_mut(i)) {
            Some(slot) => {
                let old_name = std::mem::replace(slot, profile).name;
                info!("Updated client {}", new_name);
                // Next use dials with the new parameters.
                commands.push(Command::ReleaseSession {
                    client: old_name.clone(),
                });
                if old_name != new_name {
                    commands.push(Command::ReleaseSession {
                        client: new_name.clone(),
                    });
                    self.passwords.remove(&old_name);
                    if self.selected_client.as_deref() == Some(old_name.as_str()) {
                        self.selected_client = Some(new_name.clone());
                    }
                }
            }
            None => {
                info!("Added client {}", new_name);
                self.config.clients.push(profile);
            }
        }

        let uses_password = self
            .config
            .client(&new_name)
            .is_some_and(|c| c.uses_password());
        if !uses_password {
            self.passwords.remove(&new_name);
        }

        self.overlay = Overlay::None;
        commands.push(Command::SaveConfig {
            config: self.config.clone(),
        });
        commands
    }

    /// Dispatches a connection test for the profile in the form.
    fn test_connection(&mut self) -> Vec<Command> {
        let Overlay::Edit(form) = &self.overlay else {
            return Vec::new();
        };
        let mut profile = match form.build_profile() {
            Ok(profile) => profile,
            Err(e) => {
                if let Some(form) = self.edit_form() {
                    form.test = Some(ConnectionTest::Failed(e));
                }
                return Vec::new();
            }
        };

        if profile.uses_password() && profile.auth.password.is_none() {
            profile.auth.password = self.passwords.get(&profile.name).cloned();
        }
        if let Some(form) = self.edit_form() {
            form.test = Some(ConnectionTest::Running);
        }
        info!("Testing connection to {}", profile.addr());
        vec![Command::Connect { profile }]
    }

    /// Marks the test passed and lists the form's ROM directory.
    pub(super) fn on_session_ready(&mut self, client: &str) -> Vec<Command> {
        info!("Connection test to {} succeeded", client);
        match self.edit_form() {
            Some(form) => {
                form.test = Some(ConnectionTest::Ok);
                self.start_browser()
            }
            None => Vec::new(),
        }
    }

    pub(super) fn on_session_error(&mut self, client: &str, error: SessionError) -> Vec<Command> {
        warn!("Connection to {} failed: {}", client, error);
        if error.class() == ErrorClass::Auth {
            self.forget_password(client);
        }
        match self.edit_form() {
            Some(form) => {
                form.test = Some(ConnectionTest::Failed(error.to_string()));
                Vec::new()
            }
            None => self.set_error(format!("{}: {}", client, error)),
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let Overlay::Settings(form) = &mut self.overlay else {
            return Vec::new();
        };
        match key.code {
            KeyCode::Esc => {
                self.overlay = Overlay::None;
                Vec::new()
            }
            KeyCode::Enter => {
                let rom_dir = form.rom_dir.value().trim().to_string();
                if rom_dir.is_empty() {
                    return self.set_error("ROM directory cannot be empty");
                }
                info!("Server ROM directory set to {}", rom_dir);
                self.config.server.rom_dir = rom_dir;
                self.overlay = Overlay::None;
                vec![Command::SaveConfig {
                    config: self.config.clone(),
                }]
            }
            _ => {
                form.rom_dir.handle_key(key);
                Vec::new()
            }
        }
    }

    /// Enters password mode holding `action`.
    pub(super) fn open_password_prompt(
        &mut self,
        client: &str,
        action: PendingAction,
    ) -> Vec<Command> {
        if self.mode() != Mode::Normal {
            return self.set_error(format!("Password required for {}", client));
        }
        let Some(profile) = self.config.client(client) else {
            return Vec::new();
        };
        info!("Password required for {}", client);
        self.overlay = Overlay::Password(PasswordPrompt::new(profile, action));
        Vec::new()
    }

    fn handle_password_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let Overlay::Password(prompt) = &mut self.overlay else {
            return Vec::new();
        };
        match key.code {
            KeyCode::Esc => {
                info!("Password entry cancelled for {}", prompt.client);
                self.overlay = Overlay::None;
                Vec::new()
            }
            KeyCode::Enter => self.submit_password(),
            _ => {
                prompt.input.handle_key(key);
                Vec::new()
            }
        }
    }

    /// Stores the password and re-dispatches the pending action once.
    fn submit_password(&mut self) -> Vec<Command> {
        let Overlay::Password(prompt) = std::mem::take(&mut self.overlay) else {
            return Vec::new();
        };
        let PasswordPrompt {
            client,
            input,
            pending,
            ..
        } = prompt;
        self.passwords.insert(client, input.value().to_string());

        match pending {
            PendingAction::None => Vec::new(),
            PendingAction::LoadItems => self.load_items(),
            PendingAction::Transfer(names) => self.request_transfer(names),
        }
    }
}
