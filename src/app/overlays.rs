//! Modal overlays: client edit form, settings, password prompt, transfer.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::config::{AuthMethod, ClientProfile, DEFAULT_PORT};
use crate::remote::{DirBrowser, TransferJob};

use super::messages::PendingAction;

/// Single-line text input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    /// Cursor position in characters.
    cursor: usize,
    masked: bool,
}

impl TextInput {
    /// Creates an input holding `value` with the cursor at the end.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor = value.chars().count();
        Self {
            value,
            cursor,
            masked: false,
        }
    }

    /// Creates an input that renders as asterisks.
    #[must_use]
    pub fn masked(value: impl Into<String>) -> Self {
        Self {
            masked: true,
            ..Self::new(value)
        }
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cursor position in characters.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Text to render.
    #[must_use]
    pub fn display(&self) -> String {
        if self.masked {
            "*".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_idx)
            .map_or(self.value.len(), |(i, _)| i)
    }

    /// Inserts a character at the cursor.
    pub fn insert(&mut self, c: char) {
        let idx = self.byte_index(self.cursor);
        self.value.insert(idx, c);
        self.cursor += 1;
    }

    /// Deletes the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let idx = self.byte_index(self.cursor);
        self.value.remove(idx);
    }

    /// Deletes the character under the cursor.
    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let idx = self.byte_index(self.cursor);
            self.value.remove(idx);
        }
    }

    /// Handles an editing key. Returns true if the key was consumed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.insert(c);
            }
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.value.chars().count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.chars().count(),
            _ => return false,
        }
        true
    }
}

/// Fields of the client edit form, in focus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    Name,
    Host,
    Port,
    User,
    AuthMethod,
    KeyPath,
    Password,
    RomDir,
}

impl EditField {
    /// All fields in focus order.
    pub const ALL: [Self; 8] = [
        Self::Name,
        Self::Host,
        Self::Port,
        Self::User,
        Self::AuthMethod,
        Self::KeyPath,
        Self::Password,
        Self::RomDir,
    ];

    /// Field label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Host => "Host",
            Self::Port => "Port",
            Self::User => "User",
            Self::AuthMethod => "Auth (key/password)",
            Self::KeyPath => "Key Path",
            Self::Password => "Password",
            Self::RomDir => "ROM Dir",
        }
    }

    /// Placeholder shown while the field is empty.
    #[must_use]
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Name => "my-device",
            Self::Host => "192.168.1.100",
            Self::Port => "22",
            Self::User => "pi",
            Self::AuthMethod => "key",
            Self::KeyPath => "~/.ssh/id_rsa",
            Self::Password => "",
            Self::RomDir => "/home/pi/RetroPie/roms",
        }
    }
}

/// Result of the last connection test run from the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTest {
    /// Waiting for the worker.
    Running,
    /// Session established.
    Ok,
    /// Session failed with this message.
    Failed(String),
}

/// Add/edit client form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    inputs: Vec<TextInput>,
    focus: usize,
    /// Index of the client being edited, None when adding.
    pub edit_index: Option<usize>,
    /// Console directory overrides carried over from the edited client.
    console_dirs: std::collections::BTreeMap<String, String>,
    /// Outcome of Ctrl+T.
    pub test: Option<ConnectionTest>,
    /// Remote directory browser, filled after a successful Ctrl+T.
    pub browser: DirBrowser,
    browser_focused: bool,
}

impl EditForm {
    /// Creates a form prefilled from `profile`.
    #[must_use]
    pub fn new(profile: Option<&ClientProfile>, edit_index: Option<usize>) -> Self {
        let inputs = EditField::ALL
            .iter()
            .map(|field| {
                let value = profile.map(|p| Self::field_value(p, *field)).unwrap_or_default();
                if *field == EditField::Password {
                    TextInput::masked(value)
                } else {
                    TextInput::new(value)
                }
            })
            .collect();

        Self {
            inputs,
            focus: 0,
            edit_index,
            console_dirs: profile.map(|p| p.console_dirs.clone()).unwrap_or_default(),
            test: None,
            browser: DirBrowser::default(),
            browser_focused: false,
        }
    }

    fn field_value(profile: &ClientProfile, field: EditField) -> String {
        match field {
            EditField::Name => profile.name.clone(),
            EditField::Host => profile.host.clone(),
            EditField::Port => profile.port.to_string(),
            EditField::User => profile.user.clone(),
            EditField::AuthMethod => profile.auth.method.as_str().to_string(),
            EditField::KeyPath => profile.auth.key_path.clone().unwrap_or_default(),
            EditField::Password => profile.auth.password.clone().unwrap_or_default(),
            EditField::RomDir => profile.rom_dir.clone(),
        }
    }

    /// Title of the form.
    #[must_use]
    pub fn title(&self) -> &'static str {
        if self.edit_index.is_some() {
            "Edit Client"
        } else {
            "Add Client"
        }
    }

    /// Focused field.
    #[must_use]
    pub fn focused(&self) -> EditField {
        EditField::ALL[self.focus]
    }

    /// Input of a field.
    #[must_use]
    pub fn input(&self, field: EditField) -> &TextInput {
        &self.inputs[field as usize]
    }

    /// Mutable input of a field.
    pub fn input_mut(&mut self, field: EditField) -> &mut TextInput {
        &mut self.inputs[field as usize]
    }

    /// Moves focus to the next field.
    pub fn next_field(&mut self) {
        self.focus = (self.focus + 1) % EditField::ALL.len();
    }

    /// Moves focus to the previous field.
    pub fn prev_field(&mut self) {
        self.focus = (self.focus + EditField::ALL.len() - 1) % EditField::ALL.len();
    }

    /// Returns true while keys go to the browser instead of the fields.
    #[must_use]
    pub fn browser_focused(&self) -> bool {
        self.browser_focused
    }

    /// Moves key focus to the browser, if it has a listing, or back.
    pub fn toggle_browser_focus(&mut self) {
        self.browser_focused = !self.browser_focused && self.browser.is_navigable();
    }

    /// Returns key focus to the fields.
    pub fn focus_fields(&mut self) {
        self.browser_focused = false;
    }

    /// Writes a picked directory into the ROM dir field.
    pub fn set_rom_dir(&mut self, path: &str) {
        *self.input_mut(EditField::RomDir) = TextInput::new(path);
    }

    /// Passes an editing key to the focused input.
    pub fn handle_input_key(&mut self, key: KeyEvent) -> bool {
        let field = self.focused();
        self.input_mut(field).handle_key(key)
    }

    fn trimmed(&self, field: EditField) -> String {
        self.input(field).value().trim().to_string()
    }

    /// Builds a profile from the form.
    ///
    /// Name, host and user are required; an empty port means 22.
    pub fn build_profile(&self) -> Result<ClientProfile, String> {
        let name = self.trimmed(EditField::Name);
        let host = self.trimmed(EditField::Host);
        let user = self.trimmed(EditField::User);
        if name.is_empty() || host.is_empty() || user.is_empty() {
            return Err("name, host, and user are required".to_string());
        }

        let port_text = self.trimmed(EditField::Port);
        let port = if port_text.is_empty() {
            DEFAULT_PORT
        } else {
            match port_text.parse::<u16>() {
                Ok(0) => DEFAULT_PORT,
                Ok(port) => port,
                Err(_) => return Err(format!("invalid port '{}'", port_text)),
            }
        };

        let method_text = self.trimmed(EditField::AuthMethod);
        let method = if method_text.is_empty() {
            AuthMethod::Key
        } else {
            AuthMethod::parse(&method_text)
                .ok_or_else(|| format!("auth method must be key or password, not '{}'", method_text))?
        };

        let key_path = self.trimmed(EditField::KeyPath);
        let password = self.input(EditField::Password).value().to_string();

        let mut profile = ClientProfile::new(name, host, user);
        profile.port = port;
        profile.auth.method = method;
        profile.auth.key_path = (!key_path.is_empty()).then_some(key_path);
        profile.auth.password = (!password.is_empty()).then_some(password);
        profile.rom_dir = self.trimmed(EditField::RomDir);
        profile.console_dirs = self.console_dirs.clone();
        Ok(profile)
    }
}

/// Server settings form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
    /// Server ROM directory.
    pub rom_dir: TextInput,
}

impl SettingsForm {
    /// Creates the form with the current ROM directory.
    #[must_use]
    pub fn new(rom_dir: &str) -> Self {
        Self {
            rom_dir: TextInput::new(rom_dir),
        }
    }
}

/// Password prompt holding the operation it gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPrompt {
    /// Client the password is for.
    pub client: String,
    /// Host shown in the dialog.
    pub host: String,
    /// User shown in the dialog.
    pub user: String,
    /// Masked input.
    pub input: TextInput,
    /// Operation to re-dispatch on submit.
    pub pending: PendingAction,
}

impl PasswordPrompt {
    /// Creates a prompt for `profile`.
    #[must_use]
    pub fn new(profile: &ClientProfile, pending: PendingAction) -> Self {
        Self {
            client: profile.name.clone(),
            host: profile.host.clone(),
            user: profile.user.clone(),
            input: TextInput::masked(""),
            pending,
        }
    }
}

/// The active overlay. Exactly one (or none) exists at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Overlay {
    /// No overlay; panels receive input.
    #[default]
    None,
    /// Client form.
    Edit(EditForm),
    /// Server settings.
    Settings(SettingsForm),
    /// Password prompt.
    Password(PasswordPrompt),
    /// Transfer progress.
    Transfer(TransferJob),
}
