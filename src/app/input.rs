//! Key handling in normal mode.
//!
//! Overlays get every key first; the panels only see input when no overlay
//! is open.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use super::{App, Command, Mode, Panel};

impl App {
    /// Handles a key event.
    pub(super) fn handle_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if key.kind != KeyEventKind::Press {
            return Vec::new();
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return Vec::new();
        }

        if self.mode() != Mode::Normal {
            return self.handle_overlay_key(key);
        }
        self.handle_normal_key(key)
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if self.show_help {
            if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                self.show_help = false;
            }
            return Vec::new();
        }

        match key.code {
            KeyCode::Char('?') => {
                self.show_help = true;
                Vec::new()
            }
            KeyCode::Char('q') => {
                self.quit();
                Vec::new()
            }
            KeyCode::Tab => {
                self.panel = self.panel.next();
                Vec::new()
            }
            KeyCode::BackTab => {
                self.panel = self.panel.prev();
                Vec::new()
            }
            KeyCode::Char('s') => self.start_scan(),
            _ => match self.panel {
                Panel::Devices => self.handle_devices_key(key),
                Panel::Scan => self.handle_scan_key(key),
                Panel::Consoles => self.handle_consoles_key(key),
                Panel::Roms => self.handle_roms_key(key),
            },
        }
    }

    fn handle_devices_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let count = self.config.clients.len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.device_cursor = self.device_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.device_cursor + 1 < count {
                    self.device_cursor += 1;
                }
            }
            KeyCode::Enter => self.select_client(self.device_cursor),
            KeyCode::Char('a') => self.open_add_form(),
            KeyCode::Char('e') => self.open_edit_form(self.device_cursor),
            KeyCode::Char('d') => return self.delete_client(self.device_cursor),
            KeyCode::Char('c') => self.open_settings(),
            _ => {}
        }
        Vec::new()
    }

    fn handle_scan_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let count = self.scan.devices.len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.scan.cursor = self.scan.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.scan.cursor + 1 < count {
                    self.scan.cursor += 1;
                }
            }
            KeyCode::Enter => self.add_scanned_device(),
            KeyCode::Esc if self.scan.scanning => self.cancel_scan(),
            _ => {}
        }
        Vec::new()
    }

    fn handle_consoles_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let count = self.collections.len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.console_cursor = self.console_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.console_cursor + 1 < count {
                    self.console_cursor += 1;
                }
            }
            KeyCode::Enter => return self.select_collection(self.console_cursor),
            _ => {}
        }
        Vec::new()
    }

    fn handle_roms_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.items.move_up(),
            KeyCode::Down | KeyCode::Char('j') => self.items.move_down(),
            KeyCode::Left | KeyCode::Char('h') => {
                let filter = self.items.filter().prev();
                self.items.set_filter(filter);
            }
            KeyCode::Right | KeyCode::Char('l') => {
                let filter = self.items.filter().next();
                self.items.set_filter(filter);
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.items.toggle_current(),
            KeyCode::Char('p') => {
                if self.selected_client.is_some() && self.selected_collection.is_some() {
                    let names = self.items.selected_in_order();
                    return self.request_transfer(names);
                }
            }
            _ => {}
        }
        Vec::new()
    }
}
