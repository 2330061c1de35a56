//! Status bar widget.
//!
//! One line at the bottom of the screen: a mode badge, then either the
//! current error or the key hints for the focused panel or overlay, and the
//! selected client on the right.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::Widget,
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Mode, Panel};

/// Separator between status bar segments.
const SEG_SEPARATOR: char = '\u{2502}';

/// Background of the whole bar.
const BAR_BG: Color = Color::Rgb(30, 30, 40);

/// Style variant for a key hint badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyHintStyle {
    /// Gray badge.
    #[default]
    Normal,
    /// Cyan badge for the main action.
    Highlighted,
    /// Red badge for destructive actions.
    Danger,
    /// Green badge for confirmation.
    Success,
}

impl KeyHintStyle {
    fn badge(self) -> Style {
        let (bg, fg) = match self {
            Self::Normal => (Color::DarkGray, Color::White),
            Self::Highlighted => (Color::Cyan, Color::Black),
            Self::Danger => (Color::Red, Color::White),
            Self::Success => (Color::Green, Color::Black),
        };
        Style::default().bg(bg).fg(fg).add_modifier(Modifier::BOLD)
    }
}

/// A key and what it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHint {
    /// Key text, e.g. "Enter".
    pub key: &'static str,
    /// Action, e.g. "Select".
    pub description: &'static str,
    /// Badge style.
    pub style: KeyHintStyle,
}

impl KeyHint {
    /// Hint with the normal badge.
    #[must_use]
    pub const fn new(key: &'static str, description: &'static str) -> Self {
        Self::styled(key, description, KeyHintStyle::Normal)
    }

    /// Hint with a specific badge.
    #[must_use]
    pub const fn styled(key: &'static str, description: &'static str, style: KeyHintStyle) -> Self {
        Self {
            key,
            description,
            style,
        }
    }

    fn width(&self) -> usize {
        self.key.width() + 2 + self.description.width() + 1
    }
}

/// Hints for a panel in normal mode.
#[must_use]
pub fn panel_hints(panel: Panel) -> Vec<KeyHint> {
    use KeyHintStyle::{Danger, Highlighted, Success};

    let mut hints = match panel {
        Panel::Devices => vec![
            KeyHint::styled("Enter", "Select", Highlighted),
            KeyHint::new("a", "Add"),
            KeyHint::new("e", "Edit"),
            KeyHint::styled("d", "Delete", Danger),
            KeyHint::new("c", "Settings"),
        ],
        Panel::Scan => vec![
            KeyHint::styled("Enter", "Add device", Highlighted),
            KeyHint::new("Esc", "Stop scan"),
        ],
        Panel::Consoles => vec![KeyHint::styled("Enter", "Open", Highlighted)],
        Panel::Roms => vec![
            KeyHint::new("Enter", "Toggle"),
            KeyHint::new("\u{2190}\u{2192}", "Filter"),
            KeyHint::styled("p", "Push", Success),
        ],
    };
    hints.extend([
        KeyHint::new("s", "Scan"),
        KeyHint::new("Tab", "Panel"),
        KeyHint::new("?", "Help"),
        KeyHint::styled("q", "Quit", Danger),
    ]);
    hints
}

/// Hints for a modal mode.
#[must_use]
pub fn overlay_hints(mode: Mode) -> Vec<KeyHint> {
    use KeyHintStyle::{Danger, Highlighted, Success};

    match mode {
        Mode::Normal => Vec::new(),
        Mode::Editing => vec![
            KeyHint::new("Tab", "Next field"),
            KeyHint::styled("Ctrl+T", "Test", Highlighted),
            KeyHint::new("Ctrl+B", "Browse"),
            KeyHint::styled("Enter", "Save", Success),
            KeyHint::styled("Esc", "Cancel", Danger),
        ],
        Mode::Settings | Mode::Password => vec![
            KeyHint::styled("Enter", "Submit", Success),
            KeyHint::styled("Esc", "Cancel", Danger),
        ],
        Mode::Transfer => vec![KeyHint::styled("Esc", "Stop", Danger)],
    }
}

/// Status bar widget.
pub struct StatusBar<'a> {
    mode: Mode,
    error: Option<&'a str>,
    hints: Vec<KeyHint>,
    client: Option<&'a str>,
}

impl<'a> StatusBar<'a> {
    /// Creates an empty status bar in normal mode.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            error: None,
            hints: Vec::new(),
            client: None,
        }
    }

    /// Builds the bar for the current application state.
    #[must_use]
    pub fn for_app(app: &'a App) -> Self {
        let mode = app.mode();
        let hints = match mode {
            Mode::Normal => panel_hints(app.panel()),
            other => overlay_hints(other),
        };
        Self::new(mode)
            .hints(hints)
            .error(app.error())
            .client(app.selected_client())
    }

    /// Sets the error shown instead of the hints.
    #[must_use]
    pub fn error(mut self, error: Option<&'a str>) -> Self {
        self.error = error;
        self
    }

    /// Sets the key hints.
    #[must_use]
    pub fn hints(mut self, hints: Vec<KeyHint>) -> Self {
        self.hints = hints;
        self
    }

    /// Sets the selected client shown on the right.
    #[must_use]
    pub fn client(mut self, client: Option<&'a str>) -> Self {
        self.client = client;
        self
    }

    fn mode_label(&self) -> (&'static str, Color) {
        match self.mode {
            Mode::Normal => ("NORMAL", Color::Blue),
            Mode::Editing => ("EDIT", Color::Yellow),
            Mode::Settings => ("SETTINGS", Color::Yellow),
            Mode::Password => ("PASSWORD", Color::Magenta),
            Mode::Transfer => ("TRANSFER", Color::Green),
        }
    }
}

/// Writes `text` from `x`, stopping at `end`. Returns the next column.
fn put(buf: &mut Buffer, mut x: u16, y: u16, end: u16, text: &str, style: Style) -> u16 {
    for c in text.chars() {
        if x >= end {
            break;
        }
        if let Some(cell) = buf.cell_mut((x, y)) {
            cell.set_char(c);
            cell.set_style(style);
        }
        x += 1;
    }
    x
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let y = area.y;
        let bg = Style::default().bg(BAR_BG).fg(Color::White);
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_char(' ');
                cell.set_style(bg);
            }
        }

        // Right segment first so the middle knows how much room it has.
        let mut end = area.x + area.width;
        if let Some(client) = self.client {
            let text = format!(" {} {} ", SEG_SEPARATOR, client);
            let w = text.width() as u16;
            if w + 12 < area.width {
                end -= w;
                put(buf, end, y, area.x + area.width, &text, bg.fg(Color::Green));
            }
        }

        let (label, color) = self.mode_label();
        let mut x = put(
            buf,
            area.x,
            y,
            end,
            &format!(" {} ", label),
            Style::default().bg(color).fg(Color::Black).add_modifier(Modifier::BOLD),
        );
        x = put(buf, x, y, end, &format!("{} ", SEG_SEPARATOR), bg.fg(Color::DarkGray));

        if let Some(error) = self.error {
            let available = end.saturating_sub(x) as usize;
            let text = crate::ui::panels::truncate(error, available);
            put(buf, x, y, end, &text, bg.fg(Color::Red).add_modifier(Modifier::BOLD));
            return;
        }

        let desc_style = bg.fg(Color::Gray);
        for (i, hint) in self.hints.iter().enumerate() {
            let needed = hint.width() + if i > 0 { 3 } else { 0 };
            if x as usize + needed > end as usize {
                break;
            }
            if i > 0 {
                x = put(buf, x, y, end, &format!(" {} ", SEG_SEPARATOR), bg.fg(Color::DarkGray));
            }
            x = put(buf, x, y, end, &format!(" {} ", hint.key), hint.style.badge());
            x = put(buf, x, y, end, &format!(" {}", hint.description), desc_style);
        }
    }
}
