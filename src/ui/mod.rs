//! User interface module.
//!
//! Draws the four panels, the details strip, the status bar and the active
//! overlay from a read-only view of [`App`].

pub mod overlays;
pub mod panels;
pub mod statusbar;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    widgets::Widget,
};

use crate::app::{App, Overlay};

pub use statusbar::{KeyHint, KeyHintStyle, StatusBar};

/// Draws the whole screen.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(1)])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(rows[0]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(consoles_height(app)),
            Constraint::Min(3),
            Constraint::Length(panels::DETAILS_HEIGHT),
        ])
        .split(columns[1]);

    let buf = frame.buffer_mut();
    panels::render_devices(app, left[0], buf);
    panels::render_scan(app, left[1], buf);
    panels::render_consoles(app, right[0], buf);
    panels::render_roms(app, right[1], buf);
    panels::render_details(app, right[2], buf);

    match app.overlay() {
        Overlay::None => {
            if app.show_help() {
                overlays::render_help(area, buf);
            }
        }
        Overlay::Edit(form) => overlays::render_edit_form(form, area, buf),
        Overlay::Settings(form) => overlays::render_settings(form, area, buf),
        Overlay::Password(prompt) => overlays::render_password(prompt, area, buf),
        Overlay::Transfer(job) => overlays::render_transfer(job, area, buf),
    }

    StatusBar::for_app(app).render(rows[1], buf);
}

/// Rows of the consoles panel: every collection plus borders, capped.
fn consoles_height(app: &App) -> u16 {
    (app.collections().len() as u16 + 2).clamp(4, 12)
}

/// Centers a `width` x `height` rectangle in `area`, clamped to fit.
#[must_use]
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;
    Rect::new(x, y, width, height)
}
