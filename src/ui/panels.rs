//! The four normal-mode panels and the details strip.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, Panel};
use crate::library::{LetterFilter, Location};

/// Formats a byte count with a binary unit.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b >= GB => format!("{:.1} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.1} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.1} KB", b as f64 / KB as f64),
        b => format!("{} B", b),
    }
}

/// Shortens `text` to `max` display columns, ending with an ellipsis.
#[must_use]
pub fn truncate(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for c in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if width + w + 1 > max {
            break;
        }
        out.push(c);
        width += w;
    }
    out.push('\u{2026}');
    out
}

fn panel_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let title_style = if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(border)
        .title(Span::styled(format!(" {} ", title), title_style))
}

/// First row to draw so that `cursor` stays visible in `height` rows.
fn scroll_offset(cursor: usize, height: usize) -> usize {
    if height == 0 {
        return 0;
    }
    cursor.saturating_sub(height - 1)
}

fn hint(text: &str) -> Line<'static> {
    Line::from(Span::styled(
        format!(" {}", text),
        Style::default().fg(Color::DarkGray),
    ))
}

fn row_style(is_cursor: bool, focused: bool) -> Style {
    match (is_cursor, focused) {
        (true, true) => Style::default().bg(Color::Rgb(40, 60, 90)).fg(Color::White),
        (true, false) => Style::default().bg(Color::Rgb(35, 35, 45)),
        _ => Style::default(),
    }
}

/// Renders the configured clients.
pub fn render_devices(app: &App, area: Rect, buf: &mut Buffer) {
    let focused = app.panel() == Panel::Devices;
    let block = panel_block(Panel::Devices.title().to_string(), focused);
    let inner = block.inner(area);
    block.render(area, buf);

    let clients = &app.config().clients;
    if clients.is_empty() {
        Paragraph::new(hint("No devices. Press a to add one.")).render(inner, buf);
        return;
    }

    let height = inner.height as usize;
    let offset = scroll_offset(app.device_cursor(), height);
    let lines: Vec<Line> = clients
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(i, client)| {
            let selected = app.selected_client() == Some(client.name.as_str());
            let marker = if selected { "\u{25b6} " } else { "  " };
            let lock = if client.uses_password() { " (pw)" } else { "" };
            let detail = format!("{}@{}", client.user, client.addr());
            let name_style = if selected {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Green)),
                Span::styled(client.name.clone(), name_style),
                Span::raw(lock),
                Span::styled(format!("  {}", detail), Style::default().fg(Color::DarkGray)),
            ])
            .style(row_style(i == app.device_cursor(), focused))
        })
        .collect();
    Paragraph::new(lines).render(inner, buf);
}

/// Renders discovery results.
pub fn render_scan(app: &App, area: Rect, buf: &mut Buffer) {
    let focused = app.panel() == Panel::Scan;
    let scan = app.scan();
    let title = if scan.scanning {
        format!("{} (scanning\u{2026})", Panel::Scan.title())
    } else {
        format!("{} ({})", Panel::Scan.title(), scan.devices.len())
    };
    let block = panel_block(title, focused);
    let inner = block.inner(area);
    block.render(area, buf);

    if scan.devices.is_empty() {
        let text = if scan.scanning {
            "Scanning the local subnet\u{2026} Esc to cancel"
        } else {
            "Press s to scan for SSH devices"
        };
        Paragraph::new(hint(text)).render(inner, buf);
        return;
    }

    let height = inner.height as usize;
    let offset = scroll_offset(scan.cursor, height);
    let lines: Vec<Line> = scan
        .devices
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(i, device)| {
            let (dot, color) = if device.port_open {
                ("\u{25cf}", Color::Green)
            } else {
                ("\u{25cb}", Color::DarkGray)
            };
            let mut spans = vec![
                Span::styled(format!(" {} ", dot), Style::default().fg(color)),
                Span::raw(format!("{:<15}", device.addr)),
            ];
            if let Some(hostname) = &device.hostname {
                spans.push(Span::styled(
                    format!("  {}", hostname),
                    Style::default().fg(Color::Gray),
                ));
            }
            Line::from(spans).style(row_style(i == scan.cursor, focused))
        })
        .collect();
    Paragraph::new(lines).render(inner, buf);
}

/// Renders the collections of the server library.
pub fn render_consoles(app: &App, area: Rect, buf: &mut Buffer) {
    let focused = app.panel() == Panel::Consoles;
    let block = panel_block(Panel::Consoles.title().to_string(), focused);
    let inner = block.inner(area);
    block.render(area, buf);

    if app.collections().is_empty() {
        Paragraph::new(hint("No consoles found in the server ROM directory")).render(inner, buf);
        return;
    }

    let height = inner.height as usize;
    let offset = scroll_offset(app.console_cursor(), height);
    let selected = app.selected_collection().map(|c| c.dir.as_str());
    let lines: Vec<Line> = app
        .collections()
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(i, collection)| {
            let is_selected = selected == Some(collection.dir.as_str());
            let marker = if is_selected { "\u{25b6} " } else { "  " };
            Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Green)),
                Span::raw(collection.name.clone()),
                Span::styled(
                    format!("  {}/", collection.dir),
                    Style::default().fg(Color::DarkGray),
                ),
            ])
            .style(row_style(i == app.console_cursor(), focused))
        })
        .collect();
    Paragraph::new(lines).render(inner, buf);
}

fn filter_bar(active: LetterFilter) -> Line<'static> {
    let mut spans = vec![Span::raw(" ")];
    let mut filter = LetterFilter::All;
    loop {
        let style = if filter == active {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(filter.label(), style));
        spans.push(Span::raw(" "));
        let next = filter.next();
        if next == filter {
            break;
        }
        filter = next;
    }
    Line::from(spans)
}

/// Renders the item list with its letter filter.
pub fn render_roms(app: &App, area: Rect, buf: &mut Buffer) {
    let focused = app.panel() == Panel::Roms;
    let items = app.items();
    let mut title = match app.selected_collection() {
        Some(collection) => format!("{}: {}", Panel::Roms.title(), collection.name),
        None => Panel::Roms.title().to_string(),
    };
    if !items.all().is_empty() {
        title.push_str(&format!(
            " ({}/{} synced)",
            items.synced_count(),
            items.all().len()
        ));
    }
    if items.selected_count() > 0 {
        title.push_str(&format!(" ({}) selected", items.selected_count()));
    }

    let block = panel_block(title, focused);
    let inner = block.inner(area);
    block.render(area, buf);
    if inner.height == 0 {
        return;
    }

    Paragraph::new(filter_bar(items.filter())).render(Rect::new(inner.x, inner.y, inner.width, 1), buf);
    let list_area = Rect::new(
        inner.x,
        inner.y + 1,
        inner.width,
        inner.height.saturating_sub(1),
    );

    let visible = items.visible();
    let message = if items.loading {
        Some("Loading ROMs\u{2026}")
    } else if app.selected_client().is_none() {
        Some("Select a device")
    } else if app.selected_collection().is_none() {
        Some("Select a console")
    } else if visible.is_empty() && items.filter() != LetterFilter::All {
        Some("No ROMs for this letter")
    } else if visible.is_empty() {
        Some("No ROMs found")
    } else {
        None
    };
    if let Some(message) = message {
        Paragraph::new(hint(message)).render(list_area, buf);
        return;
    }

    let height = list_area.height as usize;
    let offset = scroll_offset(items.cursor(), height);
    // Checkbox, cursor, size and status columns.
    let name_width = (list_area.width as usize).saturating_sub(32).max(8);
    let lines: Vec<Line> = visible
        .iter()
        .enumerate()
        .skip(offset)
        .take(height)
        .map(|(i, item)| {
            let is_cursor = i == items.cursor();
            let check = if items.is_selected(&item.name) {
                "[\u{2713}] "
            } else {
                "[ ] "
            };
            let (status, status_style) = match item.location {
                Location::OnBoth => ("\u{25cf} synced", Style::default().fg(Color::Green)),
                Location::ServerOnly => ("\u{25cb} server", Style::default().fg(Color::DarkGray)),
            };
            let name_style = match item.location {
                Location::OnBoth => Style::default().fg(Color::Green),
                Location::ServerOnly => Style::default().fg(Color::White),
            };
            let name = truncate(&item.name, name_width);
            let pad = name_width.saturating_sub(name.width());
            Line::from(vec![
                Span::styled(
                    if is_cursor { "\u{25b8} " } else { "  " },
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(check, Style::default().fg(Color::Yellow)),
                Span::styled(name, name_style),
                Span::raw(" ".repeat(pad)),
                Span::styled(
                    format!("{:>10}  ", format_size(item.size)),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(status, status_style),
            ])
            .style(row_style(is_cursor, focused))
        })
        .collect();
    Paragraph::new(lines).render(list_area, buf);
}

/// Rows of the details panel, borders included.
pub const DETAILS_HEIGHT: u16 = 6;

/// Renders details of the selected device, console and item.
pub fn render_details(app: &App, area: Rect, buf: &mut Buffer) {
    let block = panel_block("Details".to_string(), false);
    let inner = block.inner(area);
    block.render(area, buf);

    let label = |text: &str| Span::styled(format!(" {:<9}", text), Style::default().fg(Color::Cyan));
    let dim = Style::default().fg(Color::DarkGray);
    let width = inner.width as usize;
    let client = app.selected_client().and_then(|name| app.config().client(name));
    let collection = app.selected_collection();

    if client.is_none() && collection.is_none() {
        Paragraph::new(hint("Select a device and console to browse ROMs")).render(inner, buf);
        return;
    }

    let mut lines = Vec::new();
    if let Some(client) = client {
        lines.push(Line::from(vec![
            label("Device"),
            Span::raw(client.name.clone()),
            Span::styled(format!("  {}@{}", client.user, client.addr()), dim),
        ]));
    }
    if let Some(collection) = collection {
        let mut spans = vec![label("Console"), Span::raw(collection.dir.clone())];
        if let Some(client) = client {
            let remote = client.collection_dir(collection);
            let room = width.saturating_sub(collection.dir.width() + 15);
            spans.push(Span::styled(format!("  \u{2192} {}", truncate(&remote, room)), dim));
        }
        lines.push(Line::from(spans));
    }
    if let Some(item) = app.items().current() {
        let (badge, badge_style) = match item.location {
            Location::OnBoth => ("synced", Style::default().fg(Color::Black).bg(Color::Green)),
            Location::ServerOnly => ("not synced", Style::default().fg(Color::Black).bg(Color::DarkGray)),
        };
        lines.push(Line::from(vec![
            label("ROM"),
            Span::raw(truncate(&item.name, width.saturating_sub(30).max(8))),
            Span::styled(format!("  {}  ", format_size(item.size)), dim),
            Span::styled(format!(" {} ", badge), badge_style),
        ]));
    }
    Paragraph::new(lines).render(inner, buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Super Mario Bros.nes", 8), "Super M\u{2026}");
    }

    #[test]
    fn test_scroll_offset_keeps_cursor_visible() {
        assert_eq!(scroll_offset(0, 5), 0);
        assert_eq!(scroll_offset(4, 5), 0);
        assert_eq!(scroll_offset(9, 5), 5);
        assert_eq!(scroll_offset(3, 0), 0);
    }

    #[test]
    fn test_filter_bar_lists_every_letter() {
        let line = filter_bar(LetterFilter::Letter('C'));
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert!(text.starts_with(" ALL A B C"));
        assert!(text.trim_end().ends_with('Z'));
    }
}
