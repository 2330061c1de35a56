//! Modal overlays: client form, settings, password dialog, transfer
//! progress and help.

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Gauge, Paragraph, Widget, Wrap},
};

use crate::app::{ConnectionTest, EditField, EditForm, PasswordPrompt, SettingsForm, TextInput};
use crate::remote::{BrowserRow, BrowserState, DirBrowser, TransferJob};

use super::centered_rect;
use super::panels::truncate;

fn dialog(title: &str, color: Color, area: Rect, buf: &mut Buffer) -> Rect {
    Clear.render(area, buf);
    let block = Block::default()
        .title(format!(" {} ", title))
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(color))
        .style(Style::default().bg(Color::Rgb(20, 20, 30)));
    let inner = block.inner(area);
    block.render(area, buf);
    inner
}

/// Input text with a block cursor when focused.
fn input_line(input: &TextInput, placeholder: &str, focused: bool) -> Span<'static> {
    let text = input.display();
    if text.is_empty() && !focused {
        return Span::styled(placeholder.to_string(), Style::default().fg(Color::DarkGray));
    }
    if focused {
        let mut chars: Vec<char> = text.chars().collect();
        chars.insert(input.cursor().min(chars.len()), '_');
        Span::styled(
            chars.into_iter().collect::<String>(),
            Style::default().bg(Color::DarkGray).fg(Color::White),
        )
    } else {
        Span::raw(text)
    }
}

fn footer(hints: &[(&'static str, &'static str, Color)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (key, label, color) in hints {
        spans.push(Span::styled(format!("[{}]", key), Style::default().fg(*color)));
        spans.push(Span::raw(format!(" {}  ", label)));
    }
    Line::from(spans).alignment(Alignment::Center)
}

/// Rows given to the directory browser inside the form.
const BROWSER_ROWS: usize = 8;

/// Lines of the remote directory browser.
fn browser_lines(browser: &DirBrowser, focused: bool, width: usize) -> Vec<Line<'static>> {
    let title_style = if focused {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    let path = if browser.path().is_empty() { "/" } else { browser.path() };
    let mut lines = vec![Line::from(Span::styled(
        format!(" Remote: {}", truncate(path, width.saturating_sub(10))),
        title_style,
    ))];

    match browser.state() {
        BrowserState::Idle => return lines,
        BrowserState::Loading => {
            lines.push(Line::from(Span::styled(
                " Listing\u{2026}",
                Style::default().fg(Color::Yellow),
            )));
            return lines;
        }
        BrowserState::Failed(e) => {
            lines.push(Line::from(Span::styled(
                format!(" Error: {}", truncate(e, width.saturating_sub(9))),
                Style::default().fg(Color::Red),
            )));
        }
        BrowserState::Ready => {}
    }
    if browser.path().is_empty() {
        return lines;
    }

    let rows = browser.rows();
    let offset = browser.cursor().saturating_sub(BROWSER_ROWS - 1);
    for (i, row) in rows.iter().enumerate().skip(offset).take(BROWSER_ROWS) {
        let (label, style) = match row {
            BrowserRow::UseThis => ("[ use this dir ]".to_string(), Style::default().fg(Color::Green)),
            BrowserRow::Parent => ("../".to_string(), Style::default()),
            BrowserRow::Entry(entry) if entry.is_dir => (format!("{}/", entry.name), Style::default()),
            BrowserRow::Entry(entry) => (entry.name.clone(), Style::default().fg(Color::DarkGray)),
        };
        let is_cursor = i == browser.cursor();
        let marker = if is_cursor && focused { " \u{25b8} " } else { "   " };
        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(Color::Cyan)),
            Span::styled(truncate(&label, width.saturating_sub(4)), style),
        ]));
    }
    lines
}

/// Renders the add/edit client form.
pub fn render_edit_form(form: &EditForm, area: Rect, buf: &mut Buffer) {
    let browser_height = if *form.browser.state() == BrowserState::Idle {
        0
    } else {
        BROWSER_ROWS as u16 + 3
    };
    let rect = centered_rect(72, EditField::ALL.len() as u16 + 8 + browser_height, area);
    let inner = dialog(form.title(), Color::Cyan, rect, buf);

    let mut lines = vec![Line::default()];
    for field in EditField::ALL {
        let focused = form.focused() == field && !form.browser_focused();
        let label_style = if focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        lines.push(Line::from(vec![
            Span::styled(format!(" {:<20}", field.label()), label_style),
            input_line(form.input(field), field.placeholder(), focused),
        ]));
    }

    lines.push(Line::default());
    lines.push(match &form.test {
        None => Line::default(),
        Some(ConnectionTest::Running) => Line::from(Span::styled(
            " Testing connection\u{2026}",
            Style::default().fg(Color::Yellow),
        )),
        Some(ConnectionTest::Ok) => Line::from(Span::styled(
            " \u{2713} Connection OK",
            Style::default().fg(Color::Green),
        )),
        Some(ConnectionTest::Failed(e)) => Line::from(Span::styled(
            format!(" \u{2717} {}", truncate(e, inner.width.saturating_sub(4) as usize)),
            Style::default().fg(Color::Red),
        )),
    });
    if browser_height > 0 {
        lines.push(Line::default());
        lines.extend(browser_lines(
            &form.browser,
            form.browser_focused(),
            inner.width as usize,
        ));
    }
    lines.push(Line::default());
    lines.push(if form.browser_focused() {
        footer(&[
            ("Enter", "Open / use", Color::Green),
            ("Bksp", "Up", Color::Cyan),
            ("Esc", "Back to form", Color::Red),
        ])
    } else {
        footer(&[
            ("Ctrl+T", "Test", Color::Yellow),
            ("Ctrl+B", "Browse", Color::Cyan),
            ("Enter", "Save", Color::Green),
            ("Esc", "Cancel", Color::Red),
        ])
    });

    Paragraph::new(lines).render(inner, buf);
}

/// Renders the server settings dialog.
pub fn render_settings(form: &SettingsForm, area: Rect, buf: &mut Buffer) {
    let rect = centered_rect(64, 8, area);
    let inner = dialog("Settings", Color::Cyan, rect, buf);

    let lines = vec![
        Line::default(),
        Line::from(Span::styled(
            " Server ROM directory",
            Style::default().fg(Color::Yellow),
        )),
        Line::from(vec![Span::raw(" "), input_line(&form.rom_dir, "~/roms", true)]),
        Line::default(),
        footer(&[("Enter", "Save", Color::Green), ("Esc", "Cancel", Color::Red)]),
    ];
    Paragraph::new(lines).render(inner, buf);
}

/// Renders the password dialog.
pub fn render_password(prompt: &PasswordPrompt, area: Rect, buf: &mut Buffer) {
    let rect = centered_rect(44, 11, area);
    let inner = dialog("Password Required", Color::Magenta, rect, buf);

    let lines = vec![
        Line::default(),
        Line::from(format!("  Host: {}", prompt.host)),
        Line::from(format!("  User: {}", prompt.user)),
        Line::default(),
        Line::from(vec![
            Span::raw("  Password: "),
            input_line(&prompt.input, "", true),
        ]),
        Line::default(),
        footer(&[("Enter", "Submit", Color::Green), ("Esc", "Cancel", Color::Red)]),
    ];
    Paragraph::new(lines).render(inner, buf);
}

/// Renders transfer progress.
pub fn render_transfer(job: &TransferJob, area: Rect, buf: &mut Buffer) {
    let rect = centered_rect(60, 10, area);
    let title = format!(
        "{} {}/{}",
        job.direction.verb(),
        (job.completed + usize::from(!job.finished)).min(job.items.len()),
        job.items.len()
    );
    let color = if job.failed() { Color::Red } else { Color::Cyan };
    let inner = dialog(&title, color, rect, buf);
    if inner.height < 5 {
        return;
    }

    let name_width = inner.width.saturating_sub(4) as usize;
    let current = job.current_name().unwrap_or_default();
    Paragraph::new(vec![
        Line::default(),
        Line::from(format!("  {}", truncate(current, name_width))),
    ])
    .render(Rect::new(inner.x, inner.y, inner.width, 2), buf);

    let gauge_area = Rect::new(inner.x + 2, inner.y + 3, inner.width.saturating_sub(4), 1);
    Gauge::default()
        .gauge_style(Style::default().fg(color).bg(Color::Rgb(35, 35, 45)))
        .ratio(job.item_ratio())
        .label(format!(
            "{} / {}",
            super::panels::format_size(job.transferred),
            super::panels::format_size(job.total)
        ))
        .render(gauge_area, buf);

    let status = match (&job.error, job.finished) {
        (Some(e), _) => Line::from(Span::styled(
            format!("  Error: {}", e),
            Style::default().fg(Color::Red),
        )),
        (None, true) => Line::from(Span::styled(
            format!("  Done: {} item(s)", job.completed),
            Style::default().fg(Color::Green),
        )),
        (None, false) => Line::from(Span::styled(
            "  Esc stops after the current item",
            Style::default().fg(Color::DarkGray),
        )),
    };
    Paragraph::new(status)
        .wrap(Wrap { trim: false })
        .render(
            Rect::new(inner.x, inner.y + 5, inner.width, inner.height.saturating_sub(5)),
            buf,
        );
}

const HELP: &[(&str, &str)] = &[
    ("Tab / Shift+Tab", "Switch panel"),
    ("\u{2191}\u{2193} / k j", "Move"),
    ("Enter", "Select / toggle"),
    ("s", "Scan local network"),
    ("a e d", "Add, edit, delete device"),
    ("c", "Settings"),
    ("\u{2190}\u{2192}", "Letter filter (ROMs)"),
    ("p", "Push selected ROMs"),
    ("Esc", "Cancel scan / close"),
    ("?", "Toggle help"),
    ("q / Ctrl+C", "Quit"),
];

/// Renders the key reference.
pub fn render_help(area: Rect, buf: &mut Buffer) {
    let rect = centered_rect(50, HELP.len() as u16 + 4, area);
    let inner = dialog("Keyboard Shortcuts [?]", Color::Cyan, rect, buf);

    let mut lines = vec![Line::default()];
    lines.extend(HELP.iter().map(|(key, action)| {
        Line::from(vec![
            Span::styled(format!("  {:<18}", key), Style::default().fg(Color::Cyan)),
            Span::raw(*action),
        ])
    }));
    Paragraph::new(lines).render(inner, buf);
}
