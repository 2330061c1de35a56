//! Full-screen rendering tests.
//!
//! Drives the app through messages and checks what lands on a test backend.

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{Terminal, backend::TestBackend};

use romsync::app::{App, Msg};
use romsync::config::{AuthMethod, ClientProfile, Collection, Config, ServerConfig};
use romsync::library::{ItemStatus, Location};
use romsync::logging::LogConfig;
use romsync::ui;

fn app(rom_dir: &std::path::Path) -> App {
    let mut deck = ClientProfile::new("deck", "192.168.1.20", "deck");
    deck.auth.method = AuthMethod::Password;
    let pi = ClientProfile::new("pi", "192.168.1.30", "pi");

    let config = Config {
        server: ServerConfig {
            rom_dir: rom_dir.display().to_string(),
            consoles: vec![Collection::new("SNES", "snes", &[".sfc"])],
        },
        clients: vec![deck, pi],
        logging: LogConfig::default(),
    };
    App::new(config, rom_dir.join("config.yaml"))
}

fn press(app: &mut App, code: KeyCode) {
    app.update(Msg::Key(KeyEvent::new(code, KeyModifiers::NONE)));
}

fn screen(app: &App) -> String {
    let mut terminal = Terminal::new(TestBackend::new(120, 30)).unwrap();
    terminal.draw(|frame| ui::render(frame, app)).unwrap();

    let buffer = terminal.backend().buffer();
    let mut text = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            text.push_str(buffer[(x, y)].symbol());
        }
        text.push('\n');
    }
    text
}

#[test]
fn test_initial_screen() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path());

    let text = screen(&app);

    assert!(text.contains("deck (pw)"));
    assert!(text.contains("pi@192.168.1.30:22"));
    assert!(text.contains("SNES"));
    assert!(text.contains("Select a device"));
    assert!(text.contains("NORMAL"));
}

#[test]
fn test_listing_with_selection() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Enter);
    press(&mut app, KeyCode::Enter);
    assert!(screen(&app).contains("Loading ROMs"));

    app.update(Msg::ItemsLoaded {
        client: "pi".to_string(),
        collection: "SNES".to_string(),
        items: vec![
            ItemStatus {
                name: "Chrono Trigger.sfc".to_string(),
                location: Location::OnBoth,
                size: 4 * 1024 * 1024,
                path: PathBuf::from("Chrono Trigger.sfc"),
            },
            ItemStatus {
                name: "EarthBound.sfc".to_string(),
                location: Location::ServerOnly,
                size: 3 * 1024 * 1024,
                path: PathBuf::from("EarthBound.sfc"),
            },
        ],
        client_error: None,
    });
    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Char(' '));

    let text = screen(&app);
    assert!(text.contains("ROMs: SNES"));
    assert!(text.contains("(1/2 synced)"));
    assert!(text.contains("(1) selected"));
    assert!(text.contains("EarthBound.sfc"));
    assert!(text.contains("4.0 MB"));
    assert!(text.contains("Push"));
}

#[test]
fn test_details_describe_the_current_rom() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    assert!(screen(&app).contains("Select a device and console"));

    press(&mut app, KeyCode::Down);
    press(&mut app, KeyCode::Enter);
    press(&mut app, KeyCode::Enter);
    app.update(Msg::ItemsLoaded {
        client: "pi".to_string(),
        collection: "SNES".to_string(),
        items: vec![ItemStatus {
            name: "EarthBound.sfc".to_string(),
            location: Location::ServerOnly,
            size: 3 * 1024 * 1024,
            path: PathBuf::from("EarthBound.sfc"),
        }],
        client_error: None,
    });

    let text = screen(&app);
    assert!(text.contains("Details"));
    assert!(text.contains("Device"));
    assert!(text.contains("Console"));
    assert!(text.contains("3.0 MB"));
    assert!(text.contains("not synced"));
}

#[test]
fn test_password_dialog_hides_input() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());
    press(&mut app, KeyCode::Enter);
    press(&mut app, KeyCode::Enter);
    for c in "secret".chars() {
        press(&mut app, KeyCode::Char(c));
    }

    let text = screen(&app);
    assert!(text.contains("Password Required"));
    assert!(text.contains("PASSWORD"));
    assert!(text.contains("******"));
    assert!(!text.contains("secret"));
}

#[test]
fn test_help_overlay_toggles() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());

    press(&mut app, KeyCode::Char('?'));
    assert!(screen(&app).contains("Keyboard Shortcuts"));

    press(&mut app, KeyCode::Esc);
    assert!(!screen(&app).contains("Keyboard Shortcuts"));
}

#[test]
fn test_error_shown_in_status_bar() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = app(dir.path());

    app.update(Msg::Error("Scan failed: no private IPv4 interface".to_string()));

    assert!(screen(&app).contains("Scan failed: no private IPv4 interface"));
}
