//! Event-loop state machine tests.
//!
//! Commands are recorded instead of executed; worker results are fed back
//! as messages by hand.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use romsync::app::{App, Command, EditField, EditForm, Mode, Msg, Overlay, Panel, PendingAction};
use romsync::config::{AuthMethod, ClientProfile, Collection, Config, ServerConfig};
use romsync::library::{ItemStatus, Location};
use romsync::logging::LogConfig;
use romsync::remote::{JobReport, RemoteEntry, TransferError};
use romsync::runtime::CommandExecutor;
use romsync::ssh::SessionError;

/// Executor that only remembers what it was asked to do.
#[derive(Default)]
struct RecordingExecutor {
    commands: RefCell<Vec<Command>>,
}

impl CommandExecutor for RecordingExecutor {
    fn execute(&self, command: Command) {
        self.commands.borrow_mut().push(command);
    }
}

impl RecordingExecutor {
    fn take(&self) -> Vec<Command> {
        self.commands.borrow_mut().drain(..).collect()
    }
}

struct Harness {
    _library: TempDir,
    app: App,
    executor: RecordingExecutor,
}

impl Harness {
    /// Clients: "deck" (password, nothing stored) and "pi" (key).
    fn new() -> Self {
        let library = tempfile::tempdir().unwrap();
        let gba = library.path().join("gba");
        fs::create_dir_all(&gba).unwrap();
        for name in ["Advance Wars.gba", "Metroid.gba", "Zelda.gba"] {
            fs::write(gba.join(name), b"rom").unwrap();
        }

        let mut deck = ClientProfile::new("deck", "192.168.1.20", "deck");
        deck.auth.method = AuthMethod::Password;
        deck.rom_dir = "/home/deck/roms".to_string();
        let mut pi = ClientProfile::new("pi", "192.168.1.30", "pi");
        pi.rom_dir = "/home/pi/RetroPie/roms".to_string();

        let config = Config {
            server: ServerConfig {
                rom_dir: library.path().display().to_string(),
                consoles: vec![Collection::new("Game Boy Advance", "gba", &[".gba"])],
            },
            clients: vec![deck, pi],
            logging: LogConfig::default(),
        };
        let config_path = library.path().join("config.yaml");

        Self {
            app: App::new(config, config_path),
            _library: library,
            executor: RecordingExecutor::default(),
        }
    }

    /// Feeds a message and returns the commands it produced.
    fn send(&mut self, msg: Msg) -> Vec<Command> {
        for command in self.app.update(msg) {
            self.executor.execute(command);
        }
        self.executor.take()
    }

    fn key(&mut self, code: KeyCode) -> Vec<Command> {
        self.send(Msg::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn ctrl(&mut self, c: char) -> Vec<Command> {
        self.send(Msg::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)))
    }

    fn type_text(&mut self, text: &str) {
        for c in text.chars() {
            assert!(self.key(KeyCode::Char(c)).is_empty());
        }
    }

    /// Selects the client at `index` and the first collection.
    fn open_collection(&mut self, index: usize) -> Vec<Command> {
        for _ in 0..index {
            self.key(KeyCode::Down);
        }
        assert!(self.key(KeyCode::Enter).is_empty());
        assert_eq!(self.app.panel(), Panel::Consoles);
        self.key(KeyCode::Enter)
    }

    fn deliver_items(&mut self, client: &str, client_error: Option<TransferError>) -> Vec<Command> {
        let items = vec![
            status("Advance Wars.gba", Location::ServerOnly),
            status("Metroid.gba", Location::OnBoth),
            status("Zelda.gba", Location::ServerOnly),
        ];
        self.send(Msg::ItemsLoaded {
            client: client.to_string(),
            collection: "Game Boy Advance".to_string(),
            items,
            client_error,
        })
    }
}

fn status(name: &str, location: Location) -> ItemStatus {
    ItemStatus {
        name: name.to_string(),
        location,
        size: 3,
        path: PathBuf::from(name),
    }
}

fn auth_failure() -> TransferError {
    TransferError::Session(SessionError::Auth {
        user: "deck".to_string(),
        addr: "192.168.1.20:22".to_string(),
        reason: "denied".to_string(),
    })
}

fn is_schedule_of(command: &Command, matcher: impl Fn(&Msg) -> bool) -> bool {
    matches!(command, Command::Schedule { msg, .. } if matcher(&**msg))
}

#[test]
fn test_starts_in_normal_mode() {
    let h = Harness::new();
    assert_eq!(h.app.mode(), Mode::Normal);
    assert_eq!(h.app.pending_action(), PendingAction::None);
    assert_eq!(h.app.collections().len(), 1);
    assert!(h.app.is_running());
}

#[test]
fn test_collection_needs_a_client() {
    let mut h = Harness::new();
    h.key(KeyCode::Tab);
    h.key(KeyCode::Tab);
    assert_eq!(h.app.panel(), Panel::Consoles);

    let commands = h.key(KeyCode::Enter);

    assert_eq!(h.app.error(), Some("Select a device first"));
    assert_eq!(commands.len(), 1);
    assert!(is_schedule_of(&commands[0], |m| matches!(m, Msg::ClearError { .. })));
}

#[test]
fn test_key_client_lists_without_prompt() {
    let mut h = Harness::new();

    let commands = h.open_collection(1);

    assert_eq!(commands.len(), 1);
    match &commands[0] {
        Command::LoadItems {
            profile,
            collection,
            client_dir,
            ..
        } => {
            assert_eq!(profile.name, "pi");
            assert_eq!(collection.dir, "gba");
            assert_eq!(client_dir, "/home/pi/RetroPie/roms/gba");
        }
        other => panic!("unexpected command {:?}", other),
    }
    assert!(h.app.items().loading);
    assert_eq!(h.app.panel(), Panel::Roms);
}

#[test]
fn test_password_gate_dispatches_once_after_submit() {
    let mut h = Harness::new();

    let commands = h.open_collection(0);
    assert!(commands.is_empty(), "nothing runs before the password");
    assert_eq!(h.app.mode(), Mode::Password);
    assert_eq!(h.app.pending_action(), PendingAction::LoadItems);

    h.type_text("hunter2");
    let commands = h.key(KeyCode::Enter);

    assert_eq!(h.app.mode(), Mode::Normal);
    assert_eq!(h.app.pending_action(), PendingAction::None);
    assert_eq!(h.app.runtime_password("deck"), Some("hunter2"));
    assert_eq!(commands.len(), 1);
    match &commands[0] {
        Command::LoadItems { profile, .. } => {
            assert_eq!(profile.auth.password.as_deref(), Some("hunter2"));
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_password_cancel_dispatches_nothing() {
    let mut h = Harness::new();
    h.open_collection(0);
    h.type_text("oops");

    let commands = h.key(KeyCode::Esc);

    assert!(commands.is_empty());
    assert_eq!(h.app.mode(), Mode::Normal);
    assert_eq!(h.app.pending_action(), PendingAction::None);
    assert_eq!(h.app.runtime_password("deck"), None);
}

#[test]
fn test_stored_password_skips_prompt() {
    let mut h = Harness::new();
    let mut config = h.app.config().clone();
    config.clients[0].auth.password = Some("stored".to_string());
    let path = h.app.config_path().to_path_buf();
    h.app = App::new(config, path);

    let commands = h.open_collection(0);

    assert_eq!(h.app.mode(), Mode::Normal);
    assert!(matches!(commands.as_slice(), [Command::LoadItems { .. }]));
}

#[test]
fn test_wrong_stored_password_reprompts_and_is_overridden() {
    let mut h = Harness::new();
    let mut config = h.app.config().clone();
    config.clients[0].auth.password = Some("stale".to_string());
    let path = h.app.config_path().to_path_buf();
    h.app = App::new(config, path);
    h.open_collection(0);

    h.deliver_items("deck", Some(auth_failure()));
    assert_eq!(h.app.mode(), Mode::Password);
    assert_eq!(h.app.pending_action(), PendingAction::LoadItems);

    h.type_text("fresh");
    let commands = h.key(KeyCode::Enter);

    match commands.as_slice() {
        [Command::LoadItems { profile, .. }] => {
            assert_eq!(profile.auth.password.as_deref(), Some("fresh"));
        }
        other => panic!("unexpected commands {:?}", other),
    }
    assert_eq!(h.app.config().clients[0].auth.password.as_deref(), Some("stale"));
}

#[test]
fn test_auth_failure_reprompts_for_loading() {
    let mut h = Harness::new();
    h.open_collection(0);
    h.type_text("wrong");
    h.key(KeyCode::Enter);

    let commands = h.deliver_items("deck", Some(auth_failure()));

    assert_eq!(h.app.mode(), Mode::Password);
    assert_eq!(h.app.pending_action(), PendingAction::LoadItems);
    assert_eq!(h.app.runtime_password("deck"), None);
    assert!(h.app.error().is_some_and(|e| e.starts_with("Authentication failed")));
    assert!(commands.iter().all(|c| !matches!(c, Command::LoadItems { .. })));
    // Server items are still shown, all server-only.
    assert_eq!(h.app.items().all().len(), 3);
}

#[test]
fn test_client_error_is_reported() {
    let mut h = Harness::new();
    h.open_collection(1);

    let error = TransferError::Channel("subsystem request failed".to_string());
    h.deliver_items("pi", Some(error));

    assert_eq!(h.app.mode(), Mode::Normal);
    assert!(h.app.error().is_some_and(|e| e.starts_with("Client error")));
}

#[test]
fn test_stale_listing_is_ignored() {
    let mut h = Harness::new();
    h.open_collection(1);

    h.deliver_items("deck", None);

    assert!(h.app.items().all().is_empty());
    assert!(h.app.items().loading);
}

#[test]
fn test_push_selected_items_in_listing_order() {
    let mut h = Harness::new();
    h.open_collection(1);
    h.deliver_items("pi", None);

    h.key(KeyCode::Down);
    h.key(KeyCode::Down);
    h.key(KeyCode::Char(' '));
    h.key(KeyCode::Up);
    h.key(KeyCode::Up);
    h.key(KeyCode::Char(' '));
    let commands = h.key(KeyCode::Char('p'));

    assert_eq!(h.app.mode(), Mode::Transfer);
    assert_eq!(commands.len(), 2);
    match &commands[0] {
        Command::Transfer { job_id, items, .. } => {
            assert_eq!(*job_id, 1);
            let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
            assert_eq!(names, vec!["Advance Wars.gba", "Zelda.gba"]);
            assert_eq!(items[1].remote, "/home/pi/RetroPie/roms/gba/Zelda.gba");
            assert!(items[1].local.ends_with("gba/Zelda.gba"));
        }
        other => panic!("unexpected command {:?}", other),
    }
    assert!(is_schedule_of(&commands[1], |m| matches!(m, Msg::TransferTick { job_id: 1 })));
}

#[test]
fn test_push_with_nothing_selected_does_nothing() {
    let mut h = Harness::new();
    h.open_collection(1);
    h.deliver_items("pi", None);

    assert!(h.key(KeyCode::Char('p')).is_empty());
    assert_eq!(h.app.mode(), Mode::Normal);
}

#[test]
fn test_transfer_gated_by_password_runs_once() {
    let mut h = Harness::new();
    h.open_collection(0);
    h.key(KeyCode::Esc);
    assert_eq!(h.app.mode(), Mode::Normal);

    // Items arrive from an earlier listing; the push needs the password.
    h.deliver_items("deck", None);
    h.key(KeyCode::Char(' '));
    let commands = h.key(KeyCode::Char('p'));
    assert!(commands.is_empty());
    assert_eq!(
        h.app.pending_action(),
        PendingAction::Transfer(vec!["Advance Wars.gba".to_string()])
    );

    h.type_text("pw");
    let commands = h.key(KeyCode::Enter);

    let transfers = commands
        .iter()
        .filter(|c| matches!(c, Command::Transfer { .. }))
        .count();
    assert_eq!(transfers, 1);
    assert_eq!(h.app.mode(), Mode::Transfer);
}

#[test]
fn test_transfer_lifecycle_closes_and_reloads() {
    let mut h = Harness::new();
    h.open_collection(1);
    h.deliver_items("pi", None);
    h.key(KeyCode::Char(' '));
    h.key(KeyCode::Char('p'));

    let ticks = h.send(Msg::TransferTick { job_id: 1 });
    assert_eq!(ticks.len(), 1, "ticks repeat while the job runs");

    let commands = h.send(Msg::TransferDone {
        job_id: 1,
        report: JobReport {
            completed: 1,
            stopped: false,
            result: Ok(()),
        },
    });
    assert!(matches!(
        commands.as_slice(),
        [Command::Schedule { delay, msg }]
            if *delay == Duration::from_millis(500)
                && matches!(**msg, Msg::CloseOverlay { job_id: 1 })
    ));
    match h.app.overlay() {
        Overlay::Transfer(job) => assert!(job.finished && !job.failed()),
        other => panic!("unexpected overlay {:?}", other),
    }
    assert!(h.send(Msg::TransferTick { job_id: 1 }).is_empty());

    let commands = h.send(Msg::CloseOverlay { job_id: 1 });
    assert_eq!(h.app.mode(), Mode::Normal);
    assert_eq!(h.app.items().selected_count(), 0);
    assert!(matches!(commands.as_slice(), [Command::LoadItems { .. }]));
}

#[test]
fn test_failed_transfer_stays_open_longer() {
    let mut h = Harness::new();
    h.open_collection(1);
    h.deliver_items("pi", None);
    h.key(KeyCode::Char(' '));
    h.key(KeyCode::Char('p'));

    let commands = h.send(Msg::TransferDone {
        job_id: 1,
        report: JobReport {
            completed: 0,
            stopped: false,
            result: Err(TransferError::Channel("closed".to_string())),
        },
    });

    assert!(matches!(
        commands.as_slice(),
        [Command::Schedule { delay, .. }] if *delay == Duration::from_secs(2)
    ));
    match h.app.overlay() {
        Overlay::Transfer(job) => assert!(job.failed()),
        other => panic!("unexpected overlay {:?}", other),
    }
}

#[test]
fn test_cancelled_job_results_are_ignored() {
    let mut h = Harness::new();
    h.open_collection(1);
    h.deliver_items("pi", None);
    h.key(KeyCode::Char(' '));
    let commands = h.key(KeyCode::Char('p'));
    let stop = match &commands[0] {
        Command::Transfer { stop, .. } => stop.clone(),
        other => panic!("unexpected command {:?}", other),
    };

    let commands = h.key(KeyCode::Esc);
    assert!(stop.load(std::sync::atomic::Ordering::SeqCst));
    assert_eq!(h.app.mode(), Mode::Normal);
    assert!(matches!(commands.as_slice(), [Command::LoadItems { .. }]));

    let late = h.send(Msg::TransferDone {
        job_id: 1,
        report: JobReport {
            completed: 1,
            stopped: false,
            result: Ok(()),
        },
    });
    assert!(late.is_empty());
    assert!(h.send(Msg::CloseOverlay { job_id: 1 }).is_empty());
    assert_eq!(h.app.mode(), Mode::Normal);
}

#[test]
fn test_error_clears_only_when_current() {
    let mut h = Harness::new();
    h.send(Msg::Error("first".to_string()));
    h.send(Msg::Error("second".to_string()));

    h.send(Msg::ClearError { seq: 1 });
    assert_eq!(h.app.error(), Some("second"));

    h.send(Msg::ClearError { seq: 2 });
    assert_eq!(h.app.error(), None);
}

#[test]
fn test_add_client_through_form() {
    let mut h = Harness::new();
    h.key(KeyCode::Char('a'));
    assert_eq!(h.app.mode(), Mode::Editing);

    h.type_text("rg35xx");
    h.key(KeyCode::Tab);
    h.type_text("10.0.0.7");
    h.key(KeyCode::Tab);
    h.key(KeyCode::Tab);
    h.type_text("root");
    let commands = h.key(KeyCode::Enter);

    assert_eq!(h.app.mode(), Mode::Normal);
    match commands.as_slice() {
        [Command::SaveConfig { config }] => {
            let added = config.client("rg35xx").unwrap();
            assert_eq!(added.host, "10.0.0.7");
            assert_eq!(added.port, 22);
            assert_eq!(added.user, "root");
        }
        other => panic!("unexpected commands {:?}", other),
    }
}

#[test]
fn test_duplicate_client_name_is_rejected() {
    let mut h = Harness::new();
    h.key(KeyCode::Char('a'));
    h.type_text("pi");
    h.key(KeyCode::Tab);
    h.type_text("10.0.0.8");
    h.key(KeyCode::Tab);
    h.key(KeyCode::Tab);
    h.type_text("pi");

    let commands = h.key(KeyCode::Enter);

    assert_eq!(h.app.mode(), Mode::Editing);
    assert!(h.app.error().is_some_and(|e| e.contains("already exists")));
    assert!(commands.iter().all(|c| !matches!(c, Command::SaveConfig { .. })));
}

#[test]
fn test_connection_test_reports_into_form() {
    let mut h = Harness::new();
    h.key(KeyCode::Down);
    h.key(KeyCode::Char('e'));

    let commands = h.ctrl('t');
    assert!(matches!(commands.as_slice(), [Command::Connect { profile }] if profile.name == "pi"));

    h.send(Msg::SessionReady {
        client: "pi".to_string(),
    });
    match h.app.overlay() {
        Overlay::Edit(form) => {
            assert_eq!(form.test, Some(romsync::app::ConnectionTest::Ok));
        }
        other => panic!("unexpected overlay {:?}", other),
    }
}

fn form(h: &Harness) -> &EditForm {
    match h.app.overlay() {
        Overlay::Edit(form) => form,
        other => panic!("unexpected overlay {:?}", other),
    }
}

/// Request id and path of a single `BrowseDir`.
fn browse_request(commands: &[Command]) -> (u64, Option<String>, bool) {
    match commands {
        [Command::BrowseDir {
            request,
            path,
            pooled,
            ..
        }] => (*request, path.clone(), *pooled),
        other => panic!("unexpected commands {:?}", other),
    }
}

fn listing(request: u64, path: &str, entries: Vec<RemoteEntry>) -> Msg {
    Msg::DirListed {
        request,
        path: path.to_string(),
        entries,
    }
}

#[test]
fn test_successful_test_lists_rom_dir() {
    let mut h = Harness::new();
    h.key(KeyCode::Down);
    h.key(KeyCode::Char('e'));
    h.ctrl('t');

    let commands = h.send(Msg::SessionReady {
        client: "pi".to_string(),
    });

    let (_, path, pooled) = browse_request(&commands);
    assert_eq!(path.as_deref(), Some("/home/pi/RetroPie/roms"));
    assert!(pooled, "an unchanged profile may use its pooled session");
}

#[test]
fn test_browser_picks_rom_dir() {
    let mut h = Harness::new();
    h.key(KeyCode::Down);
    h.key(KeyCode::Char('e'));
    h.ctrl('t');
    let (request, _, _) = browse_request(&h.send(Msg::SessionReady {
        client: "pi".to_string(),
    }));

    assert!(h.ctrl('b').is_empty());
    assert!(!form(&h).browser_focused(), "no focus before a listing");

    h.send(listing(
        request,
        "/home/pi/RetroPie/roms",
        vec![RemoteEntry::dir("gba"), RemoteEntry::dir("snes"), RemoteEntry::file("README", 9)],
    ));
    h.ctrl('b');
    assert!(form(&h).browser_focused());

    // Rows: use this dir, ../, gba/, snes/, README
    h.key(KeyCode::Down);
    h.key(KeyCode::Down);
    let (request, path, _) = browse_request(&h.key(KeyCode::Enter));
    assert_eq!(path.as_deref(), Some("/home/pi/RetroPie/roms/gba"));

    // Keys wait while a listing is in flight.
    assert!(h.key(KeyCode::Enter).is_empty());
    h.send(listing(request - 1, "/stale", Vec::new()));
    assert_eq!(form(&h).browser.path(), "/home/pi/RetroPie/roms");

    h.send(listing(request, "/home/pi/RetroPie/roms/gba", Vec::new()));
    assert_eq!(form(&h).browser.path(), "/home/pi/RetroPie/roms/gba");

    let (request, path, _) = browse_request(&h.key(KeyCode::Backspace));
    assert_eq!(path.as_deref(), Some("/home/pi/RetroPie/roms"));
    h.send(listing(request, "/home/pi/RetroPie/roms", vec![RemoteEntry::dir("gba")]));
    let (request, path, _) = browse_request(&h.key(KeyCode::Left));
    assert_eq!(path.as_deref(), Some("/home/pi/RetroPie"));
    h.send(listing(request, "/home/pi/RetroPie", vec![RemoteEntry::dir("roms")]));

    assert!(h.key(KeyCode::Enter).is_empty());
    assert!(!form(&h).browser_focused());
    assert_eq!(form(&h).input(EditField::RomDir).value(), "/home/pi/RetroPie");

    let commands = h.key(KeyCode::Enter);
    assert!(commands.iter().any(|c| matches!(
        c,
        Command::SaveConfig { config } if config.clients[1].rom_dir == "/home/pi/RetroPie"
    )));
}

#[test]
fn test_browser_esc_returns_to_fields() {
    let mut h = Harness::new();
    h.key(KeyCode::Down);
    h.key(KeyCode::Char('e'));
    h.ctrl('t');
    let (request, _, _) = browse_request(&h.send(Msg::SessionReady {
        client: "pi".to_string(),
    }));
    h.send(listing(request, "/", vec![RemoteEntry::dir("home")]));
    h.ctrl('b');

    h.key(KeyCode::Esc);

    assert_eq!(h.app.mode(), Mode::Editing, "Esc leaves the browser, not the form");
    assert!(!form(&h).browser_focused());
    assert_eq!(form(&h).input(EditField::RomDir).value(), "/home/pi/RetroPie/roms");
}

#[test]
fn test_unsaved_form_browses_without_pool() {
    let mut h = Harness::new();
    h.key(KeyCode::Char('a'));
    h.type_text("handheld");
    h.key(KeyCode::Tab);
    h.type_text("10.0.0.8");
    h.key(KeyCode::Tab);
    h.key(KeyCode::Tab);
    h.type_text("root");
    h.ctrl('t');

    let commands = h.send(Msg::SessionReady {
        client: "handheld".to_string(),
    });

    let (request, path, pooled) = browse_request(&commands);
    assert_eq!(path, None, "an empty ROM dir starts in the login directory");
    assert!(!pooled);

    h.send(Msg::DirListFailed {
        request,
        error: TransferError::Channel("subsystem request failed".to_string()),
    });
    assert_eq!(
        form(&h).browser.state(),
        &romsync::remote::BrowserState::Failed(
            "opening SFTP channel: subsystem request failed".to_string()
        )
    );
    assert_eq!(h.app.mode(), Mode::Editing);
}

#[test]
fn test_listing_after_form_closed_is_ignored() {
    let mut h = Harness::new();
    h.key(KeyCode::Down);
    h.key(KeyCode::Char('e'));
    h.ctrl('t');
    let (request, _, _) = browse_request(&h.send(Msg::SessionReady {
        client: "pi".to_string(),
    }));
    h.key(KeyCode::Esc);

    let commands = h.send(listing(request, "/", Vec::new()));

    assert!(commands.is_empty());
    assert_eq!(h.app.mode(), Mode::Normal);
}

#[test]
fn test_delete_selected_client() {
    let mut h = Harness::new();
    h.open_collection(1);
    h.key(KeyCode::Tab);
    assert_eq!(h.app.panel(), Panel::Devices);

    let commands = h.key(KeyCode::Char('d'));

    assert_eq!(h.app.selected_client(), None);
    assert_eq!(h.app.config().clients.len(), 1);
    assert_eq!(h.app.device_cursor(), 0);
    assert!(matches!(
        commands.as_slice(),
        [Command::ReleaseSession { client }, Command::SaveConfig { .. }] if client == "pi"
    ));
}

#[test]
fn test_settings_rejects_empty_rom_dir() {
    let mut h = Harness::new();
    h.key(KeyCode::Char('c'));
    assert_eq!(h.app.mode(), Mode::Settings);

    for _ in 0..200 {
        h.key(KeyCode::Backspace);
    }
    h.key(KeyCode::Enter);

    assert_eq!(h.app.mode(), Mode::Settings);
    assert_eq!(h.app.error(), Some("ROM directory cannot be empty"));
}

#[test]
fn test_scan_lifecycle() {
    let mut h = Harness::new();

    let commands = h.key(KeyCode::Char('s'));
    let scan_id = match commands.as_slice() {
        [Command::Scan { scan_id, deadline, .. }] => {
            assert_eq!(*deadline, Duration::from_secs(10));
            *scan_id
        }
        other => panic!("unexpected commands {:?}", other),
    };
    assert!(h.app.scan().scanning);
    assert!(h.key(KeyCode::Char('s')).is_empty(), "one scan at a time");

    h.send(Msg::ScanComplete {
        scan_id,
        result: Ok(vec![romsync::ssh::Device {
            addr: "192.168.1.44".parse().unwrap(),
            hostname: Some("retropie".to_string()),
            port_open: true,
        }]),
    });
    assert!(!h.app.scan().scanning);
    assert_eq!(h.app.scan().devices.len(), 1);

    h.key(KeyCode::Enter);
    match h.app.overlay() {
        Overlay::Edit(form) => {
            let profile_host = form.input(romsync::app::EditField::Host).value().to_string();
            assert_eq!(profile_host, "192.168.1.44");
        }
        other => panic!("unexpected overlay {:?}", other),
    }
}

#[test]
fn test_quit_and_ctrl_c() {
    let mut h = Harness::new();
    h.key(KeyCode::Char('a'));
    h.ctrl('c');
    assert!(!h.app.is_running());
}
