//! romsync - Main entry point.
//!
//! Usage: romsync [OPTIONS]
//!
//! Options:
//!   --config PATH    Use this configuration file
//!   --version, -v    Show version

use std::env;
use std::io;
use std::panic;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{error, info};

use romsync::app::{App, Msg};
use romsync::config::Config;
use romsync::runtime::{CommandExecutor, WorkerExecutor};
use romsync::ssh::SessionManager;
use romsync::{logging, ui};

/// Version from Cargo.toml.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Event poll timeout in milliseconds.
const POLL_TIMEOUT_MS: u64 = 50;

/// Maximum iterations for main loop (safety bound).
const MAX_MAIN_ITERATIONS: usize = 10_000_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--version" || a == "-v") {
        println!("romsync v{}", VERSION);
        return Ok(());
    }

    let config_path = match args.iter().position(|a| a == "--config") {
        Some(i) => match args.get(i + 1) {
            Some(path) => PathBuf::from(path),
            None => {
                eprintln!("--config needs a path");
                std::process::exit(2);
            }
        },
        None => Config::default_config_path(),
    };

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("romsync: {}", e);
            std::process::exit(1);
        }
    };

    // Keep the guard alive so buffered log lines are flushed on exit.
    let _log_guard = match logging::init(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("romsync: logging disabled: {}", e);
            None
        }
    };
    info!("romsync v{} starting with {}", VERSION, config_path.display());

    // Set up panic hook to restore terminal on panic
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));

    let (tx, rx) = mpsc::channel();
    let sessions = Arc::new(SessionManager::with_default_trust());
    let executor = WorkerExecutor::new(sessions, tx, config_path.clone())?;
    let mut app = App::new(config, config_path);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run(&mut terminal, &mut app, &executor, &rx);

    executor.shutdown();
    restore_terminal()?;

    if let Err(e) = &result {
        error!("Event loop failed: {}", e);
    }
    info!("romsync exiting");
    result.map_err(Into::into)
}

/// Draw, read input, drain worker messages, dispatch commands.
fn run<B, E>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    executor: &E,
    rx: &mpsc::Receiver<Msg>,
) -> io::Result<()>
where
    B: ratatui::backend::Backend,
    E: CommandExecutor,
{
    let mut iterations = 0;
    while app.is_running() && iterations < MAX_MAIN_ITERATIONS {
        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(Duration::from_millis(POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                dispatch(app, executor, Msg::Key(key));
            }
        }

        while let Ok(msg) = rx.try_recv() {
            dispatch(app, executor, msg);
        }

        iterations += 1;
    }
    Ok(())
}

fn dispatch<E: CommandExecutor>(app: &mut App, executor: &E, msg: Msg) {
    for command in app.update(msg) {
        executor.execute(command);
    }
}

/// Restores the terminal to its original state.
fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}
