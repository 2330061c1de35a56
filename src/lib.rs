//! romsync
//!
//! A terminal UI that keeps a local ROM library in sync with handheld and
//! retro devices over SSH.
//!
//! # Architecture
//!
//! - **SSH Module**: known_hosts trust, pooled sessions, subnet discovery
//! - **Remote Module**: SFTP push/pull and sequential transfer jobs
//! - **Library Module**: server-side collections and client diffing
//! - **App Module**: message-driven state machine with modal overlays
//! - **Runtime Module**: executes app commands on a tokio runtime
//! - **UI Module**: ratatui panels, overlays and status bar
//!
//! # Usage
//!
//! ```no_run
//! use romsync::app::{App, Msg};
//! use romsync::config::Config;
//!
//! let path = Config::default_config_path();
//! let config = Config::load(&path).expect("config");
//! let mut app = App::new(config, path);
//! let commands = app.update(Msg::ClearError { seq: 0 });
//! assert!(commands.is_empty());
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::unnested_or_patterns)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::similar_names)]

pub mod app;
pub mod config;
pub mod library;
pub mod logging;
pub mod remote;
pub mod runtime;
pub mod ssh;
pub mod ui;

// Re-export main types
pub use app::App;
pub use config::Config;
pub use runtime::{CommandExecutor, WorkerExecutor};
pub use ssh::SessionManager;
