//! Configuration module for romsync.
//!
//! Handles loading, validating and saving the YAML configuration document
//! that lists the server ROM library and the client devices.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogConfig;
use crate::remote::remote_join;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Errors that can occur while loading or saving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// YAML parsing error.
    #[error("parsing config: {0}")]
    Parse(#[source] serde_yaml::Error),

    /// YAML serialization error.
    #[error("marshaling config: {0}")]
    Serialize(#[source] serde_yaml::Error),

    /// The document parsed but is not usable.
    #[error("{0}")]
    Invalid(String),
}

/// How a client authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Private key file.
    #[default]
    Key,
    /// Password, either stored or entered at runtime.
    Password,
}

impl AuthMethod {
    /// Returns the config spelling of the method.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Password => "password",
        }
    }

    /// Parses a method name as typed in the edit form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "key" | "pubkey" | "publickey" => Some(Self::Key),
            "password" | "pass" => Some(Self::Password),
            _ => None,
        }
    }
}

/// Authentication settings of a client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Authentication method.
    pub method: AuthMethod,
    /// Private key path (defaults to ~/.ssh/id_rsa).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<String>,
    /// Stored password. Runtime passwords are never written here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// A remote device that receives ROMs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    /// Unique name.
    pub name: String,
    /// Hostname or IP address.
    pub host: String,
    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Root of the ROM tree on the device.
    #[serde(default)]
    pub rom_dir: String,
    /// Per-console directory overrides (console dir -> absolute remote path).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub console_dirs: BTreeMap<String, String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ClientProfile {
    /// Creates a key-authenticated profile with no ROM directory.
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            auth: AuthConfig::default(),
            rom_dir: String::new(),
            console_dirs: BTreeMap::new(),
        }
    }

    /// Returns `host:port` in the form used for dialing.
    #[must_use]
    pub fn addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Returns true if the client authenticates with a password.
    #[must_use]
    pub fn uses_password(&self) -> bool {
        self.auth.method == AuthMethod::Password
    }

    /// Resolves the directory holding `collection` on this client.
    #[must_use]
    pub fn collection_dir(&self, collection: &Collection) -> String {
        match self.console_dirs.get(&collection.dir) {
            Some(dir) => dir.clone(),
            None => remote_join(&self.rom_dir, &collection.dir),
        }
    }

    /// Returns the private key path, falling back to ~/.ssh/id_rsa.
    #[must_use]
    pub fn key_path(&self) -> PathBuf {
        match self.auth.key_path.as_deref() {
            Some(path) if !path.is_empty() => expand_home(path),
            _ => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".ssh")
                .join("id_rsa"),
        }
    }
}

/// A named ROM collection (console).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Display name.
    pub name: String,
    /// Directory name under the server and client roots.
    pub dir: String,
    /// Accepted extensions (empty means every file).
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl Collection {
    /// Creates a collection that accepts the given extensions.
    #[must_use]
    pub fn new(name: &str, dir: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            dir: dir.to_string(),
            extensions: extensions.iter().map(|e| (*e).to_string()).collect(),
        }
    }
}

/// Server side of the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Root directory of the ROM library.
    pub rom_dir: String,
    /// Known consoles.
    #[serde(default)]
    pub consoles: Vec<Collection>,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Server library.
    pub server: ServerConfig,
    /// Client devices.
    #[serde(default)]
    pub clients: Vec<ClientProfile>,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let mut example = ClientProfile::new("example-device", "192.168.1.100", "pi");
        example.auth.key_path = Some(home.join(".ssh").join("id_rsa").display().to_string());
        example.rom_dir = "/home/pi/RetroPie/roms".to_string();

        Self {
            server: ServerConfig {
                rom_dir: home.join("roms").display().to_string(),
                consoles: vec![
                    Collection::new("NES", "nes", &[".nes", ".zip"]),
                    Collection::new("SNES", "snes", &[".sfc", ".smc", ".zip"]),
                    Collection::new("Game Boy", "gb", &[".gb", ".gbc", ".zip"]),
                    Collection::new("Game Boy Advance", "gba", &[".gba", ".zip"]),
                    Collection::new("Nintendo 64", "n64", &[".n64", ".z64", ".v64", ".zip"]),
                    Collection::new("Genesis", "genesis", &[".md", ".bin", ".zip"]),
                    Collection::new(
                        "PlayStation",
                        "psx",
                        &[".bin", ".cue", ".iso", ".chd", ".zip"],
                    ),
                ],
            },
            clients: vec![example],
            logging: LogConfig::default(),
        }
    }
}

impl Config {
    /// Returns the default config file path (~/.config/romsync/config.yaml).
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("romsync")
            .join("config.yaml")
    }

    /// Loads configuration from a path, writing the defaults if it doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            context: "reading",
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_yaml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                context: "creating config directory",
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let data = serde_yaml::to_string(self).map_err(ConfigError::Serialize)?;
        fs::write(path, data).map_err(|source| ConfigError::Io {
            context: "writing",
            path: path.to_path_buf(),
            source,
        })
    }

    /// Checks required fields and normalises defaults in place.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.server.rom_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("server.rom_dir is required".to_string()));
        }
        if self.server.consoles.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one console must be configured".to_string(),
            ));
        }

        for (i, client) in self.clients.iter_mut().enumerate() {
            if client.name.is_empty() {
                return Err(ConfigError::Invalid(format!("client[{}].name is required", i)));
            }
            if client.host.is_empty() {
                return Err(ConfigError::Invalid(format!("client[{}].host is required", i)));
            }
            if client.user.is_empty() {
                return Err(ConfigError::Invalid(format!("client[{}].user is required", i)));
            }
            if client.port == 0 {
                client.port = DEFAULT_PORT;
            }
        }

        for (i, client) in self.clients.iter().enumerate() {
            if self.clients[..i].iter().any(|c| c.name == client.name) {
                return Err(ConfigError::Invalid(format!(
                    "client name '{}' is used more than once",
                    client.name
                )));
            }
        }

        Ok(())
    }

    /// Looks up a client by name.
    #[must_use]
    pub fn client(&self, name: &str) -> Option<&ClientProfile> {
        self.clients.iter().find(|c| c.name == name)
    }

    /// Server directory of a collection.
    #[must_use]
    pub fn server_collection_dir(&self, collection: &Collection) -> PathBuf {
        expand_home(&self.server.rom_dir).join(&collection.dir)
    }
}

/// Expands a leading `~/` to the home directory.
#[must_use]
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.consoles.len(), 7);
    }

    #[test]
    fn test_port_defaults_when_missing() {
        let yaml = r#"
server:
  rom_dir: /srv/roms
  consoles:
    - name: NES
      dir: nes
clients:
  - name: deck
    host: 10.0.0.4
    user: deck
    auth:
      method: password
    rom_dir: /home/deck/roms
"#;
        let mut config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        let deck = config.client("deck").unwrap();
        assert_eq!(deck.port, 22);
        assert!(deck.uses_password());
        assert_eq!(deck.addr(), "10.0.0.4:22");
    }

    #[test]
    fn test_zero_port_is_normalised() {
        let mut config = Config::default();
        config.clients[0].port = 0;
        config.validate().unwrap();
        assert_eq!(config.clients[0].port, 22);
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let mut config = Config::default();
        config.clients[0].user.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.server.rom_dir.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.consoles.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut config = Config::default();
        let dup = config.clients[0].clone();
        config.clients.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_collection_dir_override() {
        let mut client = ClientProfile::new("deck", "10.0.0.4", "deck");
        client.rom_dir = "/roms/".to_string();
        let nes = Collection::new("NES", "nes", &[".nes"]);
        let snes = Collection::new("SNES", "snes", &[".sfc"]);
        client
            .console_dirs
            .insert("snes".to_string(), "/mnt/sd/sfc".to_string());

        assert_eq!(client.collection_dir(&nes), "/roms/nes");
        assert_eq!(client.collection_dir(&snes), "/mnt/sd/sfc");
    }

    #[test]
    fn test_ipv6_addr_is_bracketed() {
        let client = ClientProfile::new("v6", "fe80::1", "root");
        assert_eq!(client.addr(), "[fe80::1]:22");
    }

    #[test]
    fn test_auth_method_parse() {
        assert_eq!(AuthMethod::parse("Password"), Some(AuthMethod::Password));
        assert_eq!(AuthMethod::parse(" key "), Some(AuthMethod::Key));
        assert_eq!(AuthMethod::parse("agent"), None);
    }

    #[test]
    fn test_load_creates_default_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let created = Config::load(&path).unwrap();
        assert!(path.exists());

        let loaded = Config::load(&path).unwrap();
        assert_eq!(created, loaded);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "server: [not, a, map").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }
}
