//! Host-key trust store.
//!
//! Reads the OpenSSH known_hosts file and, per target address, derives the
//! host-key algorithms already trusted for it. Restricting the handshake to
//! those algorithms keeps a server that offers several key types from
//! negotiating one we never recorded. Unknown hosts are never accepted.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use ssh2::{CheckResult, KnownHostFileKind, Session};
use thiserror::Error;

/// Errors raised while resolving or checking host trust.
#[derive(Debug, Error)]
pub enum TrustError {
    /// The known_hosts file does not exist.
    #[error("{0} not found; connect to the host with ssh first to record its key")]
    StoreUnavailable(PathBuf),

    /// The known_hosts file could not be read.
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The presented host key does not match the store.
    #[error("host key for {addr} rejected: {reason}")]
    KeyRejected { addr: String, reason: String },
}

/// One parsed known_hosts line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownHostEntry {
    /// `@cert-authority` / `@revoked` marker, if any.
    pub marker: Option<String>,
    /// Comma-separated host patterns.
    pub patterns: Vec<String>,
    /// Key type (e.g. `ssh-ed25519`).
    pub key_type: String,
}

impl KnownHostEntry {
    /// Parses a known_hosts line. Returns None for comments and short lines.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        let mut fields = line.split_whitespace();
        let mut first = fields.next()?;
        let marker = if first.starts_with('@') {
            let marker = first.to_string();
            first = fields.next()?;
            Some(marker)
        } else {
            None
        };
        let key_type = fields.next()?;
        // The key blob must be present for the line to be usable.
        fields.next()?;

        Some(Self {
            marker,
            patterns: first.split(',').map(String::from).collect(),
            key_type: key_type.to_string(),
        })
    }

    /// Returns true if this entry may describe `host:port`.
    ///
    /// Hashed patterns cannot be matched by inspection, so they count as a
    /// candidate and final say is left to the key check.
    #[must_use]
    pub fn may_match(&self, host: &str, port: u16) -> bool {
        let target = normalize(host, port);
        let mut matched = false;
        for pattern in &self.patterns {
            if pattern.starts_with("|1|") {
                return true;
            }
            if let Some(negated) = pattern.strip_prefix('!') {
                if glob_match(&negated.to_lowercase(), &target) {
                    return false;
                }
                continue;
            }
            if glob_match(&pattern.to_lowercase(), &target) {
                matched = true;
            }
        }
        matched
    }
}

/// The known_hosts database.
#[derive(Debug, Clone)]
pub struct TrustStore {
    path: PathBuf,
    entries: Vec<KnownHostEntry>,
}

impl TrustStore {
    /// Returns ~/.ssh/known_hosts.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ssh")
            .join("known_hosts")
    }

    /// Loads the trust store. A missing file is an error: trust must be
    /// established out of band.
    pub fn load(path: &Path) -> Result<Self, TrustError> {
        if !path.exists() {
            return Err(TrustError::StoreUnavailable(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| TrustError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(path, &content))
    }

    /// Builds a store from file content.
    #[must_use]
    pub fn parse(path: &Path, content: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            entries: content.lines().filter_map(KnownHostEntry::parse).collect(),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Key types recorded for `host:port`, in file order without duplicates.
    #[must_use]
    pub fn algorithms_for(&self, host: &str, port: u16) -> Vec<String> {
        let mut algorithms: Vec<String> = Vec::new();
        for entry in &self.entries {
            if entry.marker.is_some() || !entry.may_match(host, port) {
                continue;
            }
            if !algorithms.contains(&entry.key_type) {
                algorithms.push(entry.key_type.clone());
            }
        }
        algorithms
    }

    /// Resolves the trust decision for one target.
    #[must_use]
    pub fn resolve(&self, host: &str, port: u16) -> HostTrust {
        HostTrust {
            host: host.to_string(),
            port,
            algorithms: self.algorithms_for(host, port),
            store_path: self.path.clone(),
        }
    }
}

/// Trust material for a single `host:port`.
#[derive(Debug, Clone)]
pub struct HostTrust {
    host: String,
    port: u16,
    /// Key types known for the host.
    pub algorithms: Vec<String>,
    store_path: PathBuf,
}

impl HostTrust {
    /// libssh2 host-key method preference, or None when nothing is known
    /// (the key check will then reject the host).
    #[must_use]
    pub fn method_pref(&self) -> Option<String> {
        let mut methods: Vec<&str> = Vec::new();
        for algorithm in &self.algorithms {
            let expanded = if algorithm == "ssh-rsa" {
                // An RSA key can be presented with any of the RSA signature schemes.
                vec!["rsa-sha2-512", "rsa-sha2-256", "ssh-rsa"]
            } else {
                vec![algorithm.as_str()]
            };
            for method in expanded {
                if !methods.contains(&method) {
                    methods.push(method);
                }
            }
        }
        if methods.is_empty() {
            None
        } else {
            Some(methods.join(","))
        }
    }

    /// Checks the key presented during the handshake against the store.
    pub fn verify(&self, session: &Session) -> Result<(), TrustError> {
        let addr = normalize(&self.host, self.port);
        let rejected = |reason: String| TrustError::KeyRejected {
            addr: addr.clone(),
            reason,
        };

        let mut known_hosts = session
            .known_hosts()
            .map_err(|e| rejected(format!("known hosts unavailable: {}", e)))?;
        known_hosts
            .read_file(&self.store_path, KnownHostFileKind::OpenSSH)
            .map_err(|e| rejected(format!("cannot read {}: {}", self.store_path.display(), e)))?;

        let (key, _) = session
            .host_key()
            .ok_or_else(|| rejected("server presented no host key".to_string()))?;

        match known_hosts.check_port(&self.host, self.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::Mismatch => Err(rejected(
                "key does not match known_hosts (possible man-in-the-middle)".to_string(),
            )),
            CheckResult::NotFound => Err(rejected(format!(
                "host is not in {}; connect with ssh first",
                self.store_path.display()
            ))),
            CheckResult::Failure => Err(rejected("known_hosts check failed".to_string())),
        }
    }
}

/// known_hosts spelling of a target: bare host on port 22, `[host]:port` otherwise.
#[must_use]
pub fn normalize(host: &str, port: u16) -> String {
    let host = host.trim_start_matches('[').trim_end_matches(']').to_lowercase();
    if port == 22 {
        host
    } else {
        format!("[{}]:{}", host, port)
    }
}

/// OpenSSH pattern match supporting `*` and `?`.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
