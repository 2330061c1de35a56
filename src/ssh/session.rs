//! Pooled SSH sessions.
//!
//! `SessionManager` owns at most one authenticated session per client name.
//! A pooled session is handed out again only after a keepalive check
//! succeeds; otherwise it is closed and replaced by a fresh dial.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ssh2::{MethodType, Session};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{AuthMethod, ClientProfile};
use crate::ssh::trust::{TrustError, TrustStore};

/// TCP connect timeout when dialing a client.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Blocking I/O timeout for an established session.
const IO_TIMEOUT_SECS: u64 = 30;

/// Minimum seconds between keepalive messages.
const KEEPALIVE_INTERVAL_SECS: u32 = 1;

/// Round-trip budget for the liveness check of a pooled session.
const LIVENESS_TIMEOUT_MS: u32 = 3000;

/// Broad class of a session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Host trust missing or rejected.
    Trust,
    /// Bad key or password.
    Auth,
    /// Network unreachable, refused, timed out or broken handshake.
    Dial,
}

/// Errors raised while acquiring a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Trust store missing or host key rejected.
    #[error(transparent)]
    Trust(#[from] TrustError),

    /// The private key could not be read or is not a key.
    #[error("reading SSH key {path}: {reason}")]
    KeyFile { path: PathBuf, reason: String },

    /// Credentials were refused.
    #[error("authentication failed for {user}@{addr}: {reason}")]
    Auth {
        user: String,
        addr: String,
        reason: String,
    },

    /// TCP connection failed.
    #[error("connecting to {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or session setup failed.
    #[error("SSH error with {addr}: {reason}")]
    Protocol { addr: String, reason: String },
}

impl SessionError {
    /// Maps the error onto its failure class.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Trust(_) => ErrorClass::Trust,
            Self::KeyFile { .. } | Self::Auth { .. } => ErrorClass::Auth,
            Self::Dial { .. } | Self::Protocol { .. } => ErrorClass::Dial,
        }
    }
}

/// Something that can open, check and close sessions.
pub trait Transport: Send + Sync {
    /// Handle to an authenticated session.
    type Session: Clone + Send + 'static;

    /// Dials and authenticates a new session.
    fn dial(&self, profile: &ClientProfile) -> Result<Self::Session, SessionError>;

    /// Lightweight liveness check.
    fn is_alive(&self, session: &Self::Session) -> bool;

    /// Closes a session.
    fn close(&self, session: &Self::Session);
}

/// Real transport over libssh2.
#[derive(Debug, Clone)]
pub struct SshTransport {
    known_hosts: PathBuf,
    connect_timeout: Duration,
}

impl SshTransport {
    /// Creates a transport that checks hosts against `known_hosts`.
    #[must_use]
    pub fn new(known_hosts: PathBuf) -> Self {
        Self {
            known_hosts,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
        }
    }

    fn connect_tcp(&self, addr: &str) -> Result<TcpStream, SessionError> {
        let dial_err = |source: io::Error| SessionError::Dial {
            addr: addr.to_string(),
            source,
        };

        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "address did not resolve");
        for sock_addr in addr.to_socket_addrs().map_err(dial_err)? {
            match TcpStream::connect_timeout(&sock_addr, self.connect_timeout) {
                Ok(stream) => {
                    let io_timeout = Some(Duration::from_secs(IO_TIMEOUT_SECS));
                    let _ = stream.set_read_timeout(io_timeout);
                    let _ = stream.set_write_timeout(io_timeout);
                    return Ok(stream);
                }
                Err(e) => last_err = e,
            }
        }
        Err(dial_err(last_err))
    }

    fn authenticate(session: &Session, profile: &ClientProfile) -> Result<(), SessionError> {
        let addr = profile.addr();
        let auth_err = |reason: String| SessionError::Auth {
            user: profile.user.clone(),
            addr: addr.clone(),
            reason,
        };

        match profile.auth.method {
            AuthMethod::Key => {
                let key_path = profile.key_path();
                let key = fs::read_to_string(&key_path).map_err(|e| SessionError::KeyFile {
                    path: key_path.clone(),
                    reason: e.to_string(),
                })?;
                if !key.contains("PRIVATE KEY") {
                    return Err(SessionError::KeyFile {
                        path: key_path,
                        reason: "not a PEM or OpenSSH private key".to_string(),
                    });
                }
                session
                    .userauth_pubkey_file(&profile.user, None, &key_path, None)
                    .map_err(|e| auth_err(e.to_string()))?;
            }
            AuthMethod::Password => {
                let password = profile
                    .auth
                    .password
                    .as_deref()
                    .ok_or_else(|| auth_err("no password available".to_string()))?;
                session
                    .userauth_password(&profile.user, password)
                    .map_err(|e| auth_err(e.to_string()))?;
            }
        }

        if session.authenticated() {
            Ok(())
        } else {
            Err(auth_err("server did not accept the credentials".to_string()))
        }
    }
}

impl Transport for SshTransport {
    type Session = Session;

    fn dial(&self, profile: &ClientProfile) -> Result<Session, SessionError> {
        let addr = profile.addr();
        let protocol_err = |reason: String| SessionError::Protocol {
            addr: addr.clone(),
            reason,
        };

        let trust = TrustStore::load(&self.known_hosts)?.resolve(&profile.host, profile.port);
        let tcp = self.connect_tcp(&addr)?;

        let mut session = Session::new().map_err(|e| protocol_err(e.to_string()))?;
        session.set_timeout(IO_TIMEOUT_SECS as u32 * 1000);
        if let Some(pref) = trust.method_pref() {
            debug!("Restricting host key algorithms for {} to {}", addr, pref);
            session
                .method_pref(MethodType::HostKey, &pref)
                .map_err(|e| protocol_err(e.to_string()))?;
        }
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| protocol_err(format!("handshake failed: {}", e)))?;

        trust.verify(&session)?;
        Self::authenticate(&session, profile)?;
        session.set_keepalive(true, KEEPALIVE_INTERVAL_SECS);

        info!("SSH session established: {}@{}", profile.user, addr);
        Ok(session)
    }

    /// Opens and closes a channel, which needs a reply from the peer.
    ///
    /// A queued keepalive succeeds even when the peer vanished without a
    /// reset, so it cannot tell a suspended handheld from a live one.
    fn is_alive(&self, session: &Session) -> bool {
        session.set_timeout(LIVENESS_TIMEOUT_MS);
        let alive = session.authenticated()
            && session
                .channel_session()
                .and_then(|mut channel| channel.close())
                .is_ok();
        session.set_timeout(IO_TIMEOUT_SECS as u32 * 1000);
        alive
    }

    fn close(&self, session: &Session) {
        let _ = session.disconnect(None, "romsync closing session", None);
    }
}

type Slot<S> = Arc<Mutex<Option<S>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pool of sessions keyed by client name.
///
/// Each client name owns one slot. `acquire` for different names runs in
/// parallel; calls for the same name serialize on that slot.
pub struct SessionManager<T: Transport = SshTransport> {
    transport: T,
    slots: Mutex<HashMap<String, Slot<T::Session>>>,
}

impl<T: Transport> SessionManager<T> {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, name: &str) -> Slot<T::Session> {
        let mut slots = lock(&self.slots);
        Arc::clone(slots.entry(name.to_string()).or_default())
    }

    /// Drops the map entry of `name` if it is empty and nobody holds it.
    ///
    /// Slots are only cloned under the map lock, so a strong count of one
    /// means no `acquire` is in flight for that name.
    fn forget_slot(&self, name: &str) {
        let mut slots = lock(&self.slots);
        let idle = slots
            .get(name)
            .is_some_and(|slot| Arc::strong_count(slot) == 1 && lock(slot).is_none());
        if idle {
            slots.remove(name);
        }
    }

    /// Returns a live session for the client, dialing if needed.
    pub fn acquire(&self, profile: &ClientProfile) -> Result<T::Session, SessionError> {
        let slot = self.slot(&profile.name);
        let mut pooled = lock(&slot);

        if let Some(session) = pooled.as_ref() {
            if self.transport.is_alive(session) {
                return Ok(session.clone());
            }
            warn!("Pooled session for {} failed keepalive, redialing", profile.name);
            self.transport.close(session);
            *pooled = None;
        }

        let session = self.transport.dial(profile)?;
        *pooled = Some(session.clone());
        Ok(session)
    }

    /// Dials `profile` once without pooling the session.
    ///
    /// Used to test unsaved profiles, whose parameters must not leak into
    /// the pool under the client's name.
    pub fn check(&self, profile: &ClientProfile) -> Result<(), SessionError> {
        self.with_session(profile, false, |_| ())
    }

    /// Runs `work` on a session for `profile`.
    ///
    /// With `pooled` the pooled session is used, dialing if needed.
    /// Otherwise a session is dialed for this call and closed afterwards.
    pub fn with_session<R>(
        &self,
        profile: &ClientProfile,
        pooled: bool,
        work: impl FnOnce(&T::Session) -> R,
    ) -> Result<R, SessionError> {
        if pooled {
            let session = self.acquire(profile)?;
            return Ok(work(&session));
        }
        let session = self.transport.dial(profile)?;
        let result = work(&session);
        self.transport.close(&session);
        Ok(result)
    }

    /// Closes and evicts the session of one client.
    pub fn release(&self, name: &str) {
        let slot = lock(&self.slots).get(name).cloned();
        if let Some(slot) = slot {
            if let Some(session) = lock(&slot).take() {
                debug!("Closing session for {}", name);
                self.transport.close(&session);
            }
            drop(slot);
            self.forget_slot(name);
        }
    }

    /// Closes and evicts every session.
    pub fn release_all(&self) {
        let slots: Vec<(String, Slot<T::Session>)> = lock(&self.slots)
            .iter()
            .map(|(name, slot)| (name.clone(), Arc::clone(slot)))
            .collect();
        for (name, slot) in slots {
            if let Some(session) = lock(&slot).take() {
                debug!("Closing session for {}", name);
                self.transport.close(&session);
            }
            drop(slot);
            self.forget_slot(&name);
        }
    }

    /// Returns true if a session for `name` is pooled.
    #[must_use]
    pub fn is_pooled(&self, name: &str) -> bool {
        let slot = lock(&self.slots).get(name).cloned();
        slot.is_some_and(|slot| lock(&slot).is_some())
    }

    /// Number of pooled sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        let slots: Vec<Slot<T::Session>> = lock(&self.slots).values().cloned().collect();
        slots.iter().filter(|slot| lock(slot).is_some()).count()
    }

    /// Returns true if no session is pooled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionManager<SshTransport> {
    /// Pool backed by libssh2 and ~/.ssh/known_hosts.
    #[must_use]
    pub fn with_default_trust() -> Self {
        Self::new(SshTransport::new(TrustStore::default_path()))
    }
}
