//! Session pool tests with an in-memory transport.

use std::io;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use pretty_assertions::assert_eq;

use romsync::config::ClientProfile;
use romsync::ssh::{ErrorClass, SessionError, SessionManager, Transport};

/// A fake session: an id plus a shared liveness flag.
#[derive(Debug, Clone)]
struct FakeSession {
    id: usize,
    alive: Arc<AtomicBool>,
}

#[derive(Default)]
struct Counters {
    dials: AtomicUsize,
    closes: AtomicUsize,
    refuse: AtomicBool,
    last: Mutex<Option<FakeSession>>,
}

/// Cloneable handle so the test keeps a view of what the pool did.
#[derive(Clone, Default)]
struct FakeTransport(Arc<Counters>);

impl FakeTransport {
    fn dials(&self) -> usize {
        self.0.dials.load(Ordering::SeqCst)
    }

    fn closes(&self) -> usize {
        self.0.closes.load(Ordering::SeqCst)
    }

    fn refuse(&self) {
        self.0.refuse.store(true, Ordering::SeqCst);
    }

    fn kill_last(&self) {
        if let Some(session) = self.0.last.lock().unwrap().as_ref() {
            session.alive.store(false, Ordering::SeqCst);
        }
    }
}

impl Transport for FakeTransport {
    type Session = FakeSession;

    fn dial(&self, profile: &ClientProfile) -> Result<FakeSession, SessionError> {
        if self.0.refuse.load(Ordering::SeqCst) {
            return Err(SessionError::Dial {
                addr: profile.addr(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
            });
        }
        let id = self.0.dials.fetch_add(1, Ordering::SeqCst) + 1;
        let session = FakeSession {
            id,
            alive: Arc::new(AtomicBool::new(true)),
        };
        *self.0.last.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    fn is_alive(&self, session: &FakeSession) -> bool {
        session.alive.load(Ordering::SeqCst)
    }

    fn close(&self, session: &FakeSession) {
        session.alive.store(false, Ordering::SeqCst);
        self.0.closes.fetch_add(1, Ordering::SeqCst);
    }
}

fn pool() -> (FakeTransport, SessionManager<FakeTransport>) {
    let transport = FakeTransport::default();
    let manager = SessionManager::new(transport.clone());
    (transport, manager)
}

fn profile(name: &str) -> ClientProfile {
    ClientProfile::new(name, "192.168.1.50", "pi")
}

#[test]
fn test_healthy_session_is_reused() {
    let (transport, manager) = pool();

    let first = manager.acquire(&profile("deck")).unwrap();
    let second = manager.acquire(&profile("deck")).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(transport.dials(), 1);
    assert!(manager.is_pooled("deck"));
    assert_eq!(manager.len(), 1);
}

#[test]
fn test_dead_session_is_redialed() {
    let (transport, manager) = pool();

    let first = manager.acquire(&profile("deck")).unwrap();
    transport.kill_last();
    let second = manager.acquire(&profile("deck")).unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(transport.dials(), 2);
    assert_eq!(transport.closes(), 1, "the stale session is closed");
    assert_eq!(manager.len(), 1);
}

#[test]
fn test_sessions_are_keyed_by_client_name() {
    let (transport, manager) = pool();

    let deck = manager.acquire(&profile("deck")).unwrap();
    let rg35 = manager.acquire(&profile("rg35xx")).unwrap();

    assert_ne!(deck.id, rg35.id);
    assert_eq!(transport.dials(), 2);
    assert_eq!(manager.len(), 2);
}

#[test]
fn test_release_closes_one_client() {
    let (transport, manager) = pool();
    manager.acquire(&profile("deck")).unwrap();
    manager.acquire(&profile("rg35xx")).unwrap();

    manager.release("deck");

    assert!(!manager.is_pooled("deck"));
    assert!(manager.is_pooled("rg35xx"));
    assert_eq!(transport.closes(), 1);

    // Unknown names are ignored.
    manager.release("nope");
    assert_eq!(transport.closes(), 1);
}

#[test]
fn test_release_all_empties_pool() {
    let (transport, manager) = pool();
    manager.acquire(&profile("deck")).unwrap();
    manager.acquire(&profile("rg35xx")).unwrap();

    manager.release_all();

    assert!(manager.is_empty());
    assert_eq!(transport.closes(), 2);
}

#[test]
fn test_failed_dial_pools_nothing() {
    let (transport, manager) = pool();
    transport.refuse();

    let err = manager.acquire(&profile("deck")).unwrap_err();

    assert_eq!(err.class(), ErrorClass::Dial);
    assert!(manager.is_empty());
}

#[test]
fn test_check_does_not_pool() {
    let (transport, manager) = pool();

    manager.check(&profile("deck")).unwrap();

    assert!(!manager.is_pooled("deck"));
    assert_eq!(transport.dials(), 1);
    assert_eq!(transport.closes(), 1);
}

#[test]
fn test_check_leaves_pooled_session_alone() {
    let (transport, manager) = pool();
    let pooled = manager.acquire(&profile("deck")).unwrap();

    let mut edited = profile("deck");
    edited.host = "10.0.0.9".to_string();
    manager.check(&edited).unwrap();

    let again = manager.acquire(&profile("deck")).unwrap();
    assert_eq!(pooled.id, again.id);
    assert_eq!(transport.dials(), 2);
}

#[test]
fn test_concurrent_acquire_dials_once() {
    let (transport, manager) = pool();
    let manager = Arc::new(manager);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.acquire(&profile("deck")).unwrap().id)
        })
        .collect();
    let ids: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(transport.dials(), 1);
}

#[test]
fn test_unpooled_work_gets_its_own_session() {
    let (transport, manager) = pool();
    let pooled = manager.acquire(&profile("deck")).unwrap();

    let seen = manager
        .with_session(&profile("deck"), false, |session| session.id)
        .unwrap();

    assert_ne!(seen, pooled.id);
    assert_eq!(transport.dials(), 2);
    assert_eq!(transport.closes(), 1, "the one-off session is closed");
    assert!(manager.is_pooled("deck"));
}

#[test]
fn test_pooled_work_reuses_the_pooled_session() {
    let (transport, manager) = pool();
    let pooled = manager.acquire(&profile("deck")).unwrap();

    let seen = manager
        .with_session(&profile("deck"), true, |session| session.id)
        .unwrap();

    assert_eq!(seen, pooled.id);
    assert_eq!(transport.dials(), 1);
    assert_eq!(transport.closes(), 0);
}

#[test]
fn test_release_then_reacquire_dials_fresh() {
    let (transport, manager) = pool();
    let first = manager.acquire(&profile("deck")).unwrap();

    manager.release("deck");
    let second = manager.acquire(&profile("deck")).unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(transport.dials(), 2);
    assert_eq!(manager.len(), 1);
}
