//! SSH connectivity.
//!
//! - `trust`: known_hosts parsing and host-key verification
//! - `session`: pooled, authenticated sessions per client
//! - `scanner`: discovery of SSH-capable devices on the local subnet

pub mod scanner;
pub mod session;
pub mod trust;

pub use scanner::{Device, Prefix, ProbeOutcome, Prober, ScanError, TcpProber};
pub use session::{ErrorClass, SessionError, SessionManager, SshTransport, Transport};
pub use trust::{HostTrust, TrustError, TrustStore};
