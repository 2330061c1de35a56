//! Network scanner for discovering SSH-capable devices.
//!
//! Probes port 22 on every address of the local /24 with a short per-probe
//! timeout. A connect or an explicit refusal both mean a live host; a
//! timeout means nothing answered and the address is dropped.

use std::fmt;
use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info};

/// Port probed on every address.
pub const SSH_PORT: u16 = 22;

/// Timeout for a single connect attempt.
pub const PROBE_TIMEOUT_MS: u64 = 500;

/// Maximum probes in flight at once.
pub const MAX_IN_FLIGHT: usize = 50;

/// Overall scan deadline used by the app.
pub const SCAN_DEADLINE_SECS: u64 = 10;

/// Upper bound on a reverse lookup.
const LOOKUP_TIMEOUT_MS: u64 = 1000;

/// Errors raised while preparing a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// No active interface carries a private IPv4 address.
    #[error("no private IPv4 network interface found")]
    NoPrivateInterface,

    /// Interfaces could not be enumerated.
    #[error("listing network interfaces: {0}")]
    Interfaces(#[from] io::Error),

    /// A prefix string could not be parsed.
    #[error("invalid subnet '{0}' (expected a.b.c.d/len)")]
    InvalidPrefix(String),
}

/// An IPv4 network prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix {
    network: Ipv4Addr,
    len: u8,
}

impl Prefix {
    /// Creates the prefix of length `len` enclosing `addr`.
    pub fn new(addr: Ipv4Addr, len: u8) -> Result<Self, ScanError> {
        if len > 32 {
            return Err(ScanError::InvalidPrefix(format!("{}/{}", addr, len)));
        }
        Ok(Self {
            network: Ipv4Addr::from(u32::from(addr) & Self::mask(len)),
            len,
        })
    }

    fn mask(len: u8) -> u32 {
        if len == 0 { 0 } else { u32::MAX << (32 - u32::from(len)) }
    }

    /// Network address.
    #[must_use]
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Prefix length.
    #[must_use]
    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    /// Returns true if `addr` lies inside the prefix.
    #[must_use]
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & Self::mask(self.len) == u32::from(self.network)
    }

    /// Host addresses of the prefix, excluding network and broadcast.
    ///
    /// A /32 is the single address; a /31 has no usable hosts.
    #[must_use]
    pub fn hosts(&self) -> Vec<Ipv4Addr> {
        match self.len {
            32 => vec![self.network],
            31 => Vec::new(),
            _ => {
                let network = u32::from(self.network);
                let broadcast = network | !Self::mask(self.len);
                (network + 1..broadcast).map(Ipv4Addr::from).collect()
            }
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.len)
    }
}

impl FromStr for Prefix {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScanError::InvalidPrefix(s.to_string());
        let (addr, len) = s.split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Addr = addr.trim().parse().map_err(|_| invalid())?;
        let len: u8 = len.trim().parse().map_err(|_| invalid())?;
        Self::new(addr, len).map_err(|_| invalid())
    }
}

/// A host found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Address of the host.
    pub addr: Ipv4Addr,
    /// Reverse-DNS name, when one resolved.
    pub hostname: Option<String>,
    /// True if the port accepted the connection.
    pub port_open: bool,
}

impl Device {
    /// Name to show for the device.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.hostname
            .clone()
            .unwrap_or_else(|| self.addr.to_string())
    }
}

/// Sorts devices with open ports first, then by ascending address.
pub fn sort_devices(devices: &mut [Device]) {
    devices.sort_by(|a, b| {
        b.port_open
            .cmp(&a.port_open)
            .then_with(|| a.addr.cmp(&b.addr))
    });
}

/// Result of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Port accepted the connection.
    Open,
    /// Host answered with a refusal.
    Refused,
    /// Nothing answered in time.
    Absent,
}

/// Probes single addresses.
pub trait Prober: Send + Sync + 'static {
    /// Attempts one connection to `addr:port`.
    fn probe(&self, addr: Ipv4Addr, port: u16) -> impl Future<Output = ProbeOutcome> + Send;

    /// Best-effort reverse lookup.
    fn lookup(&self, addr: Ipv4Addr) -> impl Future<Output = Option<String>> + Send;
}

/// Prober using real TCP connects and system reverse DNS.
#[derive(Debug, Clone)]
pub struct TcpProber {
    timeout: Duration,
}

impl TcpProber {
    /// Creates a prober with the standard probe timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_millis(PROBE_TIMEOUT_MS),
        }
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for TcpProber {
    async fn probe(&self, addr: Ipv4Addr, port: u16) -> ProbeOutcome {
        let target = SocketAddr::new(IpAddr::V4(addr), port);
        match timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_)) => ProbeOutcome::Open,
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => ProbeOutcome::Refused,
            Ok(Err(_)) | Err(_) => ProbeOutcome::Absent,
        }
    }

    async fn lookup(&self, addr: Ipv4Addr) -> Option<String> {
        tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&IpAddr::V4(addr)).ok())
            .await
            .ok()
            .flatten()
            .filter(|name| name.parse::<IpAddr>().is_err())
    }
}

/// Returns the /24 of the first private IPv4 address on an active interface.
pub fn local_subnet() -> Result<Prefix, ScanError> {
    let addrs = get_if_addrs::get_if_addrs()?
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .map(|iface| iface.ip());
    local_subnet_from(addrs)
}

/// Picks the /24 of the first private, non-loopback IPv4 address.
pub fn local_subnet_from<I>(addrs: I) -> Result<Prefix, ScanError>
where
    I: IntoIterator<Item = IpAddr>,
{
    addrs
        .into_iter()
        .find_map(|addr| match addr {
            IpAddr::V4(v4) if v4.is_private() && !v4.is_loopback() => Some(v4),
            _ => None,
        })
        .ok_or(ScanError::NoPrivateInterface)
        .and_then(|addr| Prefix::new(addr, 24))
}

/// Probes every host of `prefix` on `port`.
///
/// No probe is issued once `cancel` is set or `deadline` has passed; probes
/// already in flight drain and their results are kept.
pub async fn scan<P: Prober>(
    prober: Arc<P>,
    prefix: Prefix,
    port: u16,
    deadline: Instant,
    cancel: Arc<AtomicBool>,
) -> Vec<Device> {
    let gate = Arc::new(Semaphore::new(MAX_IN_FLIGHT));
    let mut probes = JoinSet::new();
    let stopped = || cancel.load(Ordering::Relaxed) || Instant::now() >= deadline;

    info!("Scanning {} on port {}", prefix, port);
    for addr in prefix.hosts() {
        if stopped() {
            debug!("Scan stopped before probing {}", addr);
            break;
        }
        let Ok(Ok(permit)) = timeout_at(deadline, Arc::clone(&gate).acquire_owned()).await else {
            debug!("Scan deadline reached while waiting for a probe slot");
            break;
        };
        if stopped() {
            break;
        }

        let prober = Arc::clone(&prober);
        probes.spawn(async move {
            let outcome = prober.probe(addr, port).await;
            drop(permit);
            if outcome == ProbeOutcome::Absent {
                return None;
            }
            let hostname = timeout(Duration::from_millis(LOOKUP_TIMEOUT_MS), prober.lookup(addr))
                .await
                .ok()
                .flatten();
            Some(Device {
                addr,
                hostname,
                port_open: outcome == ProbeOutcome::Open,
            })
        });
    }

    let mut devices = Vec::new();
    while let Some(joined) = probes.join_next().await {
        if let Ok(Some(device)) = joined {
            devices.push(device);
        }
    }

    sort_devices(&mut devices);
    info!("Scan of {} found {} device(s)", prefix, devices.len());
    devices
}
