//! Bounded connectivity checks used before forcing a re-record

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;
use url::Url;

/// Default connect timeout
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Decides whether the origin of a recorded URI can currently be reached
///
/// Implementations must not fail; an unreachable or unparseable target is `false`.
pub trait ConnectivityProbe: Send + Sync {
    /// Whether a connection to the host behind `uri` succeeds
    fn is_reachable(&self, uri: &str) -> bool;
}

impl<F> ConnectivityProbe for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_reachable(&self, uri: &str) -> bool {
        self(uri)
    }
}

/// Opens a TCP connection to the URI's host and port
///
/// The timeout bounds the whole check, name resolution included.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnectivityProbe {
    timeout: Duration,
}

impl TcpConnectivityProbe {
    /// Probe with the given connect timeout
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Total time budget for one check
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for TcpConnectivityProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl ConnectivityProbe for TcpConnectivityProbe {
    fn is_reachable(&self, uri: &str) -> bool {
        let Ok(url) = Url::parse(uri) else {
            debug!("Connectivity probe skipped, unparseable uri {}", uri);
            return false;
        };
        let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
            debug!("Connectivity probe skipped, no host or port in {}", uri);
            return false;
        };
        let host = host.trim_start_matches('[').trim_end_matches(']');

        let deadline = Instant::now() + self.timeout;
        let Some(addrs) = resolve(host, port, self.timeout) else {
            return false;
        };

        for addr in addrs {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("Connectivity probe ran out of time before {}", addr);
                break;
            }
            match TcpStream::connect_timeout(&addr, remaining) {
                Ok(_) => {
                    debug!("Connectivity probe reached {}", addr);
                    return true;
                }
                Err(e) => debug!("Connectivity probe failed for {}: {}", addr, e),
            }
        }
        false
    }
}

/// Resolve on a helper thread so a slow resolver cannot outlive `timeout`
fn resolve(host: &str, port: u16, timeout: Duration) -> Option<Vec<SocketAddr>> {
    let (tx, rx) = mpsc::channel();
    let target = host.to_string();
    thread::spawn(move || {
        let resolved = (target.as_str(), port)
            .to_socket_addrs()
            .map(|addrs| addrs.collect::<Vec<_>>());
        let _ = tx.send(resolved);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(addrs)) => Some(addrs),
        Ok(Err(e)) => {
            debug!("Connectivity probe could not resolve {}: {}", host, e);
            None
        }
        Err(_) => {
            debug!("Connectivity probe timed out resolving {}", host);
            None
        }
    }
}
