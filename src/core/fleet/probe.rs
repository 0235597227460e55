//! Reachability probes run before any provider touches a host.

use std::net::{TcpStream, ToSocketAddrs};
use std::process::Command;
use std::str::FromStr;
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use super::types::HostTarget;
use crate::error::HostFactsError;
use crate::platform::process::run_with_timeout;

/// Extra time granted to the `ping` process on top of its own reply timeout.
const PING_GRACE: Duration = Duration::from_millis(1_500);

/// Liveness check. Must return `false` rather than fail for a dead host.
pub trait ReachabilityProbe: Send + Sync {
    fn probe(&self, host: &HostTarget) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    Ping,
    Tcp,
}

impl FromStr for ProbeKind {
    type Err = HostFactsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ping" | "icmp" => Ok(ProbeKind::Ping),
            "tcp" => Ok(ProbeKind::Tcp),
            other => Err(HostFactsError::config(format!(
                "unknown probe '{}' (expected ping or tcp)",
                other
            ))),
        }
    }
}

/// Single ICMP echo through the system `ping` utility.
#[derive(Debug, Clone)]
pub struct PingProber {
    timeout: Duration,
}

impl PingProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn command(&self, host: &HostTarget) -> Command {
        let mut cmd = Command::new("ping");
        if cfg!(windows) {
            let millis = self.timeout.as_millis().max(1).to_string();
            cmd.args(["-n", "1", "-w", &millis, host.name()]);
        } else {
            let secs = self.timeout.as_secs_f64().ceil().max(1.0) as u64;
            cmd.args(["-c", "1", "-W", &secs.to_string(), host.name()]);
        }
        cmd
    }
}

impl ReachabilityProbe for PingProber {
    fn probe(&self, host: &HostTarget) -> bool {
        let what = format!("ping {}", host);
        match run_with_timeout(self.command(host), self.timeout + PING_GRACE, &what) {
            // Windows ping exits 0 on "Destination host unreachable" replies from a router
            Ok(output) => output.status.success() && !reports_unreachable(&output.stdout),
            Err(e) => {
                debug!("{} failed: {}", what, e);
                false
            }
        }
    }
}

/// True when a ping reply line says the destination is unreachable. The
/// phrases contain spaces, so an echoed host name never matches them.
fn reports_unreachable(stdout: &str) -> bool {
    stdout.lines().any(|line| {
        let line = line.to_lowercase();
        line.contains("destination host unreachable")
            || line.contains("destination net unreachable")
            || line.contains("destination port unreachable")
    })
}

/// TCP connect to a management port (WinRM by default).
#[derive(Debug, Clone)]
pub struct TcpProber {
    port: u16,
    timeout: Duration,
}

impl TcpProber {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl ReachabilityProbe for TcpProber {
    fn probe(&self, host: &HostTarget) -> bool {
        let addrs = match (host.name(), self.port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                debug!("Could not resolve {}: {}", host, e);
                return false;
            }
        };

        addrs
            .into_iter()
            .any(|addr| TcpStream::connect_timeout(&addr, self.timeout).is_ok())
    }
}

/// Build the configured prober.
pub fn build_prober(kind: ProbeKind, timeout: Duration, tcp_port: u16) -> Box<dyn ReachabilityProbe> {
    match kind {
        ProbeKind::Ping => Box::new(PingProber::new(timeout)),
        ProbeKind::Tcp => Box::new(TcpProber::new(tcp_port, timeout)),
    }
}
