//! Remote-fact transport boundary.
//!
//! Providers never talk to a host directly: they ask a [`RemoteTransport`] for a
//! named [`Capability`] and get structured JSON back. How the query travels
//! (PowerShell remoting, an agent, canned data in tests) is the transport's concern.

use serde_json::Value;
use std::fmt;

use super::types::HostTarget;
use crate::error::Result;

/// A category of remote data a provider can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    LoggedOnUser,
    ConsoleSessions,
    BootTime,
    SystemEvents,
    TranslateSid,
    SystemSummary,
    LogicalDisks,
    MemoryStatus,
    NetworkAdapters,
    Monitors,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::LoggedOnUser => "logged-on-user",
            Capability::ConsoleSessions => "console-sessions",
            Capability::BootTime => "boot-time",
            Capability::SystemEvents => "system-events",
            Capability::TranslateSid => "translate-sid",
            Capability::SystemSummary => "system-summary",
            Capability::LogicalDisks => "logical-disks",
            Capability::MemoryStatus => "memory-status",
            Capability::NetworkAdapters => "network-adapters",
            Capability::Monitors => "monitors",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executes capability queries against a host.
///
/// Implementations must bound every query with their own timeout and must not
/// hold shared locks while a query is in flight; the collector calls them from
/// many worker threads at once.
pub trait RemoteTransport: Send + Sync {
    /// Run `capability` on `host`. `params` is `Value::Null` when the capability
    /// takes no arguments. An empty remote answer is returned as `Value::Null`.
    fn query_host(&self, host: &HostTarget, capability: Capability, params: &Value)
        -> Result<Value>;
}
