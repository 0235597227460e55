//! Built-in fact providers.
//!
//! Registration order here is the column order of tabular output.

pub mod inventory;
pub mod monitor;
pub mod uptime;
pub mod user;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::provider::ProviderRegistry;
use crate::error::{HostFactsError, Result};

pub use inventory::{DiskInfo, DiskProvider, InventoryProvider, MemoryProvider, MemoryUsage, NetworkAdapter, NetworkProvider};
pub use monitor::{connection_label, decode_char_array, MonitorInfo, MonitorProvider};
pub use uptime::{correlate_events, EventCorrelation, EventIds, SystemEvent, UptimeProvider};
pub use user::UserProvider;

pub const USER: &str = "user";
pub const UPTIME: &str = "uptime";
pub const INVENTORY: &str = "inventory";
pub const DISK: &str = "disk";
pub const MEMORY: &str = "memory";
pub const NETWORK: &str = "network";
pub const MONITORS: &str = "monitors";

/// Every built-in provider name, in registration order.
pub const BUILTIN: &[&str] = &[USER, UPTIME, INVENTORY, DISK, MEMORY, NETWORK, MONITORS];

/// Knobs for the built-in providers.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Also enumerate console session users
    pub console_sessions: bool,
    pub event_ids: EventIds,
    /// Maximum number of event log records scanned
    pub event_window: usize,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            console_sessions: false,
            event_ids: EventIds::default(),
            event_window: uptime::DEFAULT_EVENT_WINDOW,
        }
    }
}

/// Registry holding every built-in provider.
pub fn builtin_registry(settings: &ProviderSettings) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    let providers: Vec<Arc<dyn super::provider::FactProvider>> = vec![
        Arc::new(UserProvider::new(settings.console_sessions)),
        Arc::new(UptimeProvider::new(
            settings.event_ids.clone(),
            settings.event_window,
        )),
        Arc::new(InventoryProvider),
        Arc::new(DiskProvider),
        Arc::new(MemoryProvider),
        Arc::new(NetworkProvider),
        Arc::new(MonitorProvider),
    ];
    for provider in providers {
        // Built-in names are unique
        let _ = registry.register(provider);
    }
    registry
}

/// Normalise PowerShell output: a single object becomes a one-element list,
/// null becomes empty.
pub(crate) fn as_array(value: Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Deserialize a payload, naming the capability in the error.
pub(crate) fn from_payload<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| HostFactsError::parse(format!("Unexpected {} payload: {}", what, e)))
}

/// Parse a timestamp as emitted by the transport.
///
/// Accepts RFC 3339 and the legacy `/Date(1714550400000)/` form produced by
/// Windows PowerShell's JSON serializer.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    let millis = raw
        .trim_start_matches('\\')
        .strip_prefix("/Date(")?
        .split(|c| c == ')' || c == '+' || c == '-')
        .next()?
        .parse::<i64>()
        .ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
