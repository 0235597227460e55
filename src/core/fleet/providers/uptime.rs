//! Uptime and shutdown history from the boot timestamp and the System event log.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{as_array, from_payload, parse_timestamp};
use crate::core::fleet::provider::{Collected, FactProvider, ProviderContext};
use crate::core::fleet::transport::Capability;
use crate::core::fleet::types::{FieldMap, FieldValue, HostTarget};
use crate::error::{HostFactsError, Result};

pub const DEFAULT_EVENT_WINDOW: usize = 20;
const UNKNOWN_ACTOR: &str = "Unknown";

/// Event IDs that mark each kind of event. Their meaning varies between
/// Windows releases, so they are configuration rather than constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventIds {
    pub startup: Vec<u32>,
    pub shutdown: Vec<u32>,
    pub user_shutdown: Vec<u32>,
}

impl Default for EventIds {
    fn default() -> Self {
        Self {
            startup: vec![6005],
            shutdown: vec![6006],
            user_shutdown: vec![1074],
        }
    }
}

impl EventIds {
    /// Every configured id, deduplicated, in kind order.
    pub fn all(&self) -> Vec<u32> {
        let mut ids = Vec::new();
        for id in self
            .startup
            .iter()
            .chain(&self.shutdown)
            .chain(&self.user_shutdown)
        {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }
}

/// One System log record, newest first in the sequences we handle.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemEvent {
    pub id: u32,
    pub time: Option<DateTime<Utc>>,
    pub user_sid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEvent {
    id: u32,
    time_created: Option<String>,
    user_id: Option<String>,
}

impl From<RawEvent> for SystemEvent {
    fn from(raw: RawEvent) -> Self {
        Self {
            id: raw.id,
            time: raw.time_created.as_deref().and_then(parse_timestamp),
            user_sid: raw.user_id.filter(|s| !s.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BootTime {
    last_boot_up_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TranslatedSid {
    account: Option<String>,
}

/// What the event scan found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventCorrelation {
    pub last_startup: Option<DateTime<Utc>>,
    pub last_shutdown: Option<DateTime<Utc>>,
    /// startup − shutdown, only when both timestamps are known
    pub downtime: Option<Duration>,
    /// SID on the most recent user-initiated shutdown
    pub shutdown_sid: Option<String>,
}

/// Pick the most recent event of each kind from a newest-first log.
///
/// Only the first `window` records are examined and the first match per kind
/// wins, even if that record lacks a timestamp.
pub fn correlate_events(events: &[SystemEvent], ids: &EventIds, window: usize) -> EventCorrelation {
    let mut startup: Option<&SystemEvent> = None;
    let mut shutdown: Option<&SystemEvent> = None;
    let mut user_shutdown: Option<&SystemEvent> = None;

    for event in events.iter().take(window) {
        if startup.is_none() && ids.startup.contains(&event.id) {
            startup = Some(event);
        }
        if shutdown.is_none() && ids.shutdown.contains(&event.id) {
            shutdown = Some(event);
        }
        if user_shutdown.is_none() && ids.user_shutdown.contains(&event.id) {
            user_shutdown = Some(event);
        }
        if startup.is_some() && shutdown.is_some() && user_shutdown.is_some() {
            break;
        }
    }

    let last_startup = startup.and_then(|e| e.time);
    let last_shutdown = shutdown.and_then(|e| e.time);
    let downtime = match (last_startup, last_shutdown) {
        (Some(up), Some(down)) => Some(up - down),
        _ => None,
    };

    EventCorrelation {
        last_startup,
        last_shutdown,
        downtime,
        shutdown_sid: user_shutdown.and_then(|e| e.user_sid.clone()),
    }
}

/// Uptime, last startup/shutdown, downtime, and who shut the host down.
#[derive(Debug, Clone)]
pub struct UptimeProvider {
    ids: EventIds,
    window: usize,
}

impl UptimeProvider {
    pub fn new(ids: EventIds, window: usize) -> Self {
        Self {
            ids,
            window: window.max(1),
        }
    }

    fn boot_time(&self, host: &HostTarget, ctx: &ProviderContext<'_>) -> Result<DateTime<Utc>> {
        let raw = ctx
            .transport
            .query_host(host, Capability::BootTime, &Value::Null)?;
        let boot: BootTime = from_payload(raw, "boot time")?;
        boot.last_boot_up_time
            .as_deref()
            .and_then(parse_timestamp)
            .ok_or_else(|| HostFactsError::parse("boot time missing or unreadable"))
    }

    fn events(&self, host: &HostTarget, ctx: &ProviderContext<'_>) -> Result<Vec<SystemEvent>> {
        let params = json!({ "ids": self.ids.all(), "max": self.window });
        let raw = ctx
            .transport
            .query_host(host, Capability::SystemEvents, &params)?;

        as_array(raw)
            .into_iter()
            .map(|item| from_payload::<RawEvent>(item, "system event").map(SystemEvent::from))
            .collect()
    }

    /// Resolve a SID to an account name, falling back to "Unknown".
    fn resolve_actor(&self, host: &HostTarget, sid: Option<&str>, ctx: &ProviderContext<'_>) -> String {
        let Some(sid) = sid else {
            return UNKNOWN_ACTOR.to_string();
        };

        let translated = ctx
            .transport
            .query_host(host, Capability::TranslateSid, &json!({ "sid": sid }))
            .and_then(|raw| from_payload::<TranslatedSid>(raw, "translated SID"));

        match translated {
            Ok(TranslatedSid {
                account: Some(account),
            }) if !account.trim().is_empty() => account,
            Ok(_) => UNKNOWN_ACTOR.to_string(),
            Err(e) => {
                debug!("Could not translate {} on {}: {}", sid, host, e);
                UNKNOWN_ACTOR.to_string()
            }
        }
    }
}

impl FactProvider for UptimeProvider {
    fn name(&self) -> &str {
        super::UPTIME
    }

    fn description(&self) -> &str {
        "Uptime, last startup/shutdown, downtime and shutdown initiator"
    }

    fn collect(&self, host: &HostTarget, ctx: &ProviderContext<'_>) -> Result<Collected> {
        let boot = self.boot_time(host, ctx)?;
        let uptime = ctx.clock.now() - boot;

        let mut note = None;
        let correlation = match self.events(host, ctx) {
            Ok(events) => correlate_events(&events, &self.ids, self.window),
            Err(e) => {
                debug!("Event log query failed on {}: {}", host, e);
                note = Some(format!("event log unavailable: {}", e));
                EventCorrelation::default()
            }
        };
        let actor = self.resolve_actor(host, correlation.shutdown_sid.as_deref(), ctx);

        let fields = FieldMap::new()
            .with("LastBoot", boot)
            .with("Uptime", FieldValue::Span(uptime.num_seconds()))
            .with("LastStartup", correlation.last_startup.map_or(FieldValue::Null, FieldValue::Time))
            .with("LastShutdown", correlation.last_shutdown.map_or(FieldValue::Null, FieldValue::Time))
            .with(
                "Downtime",
                correlation
                    .downtime
                    .map_or(FieldValue::Null, |d| FieldValue::Span(d.num_seconds())),
            )
            .with("ShutdownInitiatedBy", actor);

        let collected = Collected::from(fields);
        Ok(match note {
            Some(note) => collected.with_note(note),
            None => collected,
        })
    }
}
