//! Fakes shared by the integration tests: canned transport, scripted prober,
//! frozen clock.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use hostfacts::core::fleet::{
    builtin_registry, CancelToken, Capability, FixedClock, FleetAggregator, HostCollector,
    HostTarget, ProviderSettings, ReachabilityProbe, RemoteTransport,
};
use hostfacts::error::{HostFactsError, Result};

pub const ANY_HOST: &str = "*";

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap()
}

/// Transport answering from a table of (host, capability) → JSON or error.
/// Entries for [`ANY_HOST`] apply to every host without a specific entry.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: HashMap<(String, Capability), std::result::Result<Value, String>>,
    calls: Mutex<Vec<(String, Capability)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, host: &str, capability: Capability, value: Value) -> Self {
        self.responses
            .insert((host.to_string(), capability), Ok(value));
        self
    }

    pub fn fail(mut self, host: &str, capability: Capability, reason: &str) -> Self {
        self.responses
            .insert((host.to_string(), capability), Err(reason.to_string()));
        self
    }

    pub fn calls_for(&self, host: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(h, _)| h == host)
            .count()
    }

    pub fn calls_to(&self, capability: Capability) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| *c == capability)
            .count()
    }
}

impl RemoteTransport for ScriptedTransport {
    fn query_host(&self, host: &HostTarget, capability: Capability, _: &Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((host.name().to_string(), capability));

        let entry = self
            .responses
            .get(&(host.name().to_string(), capability))
            .or_else(|| self.responses.get(&(ANY_HOST.to_string(), capability)));

        match entry {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(reason)) => Err(HostFactsError::transport(reason.clone())),
            None => Err(HostFactsError::transport(format!(
                "no canned response for {} on {}",
                capability, host
            ))),
        }
    }
}

/// Prober with a fixed set of dead hosts, optional per-host delays and an
/// optional cancellation trigger.
#[derive(Default)]
pub struct ScriptedProber {
    down: HashSet<String>,
    delays: HashMap<String, Duration>,
    cancel_on: Option<(String, CancelToken)>,
    probes: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn down(mut self, host: &str) -> Self {
        self.down.insert(host.to_string());
        self
    }

    pub fn delay(mut self, host: &str, millis: u64) -> Self {
        self.delays
            .insert(host.to_string(), Duration::from_millis(millis));
        self
    }

    pub fn cancel_when_probing(mut self, host: &str, token: CancelToken) -> Self {
        self.cancel_on = Some((host.to_string(), token));
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl ReachabilityProbe for ScriptedProber {
    fn probe(&self, host: &HostTarget) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(host.name()) {
            thread::sleep(*delay);
        }
        if let Some((trigger, token)) = &self.cancel_on {
            if trigger == host.name() {
                token.cancel();
            }
        }
        !self.down.contains(host.name())
    }
}

/// Canned answers for a healthy workstation, for every capability.
pub fn healthy_fleet() -> ScriptedTransport {
    ScriptedTransport::new()
        .respond(ANY_HOST, Capability::LoggedOnUser, json!({ "UserName": "CORP\\alice" }))
        .respond(
            ANY_HOST,
            Capability::ConsoleSessions,
            json!([{ "UserName": "alice" }]),
        )
        .respond(
            ANY_HOST,
            Capability::BootTime,
            json!({ "LastBootUpTime": "2024-05-01T08:29:30Z" }),
        )
        .respond(
            ANY_HOST,
            Capability::SystemEvents,
            json!([
                { "Id": 6005, "TimeCreated": "2024-05-01T08:30:00Z", "UserId": null },
                { "Id": 6006, "TimeCreated": "2024-05-01T08:00:00Z", "UserId": null },
                { "Id": 1074, "TimeCreated": "2024-05-01T07:59:40Z", "UserId": "S-1-5-21-1004336348-1177238915-682003330-1001" }
            ]),
        )
        .respond(
            ANY_HOST,
            Capability::TranslateSid,
            json!({ "Account": "CORP\\alice" }),
        )
        .respond(
            ANY_HOST,
            Capability::SystemSummary,
            json!({
                "Manufacturer": "Dell Inc.",
                "Model": "OptiPlex 7090",
                "SerialNumber": "7XK2N93",
                "Processor": "Intel(R) Core(TM) i7-10700 CPU @ 2.90GHz",
                "OsCaption": "Microsoft Windows 11 Enterprise",
                "OsVersion": "10.0.22631",
                "TotalPhysicalMemory": 17_179_869_184u64
            }),
        )
        .respond(
            ANY_HOST,
            Capability::LogicalDisks,
            json!([
                { "DeviceID": "C:", "DriveType": 3, "VolumeName": "OS", "FileSystem": "NTFS", "Size": 511_000_000_000u64, "FreeSpace": 127_750_000_000u64 },
                { "DeviceID": "E:", "DriveType": 2, "VolumeName": "USB", "FileSystem": "FAT32", "Size": 16_000_000_000u64, "FreeSpace": 1_000u64 }
            ]),
        )
        .respond(
            ANY_HOST,
            Capability::MemoryStatus,
            json!({ "TotalVisibleMemorySize": 16_777_216u64, "FreePhysicalMemory": 4_194_304u64 }),
        )
        .respond(
            ANY_HOST,
            Capability::NetworkAdapters,
            json!({
                "Description": "Intel(R) Ethernet Connection (14) I219-LM",
                "MACAddress": "00:1A:2B:3C:4D:5E",
                "IPAddress": ["10.20.30.40", "fe80::1c2d:3e4f:5a6b:7c8d"],
                "DefaultIPGateway": ["10.20.30.1"],
                "DNSServerSearchOrder": ["10.20.0.10", "10.20.0.11"],
                "DHCPEnabled": true
            }),
        )
        .respond(
            ANY_HOST,
            Capability::Monitors,
            json!([
                {
                    "InstanceName": "DISPLAY\\DELA1A4\\5&1a2b3c4d&0&UID4352_0",
                    "ManufacturerName": codes("DEL"),
                    "UserFriendlyName": codes("DELL U2720Q"),
                    "SerialNumberID": codes("CN0ABC123"),
                    "VideoOutputTechnology": 5
                },
                {
                    "InstanceName": "DISPLAY\\GSM5B7F\\5&1a2b3c4d&0&UID4353_0",
                    "ManufacturerName": codes("GSM"),
                    "UserFriendlyName": [0, 0, 0],
                    "SerialNumberID": [0],
                    "VideoOutputTechnology": 999
                }
            ]),
        )
}

/// Encode text as a zero-padded WMI character array.
pub fn codes(text: &str) -> Vec<i64> {
    let mut out: Vec<i64> = text.chars().map(|c| c as i64).collect();
    out.extend([0, 0, 0]);
    out
}

pub fn aggregator(
    transport: Arc<ScriptedTransport>,
    prober: Arc<ScriptedProber>,
    workers: usize,
    settings: &ProviderSettings,
) -> FleetAggregator {
    let collector = HostCollector::new(prober, transport, Arc::new(FixedClock(now())));
    FleetAggregator::new(builtin_registry(settings), collector, workers)
}

pub fn hosts(names: &[&str]) -> Vec<HostTarget> {
    names
        .iter()
        .map(|n| HostTarget::parse(n).unwrap())
        .collect()
}
