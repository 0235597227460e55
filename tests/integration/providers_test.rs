use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;

use hostfacts::core::fleet::providers::{EventIds, BUILTIN};
use hostfacts::core::fleet::{
    CancelToken, Capability, CollectionRequest, FieldMap, FieldValue, HostRecord,
    ProviderSettings,
};

use super::support::{aggregator, healthy_fleet, hosts, ScriptedProber, ScriptedTransport, ANY_HOST};

async fn collect_one(transport: ScriptedTransport, providers: &[&str], settings: &ProviderSettings) -> HostRecord {
    let fleet = aggregator(Arc::new(transport), Arc::new(ScriptedProber::new()), 1, settings);
    let request = CollectionRequest::new(
        hosts(&["ws042"]),
        providers.iter().map(|p| p.to_string()).collect(),
    );
    let mut result = fleet.run(&request, &CancelToken::new()).await.unwrap();
    result.records.remove(0)
}

fn list_maps(value: Option<&FieldValue>) -> Vec<FieldMap> {
    match value {
        Some(FieldValue::List(items)) => items
            .iter()
            .filter_map(|i| match i {
                FieldValue::Map(m) => Some(m.clone()),
                _ => None,
            })
            .collect(),
        other => panic!("expected a list, got {:?}", other),
    }
}

#[tokio::test]
async fn test_full_record_field_order_follows_registration() {
    let record = collect_one(healthy_fleet(), &[], &ProviderSettings::default()).await;

    assert_eq!(record.providers_run, BUILTIN.to_vec());
    let keys: Vec<&str> = record.fields.keys().collect();
    assert_eq!(
        keys,
        vec![
            "UserName",
            "LastBoot",
            "Uptime",
            "LastStartup",
            "LastShutdown",
            "Downtime",
            "ShutdownInitiatedBy",
            "Manufacturer",
            "Model",
            "SerialNumber",
            "Processor",
            "OperatingSystem",
            "OsVersion",
            "TotalMemory",
            "Disks",
            "MemoryTotal",
            "MemoryUsed",
            "MemoryUsedPercent",
            "MemoryFree",
            "MemoryFreePercent",
            "NetworkAdapters",
            "MonitorCount",
            "Monitors",
        ]
    );
}

#[tokio::test]
async fn test_uptime_downtime_and_actor() {
    let record = collect_one(healthy_fleet(), &["uptime"], &ProviderSettings::default()).await;
    let fields = &record.fields;

    // Clock is frozen at 10:30:00, boot at 08:29:30
    assert_eq!(fields.get("Uptime"), Some(&FieldValue::Span(2 * 3600 + 30)));
    assert_eq!(
        fields.get("LastStartup"),
        Some(&FieldValue::Time(Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()))
    );
    assert_eq!(fields.get("Downtime"), Some(&FieldValue::Span(30 * 60)));
    assert_eq!(fields.get("ShutdownInitiatedBy"), Some(&FieldValue::text("CORP\\alice")));
}

#[tokio::test]
async fn test_uptime_startup_only_has_no_downtime() {
    let transport = healthy_fleet().respond(
        ANY_HOST,
        Capability::SystemEvents,
        json!({ "Id": 6005, "TimeCreated": "2024-05-01T08:30:00Z", "UserId": null }),
    );
    let record = collect_one(transport, &["uptime"], &ProviderSettings::default()).await;

    assert!(record.failures.is_empty());
    assert_eq!(record.fields.get("Downtime"), Some(&FieldValue::Null));
    assert_eq!(record.fields.get("LastShutdown"), Some(&FieldValue::Null));
    assert_eq!(record.fields.get("ShutdownInitiatedBy"), Some(&FieldValue::text("Unknown")));
}

#[tokio::test]
async fn test_event_log_failure_keeps_boot_time() {
    let transport = healthy_fleet().fail(ANY_HOST, Capability::SystemEvents, "The RPC server is unavailable.");
    let record = collect_one(transport, &["uptime"], &ProviderSettings::default()).await;

    assert!(record.failures.is_empty());
    assert_eq!(
        record.fields.get("LastBoot"),
        Some(&FieldValue::Time(Utc.with_ymd_and_hms(2024, 5, 1, 8, 29, 30).unwrap()))
    );
    assert_eq!(record.fields.get("Uptime"), Some(&FieldValue::Span(2 * 3600 + 30)));
    assert_eq!(record.fields.get("LastStartup"), Some(&FieldValue::Null));
    assert_eq!(record.fields.get("Downtime"), Some(&FieldValue::Null));
    assert_eq!(record.fields.get("ShutdownInitiatedBy"), Some(&FieldValue::text("Unknown")));
    assert_eq!(record.warnings.len(), 1);
    assert!(record.warnings[0].starts_with("uptime: event log unavailable"));
}

#[tokio::test]
async fn test_untranslatable_sid_is_unknown() {
    let transport = healthy_fleet().fail(
        ANY_HOST,
        Capability::TranslateSid,
        "Some or all identity references could not be translated.",
    );
    let record = collect_one(transport, &["uptime"], &ProviderSettings::default()).await;

    assert!(record.failures.is_empty());
    assert_eq!(record.fields.get("ShutdownInitiatedBy"), Some(&FieldValue::text("Unknown")));
}

#[tokio::test]
async fn test_custom_event_ids() {
    let transport = healthy_fleet().respond(
        ANY_HOST,
        Capability::SystemEvents,
        json!([
            { "Id": 12, "TimeCreated": "2024-05-01T08:30:00Z" },
            { "Id": 13, "TimeCreated": "2024-05-01T08:10:00Z" }
        ]),
    );
    let settings = ProviderSettings {
        event_ids: EventIds {
            startup: vec![12],
            shutdown: vec![13],
            user_shutdown: vec![1074],
        },
        ..ProviderSettings::default()
    };
    let record = collect_one(transport, &["uptime"], &settings).await;
    assert_eq!(record.fields.get("Downtime"), Some(&FieldValue::Span(20 * 60)));
}

#[tokio::test]
async fn test_malformed_payload_is_a_provider_failure() {
    let transport = healthy_fleet().respond(ANY_HOST, Capability::MemoryStatus, json!("access denied"));
    let record = collect_one(transport, &["memory", "network"], &ProviderSettings::default()).await;

    assert_eq!(record.failures.len(), 1);
    assert_eq!(record.failures[0].provider, "memory");
    assert!(record.fields.contains_key("NetworkAdapters"));
}

#[tokio::test]
async fn test_monitor_labels_and_defaults() {
    let record = collect_one(healthy_fleet(), &["monitors"], &ProviderSettings::default()).await;

    assert_eq!(record.fields.get("MonitorCount"), Some(&FieldValue::Int(2)));
    let monitors = list_maps(record.fields.get("Monitors"));

    assert_eq!(monitors[0].get("Model"), Some(&FieldValue::text("DELL U2720Q")));
    assert_eq!(monitors[0].get("Connection"), Some(&FieldValue::text("HDMI")));
    assert_eq!(monitors[1].get("Manufacturer"), Some(&FieldValue::text("GSM")));
    assert_eq!(monitors[1].get("Model"), Some(&FieldValue::text("Unknown Model")));
    assert_eq!(monitors[1].get("SerialNumber"), Some(&FieldValue::text("N/A")));
    assert_eq!(monitors[1].get("Connection"), Some(&FieldValue::text("Unknown")));
}

#[tokio::test]
async fn test_malformed_connection_code_is_unknown() {
    let transport = healthy_fleet().respond(
        ANY_HOST,
        Capability::Monitors,
        json!({
            "ManufacturerName": super::support::codes("DEL"),
            "UserFriendlyName": super::support::codes("DELL U2720Q"),
            "SerialNumberID": [67, "N", 48],
            "VideoOutputTechnology": "HDMI?"
        }),
    );
    let record = collect_one(transport, &["monitors"], &ProviderSettings::default()).await;

    assert!(record.failures.is_empty());
    assert_eq!(record.fields.get("MonitorCount"), Some(&FieldValue::Int(1)));
    let monitors = list_maps(record.fields.get("Monitors"));
    assert_eq!(monitors[0].get("Connection"), Some(&FieldValue::text("Unknown")));
    assert_eq!(monitors[0].get("SerialNumber"), Some(&FieldValue::text("C0")));
}

#[tokio::test]
async fn test_disk_memory_network_values() {
    let record = collect_one(
        healthy_fleet(),
        &["disk", "memory", "network"],
        &ProviderSettings::default(),
    )
    .await;

    let disks = list_maps(record.fields.get("Disks"));
    assert_eq!(disks.len(), 1);
    assert_eq!(disks[0].get("Drive"), Some(&FieldValue::text("C:")));
    assert_eq!(disks[0].get("FreePercent"), Some(&FieldValue::Float(25.0)));

    assert_eq!(record.fields.get("MemoryUsedPercent"), Some(&FieldValue::Float(75.0)));
    assert_eq!(
        record.fields.get("MemoryFree"),
        Some(&FieldValue::Bytes(4_194_304 * 1024))
    );

    let adapters = list_maps(record.fields.get("NetworkAdapters"));
    assert_eq!(adapters[0].get("IPv4"), Some(&FieldValue::text("10.20.30.40")));
    assert_eq!(adapters[0].get("DnsServers"), Some(&FieldValue::text("10.20.0.10, 10.20.0.11")));
    assert_eq!(adapters[0].get("Dhcp"), Some(&FieldValue::Bool(true)));
}

#[tokio::test]
async fn test_console_sessions_toggle() {
    let without = collect_one(healthy_fleet(), &["user"], &ProviderSettings::default()).await;
    assert!(!without.fields.contains_key("ConsoleUsers"));

    let settings = ProviderSettings {
        console_sessions: true,
        ..ProviderSettings::default()
    };
    let transport = healthy_fleet().fail(ANY_HOST, Capability::ConsoleSessions, "quser is not recognized");
    let record = collect_one(transport, &["user"], &settings).await;

    assert!(record.failures.is_empty());
    assert_eq!(record.fields.get("UserName"), Some(&FieldValue::text("CORP\\alice")));
    assert_eq!(record.fields.get("ConsoleUsers"), Some(&FieldValue::Null));
    assert_eq!(record.warnings.len(), 1);
    assert!(record.warnings[0].starts_with("user: console sessions unavailable"));
}
