use std::sync::Arc;

use hostfacts::core::fleet::{
    CancelToken, Capability, CollectionRequest, FieldMap, FieldValue, HostRecord, HostStatus,
    ProviderSettings,
};

use serde_json::json;

use super::support::{aggregator, healthy_fleet, hosts, ScriptedProber, ANY_HOST};

/// Record with every time-dependent value removed.
fn without_timestamps(record: &HostRecord) -> (String, HostStatus, FieldMap, Vec<String>) {
    let fields: FieldMap = record
        .fields
        .iter()
        .filter(|(_, v)| !v.is_temporal())
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    let failures = record.failures.iter().map(|f| f.to_string()).collect();
    (record.host.clone(), record.status, fields, failures)
}

#[tokio::test]
async fn test_results_follow_input_order_not_completion_order() {
    let transport = Arc::new(healthy_fleet());
    // Earlier hosts are slower, so they finish last
    let prober = Arc::new(
        ScriptedProber::new()
            .delay("ws001", 150)
            .delay("ws002", 100)
            .delay("ws003", 50),
    );
    let fleet = aggregator(transport, prober, 4, &ProviderSettings::default());

    let request = CollectionRequest::new(hosts(&["ws001", "ws002", "ws003", "ws004"]), vec![]);
    let result = fleet.run(&request, &CancelToken::new()).await.unwrap();

    let names: Vec<&str> = result.iter().map(|r| r.host.as_str()).collect();
    assert_eq!(names, vec!["ws001", "ws002", "ws003", "ws004"]);
    assert!(result.iter().all(|r| r.is_collected()));
    assert!(!result.cancelled);
}

#[tokio::test]
async fn test_unreachable_host_is_never_queried() {
    let transport = Arc::new(healthy_fleet());
    let prober = Arc::new(ScriptedProber::new().down("ws002"));
    let fleet = aggregator(transport.clone(), prober, 2, &ProviderSettings::default());

    let request = CollectionRequest::new(hosts(&["ws001", "ws002", "ws003"]), vec![]);
    let result = fleet.run(&request, &CancelToken::new()).await.unwrap();

    let dead = &result.records[1];
    assert_eq!(dead.status, HostStatus::Unreachable);
    assert!(dead.fields.is_empty());
    assert!(dead.providers_run.is_empty());
    assert!(!dead.error.as_deref().unwrap_or("").is_empty());
    assert_eq!(transport.calls_for("ws002"), 0);
    assert!(transport.calls_for("ws001") > 0);
}

#[tokio::test]
async fn test_failing_provider_does_not_block_others() {
    let transport = Arc::new(healthy_fleet().fail(
        "ws001",
        Capability::Monitors,
        "Invalid namespace \"root\\wmi\"",
    ));
    let prober = Arc::new(ScriptedProber::new());
    let fleet = aggregator(transport, prober, 1, &ProviderSettings::default());

    let request = CollectionRequest::new(hosts(&["ws001"]), vec![]);
    let result = fleet.run(&request, &CancelToken::new()).await.unwrap();
    let record = &result.records[0];

    assert_eq!(record.status, HostStatus::Collected);
    assert_eq!(record.failures.len(), 1);
    assert_eq!(record.failures[0].provider, "monitors");
    assert_eq!(record.failures[0].host, "ws001");
    assert!(!record.fields.contains_key("Monitors"));
    assert_eq!(record.fields.get("UserName"), Some(&FieldValue::text("CORP\\alice")));
    assert!(record.fields.contains_key("Disks"));
}

#[tokio::test]
async fn test_oversized_memory_counter_fails_only_memory_provider() {
    let transport = Arc::new(healthy_fleet().respond(
        ANY_HOST,
        Capability::MemoryStatus,
        json!({ "TotalVisibleMemorySize": 18_446_744_073_709_551u64, "FreePhysicalMemory": 1 }),
    ));
    let prober = Arc::new(ScriptedProber::new());
    let fleet = aggregator(transport, prober, 1, &ProviderSettings::default());

    let request = CollectionRequest::new(hosts(&["ws001"]), vec![]);
    let result = fleet.run(&request, &CancelToken::new()).await.unwrap();
    let record = &result.records[0];

    assert_eq!(record.status, HostStatus::Collected);
    assert!(record.error.is_none());
    assert_eq!(record.failures.len(), 1);
    assert_eq!(record.failures[0].provider, "memory");
    assert!(!record.fields.contains_key("MemoryTotal"));
    assert_eq!(record.fields.get("UserName"), Some(&FieldValue::text("CORP\\alice")));
    assert!(record.fields.contains_key("Disks"));
    assert!(record.fields.contains_key("NetworkAdapters"));
    assert_eq!(record.fields.get("MonitorCount"), Some(&FieldValue::Int(2)));
}

#[tokio::test]
async fn test_every_provider_failing_still_yields_record() {
    let transport = Arc::new(super::support::ScriptedTransport::new());
    let prober = Arc::new(ScriptedProber::new());
    let fleet = aggregator(transport, prober, 1, &ProviderSettings::default());

    let request = CollectionRequest::new(hosts(&["ws001"]), vec![]);
    let result = fleet.run(&request, &CancelToken::new()).await.unwrap();
    let record = &result.records[0];

    assert_eq!(record.status, HostStatus::Collected);
    assert!(record.fields.is_empty());
    assert_eq!(record.failures.len(), 7);
    assert_eq!(result.provider_failure_count(), 7);
}

#[tokio::test]
async fn test_subset_runs_in_registration_order() {
    let transport = Arc::new(healthy_fleet());
    let prober = Arc::new(ScriptedProber::new());
    let fleet = aggregator(transport.clone(), prober, 1, &ProviderSettings::default());

    let request = CollectionRequest::new(
        hosts(&["ws001"]),
        vec!["monitors".to_string(), "user".to_string()],
    );
    let result = fleet.run(&request, &CancelToken::new()).await.unwrap();
    let record = &result.records[0];

    assert_eq!(record.providers_run, vec!["user", "monitors"]);
    let keys: Vec<&str> = record.fields.keys().collect();
    assert_eq!(keys, vec!["UserName", "MonitorCount", "Monitors"]);
    assert_eq!(transport.calls_to(Capability::SystemSummary), 0);
}

#[tokio::test]
async fn test_duplicate_hosts_each_get_an_outcome() {
    let transport = Arc::new(healthy_fleet());
    let prober = Arc::new(ScriptedProber::new());
    let fleet = aggregator(transport, prober.clone(), 3, &ProviderSettings::default());

    let request = CollectionRequest::new(hosts(&["ws001", "ws001", "ws002"]), vec!["user".to_string()]);
    let result = fleet.run(&request, &CancelToken::new()).await.unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(prober.probe_count(), 3);
}

#[tokio::test]
async fn test_cancellation_skips_undispatched_hosts() {
    let token = CancelToken::new();
    let transport = Arc::new(healthy_fleet());
    let prober = Arc::new(ScriptedProber::new().cancel_when_probing("ws002", token.clone()));
    let fleet = aggregator(transport.clone(), prober, 1, &ProviderSettings::default());

    let request = CollectionRequest::new(hosts(&["ws001", "ws002", "ws003", "ws004"]), vec![]);
    let result = fleet.run(&request, &token).await.unwrap();

    assert!(result.cancelled);
    assert_eq!(result.len(), 4);

    assert!(result.records[0].is_collected());
    assert!(result.records[0].warnings.is_empty());

    // In flight when cancelled: finishes, but runs no further providers
    let in_flight = &result.records[1];
    assert_eq!(in_flight.status, HostStatus::Collected);
    assert!(in_flight.providers_run.is_empty());
    assert!(in_flight.warnings[0].contains("cancelled"));
    assert_eq!(transport.calls_for("ws002"), 0);

    for record in &result.records[2..] {
        assert_eq!(record.status, HostStatus::Skipped);
        assert!(record.error.is_some());
    }
    assert_eq!(transport.calls_for("ws003"), 0);
}

#[tokio::test]
async fn test_repeated_runs_are_identical_apart_from_timestamps() {
    let names = ["ws001", "ws002", "ws003"];
    let transport = Arc::new(healthy_fleet().fail("ws003", Capability::MemoryStatus, "RPC server is unavailable"));
    let prober = Arc::new(ScriptedProber::new().down("ws002"));
    let settings = ProviderSettings {
        console_sessions: true,
        ..ProviderSettings::default()
    };

    let first = aggregator(transport.clone(), prober.clone(), 3, &settings)
        .run(&CollectionRequest::new(hosts(&names), vec![]), &CancelToken::new())
        .await
        .unwrap();
    let second = aggregator(transport, prober, 1, &settings)
        .run(&CollectionRequest::new(hosts(&names), vec![]), &CancelToken::new())
        .await
        .unwrap();

    let a: Vec<_> = first.iter().map(without_timestamps).collect();
    let b: Vec<_> = second.iter().map(without_timestamps).collect();
    assert_eq!(a, b);
}
