use std::sync::Arc;

use serde_json::Value;

use hostfacts::core::fleet::{CancelToken, CollectionRequest, OutputMode, ProviderSettings};
use hostfacts::core::output::{format, Rendering};

use super::support::{aggregator, healthy_fleet, hosts, ScriptedProber};

async fn sample() -> hostfacts::core::fleet::CollectionResult {
    let fleet = aggregator(
        Arc::new(healthy_fleet()),
        Arc::new(ScriptedProber::new().down("ws002")),
        2,
        &ProviderSettings::default(),
    );
    let request = CollectionRequest::new(
        hosts(&["ws001", "ws002"]),
        vec!["user".to_string(), "disk".to_string()],
    );
    fleet.run(&request, &CancelToken::new()).await.unwrap()
}

#[tokio::test]
async fn test_csv_rendering_of_mixed_fleet() {
    let result = sample().await;
    let Rendering::Csv(text) = format(&result, OutputMode::Csv, 4).unwrap() else {
        panic!("csv mode should render text");
    };
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Host,Status,UserName,Disks,Errors");
    assert!(lines[1].starts_with("ws001,Collected,CORP\\alice,\"Drive=C:, Label=OS, FileSystem=NTFS,"));
    assert_eq!(lines[2], "ws002,Unreachable,,,host did not answer the reachability probe");
}

#[tokio::test]
async fn test_json_rendering_respects_depth() {
    let result = sample().await;

    let Rendering::Json(deep) = format(&result, OutputMode::Json, 4).unwrap() else {
        panic!("json mode should render text");
    };
    let parsed: Value = serde_json::from_str(&deep).unwrap();
    assert_eq!(parsed[0]["Host"], "ws001");
    assert_eq!(parsed[0]["Disks"][0]["Drive"], "C:");
    assert_eq!(parsed[1]["Status"], "Unreachable");
    assert!(parsed[1]["Error"].is_string());

    let Rendering::Json(shallow) = format(&result, OutputMode::Json, 1).unwrap() else {
        panic!("json mode should render text");
    };
    let parsed: Value = serde_json::from_str(&shallow).unwrap();
    assert!(parsed[0]["Disks"].as_str().unwrap().starts_with("Drive=C:"));
}

#[tokio::test]
async fn test_json_keeps_field_order() {
    let result = sample().await;
    let text = hostfacts::core::output::to_json(&result.records, 4).unwrap();

    let host = text.find("\"Host\"").unwrap();
    let user = text.find("\"UserName\"").unwrap();
    let disks = text.find("\"Disks\"").unwrap();
    assert!(host < user && user < disks);
}

#[tokio::test]
async fn test_table_rendering_is_structured() {
    let result = sample().await;
    let Rendering::Table(rows) = format(&result, OutputMode::Table, 4).unwrap() else {
        panic!("table mode should render rows");
    };

    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains_key("UserName"));
    assert!(!rows[1].contains_key("UserName"));
}
