//! Rendering of collection results. Pure transforms; nothing here touches disk.

use serde_json::{json, Map, Value};

use crate::core::fleet::{CollectionResult, FieldMap, FieldValue, HostRecord, OutputMode};
use crate::error::Result;

pub const DEFAULT_JSON_DEPTH: usize = 4;

/// A formatted collection result.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendering {
    /// One ordered row per host: `Host`, `Status`, provider fields, `Errors`
    Table(Vec<FieldMap>),
    Csv(String),
    Json(String),
}

impl Rendering {
    /// Text form, for the modes that have one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Rendering::Table(_) => None,
            Rendering::Csv(text) | Rendering::Json(text) => Some(text),
        }
    }
}

pub fn format(result: &CollectionResult, mode: OutputMode, json_depth: usize) -> Result<Rendering> {
    Ok(match mode {
        OutputMode::Table => Rendering::Table(table_rows(&result.records)),
        OutputMode::Csv => Rendering::Csv(to_csv(&result.records)),
        OutputMode::Json => Rendering::Json(to_json(&result.records, json_depth)?),
    })
}

pub fn table_rows(records: &[HostRecord]) -> Vec<FieldMap> {
    records
        .iter()
        .map(|record| {
            let mut row = FieldMap::new()
                .with("Host", record.host.as_str())
                .with("Status", record.status.to_string());
            for (key, value) in record.fields.iter() {
                row.insert(key, value.clone());
            }
            row.with("Errors", error_cell(record))
        })
        .collect()
}

fn error_cell(record: &HostRecord) -> FieldValue {
    let summary = record.error_summary();
    if summary.is_empty() {
        FieldValue::Null
    } else {
        FieldValue::Text(summary)
    }
}

/// Field names across all records, in first-seen order.
pub fn field_columns(records: &[HostRecord]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.fields.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.to_string());
            }
        }
    }
    columns
}

pub fn to_csv(records: &[HostRecord]) -> String {
    let columns = field_columns(records);

    let mut header = vec!["Host".to_string(), "Status".to_string()];
    header.extend(columns.iter().cloned());
    header.push("Errors".to_string());

    let mut out = csv_line(header.iter().map(String::as_str));
    for record in records {
        let mut cells = vec![record.host.clone(), record.status.to_string()];
        cells.extend(
            columns
                .iter()
                .map(|c| record.fields.get(c).map(|v| v.to_string()).unwrap_or_default()),
        );
        cells.push(record.error_summary());
        out.push_str(&csv_line(cells.iter().map(String::as_str)));
    }
    out
}

pub(crate) fn csv_line<'a>(cells: impl Iterator<Item = &'a str>) -> String {
    let mut line = cells.map(escape_csv).collect::<Vec<_>>().join(",");
    line.push_str("\r\n");
    line
}

/// Quote a cell when it contains a delimiter, quote or line break.
pub(crate) fn escape_csv(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// JSON value for one record. Field values nested deeper than `depth` levels
/// are replaced by their display string.
pub fn record_json(record: &HostRecord, depth: usize) -> Value {
    let mut object = Map::new();
    object.insert("Host".to_string(), Value::String(record.host.clone()));
    object.insert("Status".to_string(), Value::String(record.status.to_string()));
    object.insert(
        "Error".to_string(),
        record.error.clone().map_or(Value::Null, Value::String),
    );

    let field_depth = depth.saturating_sub(1);
    for (key, value) in record.fields.iter() {
        object.insert(key.to_string(), value.to_json(field_depth));
    }

    let failures: Vec<Value> = record
        .failures
        .iter()
        .map(|f| json!({ "Provider": f.provider, "Detail": f.detail }))
        .collect();
    object.insert("Failures".to_string(), Value::Array(failures));
    object.insert("Warnings".to_string(), json!(record.warnings));
    object.insert(
        "CollectedAt".to_string(),
        Value::String(record.collected_at.to_rfc3339()),
    );
    Value::Object(object)
}

pub fn to_json(records: &[HostRecord], depth: usize) -> Result<String> {
    let depth = depth.max(1);
    let array: Vec<Value> = records.iter().map(|r| record_json(r, depth)).collect();
    Ok(serde_json::to_string_pretty(&Value::Array(array))?)
}
