use chrono::{DateTime, Utc};
use humansize::{format_size, BINARY};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{HostFactsError, Result};

/// Host names that resolve to the machine running the collection.
const LOCAL_ALIASES: &[&str] = &["localhost", ".", "127.0.0.1", "::1"];

/// A host to collect facts from (name or address).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostTarget(String);

impl HostTarget {
    /// Parse a host identifier, trimming surrounding whitespace.
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(HostFactsError::invalid_host("host name is empty"));
        }
        if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(HostFactsError::invalid_host(format!(
                "'{}' contains whitespace",
                name
            )));
        }
        if name.contains(['\'', '"', ';', '`', '$', '{', '}']) {
            return Err(HostFactsError::invalid_host(format!(
                "'{}' contains characters not allowed in a host name",
                name
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Whether the target refers to the local machine.
    pub fn is_local(&self) -> bool {
        LOCAL_ALIASES
            .iter()
            .any(|alias| alias.eq_ignore_ascii_case(&self.0))
    }
}

impl fmt::Display for HostTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HostTarget {
    type Err = HostFactsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A single value stored in a host record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Size in bytes
    Bytes(u64),
    /// Time span in whole seconds
    Span(i64),
    Time(DateTime<Utc>),
    List(Vec<FieldValue>),
    Map(FieldMap),
}

impl FieldValue {
    pub fn text<S: Into<String>>(value: S) -> Self {
        FieldValue::Text(value.into())
    }

    /// Text value, or `Null` when the input is absent.
    pub fn opt_text<S: Into<String>>(value: Option<S>) -> Self {
        value.map_or(FieldValue::Null, |v| FieldValue::Text(v.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Whether the value carries a point in time (excluded from idempotence checks).
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldValue::Time(_) | FieldValue::Span(_))
    }

    /// Convert to JSON, rendering anything nested deeper than `depth` as its display string.
    pub fn to_json(&self, depth: usize) -> serde_json::Value {
        use serde_json::Value;

        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Text(s) => Value::String(s.clone()),
            FieldValue::Int(i) => Value::from(*i),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Bytes(b) => Value::from(*b),
            FieldValue::Span(_) => Value::String(self.to_string()),
            FieldValue::Time(t) => Value::String(t.to_rfc3339()),
            FieldValue::List(_) | FieldValue::Map(_) if depth == 0 => {
                Value::String(self.to_string())
            }
            FieldValue::List(items) => {
                Value::Array(items.iter().map(|v| v.to_json(depth - 1)).collect())
            }
            FieldValue::Map(map) => map.to_json(depth - 1),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Bytes(b) => f.write_str(&format_size(*b, BINARY)),
            FieldValue::Span(secs) => f.write_str(&format_span(*secs)),
            FieldValue::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
            FieldValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                f.write_str(&parts.join("; "))
            }
            FieldValue::Map(map) => {
                let parts: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json(usize::MAX).serialize(serializer)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Time(value)
    }
}

impl From<FieldMap> for FieldValue {
    fn from(value: FieldMap) -> Self {
        FieldValue::Map(value)
    }
}

/// Format a span of seconds as `1d 02h 03m 04s`.
pub fn format_span(total_secs: i64) -> String {
    let sign = if total_secs < 0 { "-" } else { "" };
    let secs = total_secs.unsigned_abs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    if days > 0 {
        format!(
            "{}{}d {:02}h {:02}m {:02}s",
            sign, days, hours, minutes, seconds
        )
    } else {
        format!("{}{:02}h {:02}m {:02}s", sign, hours, minutes, seconds)
    }
}

/// Insertion-ordered field map. Order drives column order in tabular output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    entries: Vec<(String, FieldValue)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. An existing key keeps its position and takes the new value.
    pub fn insert<K: Into<String>, V: Into<FieldValue>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style insert.
    pub fn with<K: Into<String>, V: Into<FieldValue>>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge another map into this one, keeping the other map's order for new keys.
    pub fn merge(&mut self, other: FieldMap) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    pub fn to_json(&self, depth: usize) -> serde_json::Value {
        let object: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json(depth)))
            .collect();
        serde_json::Value::Object(object)
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for FieldMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = FieldMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Failure of one provider on one host.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub host: String,
    pub detail: String,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.detail)
    }
}

/// Outcome of running one provider against one host.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResult {
    Success {
        provider: String,
        fields: FieldMap,
        /// Non-fatal problems (e.g. an optional secondary query failed)
        notes: Vec<String>,
    },
    Failure(ProviderFailure),
}

impl ProviderResult {
    pub fn provider(&self) -> &str {
        match self {
            ProviderResult::Success { provider, .. } => provider,
            ProviderResult::Failure(failure) => &failure.provider,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ProviderResult::Success { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum HostStatus {
    /// Host answered the probe and providers were run
    Collected,
    /// Host did not answer the probe, or its collector crashed
    Unreachable,
    /// Host was never dispatched because the run was cancelled
    Skipped,
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostStatus::Collected => write!(f, "Collected"),
            HostStatus::Unreachable => write!(f, "Unreachable"),
            HostStatus::Skipped => write!(f, "Skipped"),
        }
    }
}

/// Merged result of all enabled providers for one host.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct HostRecord {
    pub host: String,
    pub status: HostStatus,
    /// Host-level failure reason when the host was not collected
    pub error: Option<String>,
    pub fields: FieldMap,
    pub providers_run: Vec<String>,
    pub failures: Vec<ProviderFailure>,
    pub warnings: Vec<String>,
    pub collected_at: DateTime<Utc>,
}

impl HostRecord {
    pub fn unreachable<S: Into<String>>(host: &HostTarget, reason: S, at: DateTime<Utc>) -> Self {
        Self::without_fields(host, HostStatus::Unreachable, reason.into(), at)
    }

    pub fn skipped<S: Into<String>>(host: &HostTarget, reason: S, at: DateTime<Utc>) -> Self {
        Self::without_fields(host, HostStatus::Skipped, reason.into(), at)
    }

    fn without_fields(
        host: &HostTarget,
        status: HostStatus,
        reason: String,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            host: host.name().to_string(),
            status,
            error: Some(reason),
            fields: FieldMap::new(),
            providers_run: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
            collected_at: at,
        }
    }

    pub fn is_collected(&self) -> bool {
        self.status == HostStatus::Collected
    }

    /// One-line summary of everything that went wrong for this host.
    pub fn error_summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(reason) = &self.error {
            parts.push(reason.clone());
        }
        parts.extend(self.failures.iter().map(|f| f.to_string()));
        parts.join("; ")
    }
}

/// Output mode selected for a collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// In-memory structured sequence, printed as a tree on the console
    #[default]
    Table,
    Csv,
    Json,
}

impl FromStr for OutputMode {
    type Err = HostFactsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(OutputMode::Table),
            "csv" => Ok(OutputMode::Csv),
            "json" => Ok(OutputMode::Json),
            other => Err(HostFactsError::config(format!(
                "unknown output format '{}' (expected table, csv or json)",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputMode::Table => write!(f, "table"),
            OutputMode::Csv => write!(f, "csv"),
            OutputMode::Json => write!(f, "json"),
        }
    }
}

/// Hosts plus enabled providers for one invocation.
#[derive(Debug, Clone)]
pub struct CollectionRequest {
    pub hosts: Vec<HostTarget>,
    pub providers: Vec<String>,
}

impl CollectionRequest {
    pub fn new(hosts: Vec<HostTarget>, providers: Vec<String>) -> Self {
        Self { hosts, providers }
    }
}

/// One record per requested host, in request order.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CollectionResult {
    pub records: Vec<HostRecord>,
    /// Whether the run was cancelled before every host was dispatched
    pub cancelled: bool,
}

impl CollectionResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HostRecord> {
        self.records.iter()
    }

    pub fn count_status(&self, status: HostStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }

    pub fn provider_failure_count(&self) -> usize {
        self.records.iter().map(|r| r.failures.len()).sum()
    }
}
