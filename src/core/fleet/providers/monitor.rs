use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{as_array, from_payload};
use crate::core::fleet::provider::{Collected, FactProvider, ProviderContext};
use crate::core::fleet::transport::Capability;
use crate::core::fleet::types::{FieldMap, FieldValue, HostTarget};
use crate::error::Result;

/// VideoOutputTechnology codes reported by WmiMonitorConnectionParams.
const CONNECTIONS: &[(i64, &str)] = &[
    (0, "VGA"),
    (1, "S-Video"),
    (2, "Composite"),
    (3, "Component"),
    (4, "DVI"),
    (5, "HDMI"),
    (6, "LVDS"),
    (8, "D-JPN"),
    (9, "SDI"),
    (10, "DisplayPort"),
    (11, "Embedded DisplayPort"),
    (12, "UDI"),
    (13, "Embedded UDI"),
    (14, "SDTV Dongle"),
    (15, "Miracast"),
    (16, "Indirect Wired"),
    (2_147_483_648, "Internal"),
];

/// Human label for a connection code; anything unmapped is "Unknown".
pub fn connection_label(code: i64) -> &'static str {
    CONNECTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map_or("Unknown", |(_, label)| label)
}

/// Decode a WMI numeric character array. Padding (zero) and non-positive
/// values are dropped.
pub fn decode_char_array(codes: &[i64]) -> String {
    codes
        .iter()
        .filter(|&&c| c > 0)
        .filter_map(|&c| u32::try_from(c).ok().and_then(char::from_u32))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Integer code, or `None` for anything that is not an integer.
fn lenient_code<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_i64))
}

/// Character codes with non-integer elements dropped. A value that is not an
/// array decodes to nothing.
fn lenient_codes<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(items.iter().filter_map(Value::as_i64).collect()),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct RawMonitor {
    #[serde(rename = "ManufacturerName", default, deserialize_with = "lenient_codes")]
    manufacturer: Option<Vec<i64>>,
    #[serde(rename = "UserFriendlyName", default, deserialize_with = "lenient_codes")]
    model: Option<Vec<i64>>,
    #[serde(rename = "SerialNumberID", default, deserialize_with = "lenient_codes")]
    serial: Option<Vec<i64>>,
    #[serde(rename = "VideoOutputTechnology", default, deserialize_with = "lenient_code")]
    connection: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub connection: String,
}

fn decoded_or(codes: Option<Vec<i64>>, fallback: &str) -> String {
    let decoded = codes.map(|c| decode_char_array(&c)).unwrap_or_default();
    if decoded.is_empty() {
        fallback.to_string()
    } else {
        decoded
    }
}

impl From<RawMonitor> for MonitorInfo {
    fn from(raw: RawMonitor) -> Self {
        Self {
            manufacturer: decoded_or(raw.manufacturer, "Unknown"),
            model: decoded_or(raw.model, "Unknown Model"),
            serial_number: decoded_or(raw.serial, "N/A"),
            connection: raw
                .connection
                .map_or("Unknown", connection_label)
                .to_string(),
        }
    }
}

impl From<&MonitorInfo> for FieldValue {
    fn from(monitor: &MonitorInfo) -> Self {
        FieldMap::new()
            .with("Manufacturer", monitor.manufacturer.as_str())
            .with("Model", monitor.model.as_str())
            .with("SerialNumber", monitor.serial_number.as_str())
            .with("Connection", monitor.connection.as_str())
            .into()
    }
}

/// Attached displays with their identity and connection type.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonitorProvider;

impl MonitorProvider {
    fn parse(raw: Value) -> Result<Vec<MonitorInfo>> {
        as_array(raw)
            .into_iter()
            .map(|item| from_payload::<RawMonitor>(item, "monitor").map(MonitorInfo::from))
            .collect()
    }
}

impl FactProvider for MonitorProvider {
    fn name(&self) -> &str {
        super::MONITORS
    }

    fn description(&self) -> &str {
        "Attached monitors: manufacturer, model, serial and connection"
    }

    fn collect(&self, host: &HostTarget, ctx: &ProviderContext<'_>) -> Result<Collected> {
        let raw = ctx
            .transport
            .query_host(host, Capability::Monitors, &Value::Null)?;
        let monitors = Self::parse(raw)?;

        let fields = FieldMap::new()
            .with("MonitorCount", monitors.len() as i64)
            .with(
                "Monitors",
                FieldValue::List(monitors.iter().map(FieldValue::from).collect()),
            );
        Ok(fields.into())
    }
}
