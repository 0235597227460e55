//! Hardware inventory: base system summary plus disk, memory and network
//! sub-providers that can be toggled and fail independently.

use std::net::IpAddr;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{as_array, from_payload, round2};
use crate::core::fleet::provider::{Collected, FactProvider, ProviderContext};
use crate::core::fleet::transport::Capability;
use crate::core::fleet::types::{FieldMap, FieldValue, HostTarget};
use crate::error::{HostFactsError, Result};

const NOT_AVAILABLE: &str = "N/A";
/// Win32_LogicalDisk.DriveType for local fixed disks
const LOCAL_FIXED_DISK: u32 = 3;

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Accept `null`, a single string, or a list of strings.
fn string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<Option<String>>),
    }

    let parsed: Option<OneOrMany> = Option::deserialize(deserializer)?;
    Ok(match parsed {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(items)) => items.into_iter().flatten().collect(),
    }
    .into_iter()
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .collect())
}

// ---------------------------------------------------------------------------
// Base inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SystemSummary {
    manufacturer: Option<String>,
    model: Option<String>,
    serial_number: Option<String>,
    processor: Option<String>,
    os_caption: Option<String>,
    os_version: Option<String>,
    total_physical_memory: Option<u64>,
}

/// Serial, model, processor, OS and installed memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryProvider;

impl FactProvider for InventoryProvider {
    fn name(&self) -> &str {
        super::INVENTORY
    }

    fn description(&self) -> &str {
        "Manufacturer, model, serial, processor, OS and total memory"
    }

    fn collect(&self, host: &HostTarget, ctx: &ProviderContext<'_>) -> Result<Collected> {
        let raw = ctx
            .transport
            .query_host(host, Capability::SystemSummary, &Value::Null)?;
        if raw.is_null() {
            return Err(HostFactsError::parse("system summary was empty"));
        }
        let summary: SystemSummary = from_payload(raw, "system summary")?;

        let fields = FieldMap::new()
            .with("Manufacturer", FieldValue::opt_text(clean(summary.manufacturer)))
            .with("Model", FieldValue::opt_text(clean(summary.model)))
            .with("SerialNumber", FieldValue::opt_text(clean(summary.serial_number)))
            .with("Processor", FieldValue::opt_text(clean(summary.processor)))
            .with("OperatingSystem", FieldValue::opt_text(clean(summary.os_caption)))
            .with("OsVersion", FieldValue::opt_text(clean(summary.os_version)))
            .with(
                "TotalMemory",
                summary
                    .total_physical_memory
                    .map_or(FieldValue::Null, FieldValue::Bytes),
            );

        Ok(fields.into())
    }
}

// ---------------------------------------------------------------------------
// Disks
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDisk {
    #[serde(rename = "DeviceID")]
    device_id: Option<String>,
    drive_type: Option<u32>,
    volume_name: Option<String>,
    file_system: Option<String>,
    size: Option<u64>,
    free_space: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiskInfo {
    pub drive: String,
    pub label: Option<String>,
    pub file_system: Option<String>,
    pub size_bytes: u64,
    pub free_bytes: u64,
}

impl DiskInfo {
    pub fn free_percent(&self) -> Option<f64> {
        (self.size_bytes > 0)
            .then(|| round2(self.free_bytes as f64 / self.size_bytes as f64 * 100.0))
    }
}

impl From<&DiskInfo> for FieldValue {
    fn from(disk: &DiskInfo) -> Self {
        FieldMap::new()
            .with("Drive", disk.drive.as_str())
            .with("Label", FieldValue::opt_text(disk.label.clone()))
            .with("FileSystem", FieldValue::opt_text(disk.file_system.clone()))
            .with("Size", FieldValue::Bytes(disk.size_bytes))
            .with("Free", FieldValue::Bytes(disk.free_bytes))
            .with(
                "FreePercent",
                disk.free_percent().map_or(FieldValue::Null, FieldValue::Float),
            )
            .into()
    }
}

/// Local fixed drives only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskProvider;

impl DiskProvider {
    fn parse(raw: Value) -> Result<Vec<DiskInfo>> {
        let mut disks = Vec::new();
        for item in as_array(raw) {
            let disk: RawDisk = from_payload(item, "logical disk")?;
            if disk.drive_type != Some(LOCAL_FIXED_DISK) {
                continue;
            }
            let Some(drive) = clean(disk.device_id) else {
                continue;
            };
            disks.push(DiskInfo {
                drive,
                label: clean(disk.volume_name),
                file_system: clean(disk.file_system),
                size_bytes: disk.size.unwrap_or(0),
                free_bytes: disk.free_space.unwrap_or(0),
            });
        }
        Ok(disks)
    }
}

impl FactProvider for DiskProvider {
    fn name(&self) -> &str {
        super::DISK
    }

    fn description(&self) -> &str {
        "Local fixed drives with size and free space"
    }

    fn collect(&self, host: &HostTarget, ctx: &ProviderContext<'_>) -> Result<Collected> {
        let raw = ctx
            .transport
            .query_host(host, Capability::LogicalDisks, &Value::Null)?;
        let disks = Self::parse(raw)?;

        let list: Vec<FieldValue> = disks.iter().map(FieldValue::from).collect();
        Ok(FieldMap::new().with("Disks", FieldValue::List(list)).into())
    }
}

// ---------------------------------------------------------------------------
// Memory utilization
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawMemory {
    /// KiB
    total_visible_memory_size: Option<u64>,
    /// KiB
    free_physical_memory: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryUsage {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub used_percent: f64,
    pub free_percent: f64,
}

impl MemoryUsage {
    /// Build from the KiB counters reported by the OS.
    pub fn from_kib(total_kib: u64, free_kib: u64) -> Result<Self> {
        if total_kib == 0 {
            return Err(HostFactsError::parse("total visible memory reported as zero"));
        }
        let total_bytes = total_kib.checked_mul(1024).ok_or_else(|| {
            HostFactsError::parse(format!(
                "total visible memory of {} KiB is out of range",
                total_kib
            ))
        })?;
        let free_kib = free_kib.min(total_kib);
        let used_kib = total_kib - free_kib;
        let total = total_kib as f64;

        Ok(Self {
            total_bytes,
            used_bytes: used_kib * 1024,
            free_bytes: free_kib * 1024,
            used_percent: round2(used_kib as f64 / total * 100.0),
            free_percent: round2(free_kib as f64 / total * 100.0),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryProvider;

impl FactProvider for MemoryProvider {
    fn name(&self) -> &str {
        super::MEMORY
    }

    fn description(&self) -> &str {
        "Used and free memory as size and percentage of total"
    }

    fn collect(&self, host: &HostTarget, ctx: &ProviderContext<'_>) -> Result<Collected> {
        let raw = ctx
            .transport
            .query_host(host, Capability::MemoryStatus, &Value::Null)?;
        let memory: RawMemory = from_payload(raw, "memory status")?;

        let usage = match (memory.total_visible_memory_size, memory.free_physical_memory) {
            (Some(total), Some(free)) => MemoryUsage::from_kib(total, free)?,
            _ => return Err(HostFactsError::parse("memory counters missing")),
        };

        let fields = FieldMap::new()
            .with("MemoryTotal", FieldValue::Bytes(usage.total_bytes))
            .with("MemoryUsed", FieldValue::Bytes(usage.used_bytes))
            .with("MemoryUsedPercent", usage.used_percent)
            .with("MemoryFree", FieldValue::Bytes(usage.free_bytes))
            .with("MemoryFreePercent", usage.free_percent);

        Ok(fields.into())
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawAdapter {
    #[serde(rename = "Description")]
    description: Option<String>,
    #[serde(rename = "MACAddress")]
    mac_address: Option<String>,
    #[serde(rename = "IPAddress", default, deserialize_with = "string_list")]
    ip_address: Vec<String>,
    #[serde(rename = "DefaultIPGateway", default, deserialize_with = "string_list")]
    default_gateway: Vec<String>,
    #[serde(rename = "DNSServerSearchOrder", default, deserialize_with = "string_list")]
    dns_servers: Vec<String>,
    #[serde(rename = "DHCPEnabled")]
    dhcp_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkAdapter {
    pub description: String,
    pub mac_address: String,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    pub gateways: Vec<String>,
    pub dns_servers: Vec<String>,
    pub dhcp: Option<bool>,
}

impl From<RawAdapter> for NetworkAdapter {
    fn from(raw: RawAdapter) -> Self {
        let (ipv4, ipv6): (Vec<String>, Vec<String>) = raw
            .ip_address
            .into_iter()
            .partition(|ip| matches!(ip.parse::<IpAddr>(), Ok(IpAddr::V4(_))));

        Self {
            description: clean(raw.description).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            mac_address: clean(raw.mac_address).unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            ipv4,
            ipv6,
            gateways: raw.default_gateway,
            dns_servers: raw.dns_servers,
            dhcp: raw.dhcp_enabled,
        }
    }
}

fn joined_or_na(items: &[String]) -> String {
    if items.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        items.join(", ")
    }
}

impl From<&NetworkAdapter> for FieldValue {
    fn from(adapter: &NetworkAdapter) -> Self {
        FieldMap::new()
            .with("Description", adapter.description.as_str())
            .with("MacAddress", adapter.mac_address.as_str())
            .with("IPv4", joined_or_na(&adapter.ipv4))
            .with("IPv6", joined_or_na(&adapter.ipv6))
            .with("Gateway", joined_or_na(&adapter.gateways))
            .with("DnsServers", joined_or_na(&adapter.dns_servers))
            .with("Dhcp", adapter.dhcp.map_or(FieldValue::Null, FieldValue::Bool))
            .into()
    }
}

/// IP-enabled network adapters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkProvider;

impl NetworkProvider {
    fn parse(raw: Value) -> Result<Vec<NetworkAdapter>> {
        as_array(raw)
            .into_iter()
            .map(|item| from_payload::<RawAdapter>(item, "network adapter").map(NetworkAdapter::from))
            .collect()
    }
}

impl FactProvider for NetworkProvider {
    fn name(&self) -> &str {
        super::NETWORK
    }

    fn description(&self) -> &str {
        "IP-enabled adapters with addresses, gateway and DNS servers"
    }

    fn collect(&self, host: &HostTarget, ctx: &ProviderContext<'_>) -> Result<Collected> {
        let raw = ctx
            .transport
            .query_host(host, Capability::NetworkAdapters, &Value::Null)?;
        let adapters = Self::parse(raw)?;

        let list: Vec<FieldValue> = adapters.iter().map(FieldValue::from).collect();
        Ok(FieldMap::new()
            .with("NetworkAdapters", FieldValue::List(list))
            .into())
    }
}
