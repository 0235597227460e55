//! PowerShell remoting transport.
//!
//! Each capability maps to a short script that emits objects which are piped
//! through `ConvertTo-Json`. Remote hosts are reached with `Invoke-Command`;
//! local aliases run the script in-process.

use std::process::Command;
use std::time::Duration;

use log::debug;
use serde_json::Value;

use super::process::run_with_timeout;
use crate::core::fleet::transport::{Capability, RemoteTransport};
use crate::core::fleet::types::HostTarget;
use crate::error::{HostFactsError, Result};

const JSON_DEPTH: u32 = 4;
const DEFAULT_EVENT_WINDOW: u64 = 20;

#[derive(Debug, Clone)]
pub struct PowerShellTransport {
    executable: String,
    timeout: Duration,
}

impl PowerShellTransport {
    pub fn new(timeout: Duration) -> Self {
        let executable = if cfg!(windows) { "powershell" } else { "pwsh" };
        Self {
            executable: executable.to_string(),
            timeout,
        }
    }

    pub fn with_executable<S: Into<String>>(mut self, executable: S) -> Self {
        self.executable = executable.into();
        self
    }

    /// Build the full command line script for a capability on a host.
    pub fn build_script(host: &HostTarget, capability: Capability, params: &Value) -> Result<String> {
        let body = capability_script(capability, params)?;
        let select = "Select-Object * -ExcludeProperty PSComputerName,RunspaceId,PSShowComputerName";

        let script = if host.is_local() {
            format!(
                "$ErrorActionPreference = 'Stop'; & {{ {} }} | ConvertTo-Json -Depth {} -Compress",
                body, JSON_DEPTH
            )
        } else {
            format!(
                "$ErrorActionPreference = 'Stop'; Invoke-Command -ComputerName '{}' -ScriptBlock {{ {} }} | {} | ConvertTo-Json -Depth {} -Compress",
                host.name(),
                body,
                select,
                JSON_DEPTH
            )
        };
        Ok(script)
    }
}

impl RemoteTransport for PowerShellTransport {
    fn query_host(&self, host: &HostTarget, capability: Capability, params: &Value) -> Result<Value> {
        let script = Self::build_script(host, capability, params)?;
        debug!("{} -> {} ({})", host, capability, self.executable);

        let mut command = Command::new(&self.executable);
        command.args(["-NoProfile", "-NonInteractive", "-Command", &script]);

        let what = format!("{} query on {}", capability, host);
        let output = run_with_timeout(command, self.timeout, &what)?;

        if !output.status.success() {
            let stderr = output.stderr.trim();
            let detail = if stderr.is_empty() {
                format!("exit status {}", output.status)
            } else {
                first_line(stderr).to_string()
            };
            return Err(HostFactsError::transport(format!("{} failed: {}", what, detail)));
        }

        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(stdout).map_err(|e| {
            HostFactsError::parse(format!("JSON parsing failed for {}: {}", what, e))
        })
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text).trim()
}

fn capability_script(capability: Capability, params: &Value) -> Result<String> {
    let script = match capability {
        Capability::LoggedOnUser => {
            "Get-CimInstance -ClassName Win32_ComputerSystem | Select-Object UserName".to_string()
        }
        Capability::ConsoleSessions => concat!(
            "@(quser 2>$null | Select-Object -Skip 1 | ForEach-Object { ",
            "$p = ($_.Trim() -replace '^>', '') -split '\\s+'; ",
            "[pscustomobject]@{ UserName = $p[0]; SessionName = $p[1] } ",
            "} | Where-Object { $_.SessionName -like 'console*' })"
        )
        .to_string(),
        Capability::BootTime => concat!(
            "$os = Get-CimInstance -ClassName Win32_OperatingSystem; ",
            "[pscustomobject]@{ LastBootUpTime = $os.LastBootUpTime.ToUniversalTime().ToString('o') }"
        )
        .to_string(),
        Capability::SystemEvents => {
            let ids = event_ids(params)?;
            let max = params
                .get("max")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_EVENT_WINDOW);
            format!(
                concat!(
                    "Get-WinEvent -FilterHashtable @{{ LogName = 'System'; Id = {} }} -MaxEvents {} -ErrorAction SilentlyContinue | ",
                    "ForEach-Object {{ [pscustomobject]@{{ Id = $_.Id; ",
                    "TimeCreated = $_.TimeCreated.ToUniversalTime().ToString('o'); ",
                    "UserId = if ($_.UserId) {{ $_.UserId.Value }} else {{ $null }} }} }}"
                ),
                ids, max
            )
        }
        Capability::TranslateSid => {
            let sid = params
                .get("sid")
                .and_then(Value::as_str)
                .ok_or_else(|| HostFactsError::transport("translate-sid requires a 'sid' parameter"))?;
            if !is_valid_sid(sid) {
                return Err(HostFactsError::transport(format!("'{}' is not a SID", sid)));
            }
            format!(
                concat!(
                    "[pscustomobject]@{{ Account = (New-Object System.Security.Principal.SecurityIdentifier('{}'))",
                    ".Translate([System.Security.Principal.NTAccount]).Value }}"
                ),
                sid
            )
        }
        Capability::SystemSummary => concat!(
            "$cs = Get-CimInstance -ClassName Win32_ComputerSystem; ",
            "$bios = Get-CimInstance -ClassName Win32_BIOS; ",
            "$cpu = Get-CimInstance -ClassName Win32_Processor | Select-Object -First 1; ",
            "$os = Get-CimInstance -ClassName Win32_OperatingSystem; ",
            "[pscustomobject]@{ Manufacturer = $cs.Manufacturer; Model = $cs.Model; ",
            "SerialNumber = $bios.SerialNumber; Processor = $cpu.Name; OsCaption = $os.Caption; ",
            "OsVersion = $os.Version; TotalPhysicalMemory = $cs.TotalPhysicalMemory }"
        )
        .to_string(),
        Capability::LogicalDisks => concat!(
            "@(Get-CimInstance -ClassName Win32_LogicalDisk -Filter 'DriveType=3' | ",
            "Select-Object DeviceID, DriveType, VolumeName, FileSystem, Size, FreeSpace)"
        )
        .to_string(),
        Capability::MemoryStatus => concat!(
            "Get-CimInstance -ClassName Win32_OperatingSystem | ",
            "Select-Object TotalVisibleMemorySize, FreePhysicalMemory"
        )
        .to_string(),
        Capability::NetworkAdapters => concat!(
            "@(Get-CimInstance -ClassName Win32_NetworkAdapterConfiguration -Filter 'IPEnabled=True' | ",
            "Select-Object Description, MACAddress, IPAddress, DefaultIPGateway, DNSServerSearchOrder, DHCPEnabled)"
        )
        .to_string(),
        Capability::Monitors => concat!(
            "$conns = @(Get-CimInstance -Namespace root\\wmi -ClassName WmiMonitorConnectionParams -ErrorAction SilentlyContinue); ",
            "@(Get-CimInstance -Namespace root\\wmi -ClassName WmiMonitorID | ForEach-Object { ",
            "$id = $_; $conn = $conns | Where-Object { $_.InstanceName -eq $id.InstanceName } | Select-Object -First 1; ",
            "[pscustomobject]@{ InstanceName = $id.InstanceName; ManufacturerName = $id.ManufacturerName; ",
            "UserFriendlyName = $id.UserFriendlyName; SerialNumberID = $id.SerialNumberID; ",
            "VideoOutputTechnology = if ($conn) { [int64]$conn.VideoOutputTechnology } else { $null } } })"
        )
        .to_string(),
    };
    Ok(script)
}

fn event_ids(params: &Value) -> Result<String> {
    let ids: Vec<String> = params
        .get("ids")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_u64)
                .map(|id| id.to_string())
                .collect()
        })
        .unwrap_or_default();

    if ids.is_empty() {
        return Err(HostFactsError::transport(
            "system-events requires a non-empty 'ids' parameter",
        ));
    }
    Ok(ids.join(","))
}

/// `S-1-5-21-...` style identifier; nothing else may reach the script.
fn is_valid_sid(sid: &str) -> bool {
    sid.starts_with("S-1-")
        && sid.len() > 4
        && sid[4..].chars().all(|c| c.is_ascii_digit() || c == '-')
}
