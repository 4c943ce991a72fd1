//! Firmware identity and secure boot state.

use chrono::{DateTime, NaiveDate};

use super::super::environment::{CapabilityHint, EnvironmentProfile};
use super::super::snapshot::FirmwareInfo;
use super::super::strategy::{ProbeContext, StrategyChain};
use super::bridge;

const BIOS_SCRIPT: &str =
    "Get-CimInstance Win32_BIOS | Select-Object Manufacturer, SMBIOSBIOSVersion, ReleaseDate, SerialNumber | ConvertTo-Json";
const SECURE_BOOT_SCRIPT: &str = "Confirm-SecureBootUEFI";

const DMI_ID: &str = "/sys/class/dmi/id";
const EFI_DIR: &str = "/sys/firmware/efi";
const SECURE_BOOT_VAR: &str =
    "/sys/firmware/efi/efivars/SecureBoot-8be4df61-93ca-11d2-aa0d-00e098032b8c";

pub fn chain(profile: &EnvironmentProfile) -> StrategyChain<FirmwareInfo> {
    StrategyChain::new("firmware")
        .when(profile.has(CapabilityHint::HostBridge), "host_bios", host_bios)
        .when(profile.has(CapabilityHint::SysFs), "sysfs_dmi", sysfs_dmi)
        .when(profile.has(CapabilityHint::DesktopTools), "system_profiler", system_profiler)
}

fn host_bios(ctx: &ProbeContext<'_>) -> Option<FirmwareInfo> {
    let value = bridge::powershell_json(ctx.host, BIOS_SCRIPT)?;
    let mut info = parse_bios(&value)?;

    info.secure_boot = bridge::powershell(ctx.host, SECURE_BOOT_SCRIPT).and_then(|out| {
        match out.trim().to_lowercase().as_str() {
            "true" => Some("Enabled".to_string()),
            "false" => Some("Disabled".to_string()),
            _ => None,
        }
    });

    Some(info)
}

pub fn parse_bios(value: &serde_json::Value) -> Option<FirmwareInfo> {
    let bios = bridge::json_items(value).into_iter().next()?;
    let text = |key: &str| {
        bios.get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let info = FirmwareInfo {
        vendor: text("Manufacturer"),
        version: text("SMBIOSBIOSVersion"),
        date: text("ReleaseDate").and_then(|d| parse_release_date(&d)),
        serial: text("SerialNumber"),
        secure_boot: None,
    };

    (info.vendor.is_some() || info.version.is_some()).then_some(info)
}

/// Release dates arrive as `/Date(ms)/`, ISO 8601 or CIM `yyyymmddHHMMSS.ffffff+zzz`.
pub fn parse_release_date(raw: &str) -> Option<String> {
    if let Some(ms) = raw
        .strip_prefix("/Date(")
        .and_then(|rest| rest.strip_suffix(")/"))
    {
        let ms: i64 = ms.parse().ok()?;
        let date = DateTime::from_timestamp_millis(ms)?;
        return Some(date.format("%Y-%m-%d").to_string());
    }

    if let Some(prefix) = raw.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }

    let digits = raw.get(..8)?;
    NaiveDate::parse_from_str(digits, "%Y%m%d")
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

fn sysfs_dmi(ctx: &ProbeContext<'_>) -> Option<FirmwareInfo> {
    let read = |name: &str| {
        ctx.host
            .read_file(&format!("{}/{}", DMI_ID, name))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let vendor = read("bios_vendor");
    let version = read("bios_version");
    if vendor.is_none() && version.is_none() {
        return None;
    }

    Some(FirmwareInfo {
        vendor,
        version,
        date: read("bios_date").map(|d| {
            NaiveDate::parse_from_str(&d, "%m/%d/%Y")
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or(d)
        }),
        // product_serial is root-only; absent without privileges
        serial: read("product_serial"),
        secure_boot: Some(secure_boot_state(ctx)),
    })
}

/// The efivar payload follows a 4-byte attribute header; byte 4 is the flag.
fn secure_boot_state(ctx: &ProbeContext<'_>) -> String {
    if !ctx.host.exists(EFI_DIR) {
        return "Unsupported (legacy BIOS)".to_string();
    }

    match ctx.host.read_bytes(SECURE_BOOT_VAR).and_then(|b| b.get(4).copied()) {
        Some(1) => "Enabled".to_string(),
        Some(0) => "Disabled".to_string(),
        _ => "Unknown".to_string(),
    }
}

fn system_profiler(ctx: &ProbeContext<'_>) -> Option<FirmwareInfo> {
    let output = ctx.host.run("system_profiler", &["SPHardwareDataType", "-json"])?;
    let value: serde_json::Value = serde_json::from_str(&output).ok()?;
    parse_hardware_overview(&value)
}

pub fn parse_hardware_overview(value: &serde_json::Value) -> Option<FirmwareInfo> {
    let hardware = value.get("SPHardwareDataType")?.as_array()?.first()?;
    let text = |key: &str| hardware.get(key).and_then(|v| v.as_str()).map(str::to_string);

    let version = text("boot_rom_version")?;
    Some(FirmwareInfo {
        vendor: Some("Apple".to_string()),
        version: Some(version),
        date: None,
        serial: text("serial_number"),
        secure_boot: None,
    })
}
