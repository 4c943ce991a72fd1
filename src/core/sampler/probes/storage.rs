//! SMART-style storage health.

use super::super::environment::{CapabilityHint, EnvironmentProfile};
use super::super::snapshot::StorageHealth;
use super::super::strategy::{ProbeContext, StrategyChain};
use super::bridge;

const PHYSICAL_DISK_SCRIPT: &str =
    "Get-PhysicalDisk | Select-Object FriendlyName, HealthStatus | ConvertTo-Json";

const VIRTUAL_BLOCK_PREFIXES: &[&str] = &["loop", "ram", "zram", "dm-", "sr", "md", "fd"];

pub fn chain(profile: &EnvironmentProfile) -> StrategyChain<StorageHealth> {
    StrategyChain::new("storage_health")
        .when(!profile.has(CapabilityHint::DesktopTools), "smartctl", smartctl)
        .when(profile.has(CapabilityHint::HostBridge), "host_physical_disk", host_physical_disk)
        .when(profile.has(CapabilityHint::DesktopTools), "diskutil", diskutil)
}

/// Map a source-specific status word onto Healthy, Warning, Failing or Unknown.
pub fn normalize_health(status: &str) -> &'static str {
    match status.trim().trim_end_matches('!').to_lowercase().as_str() {
        "passed" | "ok" | "verified" | "healthy" => "Healthy",
        "warning" | "degraded" => "Warning",
        "failed" | "failing" | "unhealthy" | "fatal" => "Failing",
        _ => "Unknown",
    }
}

fn health(status: impl Into<String>) -> StorageHealth {
    let status = status.into();
    StorageHealth {
        health: normalize_health(&status).to_string(),
        status,
    }
}

/// Raw block devices need privileges; without them this strategy is absent, not an error.
fn smartctl(ctx: &ProbeContext<'_>) -> Option<StorageHealth> {
    if !ctx.host.is_privileged() {
        log::debug!("smartctl skipped: not privileged");
        return None;
    }
    let exe = ctx.host.find_tool("smartctl")?;
    let device = first_block_device(ctx)?;
    let output = ctx.host.run(&exe, &["-H", &device])?;
    parse_smartctl(&output)
}

fn first_block_device(ctx: &ProbeContext<'_>) -> Option<String> {
    let mut devices = ctx.host.list_dir("/sys/block");
    devices.sort();
    devices
        .into_iter()
        .find(|name| !VIRTUAL_BLOCK_PREFIXES.iter().any(|p| name.starts_with(p)))
        .map(|name| format!("/dev/{}", name))
}

/// ATA reports `...test result: PASSED`, SCSI reports `SMART Health Status: OK`.
pub fn parse_smartctl(output: &str) -> Option<StorageHealth> {
    output.lines().find_map(|line| {
        let lower = line.to_lowercase();
        if lower.contains("self-assessment test result") || lower.contains("smart health status") {
            let (_, status) = line.rsplit_once(':')?;
            Some(health(status.trim()))
        } else {
            None
        }
    })
}

fn host_physical_disk(ctx: &ProbeContext<'_>) -> Option<StorageHealth> {
    let value = bridge::powershell_json(ctx.host, PHYSICAL_DISK_SCRIPT)?;
    parse_physical_disks(&value)
}

/// Worst status across disks. `HealthStatus` is numeric on older hosts.
pub fn parse_physical_disks(value: &serde_json::Value) -> Option<StorageHealth> {
    let statuses: Vec<String> = bridge::json_items(value)
        .into_iter()
        .filter_map(|disk| {
            let status = disk.get("HealthStatus")?;
            match status {
                serde_json::Value::Number(n) => Some(
                    match n.as_u64()? {
                        0 => "Healthy",
                        1 => "Warning",
                        2 => "Unhealthy",
                        _ => "Unknown",
                    }
                    .to_string(),
                ),
                serde_json::Value::String(s) => Some(s.clone()),
                _ => None,
            }
        })
        .collect();

    let rank = |status: &String| match normalize_health(status) {
        "Failing" => 3,
        "Warning" => 2,
        "Unknown" => 1,
        _ => 0,
    };

    statuses.into_iter().max_by_key(rank).map(health)
}

fn diskutil(ctx: &ProbeContext<'_>) -> Option<StorageHealth> {
    let output = ctx.host.run("diskutil", &["info", "disk0"])?;
    parse_diskutil(&output)
}

pub fn parse_diskutil(output: &str) -> Option<StorageHealth> {
    output.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "SMART Status").then(|| health(value.trim()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sampler::environment::EnvironmentKind;
    use crate::platform::FakeHost;

    #[test]
    fn test_parse_smartctl_variants() {
        let ata = "smartctl 7.2\n=== START OF READ SMART DATA SECTION ===\nSMART overall-health self-assessment test result: PASSED\n";
        assert_eq!(parse_smartctl(ata).unwrap().health, "Healthy");

        let scsi = "SMART Health Status: OK\n";
        assert_eq!(parse_smartctl(scsi).unwrap().status, "OK");

        assert!(parse_smartctl("Permission denied").is_none());
    }

    #[test]
    fn test_smartctl_requires_privilege() {
        let script = |host: FakeHost| {
            host.with_tool("smartctl")
                .with_file("/sys/block/loop0/size", "0")
                .with_file("/sys/block/sda/size", "1000")
                .with_command("smartctl", "-H /dev/sda", Some("SMART overall-health self-assessment test result: FAILED!"))
        };
        let profile = EnvironmentProfile::for_kind(EnvironmentKind::NativeLinux, "");

        let unprivileged = script(FakeHost::linux());
        let ctx = ProbeContext::new(&unprivileged, &profile);
        assert!(chain(&profile).run(&ctx).value().is_none());
        assert!(unprivileged.calls().is_empty());

        let root = script(FakeHost::linux().privileged());
        let ctx = ProbeContext::new(&root, &profile);
        let result = chain(&profile).run(&ctx).value().unwrap();
        assert_eq!(result.status, "FAILED!");
        assert_eq!(result.health, "Failing");
    }

    #[test]
    fn test_physical_disks_report_worst() {
        let value: serde_json::Value = serde_json::from_str(
            r#"[{"FriendlyName":"NVMe","HealthStatus":0},{"FriendlyName":"HDD","HealthStatus":1}]"#,
        )
        .unwrap();
        assert_eq!(parse_physical_disks(&value).unwrap().health, "Warning");

        let single: serde_json::Value =
            serde_json::from_str(r#"{"FriendlyName":"NVMe","HealthStatus":"Healthy"}"#).unwrap();
        assert_eq!(parse_physical_disks(&single).unwrap().status, "Healthy");
    }

    #[test]
    fn test_diskutil_smart_status() {
        let output = "   Device Identifier:        disk0\n   SMART Status:             Verified\n";
        let health = parse_diskutil(output).unwrap();
        assert_eq!(health.status, "Verified");
        assert_eq!(health.health, "Healthy");
    }
}
