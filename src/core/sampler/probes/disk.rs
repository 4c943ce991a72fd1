//! Mounted filesystem usage.

use std::collections::HashSet;

use super::super::environment::{CapabilityHint, EnvironmentProfile};
use super::super::format::{format_bytes, round_to};
use super::super::snapshot::DiskEntry;
use super::super::strategy::StrategyChain;
use crate::platform::MountEntry;

const PSEUDO_FS_TYPES: &[&str] = &[
    "tmpfs",
    "devtmpfs",
    "devfs",
    "proc",
    "sysfs",
    "cgroup",
    "cgroup2",
    "overlay",
    "squashfs",
    "autofs",
    "debugfs",
    "tracefs",
    "securityfs",
    "pstore",
    "bpf",
    "mqueue",
    "hugetlbfs",
    "fusectl",
    "configfs",
    "binfmt_misc",
    "nsfs",
    "ramfs",
    "efivarfs",
    "nullfs",
];

const PSEUDO_SOURCES: &[&str] = &["none", "tmpfs", "overlay", "devfs", "map auto_home"];

const SYSTEM_PREFIXES: &[&str] = &[
    "/proc",
    "/sys",
    "/dev",
    "/run",
    "/snap",
    "/boot",
    "/var/lib/docker",
    "/usr/lib/wsl",
    "/mnt/wsl",
    "/init",
    "/System/Volumes",
    "/private/var/vm",
];

pub fn chain(profile: &EnvironmentProfile) -> StrategyChain<Vec<MountEntry>> {
    StrategyChain::new("disk")
        .when(profile.has(CapabilityHint::NativeSampler), "native", |ctx| {
            non_empty(ctx.host.native_mounts())
        })
        .with("df", |ctx| non_empty(parse_df(&ctx.host.run("df", &["-kP"])?)))
}

fn non_empty(mounts: Vec<MountEntry>) -> Option<Vec<MountEntry>> {
    if mounts.is_empty() {
        None
    } else {
        Some(mounts)
    }
}

/// POSIX `df -kP`: sizes are 1024-byte blocks and the mount point may contain spaces.
pub fn parse_df(output: &str) -> Vec<MountEntry> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                return None;
            }

            let total_kb: u64 = fields[1].parse().ok()?;
            let available_kb: u64 = fields[3].parse().ok()?;

            Some(MountEntry {
                source: fields[0].to_string(),
                path: fields[5..].join(" "),
                fs_type: String::new(),
                total_bytes: total_kb * 1024,
                available_bytes: available_kb * 1024,
            })
        })
        .collect()
}

/// Root first, identical (size, used) collapsed, pseudo and system mounts dropped.
pub fn compute(mut mounts: Vec<MountEntry>) -> Vec<DiskEntry> {
    // Real mounts before pseudo ones so a shared signature keeps the real path
    mounts.sort_by_key(|m| (m.path != "/", is_pseudo(m)));

    let mut seen = HashSet::new();
    mounts
        .into_iter()
        .filter(|m| m.total_bytes > 0)
        .filter(|m| seen.insert((m.total_bytes, m.used_bytes())))
        .filter(|m| !is_pseudo(m))
        .map(|m| {
            let used = m.used_bytes();
            DiskEntry {
                percent: round_to(100.0 * used as f64 / m.total_bytes as f64, 1),
                total: format_bytes(m.total_bytes),
                used: format_bytes(used),
                path: m.path,
                fs_type: m.fs_type,
                total_bytes: m.total_bytes,
                used_bytes: used,
            }
        })
        .collect()
}

fn is_pseudo(mount: &MountEntry) -> bool {
    let fs_type = mount.fs_type.to_lowercase();
    if PSEUDO_FS_TYPES.contains(&fs_type.as_str()) {
        return true;
    }
    if PSEUDO_SOURCES.contains(&mount.source.as_str()) {
        return true;
    }

    SYSTEM_PREFIXES.iter().any(|prefix| {
        mount.path == *prefix
            || mount
                .path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    })
}
