//! Physical memory totals.

use super::super::environment::{CapabilityHint, EnvironmentProfile};
use super::super::format::round_to;
use super::super::snapshot::MemoryReading;
use super::super::strategy::StrategyChain;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Raw byte counts before derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryCounters {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

pub fn chain(profile: &EnvironmentProfile) -> StrategyChain<MemoryCounters> {
    StrategyChain::new("memory")
        .when(profile.has(CapabilityHint::ProcFs), "proc_meminfo", |ctx| {
            parse_meminfo(&ctx.host.read_file("/proc/meminfo")?)
        })
        .when(profile.has(CapabilityHint::NativeSampler), "native", |ctx| {
            let (total_bytes, available_bytes) = ctx.host.native_memory()?;
            Some(MemoryCounters {
                total_bytes,
                available_bytes,
            })
        })
}

/// `MemAvailable` is preferred; kernels without it fall back to `MemFree`.
pub fn parse_meminfo(content: &str) -> Option<MemoryCounters> {
    let mut total = None;
    let mut available = None;
    let mut free = None;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(kib) = value.parse::<u64>() else {
            continue;
        };

        match key {
            "MemTotal:" => total = Some(kib * 1024),
            "MemAvailable:" => available = Some(kib * 1024),
            "MemFree:" => free = Some(kib * 1024),
            _ => {}
        }
    }

    Some(MemoryCounters {
        total_bytes: total?,
        available_bytes: available.or(free)?,
    })
}

/// Derive the published reading. `None` for a zero total.
pub fn compute(counters: MemoryCounters) -> Option<MemoryReading> {
    if counters.total_bytes == 0 {
        return None;
    }

    let available = counters.available_bytes.min(counters.total_bytes);
    let used = counters.total_bytes - available;

    let total_gb = counters.total_bytes as f64 / GIB;
    let used_gb = used as f64 / GIB;
    let free_gb = available as f64 / GIB;
    let percent = 100.0 * used as f64 / counters.total_bytes as f64;

    Some(MemoryReading {
        total_gb: round_to(total_gb, 2),
        used_gb: round_to(used_gb, 2),
        free_gb: round_to(free_gb, 2),
        percent: round_to(percent, 2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gib(value: f64) -> u64 {
        (value * GIB) as u64
    }

    #[test]
    fn test_used_and_percent_from_available() {
        let reading = compute(MemoryCounters {
            total_bytes: gib(16.0),
            available_bytes: gib(1.4),
        })
        .unwrap();

        assert_eq!(reading.total_gb, 16.0);
        assert_eq!(reading.used_gb, 14.6);
        assert_eq!(reading.free_gb, 1.4);
        assert_eq!(reading.percent, 91.25);
    }

    #[test]
    fn test_zero_total_is_unavailable() {
        assert!(compute(MemoryCounters {
            total_bytes: 0,
            available_bytes: 0
        })
        .is_none());
    }

    #[test]
    fn test_meminfo_prefers_available_over_free() {
        let with_available = "MemTotal:       16384000 kB\nMemFree:         1000000 kB\nMemAvailable:    4096000 kB\n";
        let counters = parse_meminfo(with_available).unwrap();
        assert_eq!(counters.total_bytes, 16384000 * 1024);
        assert_eq!(counters.available_bytes, 4096000 * 1024);

        let old_kernel = "MemTotal:       1024 kB\nMemFree:         256 kB\n";
        assert_eq!(parse_meminfo(old_kernel).unwrap().available_bytes, 256 * 1024);

        assert!(parse_meminfo("MemFree: 10 kB\n").is_none());
    }
}
