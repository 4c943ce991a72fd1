//! Network throughput.
//!
//! Counter strategies return cumulative bytes; rates are derived afterwards through
//! `RateState`, keyed by strategy so switching sources never mixes counters.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use super::super::environment::{CapabilityHint, EnvironmentProfile, InterfaceClass};
use super::super::format::format_rate;
use super::super::rate::RateState;
use super::super::snapshot::{ClassRates, NetworkReading, TrafficState};
use super::super::strategy::{ProbeContext, ProbeResult, StrategyChain};
use super::bridge;
use crate::platform::{HostSource, InterfaceCounters};

const HOST_COUNTER_SCRIPT: &str = "Get-Counter -Counter '\\Network Interface(*)\\Bytes Received/sec','\\Network Interface(*)\\Bytes Sent/sec' \
| Select-Object -ExpandProperty CounterSamples \
| ForEach-Object { '{0}|{1}|{2}' -f $_.InstanceName, $_.Path, $_.CookedValue }";

/// Per-second rates measured on the physical host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostInterfaceRate {
    pub name: String,
    pub rx_per_sec: f64,
    pub tx_per_sec: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkSample {
    /// Host-wide protocol counters, no interface breakdown
    Global { rx_bytes: u64, tx_bytes: u64 },
    Interfaces(Vec<InterfaceCounters>),
    HostRates(Vec<HostInterfaceRate>),
    Connections(usize),
}

pub fn chain(profile: &EnvironmentProfile) -> StrategyChain<NetworkSample> {
    let procfs = profile.has(CapabilityHint::ProcFs);

    StrategyChain::new("network")
        .when(profile.has(CapabilityHint::HostBridge), "host_perf_counter", |ctx| {
            let rates = ctx.bridge?;
            if rates.is_empty() {
                return None;
            }
            Some(NetworkSample::HostRates(rates.to_vec()))
        })
        .when(procfs, "proc_netstat", |ctx| {
            let (rx_bytes, tx_bytes) = parse_netstat_ipext(&ctx.host.read_file("/proc/net/netstat")?)?;
            let (rx_bytes, tx_bytes) = without_loopback(ctx, rx_bytes, tx_bytes);
            if rx_bytes == 0 && tx_bytes == 0 {
                return None;
            }
            Some(NetworkSample::Global { rx_bytes, tx_bytes })
        })
        .when(procfs, "proc_net_dev", |ctx| {
            interfaces(ctx, parse_proc_net_dev(&ctx.host.read_file("/proc/net/dev")?))
        })
        .when(profile.has(CapabilityHint::SysFs), "sysfs_statistics", |ctx| {
            interfaces(ctx, read_sysfs_statistics(ctx.host))
        })
        .when(profile.has(CapabilityHint::NativeSampler), "native", |ctx| {
            interfaces(ctx, ctx.host.native_interfaces())
        })
        .with("connections", |ctx| {
            Some(NetworkSample::Connections(count_connections(ctx)))
        })
}

/// `IpExt` octets count loopback traffic too; take out whatever `/proc/net/dev`
/// attributes to loopback interfaces.
fn without_loopback(ctx: &ProbeContext<'_>, rx_bytes: u64, tx_bytes: u64) -> (u64, u64) {
    let Some(content) = ctx.host.read_file("/proc/net/dev") else {
        return (rx_bytes, tx_bytes);
    };

    parse_proc_net_dev(&content)
        .iter()
        .filter(|c| ctx.profile.classify_interface(&c.name) == InterfaceClass::Loopback)
        .fold((rx_bytes, tx_bytes), |(rx, tx), lo| {
            (rx.saturating_sub(lo.rx_bytes), tx.saturating_sub(lo.tx_bytes))
        })
}

/// Counters whose non-loopback totals are all zero are an empty source, not an idle one.
fn interfaces(ctx: &ProbeContext<'_>, counters: Vec<InterfaceCounters>) -> Option<NetworkSample> {
    let has_traffic = counters.iter().any(|c| {
        ctx.profile.classify_interface(&c.name) != InterfaceClass::Loopback
            && (c.rx_bytes > 0 || c.tx_bytes > 0)
    });

    has_traffic.then_some(NetworkSample::Interfaces(counters))
}

/// Turn the committed sample into the published reading.
pub fn compute(
    result: ProbeResult<NetworkSample>,
    profile: &EnvironmentProfile,
    rates: &mut RateState,
    now: Instant,
) -> Option<NetworkReading> {
    let ProbeResult::Found { strategy, value } = result else {
        return None;
    };

    let published = match value {
        NetworkSample::Global { rx_bytes, tx_bytes } => {
            let key = format!("{}:global", strategy);
            match rates.update_network(&key, rx_bytes, tx_bytes, now) {
                Some(pair) => reading(pair.rx_per_sec, pair.tx_per_sec, None, None),
                None => warming(),
            }
        }
        NetworkSample::Interfaces(counters) => {
            let prefix = format!("{}:", strategy);
            let mut totals = Totals::default();
            let mut keys = Vec::new();

            for counter in counters {
                let class = profile.classify_interface(&counter.name);
                if class == InterfaceClass::Loopback {
                    continue;
                }

                let key = format!("{}{}", prefix, counter.name);
                if let Some(pair) = rates.update_network(&key, counter.rx_bytes, counter.tx_bytes, now) {
                    totals.add(class, pair.rx_per_sec, pair.tx_per_sec);
                }
                keys.push(key);
            }

            rates.retain_interfaces(&prefix, keys.iter().map(String::as_str));
            totals.into_reading()
        }
        NetworkSample::HostRates(host_rates) => {
            let mut totals = Totals::default();
            for rate in host_rates {
                let class = profile.classify_interface(&rate.name);
                if class != InterfaceClass::Loopback {
                    totals.add(class, rate.rx_per_sec, rate.tx_per_sec);
                }
            }
            totals.into_reading()
        }
        NetworkSample::Connections(count) => NetworkReading {
            state: TrafficState::ConnectionsOnly,
            connections: Some(count),
            ..reading(0.0, 0.0, None, None)
        },
    };

    Some(published)
}

#[derive(Default)]
struct Totals {
    wired: Option<ClassRates>,
    wireless: Option<ClassRates>,
}

impl Totals {
    fn add(&mut self, class: InterfaceClass, down: f64, up: f64) {
        let slot = match class {
            InterfaceClass::Wireless => &mut self.wireless,
            _ => &mut self.wired,
        };
        let rates = slot.get_or_insert_with(ClassRates::default);
        rates.down_bytes_per_sec += down;
        rates.up_bytes_per_sec += up;
    }

    fn into_reading(self) -> NetworkReading {
        if self.wired.is_none() && self.wireless.is_none() {
            return warming();
        }

        let down = class_sum(&self.wired, &self.wireless, |c| c.down_bytes_per_sec);
        let up = class_sum(&self.wired, &self.wireless, |c| c.up_bytes_per_sec);
        reading(down, up, self.wired, self.wireless)
    }
}

fn class_sum(a: &Option<ClassRates>, b: &Option<ClassRates>, field: impl Fn(&ClassRates) -> f64) -> f64 {
    a.iter().chain(b.iter()).map(field).sum()
}

fn reading(down: f64, up: f64, wired: Option<ClassRates>, wireless: Option<ClassRates>) -> NetworkReading {
    let state = if down > 0.0 || up > 0.0 {
        TrafficState::Active
    } else {
        TrafficState::Idle
    };

    NetworkReading {
        state,
        down_bytes_per_sec: down,
        up_bytes_per_sec: up,
        down_rate: format_rate(down),
        up_rate: format_rate(up),
        wired,
        wireless,
        connections: None,
    }
}

fn warming() -> NetworkReading {
    NetworkReading {
        state: TrafficState::Warming,
        ..reading(0.0, 0.0, None, None)
    }
}

/// `InOctets`/`OutOctets` from the `IpExt` header/value line pair.
pub fn parse_netstat_ipext(content: &str) -> Option<(u64, u64)> {
    let mut lines = content.lines().filter(|l| l.starts_with("IpExt:"));
    let header = lines.next()?;
    let values = lines.next()?;

    let mut rx = None;
    let mut tx = None;
    for (name, value) in header.split_whitespace().zip(values.split_whitespace()).skip(1) {
        match name {
            "InOctets" => rx = value.parse().ok(),
            "OutOctets" => tx = value.parse().ok(),
            _ => {}
        }
    }

    Some((rx?, tx?))
}

pub fn parse_proc_net_dev(content: &str) -> Vec<InterfaceCounters> {
    content
        .lines()
        .skip(2)
        .filter_map(|line| {
            let (name, rest) = line.split_once(':')?;
            let fields: Vec<u64> = rest
                .split_whitespace()
                .map(|f| f.parse().unwrap_or(0))
                .collect();
            if fields.len() < 9 {
                return None;
            }
            Some(InterfaceCounters::new(name.trim(), fields[0], fields[8]))
        })
        .collect()
}

fn read_sysfs_statistics(host: &dyn HostSource) -> Vec<InterfaceCounters> {
    host.list_dir("/sys/class/net")
        .into_iter()
        .filter_map(|name| {
            let read = |counter: &str| -> Option<u64> {
                host.read_file(&format!("/sys/class/net/{}/statistics/{}", name, counter))?
                    .trim()
                    .parse()
                    .ok()
            };
            let rx = read("rx_bytes")?;
            let tx = read("tx_bytes")?;
            Some(InterfaceCounters::new(name.as_str(), rx, tx))
        })
        .collect()
}

/// Socket tables where procfs has them, otherwise the background task's last count.
fn count_connections(ctx: &ProbeContext<'_>) -> usize {
    if ctx.profile.has(CapabilityHint::ProcFs) {
        let tables: Vec<String> = ["/proc/net/tcp", "/proc/net/tcp6"]
            .iter()
            .filter_map(|path| ctx.host.read_file(path))
            .collect();
        if !tables.is_empty() {
            return tables.iter().map(|t| count_established_proc(t)).sum();
        }
    }

    ctx.connections.unwrap_or(0)
}

/// Count established sockets with `netstat`. Run by the `connections` task.
pub fn query_connections(host: &dyn HostSource) -> Option<usize> {
    let output = host.run("netstat", &["-an"])?;
    Some(output.lines().filter(|l| l.contains("ESTABLISHED")).count())
}

/// Rows of `/proc/net/tcp*` in state `01` (established).
pub fn count_established_proc(table: &str) -> usize {
    table
        .lines()
        .skip(1)
        .filter(|line| line.split_whitespace().nth(3) == Some("01"))
        .count()
}

/// Query the host's per-interface byte rates. Run by the `host_network` task.
pub fn query_host_rates(host: &dyn HostSource) -> Option<Vec<HostInterfaceRate>> {
    let output = bridge::powershell(host, HOST_COUNTER_SCRIPT)?;
    let rates = parse_host_counters(&output);
    if rates.is_empty() {
        None
    } else {
        Some(rates)
    }
}

/// Lines of `instance|counter path|value`.
pub fn parse_host_counters(output: &str) -> Vec<HostInterfaceRate> {
    let mut rates: Vec<HostInterfaceRate> = Vec::new();

    for line in output.lines() {
        let mut parts = line.trim().splitn(3, '|');
        let (Some(instance), Some(path), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let Ok(value) = value.trim().replace(',', ".").parse::<f64>() else {
            log::debug!("Skipping host counter line: {}", line);
            continue;
        };

        let index = match rates.iter().position(|r| r.name == instance) {
            Some(index) => index,
            None => {
                rates.push(HostInterfaceRate {
                    name: instance.to_string(),
                    rx_per_sec: 0.0,
                    tx_per_sec: 0.0,
                });
                rates.len() - 1
            }
        };

        let path = path.to_lowercase();
        if path.contains("bytes received") {
            rates[index].rx_per_sec = value;
        } else if path.contains("bytes sent") {
            rates[index].tx_per_sec = value;
        }
    }

    rates
}
