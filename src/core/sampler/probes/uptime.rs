//! Seconds since boot.

use super::super::environment::{CapabilityHint, EnvironmentProfile};
use super::super::strategy::StrategyChain;

pub fn chain(profile: &EnvironmentProfile) -> StrategyChain<u64> {
    StrategyChain::new("uptime")
        .when(profile.has(CapabilityHint::ProcFs), "proc_uptime", |ctx| {
            parse_proc_uptime(&ctx.host.read_file("/proc/uptime")?)
        })
        .when(profile.has(CapabilityHint::NativeSampler), "native", |ctx| {
            ctx.host.native_uptime().filter(|secs| *secs > 0)
        })
}

pub fn parse_proc_uptime(content: &str) -> Option<u64> {
    let secs: f64 = content.split_whitespace().next()?.parse().ok()?;
    (secs >= 0.0).then_some(secs as u64)
}
