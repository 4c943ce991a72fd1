//! Process count and the memory-heaviest processes.

use super::super::environment::{CapabilityHint, EnvironmentProfile};
use super::super::format::round_to;
use super::super::snapshot::ProcessEntry;
use super::super::strategy::{ProbeContext, StrategyChain};

pub fn count_chain(profile: &EnvironmentProfile) -> StrategyChain<usize> {
    StrategyChain::new("process_count")
        .when(profile.has(CapabilityHint::ProcFs), "proc_pids", |ctx| {
            let count = ctx
                .host
                .list_dir("/proc")
                .iter()
                .filter(|name| name.chars().all(|c| c.is_ascii_digit()))
                .count();
            (count > 0).then_some(count)
        })
        .when(profile.has(CapabilityHint::NativeSampler), "native", |ctx| {
            ctx.host.native_process_count().filter(|count| *count > 0)
        })
}

pub fn top_chain(profile: &EnvironmentProfile, limit: usize) -> StrategyChain<Vec<ProcessEntry>> {
    StrategyChain::new("top_processes")
        .when(profile.has(CapabilityHint::NativeSampler), "native", move |ctx| {
            native_top(ctx, limit)
        })
        .when(profile.has(CapabilityHint::ProcFs), "ps_linux", move |ctx| {
            let output = ctx
                .host
                .run("ps", &["-eo", "pid,user,pmem,comm", "--sort=-pmem"])?;
            non_empty(parse_ps(&output, limit))
        })
        .when(profile.has(CapabilityHint::DesktopTools), "ps_bsd", move |ctx| {
            let output = ctx.host.run("ps", &["-Ao", "pid,user,%mem,comm", "-m"])?;
            non_empty(parse_ps(&output, limit))
        })
}

fn non_empty(entries: Vec<ProcessEntry>) -> Option<Vec<ProcessEntry>> {
    (!entries.is_empty()).then_some(entries)
}

fn native_top(ctx: &ProbeContext<'_>, limit: usize) -> Option<Vec<ProcessEntry>> {
    let (total_memory, _) = ctx.host.native_memory()?;
    if total_memory == 0 {
        return None;
    }

    let mut processes = ctx.host.native_processes();
    processes.sort_by(|a, b| b.memory_bytes.cmp(&a.memory_bytes));

    non_empty(
        processes
            .into_iter()
            .take(limit)
            .map(|p| ProcessEntry {
                pid: p.pid,
                user: p.user.unwrap_or_else(|| "?".to_string()),
                mem_percent: round_to(100.0 * p.memory_bytes as f64 / total_memory as f64, 1),
                command: p.command,
            })
            .collect(),
    )
}

/// Header line, then `pid user mem% command` rows already sorted by memory.
pub fn parse_ps(output: &str, limit: usize) -> Vec<ProcessEntry> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let pid = fields.next()?.parse().ok()?;
            let user = fields.next()?.to_string();
            let mem_percent = fields.next()?.replace(',', ".").parse().ok()?;
            let command: Vec<&str> = fields.collect();
            if command.is_empty() {
                return None;
            }
            let command = command.join(" ");
            let command = command.rsplit('/').next().unwrap_or(&command).to_string();

            Some(ProcessEntry {
                pid,
                user,
                mem_percent,
                command,
            })
        })
        .take(limit)
        .collect()
}
