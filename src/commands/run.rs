use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::sampler::format::format_uptime;
use crate::core::sampler::probes::format_temperature;
use crate::core::sampler::{MetricSnapshot, SamplerRuntime, NO_ALERTS};

use super::config;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = config::resolve(matches)?;
    let json_output = matches.get_flag("json");

    // Shared stop flag
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::Relaxed);
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    let runtime = SamplerRuntime::start(config).context("Failed to start sampler")?;
    let mut reader = runtime.reader();

    if !json_output {
        println!(
            "{} {}",
            "Sampling".cyan().bold(),
            format!("({} environment, Ctrl+C to stop)", runtime.profile().kind).dimmed()
        );
    }

    while running.load(Ordering::Relaxed) {
        let Some(snapshot) = runtime.next_snapshot(&mut reader) else {
            break;
        };

        if json_output {
            println!("{}", serde_json::to_string(snapshot.as_ref())?);
        } else {
            println!("{}", summary_line(&snapshot));
        }
    }

    runtime.shutdown();
    Ok(())
}

/// One line per cycle. Missing values render as `-`.
pub fn summary_line(snapshot: &MetricSnapshot) -> String {
    let cpu = snapshot
        .cpu
        .usage_percent
        .map(|p| format!("{:.1}%", p))
        .unwrap_or_else(|| "-".to_string());

    let memory = snapshot
        .memory
        .as_ref()
        .map(|m| format!("{:.1}/{:.1} GB ({:.0}%)", m.used_gb, m.total_gb, m.percent))
        .unwrap_or_else(|| "-".to_string());

    let network = snapshot
        .network
        .as_ref()
        .map(|n| match n.connections {
            Some(count) => format!("{} connections", count),
            None => format!("down {} up {}", n.down_rate, n.up_rate),
        })
        .unwrap_or_else(|| "-".to_string());

    let uptime = snapshot
        .system
        .uptime_secs
        .map(format_uptime)
        .unwrap_or_else(|| "-".to_string());

    let alerts = snapshot.alerts.join("; ");
    let alerts = if snapshot.alerts.iter().any(|a| a != NO_ALERTS) {
        alerts.red().bold()
    } else {
        alerts.green()
    };

    format!(
        "{} {} {} {} {} {} {} {} {} {} {}",
        format!("#{}", snapshot.cycle).dimmed(),
        "CPU".white().bold(),
        cpu.yellow(),
        format!("{}°C", format_temperature(snapshot.cpu.temperature_c)).yellow(),
        "MEM".white().bold(),
        memory.yellow(),
        "NET".white().bold(),
        network.cyan(),
        "UP".white().bold(),
        uptime.cyan(),
        alerts
    )
}
