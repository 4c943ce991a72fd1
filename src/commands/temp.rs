use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::sampler::probes::{self, format_temperature, round_one};
use crate::core::sampler::{EnvironmentProfile, ProbeContext};
use crate::platform::SystemHost;

use super::config;

/// Print the CPU temperature once, `N/A` when no source works.
pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = config::resolve(matches)?;
    let debug = matches.get_flag("debug");
    let host = SystemHost::new(config.command_timeout());

    let profile = EnvironmentProfile::detect(&host, config.environment_override)
        .context("Failed to detect environment")?;

    let chain = probes::temperature::chain(&profile);
    if debug {
        eprintln!(
            "{} {}",
            format!("Trying ({} environment):", profile.kind).dimmed(),
            chain.ids().join(" -> ").dimmed()
        );
    }

    let ctx = ProbeContext::new(&host, &profile);
    let result = chain.run(&ctx);

    if debug {
        eprintln!("{} {}", "Source:".dimmed(), result.source_label().dimmed());
    }

    println!("{}", format_temperature(result.value().map(round_one)));
    Ok(())
}
