use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;

use crate::core::sampler::EnvironmentProfile;
use crate::platform::SystemHost;

use super::config;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = config::resolve(matches)?;
    let host = SystemHost::new(config.command_timeout());

    let profile = EnvironmentProfile::detect(&host, config.environment_override)
        .context("Failed to detect environment")?;

    println!("{} {}", "Environment:".white().bold(), profile.kind.to_string().cyan().bold());

    if !profile.release.is_empty() {
        println!("{} {}", "Kernel release:".white(), profile.release);
    }

    let hints: Vec<String> = profile.hints.iter().map(|h| format!("{:?}", h)).collect();
    println!("{} {}", "Capabilities:".white(), hints.join(", ").yellow());
    println!(
        "{} {}",
        "Wireless prefixes:".white(),
        profile.wireless_prefixes.join(", ").dimmed()
    );

    if !profile.wireless_markers.is_empty() {
        println!(
            "{} {}",
            "Wireless markers:".white(),
            profile.wireless_markers.join(", ").dimmed()
        );
    }

    Ok(())
}
