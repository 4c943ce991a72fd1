use anyhow::{Context, Result};
use clap::ArgMatches;
use std::path::Path;

use crate::core::sampler::EnvironmentKind;
use crate::core::SamplerConfig;

/// Effective configuration: the file first, then command line overrides.
pub fn resolve(matches: &ArgMatches) -> Result<SamplerConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => SamplerConfig::load_from(Path::new(path))?,
        None => SamplerConfig::load()?,
    };

    if let Some(&interval) = matches.get_one::<u64>("interval-ms") {
        config.cycle_interval_ms = interval;
    }

    if let Some(env) = matches.get_one::<String>("env") {
        let kind: EnvironmentKind = env
            .parse()
            .with_context(|| format!("Invalid --env value '{}'", env))?;
        config.environment_override = Some(kind);
    }

    config
        .validate()
        .context("Invalid sampler configuration")?;

    Ok(config)
}
