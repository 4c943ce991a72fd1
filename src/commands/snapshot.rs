use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use std::time::Duration;

use crate::core::sampler::SamplerRuntime;

use super::config;

/// Cycles to run before printing, so CPU usage and rates have a delta.
const WARMUP_CYCLES: u64 = 2;

pub fn execute(matches: &ArgMatches) -> Result<()> {
    let config = config::resolve(matches)?;
    let timeout = config.cycle_interval() * (WARMUP_CYCLES as u32 + 1) + Duration::from_secs(5);

    let runtime = SamplerRuntime::start(config).context("Failed to start sampler")?;
    let snapshot = runtime.wait_for(timeout, |s| s.cycle >= WARMUP_CYCLES);
    runtime.shutdown();

    let Some(snapshot) = snapshot else {
        bail!("No snapshot was published within {:?}", timeout);
    };

    println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
    Ok(())
}
