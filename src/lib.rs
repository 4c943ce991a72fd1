// Gravity Library - Public API

// Re-export error types
pub mod error;
pub use error::{GravityError, Result};

// Module declarations
pub mod commands;
pub mod core;
pub mod platform;

// Re-export commonly used types
pub use core::config::SamplerConfig;
pub use core::sampler::{MetricSnapshot, SamplerRuntime, SnapshotReader};

// Initialize logging
pub fn init_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
