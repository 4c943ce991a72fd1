// Core business logic module

pub mod config;
pub mod sampler;

// Re-export commonly used items
pub use config::{AlertThresholds, CadenceConfig, SamplerConfig};
pub use sampler::{MetricSnapshot, SamplerRuntime, SnapshotReader};
