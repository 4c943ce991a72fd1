//! Host telemetry sampling.
//!
//! A fixed-interval loop runs cheap probes inline and hands slow ones to a
//! multi-cadence scheduler. Each cycle ends with one immutable `MetricSnapshot`
//! published for any number of readers.

pub mod alerts;
pub mod environment;
pub mod format;
pub mod probes;
pub mod rate;
pub mod runtime;
pub mod scheduler;
pub mod snapshot;
pub mod strategy;

pub use alerts::{evaluate_alerts, NO_ALERTS};
pub use environment::{CapabilityHint, EnvironmentKind, EnvironmentProfile, InterfaceClass};
pub use runtime::{Sampler, SamplerRuntime};
pub use scheduler::{Published, Scheduler, SlowReading, TaskId, TaskState};
pub use snapshot::{
    ClassRates, CpuSection, DiskEntry, FirmwareInfo, GpuReading, MemoryReading, MetricSnapshot,
    NetworkReading, ProcessEntry, SnapshotReader, SnapshotStore, StorageHealth, SystemSection,
    TrafficState, SOURCE_PENDING, SOURCE_UNAVAILABLE,
};
pub use strategy::{ProbeContext, ProbeResult, StrategyChain};
