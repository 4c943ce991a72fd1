//! The published per-cycle record and the channel that distributes it.
//!
//! A `MetricSnapshot` is immutable once published. Readers hold an `Arc` and never
//! observe a half-built cycle.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::environment::EnvironmentKind;

/// Label recorded for a slow metric whose first invocation has not finished yet.
pub const SOURCE_PENDING: &str = "pending";
/// Label recorded for a metric no strategy could supply this cycle.
pub const SOURCE_UNAVAILABLE: &str = "unavailable";

/// Complete, immutable metrics snapshot for one sampling cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub timestamp: i64, // Unix timestamp
    pub cycle: u64,
    pub environment: EnvironmentKind,
    pub cpu: CpuSection,
    pub memory: Option<MemoryReading>,
    pub disk: Vec<DiskEntry>,
    pub storage_health: Option<StorageHealth>,
    pub network: Option<NetworkReading>,
    pub gpu: Option<GpuReading>,
    pub firmware: Option<FirmwareInfo>,
    pub system: SystemSection,
    pub top_processes: Vec<ProcessEntry>,
    pub alerts: Vec<String>,
    /// Metric domain -> strategy that produced it (or pending/unavailable)
    pub sources: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuSection {
    pub model: Option<String>,
    pub cores: Option<usize>,
    /// `None` until two tick samples exist
    pub usage_percent: Option<f32>,
    pub load1: Option<f64>,
    pub temperature_c: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryReading {
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskEntry {
    pub path: String,
    pub fs_type: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    /// Human readable, e.g. "512.11 GB"
    pub total: String,
    pub used: String,
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageHealth {
    /// Raw status as reported by the source (e.g. "PASSED", "OK", "Verified")
    pub status: String,
    /// Normalized: Healthy, Warning, Failing or Unknown
    pub health: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficState {
    /// Counters moved since the previous sample
    Active,
    /// Counters present but unchanged; an explicit zero, not missing data
    Idle,
    /// First sample of a counter source, no rate yet
    #[default]
    Warming,
    /// No byte counters at all; only the connection count is known
    ConnectionsOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassRates {
    pub down_bytes_per_sec: f64,
    pub up_bytes_per_sec: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkReading {
    pub state: TrafficState,
    pub down_bytes_per_sec: f64,
    pub up_bytes_per_sec: f64,
    /// Human readable, e.g. "1.25 MB/s"
    pub down_rate: String,
    pub up_rate: String,
    pub wired: Option<ClassRates>,
    pub wireless: Option<ClassRates>,
    pub connections: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuReading {
    pub name: String,
    /// e.g. "1024 / 8192 MiB"
    pub memory: Option<String>,
    pub memory_used_mb: Option<u64>,
    pub memory_total_mb: Option<u64>,
    pub temperature_c: Option<f64>,
    pub utilization_percent: Option<f64>,
}

impl GpuReading {
    pub fn from_parts(
        name: impl Into<String>,
        memory_used_mb: Option<u64>,
        memory_total_mb: Option<u64>,
        temperature_c: Option<f64>,
        utilization_percent: Option<f64>,
    ) -> Self {
        let memory = match (memory_used_mb, memory_total_mb) {
            (Some(used), Some(total)) => Some(format!("{} / {} MiB", used, total)),
            (None, Some(total)) => Some(format!("{} MiB", total)),
            _ => None,
        };

        Self {
            name: name.into(),
            memory,
            memory_used_mb,
            memory_total_mb,
            temperature_c,
            utilization_percent,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FirmwareInfo {
    pub vendor: Option<String>,
    pub version: Option<String>,
    pub date: Option<String>,
    pub serial: Option<String>,
    pub secure_boot: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSection {
    /// e.g. "3d 4h 12m"
    pub uptime: Option<String>,
    pub uptime_secs: Option<u64>,
    pub process_count: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub user: String,
    pub mem_percent: f64,
    pub command: String,
}

impl MetricSnapshot {
    /// True once CPU usage has a delta and every slow probe has reported at least once.
    pub fn is_settled(&self) -> bool {
        self.cycle >= 2 && !self.sources.values().any(|s| s == SOURCE_PENDING)
    }

    pub fn source(&self, domain: &str) -> Option<&str> {
        self.sources.get(domain).map(String::as_str)
    }
}

/// Single-writer store of the latest published snapshot.
///
/// Only the sampling loop owns one; everyone else holds a `SnapshotReader`.
pub struct SnapshotStore {
    tx: watch::Sender<Arc<MetricSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(MetricSnapshot::default()));
        Self { tx }
    }

    /// Replace the published snapshot as one atomic swap.
    pub fn publish(&self, snapshot: MetricSnapshot) -> Arc<MetricSnapshot> {
        let snapshot = Arc::new(snapshot);
        // send_replace succeeds even when no reader is subscribed
        self.tx.send_replace(snapshot.clone());
        snapshot
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read handle for collaborators. Always observes whole snapshots.
#[derive(Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<Arc<MetricSnapshot>>,
}

impl SnapshotReader {
    pub fn latest(&self) -> Arc<MetricSnapshot> {
        self.rx.borrow().clone()
    }

    /// Wait for the next publish. `None` once the sampler is gone.
    pub async fn changed(&mut self) -> Option<Arc<MetricSnapshot>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
