//! The single seam through which probes touch the operating system.
//!
//! Every strategy receives a `&dyn HostSource` instead of calling `std::fs`,
//! `std::process` or `sysinfo` directly. `SystemHost` is the real implementation;
//! `FakeHost` scripts the same surface for tests.

use serde::{Deserialize, Serialize};

use crate::core::sampler::GpuReading;

/// CPU identity as reported by the native sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeCpu {
    pub brand: String,
    pub cores: usize,
}

/// One mounted filesystem.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MountEntry {
    /// Device or source column (e.g. `/dev/sda1`, `tmpfs`, `drvfs`)
    pub source: String,
    pub path: String,
    pub fs_type: String,
    pub total_bytes: u64,
    pub available_bytes: u64,
}

impl MountEntry {
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }
}

/// Cumulative byte counters for one interface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub name: String,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl InterfaceCounters {
    pub fn new(name: impl Into<String>, rx_bytes: u64, tx_bytes: u64) -> Self {
        Self {
            name: name.into(),
            rx_bytes,
            tx_bytes,
        }
    }
}

/// One row of the native process table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NativeProcess {
    pub pid: u32,
    pub user: Option<String>,
    pub memory_bytes: u64,
    pub command: String,
}

/// Everything a probe strategy may read from the host.
///
/// Methods never fail loudly: an absent source is `None` or an empty list.
pub trait HostSource: Send + Sync {
    fn read_file(&self, path: &str) -> Option<String>;

    fn read_bytes(&self, path: &str) -> Option<Vec<u8>>;

    /// Entry names (not full paths) of a directory, empty if it does not exist.
    fn list_dir(&self, path: &str) -> Vec<String>;

    fn exists(&self, path: &str) -> bool;

    /// Resolve a tool on `PATH`.
    fn find_tool(&self, name: &str) -> Option<String>;

    /// Run an external command with the host's timeout.
    ///
    /// Returns trimmed stdout on a zero exit status with non-empty output.
    fn run(&self, program: &str, args: &[&str]) -> Option<String>;

    /// Kernel release string (the environment marker).
    fn kernel_release(&self) -> Option<String>;

    /// Kernel or OS family name, e.g. `linux` or `macos`.
    fn kernel_name(&self) -> String;

    /// Whether privileged sources (raw block devices, root-only files) are readable.
    fn is_privileged(&self) -> bool;

    // Native sampler (sysinfo on real hosts)

    fn native_cpu(&self) -> Option<NativeCpu>;

    fn native_cpu_usage(&self) -> Option<f32>;

    fn native_load1(&self) -> Option<f64>;

    /// `(total_bytes, available_bytes)`
    fn native_memory(&self) -> Option<(u64, u64)>;

    fn native_uptime(&self) -> Option<u64>;

    fn native_mounts(&self) -> Vec<MountEntry>;

    fn native_interfaces(&self) -> Vec<InterfaceCounters>;

    /// `(label, celsius)` per sensor.
    fn native_temperatures(&self) -> Vec<(String, f32)>;

    /// Number of live processes, refreshing nothing but the pid list.
    fn native_process_count(&self) -> Option<usize>;

    fn native_processes(&self) -> Vec<NativeProcess>;

    /// GPU via a vendor management library, when one is compiled in and loadable.
    fn native_gpu(&self) -> Option<GpuReading>;
}
