//! Strategy chains for every metric domain.
//!
//! Each module builds its chain from the environment profile and exposes the pure
//! parsers it uses, so raw inputs can be tested without a host.

pub mod bridge;
pub mod cpu;
pub mod disk;
pub mod firmware;
pub mod gpu;
pub mod memory;
pub mod network;
pub mod processes;
pub mod storage;
pub mod temperature;
pub mod uptime;

pub use cpu::{CpuIdentity, CpuSample};
pub use memory::MemoryCounters;
pub use network::{HostInterfaceRate, NetworkSample};
pub use temperature::{format_temperature, normalize_temperature, round_one};
