//! Real host access: filesystem, external commands and the `sysinfo` sampler.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use sysinfo::{
    Components, CpuRefreshKind, Disks, MemoryRefreshKind, Networks, ProcessRefreshKind,
    ProcessesToUpdate, RefreshKind, System, UpdateKind, Users,
};

use super::command::run_with_timeout;
use super::host::{HostSource, InterfaceCounters, MountEntry, NativeCpu, NativeProcess};
use super::nvidia;
use crate::core::sampler::GpuReading;

/// `HostSource` backed by the running machine.
pub struct SystemHost {
    system: Mutex<System>,
    // Full process table for the top processes task, never locked by the fast path
    process_table: Mutex<System>,
    // Pid-only refreshes for the per-cycle count
    process_ids: Mutex<System>,
    networks: Mutex<Networks>,
    disks: Mutex<Disks>,
    components: Mutex<Components>,
    users: Users,
    // sysinfo needs two refreshes before usage means anything
    cpu_primed: AtomicBool,
    command_timeout: Duration,
}

impl SystemHost {
    pub fn new(command_timeout: Duration) -> Self {
        let refresh_kind = RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());

        Self {
            system: Mutex::new(System::new_with_specifics(refresh_kind)),
            process_table: Mutex::new(System::new()),
            process_ids: Mutex::new(System::new()),
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
            components: Mutex::new(Components::new_with_refreshed_list()),
            users: Users::new_with_refreshed_list(),
            cpu_primed: AtomicBool::new(false),
            command_timeout,
        }
    }
}

impl HostSource for SystemHost {
    fn read_file(&self, path: &str) -> Option<String> {
        fs::read_to_string(path).ok()
    }

    fn read_bytes(&self, path: &str) -> Option<Vec<u8>> {
        fs::read(path).ok()
    }

    fn list_dir(&self, path: &str) -> Vec<String> {
        let Ok(entries) = fs::read_dir(path) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn find_tool(&self, name: &str) -> Option<String> {
        which::which(name)
            .ok()
            .map(|p| p.to_string_lossy().to_string())
    }

    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        run_with_timeout(program, args, self.command_timeout)
    }

    fn kernel_release(&self) -> Option<String> {
        System::kernel_version()
    }

    fn kernel_name(&self) -> String {
        std::env::consts::OS.to_string()
    }

    fn is_privileged(&self) -> bool {
        #[cfg(unix)]
        {
            // SAFETY: geteuid has no preconditions and cannot fail
            unsafe { libc::geteuid() == 0 }
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    fn native_cpu(&self) -> Option<NativeCpu> {
        let mut system = self.system.lock();
        system.refresh_cpu_all();

        let cpus = system.cpus();
        let brand = cpus.first()?.brand().trim().to_string();
        if brand.is_empty() {
            return None;
        }

        Some(NativeCpu {
            brand,
            cores: cpus.len(),
        })
    }

    fn native_cpu_usage(&self) -> Option<f32> {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();

        if !self.cpu_primed.swap(true, Ordering::Relaxed) {
            return None;
        }

        Some(system.global_cpu_usage())
    }

    fn native_load1(&self) -> Option<f64> {
        let load = System::load_average();
        // Platforms without load averages report all zeros
        if load.one == 0.0 && load.five == 0.0 && load.fifteen == 0.0 {
            return None;
        }
        Some(load.one)
    }

    fn native_memory(&self) -> Option<(u64, u64)> {
        let mut system = self.system.lock();
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return None;
        }
        Some((total, system.available_memory()))
    }

    fn native_uptime(&self) -> Option<u64> {
        match System::uptime() {
            0 => None,
            secs => Some(secs),
        }
    }

    fn native_mounts(&self) -> Vec<MountEntry> {
        let mut disks = self.disks.lock();
        disks.refresh(true);

        disks
            .list()
            .iter()
            .map(|disk| MountEntry {
                source: disk.name().to_string_lossy().to_string(),
                path: disk.mount_point().to_string_lossy().to_string(),
                fs_type: disk.file_system().to_string_lossy().to_string(),
                total_bytes: disk.total_space(),
                available_bytes: disk.available_space(),
            })
            .collect()
    }

    fn native_interfaces(&self) -> Vec<InterfaceCounters> {
        let mut networks = self.networks.lock();
        networks.refresh(true);

        networks
            .iter()
            .map(|(name, data)| {
                InterfaceCounters::new(name.clone(), data.total_received(), data.total_transmitted())
            })
            .collect()
    }

    fn native_temperatures(&self) -> Vec<(String, f32)> {
        let mut components = self.components.lock();
        components.refresh(true);

        components
            .iter()
            .filter_map(|comp| comp.temperature().map(|t| (comp.label().to_string(), t)))
            .collect()
    }

    fn native_process_count(&self) -> Option<usize> {
        let mut system = self.process_ids.lock();
        system.refresh_processes_specifics(ProcessesToUpdate::All, true, ProcessRefreshKind::nothing());

        match system.processes().len() {
            0 => None,
            count => Some(count),
        }
    }

    fn native_processes(&self) -> Vec<NativeProcess> {
        let mut system = self.process_table.lock();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_memory()
                .with_user(UpdateKind::OnlyIfNotSet),
        );

        system
            .processes()
            .values()
            .map(|proc| NativeProcess {
                pid: proc.pid().as_u32(),
                user: proc
                    .user_id()
                    .and_then(|uid| self.users.get_user_by_id(uid))
                    .map(|user| user.name().to_string()),
                memory_bytes: proc.memory(),
                command: proc.name().to_string_lossy().to_string(),
            })
            .collect()
    }

    fn native_gpu(&self) -> Option<GpuReading> {
        nvidia::query_nvml(0)
    }
}
