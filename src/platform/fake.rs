//! Scripted `HostSource` for tests and environment simulation.
//!
//! Files, commands and native readings are all in memory and can be changed between
//! sampling cycles. Every command invocation is recorded so tests can assert which
//! strategies actually ran.

use std::collections::{BTreeSet, HashMap};

use parking_lot::{Mutex, RwLock};

use super::host::{HostSource, InterfaceCounters, MountEntry, NativeCpu, NativeProcess};
use crate::core::sampler::GpuReading;

/// Native sampler readings served by `FakeHost`.
#[derive(Debug, Clone, Default)]
pub struct NativeFixture {
    pub cpu: Option<NativeCpu>,
    pub cpu_usage: Option<f32>,
    pub load1: Option<f64>,
    pub memory: Option<(u64, u64)>,
    pub uptime: Option<u64>,
    pub mounts: Vec<MountEntry>,
    pub interfaces: Vec<InterfaceCounters>,
    pub temperatures: Vec<(String, f32)>,
    pub processes: Vec<NativeProcess>,
    pub gpu: Option<GpuReading>,
}

struct ScriptedCommand {
    program: String,
    needle: String,
    output: Option<String>,
}

/// Minimal fake host used in tests to script reads and commands.
pub struct FakeHost {
    files: RwLock<HashMap<String, String>>,
    bytes: RwLock<HashMap<String, Vec<u8>>>,
    commands: RwLock<Vec<ScriptedCommand>>,
    tools: BTreeSet<String>,
    native: RwLock<NativeFixture>,
    calls: Mutex<Vec<String>>,
    release: Option<String>,
    kernel: String,
    privileged: bool,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            bytes: RwLock::new(HashMap::new()),
            commands: RwLock::new(Vec::new()),
            tools: BTreeSet::new(),
            native: RwLock::new(NativeFixture::default()),
            calls: Mutex::new(Vec::new()),
            release: None,
            kernel: "linux".to_string(),
            privileged: false,
        }
    }
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A native Linux kernel identity.
    pub fn linux() -> Self {
        Self::default().with_kernel("5.15.0-91-generic", "linux")
    }

    /// A WSL2 kernel identity.
    pub fn wsl() -> Self {
        Self::default().with_kernel("5.15.153.1-microsoft-standard-WSL2", "linux")
    }

    /// A Darwin kernel identity.
    pub fn macos() -> Self {
        Self::default().with_kernel("23.1.0", "macos")
    }

    pub fn with_kernel(mut self, release: &str, kernel: &str) -> Self {
        self.release = Some(release.to_string());
        self.kernel = kernel.to_string();
        self
    }

    pub fn without_release(mut self) -> Self {
        self.release = None;
        self
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.set_file(path, content);
        self
    }

    pub fn with_bytes(self, path: &str, content: &[u8]) -> Self {
        self.bytes.write().insert(path.to_string(), content.to_vec());
        self
    }

    /// Make `name` resolvable on `PATH` as `/usr/bin/<name>`.
    pub fn with_tool(mut self, name: &str) -> Self {
        self.tools.insert(name.to_string());
        self
    }

    /// Script the output of `program` when its joined arguments contain `needle`.
    ///
    /// The first matching script wins. `None` output simulates a failing command.
    pub fn with_command(self, program: &str, needle: &str, output: Option<&str>) -> Self {
        self.commands.write().push(ScriptedCommand {
            program: program.to_string(),
            needle: needle.to_string(),
            output: output.map(str::to_string),
        });
        self
    }

    pub fn with_native(self, native: NativeFixture) -> Self {
        *self.native.write() = native;
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn set_file(&self, path: &str, content: &str) {
        self.files.write().insert(path.to_string(), content.to_string());
    }

    pub fn remove_file(&self, path: &str) {
        self.files.write().remove(path);
    }

    pub fn update_native(&self, update: impl FnOnce(&mut NativeFixture)) {
        update(&mut self.native.write());
    }

    /// Every command run so far, as `program arg1 arg2 ...`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, needle: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.contains(needle)).count()
    }

    fn bin_path(name: &str) -> String {
        format!("/usr/bin/{}", name)
    }
}

impl HostSource for FakeHost {
    fn read_file(&self, path: &str) -> Option<String> {
        self.files.read().get(path).cloned()
    }

    fn read_bytes(&self, path: &str) -> Option<Vec<u8>> {
        if let Some(bytes) = self.bytes.read().get(path) {
            return Some(bytes.clone());
        }
        self.read_file(path).map(String::into_bytes)
    }

    fn list_dir(&self, path: &str) -> Vec<String> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let files = self.files.read();
        let bytes = self.bytes.read();

        let names: BTreeSet<String> = files
            .keys()
            .chain(bytes.keys())
            .filter_map(|p| p.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        names.into_iter().collect()
    }

    fn exists(&self, path: &str) -> bool {
        let path = path.trim_end_matches('/');
        if self.files.read().contains_key(path) || self.bytes.read().contains_key(path) {
            return true;
        }
        if self.tools.iter().any(|t| Self::bin_path(t) == path) {
            return true;
        }
        !self.list_dir(path).is_empty()
    }

    fn find_tool(&self, name: &str) -> Option<String> {
        self.tools.contains(name).then(|| Self::bin_path(name))
    }

    fn run(&self, program: &str, args: &[&str]) -> Option<String> {
        let joined = args.join(" ");
        self.calls.lock().push(format!("{} {}", program, joined).trim().to_string());

        let name = program.rsplit('/').next().unwrap_or(program);
        self.commands
            .read()
            .iter()
            .find(|c| (c.program == program || c.program == name) && joined.contains(&c.needle))
            .and_then(|c| c.output.clone())
    }

    fn kernel_release(&self) -> Option<String> {
        self.release.clone()
    }

    fn kernel_name(&self) -> String {
        self.kernel.clone()
    }

    fn is_privileged(&self) -> bool {
        self.privileged
    }

    fn native_cpu(&self) -> Option<NativeCpu> {
        self.native.read().cpu.clone()
    }

    fn native_cpu_usage(&self) -> Option<f32> {
        self.native.read().cpu_usage
    }

    fn native_load1(&self) -> Option<f64> {
        self.native.read().load1
    }

    fn native_memory(&self) -> Option<(u64, u64)> {
        self.native.read().memory
    }

    fn native_uptime(&self) -> Option<u64> {
        self.native.read().uptime
    }

    fn native_mounts(&self) -> Vec<MountEntry> {
        self.native.read().mounts.clone()
    }

    fn native_interfaces(&self) -> Vec<InterfaceCounters> {
        self.native.read().interfaces.clone()
    }

    fn native_temperatures(&self) -> Vec<(String, f32)> {
        self.native.read().temperatures.clone()
    }

    fn native_process_count(&self) -> Option<usize> {
        let count = self.native.read().processes.len();
        (count > 0).then_some(count)
    }

    fn native_processes(&self) -> Vec<NativeProcess> {
        self.native.read().processes.clone()
    }

    fn native_gpu(&self) -> Option<GpuReading> {
        self.native.read().gpu.clone()
    }
}
