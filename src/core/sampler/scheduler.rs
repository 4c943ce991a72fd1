//! Multi-cadence background execution for slow probes.
//!
//! Each registered task runs at most one invocation at a time on tokio's blocking pool.
//! Liveness is the invocation's `JoinHandle`: once it is finished (normally or by
//! panicking) the task may start again. Results land in a lock-protected cell that
//! the sampling loop reads every cycle.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::probes::HostInterfaceRate;
use super::snapshot::{DiskEntry, FirmwareInfo, GpuReading, ProcessEntry, StorageHealth};
use super::strategy::ProbeResult;
use crate::core::config::CadenceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskId {
    Disk,
    Temperature,
    TopProcesses,
    Gpu,
    StorageHealth,
    Firmware,
    /// Host-side interface counters feeding the network probe
    HostNetwork,
    /// Established connections on hosts without procfs socket tables
    Connections,
}

impl TaskId {
    /// Key used in `MetricSnapshot::sources`.
    pub fn domain(&self) -> &'static str {
        match self {
            TaskId::Disk => "disk",
            TaskId::Temperature => "temperature",
            TaskId::TopProcesses => "top_processes",
            TaskId::Gpu => "gpu",
            TaskId::StorageHealth => "storage_health",
            TaskId::Firmware => "firmware",
            TaskId::HostNetwork => "host_network",
            TaskId::Connections => "connections",
        }
    }

    pub fn cadence(&self, cadences: &CadenceConfig) -> u64 {
        match self {
            TaskId::Disk => cadences.disk,
            TaskId::Temperature => cadences.temperature,
            TaskId::TopProcesses => cadences.top_processes,
            TaskId::Gpu => cadences.gpu,
            TaskId::StorageHealth => cadences.storage_health,
            TaskId::Firmware => cadences.firmware,
            TaskId::HostNetwork => cadences.host_network,
            TaskId::Connections => cadences.connections,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.domain())
    }
}

/// Value produced by one slow probe invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum SlowReading {
    Disk(Vec<DiskEntry>),
    Temperature(f64),
    TopProcesses(Vec<ProcessEntry>),
    Gpu(GpuReading),
    StorageHealth(StorageHealth),
    Firmware(FirmwareInfo),
    HostNetwork(Vec<HostInterfaceRate>),
    Connections(usize),
}

/// A completed result, tagged with the cycle whose tick started it.
#[derive(Debug, Clone, PartialEq)]
pub struct Published {
    pub cycle: u64,
    pub strategy: &'static str,
    pub reading: SlowReading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Running,
}

type Job = Arc<dyn Fn() -> ProbeResult<SlowReading> + Send + Sync>;

#[derive(Default)]
struct PublishCell {
    published: Option<Arc<Published>>,
    completed_runs: u64,
}

struct ScheduledTask {
    id: TaskId,
    cadence: u64,
    last_triggered: Option<u64>,
    invocation: Option<JoinHandle<()>>,
    cell: Arc<RwLock<PublishCell>>,
    job: Job,
}

impl ScheduledTask {
    fn is_due(&self, cycle: u64) -> bool {
        match self.last_triggered {
            None => true,
            Some(last) => cycle.saturating_sub(last) >= self.cadence,
        }
    }

    fn is_running(&self) -> bool {
        self.invocation.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

pub struct Scheduler {
    runtime: Handle,
    tasks: BTreeMap<TaskId, ScheduledTask>,
}

impl Scheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: BTreeMap::new(),
        }
    }

    /// Register a slow probe. Re-registering an id replaces the previous task.
    pub fn register<F>(&mut self, id: TaskId, cadence: u64, job: F)
    where
        F: Fn() -> ProbeResult<SlowReading> + Send + Sync + 'static,
    {
        log::debug!("Registering task {} every {} cycle(s)", id, cadence);
        self.tasks.insert(
            id,
            ScheduledTask {
                id,
                cadence: cadence.max(1),
                last_triggered: None,
                invocation: None,
                cell: Arc::new(RwLock::new(PublishCell::default())),
                job: Arc::new(job),
            },
        );
    }

    /// Start every due task that is not already running. Never blocks.
    ///
    /// Returns the ids started this tick.
    pub fn tick(&mut self, cycle: u64) -> Vec<TaskId> {
        let mut started = Vec::new();

        for task in self.tasks.values_mut() {
            if !task.is_due(cycle) {
                continue;
            }
            if task.is_running() {
                log::debug!("Task {} still running, not starting it again", task.id);
                continue;
            }

            task.last_triggered = Some(cycle);
            task.invocation = Some(spawn_invocation(&self.runtime, task, cycle));
            started.push(task.id);
        }

        started
    }

    /// Most recent published result, regardless of how old.
    pub fn latest(&self, id: TaskId) -> Option<Arc<Published>> {
        self.tasks.get(&id)?.cell.read().published.clone()
    }

    /// Whether any invocation of `id` has finished, successfully or not.
    pub fn has_completed(&self, id: TaskId) -> bool {
        self.tasks
            .get(&id)
            .is_some_and(|task| task.cell.read().completed_runs > 0)
    }

    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(&id).map(|task| {
            if task.is_running() {
                TaskState::Running
            } else {
                TaskState::Idle
            }
        })
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.keys().copied().collect()
    }
}

fn spawn_invocation(runtime: &Handle, task: &ScheduledTask, cycle: u64) -> JoinHandle<()> {
    let id = task.id;
    let job = task.job.clone();
    let cell = task.cell.clone();

    log::debug!("Starting task {} for cycle {}", id, cycle);

    runtime.spawn_blocking(move || {
        let outcome = catch_unwind(AssertUnwindSafe(|| job()));

        let mut cell = cell.write();
        cell.completed_runs += 1;

        match outcome {
            Ok(ProbeResult::Found { strategy, value }) => {
                let stale = cell.published.as_ref().is_some_and(|p| p.cycle > cycle);
                if stale {
                    log::warn!("Dropping result of task {} from older cycle {}", id, cycle);
                    return;
                }
                cell.published = Some(Arc::new(Published {
                    cycle,
                    strategy,
                    reading: value,
                }));
                log::debug!("Task {} published from '{}'", id, strategy);
            }
            Ok(ProbeResult::Unavailable) => {
                log::debug!("Task {} found no source, keeping previous value", id);
            }
            Err(_) => {
                log::warn!("Task {} panicked, keeping previous value", id);
            }
        }
    })
}
