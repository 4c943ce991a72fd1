//! Sampling loop and the tokio runtime hosting it.
//!
//! `Sampler` owns everything mutable: rate state, the scheduler and the snapshot
//! store. `SamplerRuntime` wraps it in a small dedicated runtime and hands out
//! read-only `SnapshotReader`s.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use super::alerts::evaluate_alerts;
use super::environment::{CapabilityHint, EnvironmentProfile};
use super::format::format_uptime;
use super::probes::{self, CpuIdentity, CpuSample, MemoryCounters, NetworkSample};
use super::rate::RateState;
use super::scheduler::{Published, Scheduler, SlowReading, TaskId};
use super::snapshot::{
    CpuSection, MetricSnapshot, SnapshotReader, SnapshotStore, SystemSection, SOURCE_PENDING,
    SOURCE_UNAVAILABLE,
};
use super::strategy::{ProbeContext, ProbeResult, StrategyChain};
use crate::core::config::SamplerConfig;
use crate::error::{GravityError, Result};
use crate::platform::{HostSource, SystemHost};

const IDENTITY_DOMAIN: &str = "cpu.identity";

/// Host rates older than this many host_network cadences are ignored.
const BRIDGE_FRESHNESS_CADENCES: u64 = 3;
const MIN_BRIDGE_WINDOW: u64 = 5;

/// Chains for the probes that run synchronously every cycle.
struct FastChains {
    usage: StrategyChain<CpuSample>,
    load: StrategyChain<f64>,
    memory: StrategyChain<MemoryCounters>,
    network: StrategyChain<NetworkSample>,
    uptime: StrategyChain<u64>,
    process_count: StrategyChain<usize>,
}

impl FastChains {
    fn new(profile: &EnvironmentProfile) -> Self {
        Self {
            usage: probes::cpu::usage_chain(profile),
            load: probes::cpu::load_chain(profile),
            memory: probes::memory::chain(profile),
            network: probes::network::chain(profile),
            uptime: probes::uptime::chain(profile),
            process_count: probes::processes::count_chain(profile),
        }
    }
}

pub struct Sampler {
    host: Arc<dyn HostSource>,
    profile: Arc<EnvironmentProfile>,
    config: SamplerConfig,
    chains: FastChains,
    identity: ProbeResult<CpuIdentity>,
    rates: RateState,
    scheduler: Scheduler,
    store: SnapshotStore,
    cycle: u64,
}

impl Sampler {
    /// Detect the environment and register slow probes.
    ///
    /// Fails only when the environment cannot be classified.
    pub fn new(host: Arc<dyn HostSource>, config: SamplerConfig, runtime: Handle) -> Result<Self> {
        config.validate()?;
        let profile = EnvironmentProfile::detect(host.as_ref(), config.environment_override)?;
        Ok(Self::with_profile(host, profile, config, runtime))
    }

    pub fn with_profile(
        host: Arc<dyn HostSource>,
        profile: EnvironmentProfile,
        config: SamplerConfig,
        runtime: Handle,
    ) -> Self {
        log::info!("Sampling as {} environment", profile.kind);

        let profile = Arc::new(profile);
        let chains = FastChains::new(&profile);

        // CPU identity does not change while running
        let identity = probes::cpu::identity_chain(&profile).run(&ProbeContext::new(host.as_ref(), &profile));

        let mut scheduler = Scheduler::new(runtime);
        register_slow_probes(&mut scheduler, &host, &profile, &config);

        Self {
            host,
            profile,
            config,
            chains,
            identity,
            rates: RateState::new(),
            scheduler,
            store: SnapshotStore::new(),
            cycle: 0,
        }
    }

    pub fn reader(&self) -> SnapshotReader {
        self.store.reader()
    }

    pub fn profile(&self) -> &EnvironmentProfile {
        &self.profile
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Run one full cycle and publish its snapshot.
    pub fn run_cycle(&mut self) -> Arc<MetricSnapshot> {
        self.cycle += 1;
        let cycle = self.cycle;
        let now = Instant::now();

        // Kick off due slow probes first so they overlap with the fast ones
        let started = self.scheduler.tick(cycle);
        if !started.is_empty() {
            log::debug!("Cycle {}: started {:?}", cycle, started);
        }

        let mut snapshot = MetricSnapshot {
            timestamp: chrono::Utc::now().timestamp(),
            cycle,
            environment: self.profile.kind,
            ..Default::default()
        };

        self.sample_fast(&mut snapshot, now);
        self.merge_slow(&mut snapshot);
        snapshot.alerts = evaluate_alerts(&snapshot, &self.config.alerts);

        self.store.publish(snapshot)
    }

    fn sample_fast(&mut self, snapshot: &mut MetricSnapshot, now: Instant) {
        let bridge_published = self.fresh_bridge();
        let bridge = bridge_published.as_ref().and_then(|p| match &p.reading {
            SlowReading::HostNetwork(rates) => Some(rates.as_slice()),
            _ => None,
        });
        let connections = self
            .scheduler
            .latest(TaskId::Connections)
            .and_then(|p| match p.reading {
                SlowReading::Connections(count) => Some(count),
                _ => None,
            });
        let ctx = ProbeContext::new(self.host.as_ref(), &self.profile)
            .with_bridge(bridge)
            .with_connections(connections);
        let sources = &mut snapshot.sources;

        let identity = self.identity.as_value();
        record(sources, IDENTITY_DOMAIN, self.identity.source_label());

        let usage = self.chains.usage.run(&ctx);
        record(sources, self.chains.usage.domain(), usage.source_label());
        let usage_percent = usage.value().and_then(|sample| sample.resolve(&mut self.rates));

        let load = self.chains.load.run(&ctx);
        record(sources, self.chains.load.domain(), load.source_label());

        snapshot.cpu = CpuSection {
            model: identity.map(|i| i.model.clone()),
            cores: identity.map(|i| i.cores),
            usage_percent,
            load1: load.value(),
            temperature_c: None,
        };

        // A zero total means a broken source, let the next strategy answer
        let memory = self.chains.memory.run_until(&ctx, |m| m.total_bytes > 0);
        record(sources, self.chains.memory.domain(), memory.source_label());
        snapshot.memory = memory.value().and_then(probes::memory::compute);

        let network = self.chains.network.run(&ctx);
        record(sources, self.chains.network.domain(), network.source_label());
        snapshot.network = probes::network::compute(network, &self.profile, &mut self.rates, now);

        let uptime = self.chains.uptime.run(&ctx);
        record(sources, self.chains.uptime.domain(), uptime.source_label());
        let uptime_secs = uptime.value();

        let process_count = self.chains.process_count.run(&ctx);
        record(sources, self.chains.process_count.domain(), process_count.source_label());

        snapshot.system = SystemSection {
            uptime: uptime_secs.map(format_uptime),
            uptime_secs,
            process_count: process_count.value(),
        };
    }

    /// Latest host-side rates, unless the bridge task has stopped producing them.
    fn fresh_bridge(&self) -> Option<Arc<Published>> {
        let published = self.scheduler.latest(TaskId::HostNetwork)?;
        let cadence = TaskId::HostNetwork.cadence(&self.config.cadences);
        let window = (cadence * BRIDGE_FRESHNESS_CADENCES).max(MIN_BRIDGE_WINDOW);

        if self.cycle.saturating_sub(published.cycle) <= window {
            Some(published)
        } else {
            log::debug!("Ignoring host rates from cycle {}", published.cycle);
            None
        }
    }

    /// Copy every slow probe's last published value into the snapshot.
    fn merge_slow(&self, snapshot: &mut MetricSnapshot) {
        for id in self.scheduler.task_ids() {
            let Some(published) = self.scheduler.latest(id) else {
                let label = if self.scheduler.has_completed(id) {
                    SOURCE_UNAVAILABLE
                } else {
                    SOURCE_PENDING
                };
                record(&mut snapshot.sources, id.domain(), label.to_string());
                continue;
            };

            record(&mut snapshot.sources, id.domain(), published.strategy.to_string());

            match &published.reading {
                SlowReading::Disk(disks) => snapshot.disk = disks.clone(),
                SlowReading::Temperature(celsius) => {
                    snapshot.cpu.temperature_c = Some(probes::round_one(*celsius))
                }
                SlowReading::TopProcesses(top) => snapshot.top_processes = top.clone(),
                SlowReading::Gpu(gpu) => snapshot.gpu = Some(gpu.clone()),
                SlowReading::StorageHealth(health) => snapshot.storage_health = Some(health.clone()),
                SlowReading::Firmware(firmware) => snapshot.firmware = Some(firmware.clone()),
                SlowReading::HostNetwork(_) | SlowReading::Connections(_) => {}
            }
        }
    }

    /// Cycle at the configured interval until `shutdown` fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.cycle_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.run_cycle();
                    log::trace!("Published snapshot for cycle {}", snapshot.cycle);
                }
                _ = shutdown.recv() => {
                    log::debug!("Sampling loop shutting down after {} cycles", self.cycle);
                    break;
                }
            }
        }
    }
}

fn record(sources: &mut BTreeMap<String, String>, domain: &str, label: String) {
    sources.insert(domain.to_string(), label);
}

fn register_slow_probes(
    scheduler: &mut Scheduler,
    host: &Arc<dyn HostSource>,
    profile: &Arc<EnvironmentProfile>,
    config: &SamplerConfig,
) {
    let cadences = &config.cadences;
    let mut register = |id: TaskId, job: SlowJob| {
        scheduler.register(id, id.cadence(cadences), job);
    };

    register(
        TaskId::Disk,
        chain_job(host, profile, probes::disk::chain(profile), |mounts| {
            SlowReading::Disk(probes::disk::compute(mounts))
        }),
    );
    register(
        TaskId::Temperature,
        chain_job(host, profile, probes::temperature::chain(profile), SlowReading::Temperature),
    );
    register(
        TaskId::TopProcesses,
        chain_job(
            host,
            profile,
            probes::processes::top_chain(profile, config.top_process_count),
            SlowReading::TopProcesses,
        ),
    );
    register(
        TaskId::Gpu,
        chain_job(host, profile, probes::gpu::chain(profile), SlowReading::Gpu),
    );
    register(
        TaskId::StorageHealth,
        chain_job(host, profile, probes::storage::chain(profile), SlowReading::StorageHealth),
    );
    register(
        TaskId::Firmware,
        chain_job(host, profile, probes::firmware::chain(profile), SlowReading::Firmware),
    );

    if profile.has(CapabilityHint::HostBridge) {
        let host = host.clone();
        register(
            TaskId::HostNetwork,
            Box::new(move || match probes::network::query_host_rates(host.as_ref()) {
                Some(rates) => ProbeResult::Found {
                    strategy: "get_counter",
                    value: SlowReading::HostNetwork(rates),
                },
                None => ProbeResult::Unavailable,
            }),
        );
    }

    // Without procfs socket tables the count needs a command, which stays off the fast path
    if !profile.has(CapabilityHint::ProcFs) {
        let host = host.clone();
        register(
            TaskId::Connections,
            Box::new(move || match probes::network::query_connections(host.as_ref()) {
                Some(count) => ProbeResult::Found {
                    strategy: "netstat",
                    value: SlowReading::Connections(count),
                },
                None => ProbeResult::Unavailable,
            }),
        );
    }
}

type SlowJob = Box<dyn Fn() -> ProbeResult<SlowReading> + Send + Sync>;

/// Wrap a strategy chain as a scheduler job over shared host and profile.
fn chain_job<T: 'static>(
    host: &Arc<dyn HostSource>,
    profile: &Arc<EnvironmentProfile>,
    chain: StrategyChain<T>,
    wrap: impl Fn(T) -> SlowReading + Send + Sync + 'static,
) -> SlowJob {
    let host = host.clone();
    let profile = profile.clone();

    Box::new(move || {
        let ctx = ProbeContext::new(host.as_ref(), &profile);
        chain.run(&ctx).map(&wrap)
    })
}

/// Dedicated runtime running the sampling loop in the background.
pub struct SamplerRuntime {
    reader: SnapshotReader,
    profile: EnvironmentProfile,

    /// Shutdown signal sender
    shutdown_tx: broadcast::Sender<()>,

    runtime: tokio::runtime::Runtime,
}

impl SamplerRuntime {
    /// Start sampling the real host.
    pub fn start(config: SamplerConfig) -> Result<Self> {
        let host = Arc::new(SystemHost::new(config.command_timeout()));
        Self::start_with_host(config, host)
    }

    /// Start sampling through any `HostSource`.
    pub fn start_with_host(config: SamplerConfig, host: Arc<dyn HostSource>) -> Result<Self> {
        // Create Tokio runtime with 2 worker threads
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .thread_name("sampler-worker")
            .build()
            .map_err(|e| GravityError::runtime(format!("failed to build runtime: {}", e)))?;

        let sampler = Sampler::new(host, config, runtime.handle().clone())?;
        let reader = sampler.reader();
        let profile = sampler.profile().clone();

        let (shutdown_tx, _) = broadcast::channel::<()>(1);
        runtime.spawn(sampler.run(shutdown_tx.subscribe()));

        Ok(Self {
            reader,
            profile,
            shutdown_tx,
            runtime,
        })
    }

    pub fn reader(&self) -> SnapshotReader {
        self.reader.clone()
    }

    pub fn profile(&self) -> &EnvironmentProfile {
        &self.profile
    }

    pub fn latest(&self) -> Arc<MetricSnapshot> {
        self.reader.latest()
    }

    /// Block until the next snapshot is published. `None` once sampling stopped.
    pub fn next_snapshot(&self, reader: &mut SnapshotReader) -> Option<Arc<MetricSnapshot>> {
        self.runtime.block_on(reader.changed())
    }

    /// Block until a snapshot satisfies `predicate`, or `timeout` passes.
    pub fn wait_for(
        &self,
        timeout: Duration,
        predicate: impl Fn(&MetricSnapshot) -> bool,
    ) -> Option<Arc<MetricSnapshot>> {
        let mut reader = self.reader();
        self.runtime.block_on(async move {
            let current = reader.latest();
            if predicate(current.as_ref()) {
                return Some(current);
            }

            tokio::time::timeout(timeout, async {
                while let Some(snapshot) = reader.changed().await {
                    if predicate(snapshot.as_ref()) {
                        return Some(snapshot);
                    }
                }
                None
            })
            .await
            .ok()
            .flatten()
        })
    }

    /// Stop the loop. Slow probes still blocked on a command are abandoned.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        self.runtime.shutdown_timeout(Duration::from_secs(1));
    }
}
