//! Delta and rate computation over cumulative counters.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Samples closer together than this never produce a rate.
pub const MIN_RATE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePair {
    pub rx_per_sec: f64,
    pub tx_per_sec: f64,
}

impl RatePair {
    pub fn total(&self) -> f64 {
        self.rx_per_sec + self.tx_per_sec
    }
}

#[derive(Debug, Clone, Copy)]
struct CpuTicks {
    total: u64,
    idle: u64,
}

#[derive(Debug, Clone, Copy)]
struct CounterSample {
    rx: u64,
    tx: u64,
    at: Instant,
}

/// Previous raw counters, owned by the sampling loop.
#[derive(Debug, Default)]
pub struct RateState {
    cpu: Option<CpuTicks>,
    last_usage: Option<f32>,
    interfaces: HashMap<String, CounterSample>,
}

impl RateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed cumulative CPU ticks and get busy percentage.
    ///
    /// The first call has nothing to compare against and returns `None`. When the
    /// total did not advance the previous usage is returned unchanged. The new ticks
    /// always replace the stored ones.
    pub fn update_cpu(&mut self, total: u64, idle: u64) -> Option<f32> {
        let previous = self.cpu.replace(CpuTicks { total, idle });

        let prev = previous?;

        let delta_total = total.saturating_sub(prev.total);
        if delta_total == 0 {
            return self.last_usage;
        }

        let delta_idle = idle.saturating_sub(prev.idle).min(delta_total);
        let usage = (100.0 * (delta_total - delta_idle) as f64 / delta_total as f64) as f32;
        let usage = usage.clamp(0.0, 100.0);

        self.last_usage = Some(usage);
        Some(usage)
    }

    /// Feed cumulative byte counters for one interface key.
    ///
    /// `None` on the first sample of a key and whenever less than
    /// `MIN_RATE_INTERVAL` passed; in the latter case the stored sample is kept so
    /// the next call measures the longer window. A counter that went backwards
    /// (interface reset) contributes a zero delta.
    pub fn update_network(&mut self, key: &str, rx: u64, tx: u64, now: Instant) -> Option<RatePair> {
        let current = CounterSample { rx, tx, at: now };

        let Some(prev) = self.interfaces.get(key).copied() else {
            self.interfaces.insert(key.to_string(), current);
            return None;
        };

        let elapsed = now.saturating_duration_since(prev.at);
        if elapsed <= MIN_RATE_INTERVAL {
            return None;
        }

        self.interfaces.insert(key.to_string(), current);

        let secs = elapsed.as_secs_f64();
        Some(RatePair {
            rx_per_sec: rx.saturating_sub(prev.rx) as f64 / secs,
            tx_per_sec: tx.saturating_sub(prev.tx) as f64 / secs,
        })
    }

    /// Drop interface keys not seen in `keep`, so vanished interfaces do not linger.
    pub fn retain_interfaces<'a>(&mut self, prefix: &str, keep: impl IntoIterator<Item = &'a str>) {
        let keep: Vec<&str> = keep.into_iter().collect();
        self.interfaces
            .retain(|key, _| !key.starts_with(prefix) || keep.contains(&key.as_str()));
    }

    pub fn tracked_interfaces(&self) -> usize {
        self.interfaces.len()
    }
}
