//! Ordered fallback over independent acquisition strategies.
//!
//! A chain commits to the first strategy that yields a value. Strategies after the
//! winner are never invoked in that run.

use serde::Serialize;

use super::environment::EnvironmentProfile;
use super::probes::network::HostInterfaceRate;
use super::snapshot::SOURCE_UNAVAILABLE;
use crate::platform::HostSource;

/// Outcome of one probe: the winning strategy and its value, or nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ProbeResult<T> {
    Found { strategy: &'static str, value: T },
    Unavailable,
}

impl<T> ProbeResult<T> {
    pub fn value(self) -> Option<T> {
        match self {
            ProbeResult::Found { value, .. } => Some(value),
            ProbeResult::Unavailable => None,
        }
    }

    pub fn as_value(&self) -> Option<&T> {
        match self {
            ProbeResult::Found { value, .. } => Some(value),
            ProbeResult::Unavailable => None,
        }
    }

    pub fn strategy(&self) -> Option<&'static str> {
        match self {
            ProbeResult::Found { strategy, .. } => Some(strategy),
            ProbeResult::Unavailable => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ProbeResult::Found { .. })
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ProbeResult<U> {
        match self {
            ProbeResult::Found { strategy, value } => ProbeResult::Found {
                strategy,
                value: f(value),
            },
            ProbeResult::Unavailable => ProbeResult::Unavailable,
        }
    }

    /// Label written into `MetricSnapshot::sources`.
    pub fn source_label(&self) -> String {
        self.strategy().unwrap_or(SOURCE_UNAVAILABLE).to_string()
    }
}

/// Everything a strategy may look at.
#[derive(Clone, Copy)]
pub struct ProbeContext<'a> {
    pub host: &'a dyn HostSource,
    pub profile: &'a EnvironmentProfile,
    /// Latest host-side interface rates published by the bridge task, if any
    pub bridge: Option<&'a [HostInterfaceRate]>,
    /// Last connection count from the background `connections` task
    pub connections: Option<usize>,
}

impl<'a> ProbeContext<'a> {
    pub fn new(host: &'a dyn HostSource, profile: &'a EnvironmentProfile) -> Self {
        Self {
            host,
            profile,
            bridge: None,
            connections: None,
        }
    }

    pub fn with_bridge(mut self, bridge: Option<&'a [HostInterfaceRate]>) -> Self {
        self.bridge = bridge;
        self
    }

    pub fn with_connections(mut self, connections: Option<usize>) -> Self {
        self.connections = connections;
        self
    }
}

type StrategyFn<T> = Box<dyn Fn(&ProbeContext<'_>) -> Option<T> + Send + Sync>;

pub struct StrategyChain<T> {
    domain: &'static str,
    strategies: Vec<(&'static str, StrategyFn<T>)>,
}

impl<T> StrategyChain<T> {
    pub fn new(domain: &'static str) -> Self {
        Self {
            domain,
            strategies: Vec::new(),
        }
    }

    /// Append a strategy.
    pub fn with<F>(mut self, id: &'static str, strategy: F) -> Self
    where
        F: Fn(&ProbeContext<'_>) -> Option<T> + Send + Sync + 'static,
    {
        self.strategies.push((id, Box::new(strategy)));
        self
    }

    /// Append a strategy only when `enabled`, so orderings can be built from the profile.
    pub fn when<F>(self, enabled: bool, id: &'static str, strategy: F) -> Self
    where
        F: Fn(&ProbeContext<'_>) -> Option<T> + Send + Sync + 'static,
    {
        if enabled {
            self.with(id, strategy)
        } else {
            self
        }
    }

    pub fn domain(&self) -> &'static str {
        self.domain
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|(id, _)| *id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn run(&self, ctx: &ProbeContext<'_>) -> ProbeResult<T> {
        self.run_until(ctx, |_| true)
    }

    /// Like `run`, but a yielded value must also pass `accept` to win.
    ///
    /// A rejected value counts as a failed strategy and the chain moves on.
    pub fn run_until(&self, ctx: &ProbeContext<'_>, accept: impl Fn(&T) -> bool) -> ProbeResult<T> {
        for (id, strategy) in &self.strategies {
            match strategy(ctx) {
                Some(value) if accept(&value) => {
                    log::debug!("{}: strategy '{}' succeeded", self.domain, id);
                    return ProbeResult::Found {
                        strategy: *id,
                        value,
                    };
                }
                Some(_) => log::debug!("{}: strategy '{}' yielded an unusable value", self.domain, id),
                None => log::debug!("{}: strategy '{}' unavailable", self.domain, id),
            }
        }

        log::debug!("{}: no strategy succeeded", self.domain);
        ProbeResult::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sampler::environment::EnvironmentKind;
    use crate::platform::FakeHost;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counted(counter: &Arc<AtomicUsize>, value: Option<u32>) -> impl Fn(&ProbeContext<'_>) -> Option<u32> {
        let counter = counter.clone();
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            value
        }
    }

    #[test]
    fn test_chain_commits_to_first_success() {
        let host = FakeHost::linux();
        let profile = EnvironmentProfile::for_kind(EnvironmentKind::NativeLinux, "");
        let ctx = ProbeContext::new(&host, &profile);

        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let c = Arc::new(AtomicUsize::new(0));

        let chain = StrategyChain::new("test")
            .with("a", counted(&a, None))
            .with("b", counted(&b, Some(2)))
            .with("c", counted(&c, Some(3)));

        let result = chain.run(&ctx);
        assert_eq!(result, ProbeResult::Found { strategy: "b", value: 2 });
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(c.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rejected_value_falls_through() {
        let host = FakeHost::linux();
        let profile = EnvironmentProfile::for_kind(EnvironmentKind::NativeLinux, "");
        let ctx = ProbeContext::new(&host, &profile);

        let chain = StrategyChain::new("test")
            .with("zero", |_| Some(0u32))
            .with("real", |_| Some(7u32));

        let result = chain.run_until(&ctx, |v| *v > 0);
        assert_eq!(result.strategy(), Some("real"));
        assert_eq!(result.value(), Some(7));
    }

    #[test]
    fn test_empty_or_failing_chain_is_unavailable() {
        let host = FakeHost::linux();
        let profile = EnvironmentProfile::for_kind(EnvironmentKind::NativeLinux, "");
        let ctx = ProbeContext::new(&host, &profile);

        let chain: StrategyChain<u32> = StrategyChain::new("test").when(false, "skipped", |_| Some(1));
        assert!(chain.is_empty());

        let result = chain.run(&ctx);
        assert_eq!(result, ProbeResult::Unavailable);
        assert_eq!(result.source_label(), SOURCE_UNAVAILABLE);
    }
}
