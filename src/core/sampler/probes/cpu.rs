//! CPU identity, usage and load.

use super::super::environment::{CapabilityHint, EnvironmentProfile};
use super::super::rate::RateState;
use super::super::strategy::{ProbeContext, StrategyChain};

#[derive(Debug, Clone, PartialEq)]
pub struct CpuIdentity {
    pub model: String,
    pub cores: usize,
}

/// Raw usage input. Tick counters need a previous sample; a percentage is used as is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CpuSample {
    Ticks { total: u64, idle: u64 },
    Percent(f32),
}

impl CpuSample {
    /// Turn the sample into a usage percentage, feeding tick counters through `rates`.
    pub fn resolve(self, rates: &mut RateState) -> Option<f32> {
        match self {
            CpuSample::Ticks { total, idle } => rates.update_cpu(total, idle),
            CpuSample::Percent(percent) => Some(percent.clamp(0.0, 100.0)),
        }
    }
}

pub fn identity_chain(profile: &EnvironmentProfile) -> StrategyChain<CpuIdentity> {
    StrategyChain::new("cpu.identity")
        .when(profile.has(CapabilityHint::ProcFs), "proc_cpuinfo", proc_cpuinfo)
        .when(profile.has(CapabilityHint::DesktopTools), "sysctl", sysctl_identity)
        .when(profile.has(CapabilityHint::NativeSampler), "native", |ctx| {
            ctx.host.native_cpu().map(|cpu| CpuIdentity {
                model: cpu.brand,
                cores: cpu.cores,
            })
        })
}

pub fn usage_chain(profile: &EnvironmentProfile) -> StrategyChain<CpuSample> {
    StrategyChain::new("cpu.usage")
        .when(profile.has(CapabilityHint::ProcFs), "proc_stat", |ctx| {
            parse_proc_stat(&ctx.host.read_file("/proc/stat")?)
        })
        .when(profile.has(CapabilityHint::NativeSampler), "native", |ctx| {
            ctx.host.native_cpu_usage().map(CpuSample::Percent)
        })
}

pub fn load_chain(profile: &EnvironmentProfile) -> StrategyChain<f64> {
    StrategyChain::new("cpu.load")
        .when(profile.has(CapabilityHint::ProcFs), "proc_loadavg", |ctx| {
            parse_loadavg(&ctx.host.read_file("/proc/loadavg")?)
        })
        .when(profile.has(CapabilityHint::NativeSampler), "native", |ctx| {
            ctx.host.native_load1()
        })
}

fn proc_cpuinfo(ctx: &ProbeContext<'_>) -> Option<CpuIdentity> {
    parse_cpuinfo(&ctx.host.read_file("/proc/cpuinfo")?)
}

fn sysctl_identity(ctx: &ProbeContext<'_>) -> Option<CpuIdentity> {
    let model = ctx.host.run("sysctl", &["-n", "machdep.cpu.brand_string"])?;
    let cores = ctx
        .host
        .run("sysctl", &["-n", "hw.ncpu"])
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(1);

    Some(CpuIdentity {
        model: model.trim().to_string(),
        cores,
    })
}

pub fn parse_cpuinfo(content: &str) -> Option<CpuIdentity> {
    let mut model = None;
    let mut cores = 0;

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();

        if key == "processor" {
            cores += 1;
        } else if model.is_none() && matches!(key, "model name" | "Model" | "Hardware" | "cpu model") {
            model = Some(value.to_string());
        }
    }

    if cores == 0 {
        return None;
    }

    Some(CpuIdentity {
        model: model.unwrap_or_else(|| "Unknown CPU".to_string()),
        cores,
    })
}

/// Aggregate `cpu` line: total is the first eight fields, idle is idle + iowait.
pub fn parse_proc_stat(content: &str) -> Option<CpuSample> {
    let line = content.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse().ok())
        .collect::<Option<Vec<u64>>>()?;

    if fields.len() < 4 {
        return None;
    }

    let total = fields.iter().sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Some(CpuSample::Ticks { total, idle })
}

/// First number of `/proc/loadavg`.
pub fn parse_loadavg(content: &str) -> Option<f64> {
    content.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sampler::environment::EnvironmentKind;
    use crate::platform::{FakeHost, NativeCpu, NativeFixture};

    const CPUINFO: &str = "processor\t: 0\nmodel name\t: Intel(R) Core(TM) i7-1165G7 @ 2.80GHz\n\nprocessor\t: 1\nmodel name\t: Intel(R) Core(TM) i7-1165G7 @ 2.80GHz\n";

    #[test]
    fn test_parse_cpuinfo() {
        let identity = parse_cpuinfo(CPUINFO).unwrap();
        assert_eq!(identity.model, "Intel(R) Core(TM) i7-1165G7 @ 2.80GHz");
        assert_eq!(identity.cores, 2);
        assert!(parse_cpuinfo("").is_none());
    }

    #[test]
    fn test_parse_proc_stat() {
        let stat = "cpu  100 0 50 800 50 0 0 0 0 0\ncpu0 50 0 25 400 25 0 0 0 0 0\n";
        assert_eq!(
            parse_proc_stat(stat),
            Some(CpuSample::Ticks { total: 1000, idle: 850 })
        );
        assert!(parse_proc_stat("cpu  a b c").is_none());
        assert!(parse_proc_stat("intr 1 2 3").is_none());
    }

    #[test]
    fn test_parse_loadavg_formats() {
        assert_eq!(parse_loadavg("0.52 0.58 0.59 1/389 12345"), Some(0.52));
        assert_eq!(parse_loadavg("bogus 0.1"), None);
        assert_eq!(parse_loadavg(""), None);
    }

    #[test]
    fn test_percent_sample_bypasses_rate_state() {
        let mut rates = RateState::new();
        assert_eq!(CpuSample::Percent(42.0).resolve(&mut rates), Some(42.0));
        assert_eq!(CpuSample::Ticks { total: 10, idle: 5 }.resolve(&mut rates), None);
    }

    #[test]
    fn test_identity_falls_back_to_native() {
        let host = FakeHost::linux().with_native(NativeFixture {
            cpu: Some(NativeCpu {
                brand: "AMD Ryzen 7".into(),
                cores: 16,
            }),
            ..Default::default()
        });
        let profile = EnvironmentProfile::for_kind(EnvironmentKind::NativeLinux, "");
        let ctx = ProbeContext::new(&host, &profile);

        let result = identity_chain(&profile).run(&ctx);
        assert_eq!(result.strategy(), Some("native"));
        assert_eq!(result.value().map(|c| c.cores), Some(16));
    }

    #[test]
    fn test_desktop_ordering_uses_sysctl_for_identity_only() {
        let host = FakeHost::macos()
            .with_command("sysctl", "machdep.cpu.brand_string", Some("Apple M2"))
            .with_command("sysctl", "hw.ncpu", Some("8"))
            .with_native(NativeFixture {
                load1: Some(2.10),
                ..Default::default()
            });
        let profile = EnvironmentProfile::for_kind(EnvironmentKind::NativeUnix, "");
        let ctx = ProbeContext::new(&host, &profile);

        let identity = identity_chain(&profile).run(&ctx).value().unwrap();
        assert_eq!(identity, CpuIdentity { model: "Apple M2".into(), cores: 8 });
        let commands = host.calls().len();

        let load = load_chain(&profile).run(&ctx);
        assert_eq!(load.strategy(), Some("native"));
        assert_eq!(load.value(), Some(2.10));
        assert_eq!(host.calls().len(), commands);
        assert!(!usage_chain(&profile).ids().contains(&"proc_stat"));
    }
}
