use gravity::core::sampler::{MetricSnapshot, Sampler, SOURCE_UNAVAILABLE};
use gravity::platform::{FakeHost, MountEntry, NativeFixture};
use gravity::SamplerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

const GB: u64 = 1_000_000_000;

/// Cycle until every slow probe has reported at least once.
async fn settle(sampler: &mut Sampler) -> Arc<MetricSnapshot> {
    for _ in 0..300 {
        let snapshot = sampler.run_cycle();
        if snapshot.is_settled() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("sampler never settled");
}

fn mount(source: &str, path: &str, fs_type: &str, total: u64, available: u64) -> MountEntry {
    MountEntry {
        source: source.to_string(),
        path: path.to_string(),
        fs_type: fs_type.to_string(),
        total_bytes: total,
        available_bytes: available,
    }
}

#[tokio::test]
async fn test_memory_pressure_raises_alert() {
    let host = FakeHost::linux().with_file(
        "/proc/meminfo",
        "MemTotal:       16777216 kB\nMemFree:          200000 kB\nMemAvailable:    1468006 kB\n",
    );
    let mut sampler = Sampler::new(Arc::new(host), SamplerConfig::default(), Handle::current()).unwrap();

    let snapshot = settle(&mut sampler).await;
    let memory = snapshot.memory.as_ref().unwrap();

    assert_eq!(memory.total_gb, 16.0);
    assert_eq!(memory.used_gb, 14.6);
    assert_eq!(memory.free_gb, 1.4);
    assert_eq!(memory.percent, 91.25);
    assert_eq!(snapshot.alerts, vec!["High Memory Usage: 91%"]);
    assert_eq!(snapshot.source("memory"), Some("proc_meminfo"));
}

#[tokio::test]
async fn test_bridged_mount_reported_once() {
    let native = NativeFixture {
        mounts: vec![
            mount("/dev/sdc", "/", "ext4", 1000 * GB, 50 * GB),
            mount("C:\\", "/mnt/c", "9p", 1000 * GB, 50 * GB),
            mount("none", "/mnt/wsl", "tmpfs", 8 * GB, 8 * GB),
            mount("tmpfs", "/run/user/1000", "tmpfs", GB, GB / 2),
        ],
        ..Default::default()
    };
    let host = FakeHost::wsl().with_native(native);
    let mut sampler = Sampler::new(Arc::new(host), SamplerConfig::default(), Handle::current()).unwrap();

    let snapshot = settle(&mut sampler).await;

    assert_eq!(snapshot.disk.len(), 1);
    assert_eq!(snapshot.disk[0].path, "/");
    assert_eq!(snapshot.disk[0].percent, 95.0);
    assert_eq!(snapshot.disk[0].total, "1 TB");
    assert_eq!(snapshot.alerts, vec!["High Disk Usage: 95% (/)"]);
    assert_eq!(snapshot.source("disk"), Some("native"));
}

#[tokio::test]
async fn test_empty_host_is_valid_output() {
    let mut sampler =
        Sampler::new(Arc::new(FakeHost::linux()), SamplerConfig::default(), Handle::current()).unwrap();

    let snapshot = settle(&mut sampler).await;

    assert!(snapshot.memory.is_none());
    assert!(snapshot.disk.is_empty());
    assert!(snapshot.gpu.is_none());
    assert_eq!(snapshot.alerts, vec!["No alerts"]);
    for domain in ["memory", "disk", "temperature", "gpu", "storage_health", "firmware"] {
        assert_eq!(snapshot.source(domain), Some(SOURCE_UNAVAILABLE), "{}", domain);
    }
}

#[tokio::test]
async fn test_temperature_from_thermal_zone() {
    let host = FakeHost::linux()
        .with_file("/sys/class/thermal/thermal_zone0/type", "acpitz\n")
        .with_file("/sys/class/thermal/thermal_zone0/temp", "27800\n")
        .with_file("/sys/class/thermal/thermal_zone1/type", "x86_pkg_temp\n")
        .with_file("/sys/class/thermal/thermal_zone1/temp", "48512\n");
    let mut sampler = Sampler::new(Arc::new(host), SamplerConfig::default(), Handle::current()).unwrap();

    let snapshot = settle(&mut sampler).await;

    assert_eq!(snapshot.cpu.temperature_c, Some(48.5));
    assert_eq!(snapshot.source("temperature"), Some("thermal_zone"));
}

#[tokio::test]
async fn test_snapshot_serializes_for_readers() {
    let host = FakeHost::linux().with_file("/proc/uptime", "3660.50 100.00\n");
    let mut sampler = Sampler::new(Arc::new(host), SamplerConfig::default(), Handle::current()).unwrap();
    let reader = sampler.reader();

    let published = sampler.run_cycle();
    assert_eq!(reader.latest().cycle, published.cycle);

    let json = serde_json::to_value(reader.latest().as_ref()).unwrap();
    assert_eq!(json["system"]["uptime"], "1h 1m");
    assert_eq!(json["environment"], "native_linux");

    let back: MetricSnapshot = serde_json::from_value(json).unwrap();
    assert_eq!(back.system.uptime_secs, Some(3660));
}

#[tokio::test]
async fn test_lost_source_keeps_last_disk_listing() {
    let native = NativeFixture {
        mounts: vec![mount("/dev/sda1", "/", "ext4", 500 * GB, 400 * GB)],
        ..Default::default()
    };
    let host = Arc::new(FakeHost::linux().with_native(native));
    let mut config = SamplerConfig::default();
    config.cadences.disk = 1;
    let mut sampler = Sampler::new(host.clone(), config, Handle::current()).unwrap();

    let settled = settle(&mut sampler).await;
    assert_eq!(settled.disk.len(), 1);
    assert_eq!(settled.disk[0].percent, 20.0);

    host.update_native(|native| native.mounts.clear());
    let mut last = settled;
    for _ in 0..20 {
        last = sampler.run_cycle();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(sampler.scheduler().has_completed(gravity::core::sampler::TaskId::Disk));
    assert_eq!(last.disk.len(), 1);
    assert_eq!(last.source("disk"), Some("native"));
}
