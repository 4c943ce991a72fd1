use gravity::core::sampler::{evaluate_alerts, DiskEntry, MemoryReading, MetricSnapshot, NO_ALERTS};
use gravity::core::AlertThresholds;

fn disk(path: &str, percent: f64) -> DiskEntry {
    DiskEntry {
        path: path.to_string(),
        percent,
        ..Default::default()
    }
}

#[test]
fn test_memory_and_disk_alerts_together() {
    let snapshot = MetricSnapshot {
        memory: Some(MemoryReading {
            total_gb: 16.0,
            used_gb: 15.2,
            free_gb: 0.8,
            percent: 95.0,
        }),
        disk: vec![disk("/", 93.4)],
        ..Default::default()
    };

    let alerts = evaluate_alerts(&snapshot, &AlertThresholds::default());
    assert_eq!(alerts, vec!["High Memory Usage: 95%", "High Disk Usage: 93% (/)"]);
}

#[test]
fn test_custom_thresholds() {
    let thresholds = AlertThresholds {
        memory_percent: 50.0,
        disk_percent: 99.0,
    };
    let snapshot = MetricSnapshot {
        memory: Some(MemoryReading {
            percent: 60.0,
            ..Default::default()
        }),
        disk: vec![disk("/", 93.4)],
        ..Default::default()
    };

    assert_eq!(evaluate_alerts(&snapshot, &thresholds), vec!["High Memory Usage: 60%"]);
}

#[test]
fn test_evaluation_is_stateless() {
    let thresholds = AlertThresholds::default();
    let hot = MetricSnapshot {
        disk: vec![disk("/", 97.0)],
        ..Default::default()
    };
    let calm = MetricSnapshot::default();

    assert_ne!(evaluate_alerts(&hot, &thresholds), vec![NO_ALERTS]);
    assert_eq!(evaluate_alerts(&calm, &thresholds), vec![NO_ALERTS]);
    assert_ne!(evaluate_alerts(&hot, &thresholds), vec![NO_ALERTS]);
}
