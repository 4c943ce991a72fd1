//! Alert evaluation for critical conditions.
//!
//! Checks a finished snapshot against configurable thresholds and produces the
//! alert lines published with it.

use super::snapshot::MetricSnapshot;
use crate::core::config::AlertThresholds;

/// Published in place of an empty alert list.
pub const NO_ALERTS: &str = "No alerts";

/// Evaluate a snapshot and generate alert lines. Pure.
pub fn evaluate_alerts(snapshot: &MetricSnapshot, thresholds: &AlertThresholds) -> Vec<String> {
    let mut alerts = Vec::new();

    // Memory alerts
    if let Some(ref memory) = snapshot.memory {
        if memory.percent > thresholds.memory_percent {
            alerts.push(format!("High Memory Usage: {:.0}%", memory.percent));
        }
    }

    // Disk alerts, first offending mount only
    if let Some(disk) = snapshot
        .disk
        .iter()
        .find(|disk| disk.percent > thresholds.disk_percent)
    {
        alerts.push(format!("High Disk Usage: {:.0}% ({})", disk.percent, disk.path));
    }

    if alerts.is_empty() {
        alerts.push(NO_ALERTS.to_string());
    }

    alerts
}
