//! Human readable renderings for published values.

use humansize::{format_size, DECIMAL};

pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_size(bytes_per_sec.max(0.0).round() as u64, DECIMAL))
}

/// `Nd Nh Nm`, leading zero units omitted.
pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(3_660), "1h 1m");
        assert_eq!(format_uptime(3 * 86_400 + 4 * 3_600 + 12 * 60 + 5), "3d 4h 12m");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(0.0), "0 B/s");
        assert_eq!(format_rate(1_250_000.0), "1.25 MB/s");
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(39.95, 1), 40.0);
        assert_eq!(round_to(91.254, 2), 91.25);
    }
}
