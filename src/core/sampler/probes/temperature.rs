//! CPU package temperature.
//!
//! Sources disagree on units. Raw integers are normalized by magnitude:
//! deci-Kelvin (ACPI thermal zones), Kelvin (perf counters) or plain Celsius.

use once_cell::sync::Lazy;
use regex::Regex;

use super::super::environment::{CapabilityHint, EnvironmentProfile};
use super::super::format::round_to;
use super::super::strategy::{ProbeContext, StrategyChain};
use super::bridge;

static LONG_NUMBER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(\d{4,})").ok());
static DECIMAL_NUMBER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)").ok());

const KELVIN_OFFSET: f64 = 273.15;

const WMI_MSACPI: &str = "Get-WmiObject MSAcpi_ThermalZoneTemperature -Namespace 'root/wmi' \
| Select-Object -ExpandProperty CurrentTemperature \
| Select-Object -First 1";

const CIM_MSACPI: &str = "Get-CimInstance -Namespace 'root/wmi' -ClassName MSAcpi_ThermalZoneTemperature \
| Select-Object -ExpandProperty CurrentTemperature \
| Select-Object -First 1";

const PERF_THERMAL_ZONE: &str = "Get-CimInstance -ClassName Win32_PerfFormattedData_Counters_ThermalZoneInformation \
| Select-Object -ExpandProperty Temperature \
| Select-Object -First 1";

const OHM_SENSOR: &str = "Get-WmiObject -Namespace 'root/OpenHardwareMonitor' -Class Sensor \
| Where-Object { $_.SensorType -eq 'Temperature' -and $_.Name -like '*CPU*' } \
| Select-Object -ExpandProperty Value \
| Select-Object -First 1";

/// Interpret an ambiguous raw reading as Celsius.
///
/// `2000 < v < 4000` is deci-Kelvin, `200 < v < 400` Kelvin, `0 < v < 150` Celsius.
/// Anything else is rejected.
pub fn normalize_temperature(raw: f64) -> Option<f64> {
    if raw > 2000.0 && raw < 4000.0 {
        Some(raw / 10.0 - KELVIN_OFFSET)
    } else if raw > 200.0 && raw < 400.0 {
        Some(raw - KELVIN_OFFSET)
    } else if raw > 0.0 && raw < 150.0 {
        Some(raw)
    } else {
        None
    }
}

/// Published precision: one decimal place.
pub fn round_one(celsius: f64) -> f64 {
    round_to(celsius, 1)
}

/// `N/A` when no source produced a reading.
pub fn format_temperature(celsius: Option<f64>) -> String {
    match celsius {
        Some(value) => format!("{:.1}", value),
        None => "N/A".to_string(),
    }
}

pub fn chain(profile: &EnvironmentProfile) -> StrategyChain<f64> {
    let bridge = profile.has(CapabilityHint::HostBridge);
    let sysfs = profile.has(CapabilityHint::SysFs);

    StrategyChain::new("temperature")
        .when(profile.has(CapabilityHint::DesktopTools), "osx_cpu_temp", osx_cpu_temp)
        .when(bridge, "wmi_msacpi", |ctx| host_integer(ctx, WMI_MSACPI))
        .when(bridge, "cim_msacpi", |ctx| host_integer(ctx, CIM_MSACPI))
        .when(bridge, "perf_thermal_zone", |ctx| host_integer(ctx, PERF_THERMAL_ZONE))
        .when(bridge, "ohm_sensor", ohm_sensor)
        .when(bridge, "wmic", wmic)
        .when(sysfs, "thermal_zone", thermal_zone)
        .when(sysfs, "hwmon", hwmon)
        .when(profile.has(CapabilityHint::NativeSampler), "native", native)
}

fn is_digits(raw: &str) -> bool {
    !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit())
}

fn host_integer(ctx: &ProbeContext<'_>, script: &str) -> Option<f64> {
    let raw = bridge::powershell(ctx.host, script)?;
    let raw = raw.trim();
    if !is_digits(raw) {
        log::debug!("Non-integer host temperature: {:?}", raw);
        return None;
    }
    normalize_temperature(raw.parse().ok()?)
}

/// OpenHardwareMonitor already reports Celsius.
fn ohm_sensor(ctx: &ProbeContext<'_>) -> Option<f64> {
    let raw = bridge::powershell(ctx.host, OHM_SENSOR)?;
    let value: f64 = raw.trim().parse().ok()?;
    (value > 0.0).then_some(value)
}

fn wmic(ctx: &ProbeContext<'_>) -> Option<f64> {
    let exe = bridge::resolve_wmic(ctx.host);
    let output = ctx.host.run(
        &exe,
        &[
            "/namespace:\\\\root\\wmi",
            "PATH",
            "MSAcpi_ThermalZoneTemperature",
            "get",
            "CurrentTemperature",
        ],
    )?;

    let regex = LONG_NUMBER.as_ref()?;
    let deci_kelvin: f64 = regex.captures(&output)?.get(1)?.as_str().parse().ok()?;
    if deci_kelvin > 2000.0 && deci_kelvin < 4000.0 {
        Some(deci_kelvin / 10.0 - KELVIN_OFFSET)
    } else {
        None
    }
}

fn read_millidegrees(ctx: &ProbeContext<'_>, path: &str) -> Option<f64> {
    let raw = ctx.host.read_file(path)?;
    let raw = raw.trim();
    if !is_digits(raw) {
        return None;
    }
    raw.parse::<f64>().ok().map(|v| v / 1000.0)
}

fn zone_index(name: &str) -> u32 {
    name.trim_start_matches("thermal_zone").parse().unwrap_or(u32::MAX)
}

/// Package sensors win; otherwise the first zone reporting a positive value.
fn thermal_zone(ctx: &ProbeContext<'_>) -> Option<f64> {
    let base = "/sys/class/thermal";
    let mut zones: Vec<String> = ctx
        .host
        .list_dir(base)
        .into_iter()
        .filter(|name| name.starts_with("thermal_zone"))
        .collect();
    zones.sort_by_key(|name| zone_index(name));

    let mut candidate = None;
    for zone in zones {
        let Some(zone_type) = ctx.host.read_file(&format!("{}/{}/type", base, zone)) else {
            continue;
        };
        let Some(celsius) = read_millidegrees(ctx, &format!("{}/{}/temp", base, zone)) else {
            continue;
        };

        if zone_type.contains("x86_pkg_temp") || zone_type.contains("coretemp") {
            return Some(celsius);
        }
        if candidate.is_none() && celsius > 0.0 {
            candidate = Some(celsius);
        }
    }

    candidate
}

/// First `temp*_input` within a plausible 10 to 150 °C.
fn hwmon(ctx: &ProbeContext<'_>) -> Option<f64> {
    let base = "/sys/class/hwmon";
    for device in ctx.host.list_dir(base) {
        let dir = format!("{}/{}", base, device);
        for file in ctx.host.list_dir(&dir) {
            if !(file.starts_with("temp") && file.ends_with("_input")) {
                continue;
            }
            if let Some(celsius) = read_millidegrees(ctx, &format!("{}/{}", dir, file)) {
                if celsius > 10.0 && celsius < 150.0 {
                    return Some(celsius);
                }
            }
        }
    }
    None
}

fn osx_cpu_temp(ctx: &ProbeContext<'_>) -> Option<f64> {
    let output = ctx.host.run("osx-cpu-temp", &[])?;
    let regex = DECIMAL_NUMBER.as_ref()?;
    let value: f64 = regex.captures(&output)?.get(1)?.as_str().parse().ok()?;
    (value > 0.0).then_some(value)
}

fn native(ctx: &ProbeContext<'_>) -> Option<f64> {
    let sensors = ctx.host.native_temperatures();
    let plausible = |value: f32| value > 0.0 && value < 150.0;

    let preferred = sensors.iter().find(|(label, value)| {
        let label = label.to_lowercase();
        plausible(*value)
            && ["package", "tctl", "cpu", "core"]
                .iter()
                .any(|marker| label.contains(marker))
    });

    preferred
        .or_else(|| sensors.iter().find(|(_, value)| plausible(*value)))
        .map(|(_, value)| f64::from(*value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sampler::environment::EnvironmentKind;
    use crate::platform::{FakeHost, NativeFixture};

    fn wsl_profile() -> EnvironmentProfile {
        EnvironmentProfile::for_kind(EnvironmentKind::TranslationLayer, "")
    }

    #[test]
    fn test_unit_heuristic() {
        assert_eq!(round_one(normalize_temperature(3131.0).unwrap()), 40.0);
        assert!((normalize_temperature(313.0).unwrap() - 39.85).abs() < 1e-9);
        assert_eq!(normalize_temperature(42.0), Some(42.0));
        assert_eq!(normalize_temperature(0.0), None);
        assert_eq!(normalize_temperature(175.0), None);
        assert_eq!(normalize_temperature(5000.0), None);
    }

    #[test]
    fn test_format_temperature() {
        assert_eq!(format_temperature(Some(39.95)), "40.0");
        assert_eq!(format_temperature(None), "N/A");
    }

    #[test]
    fn test_first_host_query_wins() {
        let host = FakeHost::wsl()
            .with_tool("powershell.exe")
            .with_command("powershell.exe", "Get-WmiObject MSAcpi", Some("3131"))
            .with_command("powershell.exe", "Get-CimInstance", Some("313"));
        let profile = wsl_profile();
        let ctx = ProbeContext::new(&host, &profile);

        let result = chain(&profile).run(&ctx);
        assert_eq!(result.strategy(), Some("wmi_msacpi"));
        assert_eq!(host.call_count("Get-CimInstance"), 0);
        assert_eq!(result.value().map(round_one), Some(40.0));
    }

    #[test]
    fn test_non_numeric_output_falls_through_to_ohm() {
        let host = FakeHost::wsl()
            .with_tool("powershell.exe")
            .with_command("powershell.exe", "MSAcpi", Some("Access denied"))
            .with_command("powershell.exe", "ThermalZoneInformation", Some("5000"))
            .with_command("powershell.exe", "OpenHardwareMonitor", Some("55.5"));
        let profile = wsl_profile();
        let ctx = ProbeContext::new(&host, &profile);

        let result = chain(&profile).run(&ctx);
        assert_eq!(result.strategy(), Some("ohm_sensor"));
        assert_eq!(result.value(), Some(55.5));
    }

    #[test]
    fn test_wmic_fallback_extracts_deci_kelvin() {
        let host = FakeHost::wsl()
            .with_file("/mnt/c/Windows/System32/wbem/wmic.exe", "")
            .with_command(
                "/mnt/c/Windows/System32/wbem/wmic.exe",
                "CurrentTemperature",
                Some("CurrentTemperature\r\n3132\r\n"),
            );
        let profile = wsl_profile();
        let ctx = ProbeContext::new(&host, &profile);

        let result = chain(&profile).run(&ctx);
        assert_eq!(result.strategy(), Some("wmic"));
        assert_eq!(result.value().map(round_one), Some(40.1));
    }

    #[test]
    fn test_thermal_zone_prefers_package_sensor() {
        let host = FakeHost::linux()
            .with_file("/sys/class/thermal/thermal_zone0/type", "acpitz")
            .with_file("/sys/class/thermal/thermal_zone0/temp", "27800")
            .with_file("/sys/class/thermal/thermal_zone2/type", "x86_pkg_temp")
            .with_file("/sys/class/thermal/thermal_zone2/temp", "52000");
        let profile = EnvironmentProfile::for_kind(EnvironmentKind::NativeLinux, "");
        let ctx = ProbeContext::new(&host, &profile);

        assert_eq!(chain(&profile).run(&ctx).value(), Some(52.0));

        host.remove_file("/sys/class/thermal/thermal_zone2/temp");
        assert_eq!(chain(&profile).run(&ctx).value(), Some(27.8));
    }

    #[test]
    fn test_hwmon_range_check() {
        let host = FakeHost::linux()
            .with_file("/sys/class/hwmon/hwmon0/temp1_input", "5000")
            .with_file("/sys/class/hwmon/hwmon1/temp1_input", "48000");
        let profile = EnvironmentProfile::for_kind(EnvironmentKind::NativeLinux, "");
        let ctx = ProbeContext::new(&host, &profile);

        let result = chain(&profile).run(&ctx);
        assert_eq!(result.strategy(), Some("hwmon"));
        assert_eq!(result.value(), Some(48.0));
    }

    #[test]
    fn test_native_prefers_cpu_labels() {
        let host = FakeHost::macos().with_native(NativeFixture {
            temperatures: vec![("Battery".into(), 30.0), ("CPU Die".into(), 61.0)],
            ..Default::default()
        });
        let profile = EnvironmentProfile::for_kind(EnvironmentKind::NativeUnix, "");
        let ctx = ProbeContext::new(&host, &profile);

        let result = chain(&profile).run(&ctx);
        assert_eq!(result.strategy(), Some("native"));
        assert_eq!(result.value(), Some(61.0));
    }

    #[test]
    fn test_no_source_is_unavailable() {
        let host = FakeHost::linux();
        let profile = EnvironmentProfile::for_kind(EnvironmentKind::NativeLinux, "");
        let ctx = ProbeContext::new(&host, &profile);
        assert!(chain(&profile).run(&ctx).value().is_none());
    }
}
