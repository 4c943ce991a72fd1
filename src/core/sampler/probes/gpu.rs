//! Discrete or integrated GPU identity and load.

use super::super::environment::{CapabilityHint, EnvironmentProfile};
use super::super::snapshot::GpuReading;
use super::super::strategy::{ProbeContext, StrategyChain};
use super::bridge;

const NVIDIA_SMI: &str = "nvidia-smi";
const WSL_NVIDIA_SMI: &str = "/usr/lib/wsl/lib/nvidia-smi";
const NVIDIA_SMI_QUERY: &str = "--query-gpu=name,memory.used,memory.total,temperature.gpu,utilization.gpu";

const VIDEO_CONTROLLER_SCRIPT: &str =
    "Get-CimInstance Win32_VideoController | Select-Object Name, AdapterRAM | ConvertTo-Json";

pub fn chain(profile: &EnvironmentProfile) -> StrategyChain<GpuReading> {
    StrategyChain::new("gpu")
        .when(profile.has(CapabilityHint::NativeSampler), "nvml", |ctx| ctx.host.native_gpu())
        .when(!profile.has(CapabilityHint::DesktopTools), "nvidia_smi", nvidia_smi)
        .when(profile.has(CapabilityHint::HostBridge), "host_video_controller", host_video_controller)
        .when(profile.has(CapabilityHint::SysFs), "sysfs_drm", sysfs_drm)
        .when(profile.has(CapabilityHint::DesktopTools), "system_profiler", system_profiler)
}

fn nvidia_smi(ctx: &ProbeContext<'_>) -> Option<GpuReading> {
    let exe = ctx.host.find_tool(NVIDIA_SMI).or_else(|| {
        ctx.host
            .exists(WSL_NVIDIA_SMI)
            .then(|| WSL_NVIDIA_SMI.to_string())
    })?;

    let output = ctx
        .host
        .run(&exe, &[NVIDIA_SMI_QUERY, "--format=csv,noheader,nounits"])?;
    parse_nvidia_smi(&output)
}

/// First CSV row of `name, memory.used, memory.total, temperature.gpu, utilization.gpu`.
pub fn parse_nvidia_smi(output: &str) -> Option<GpuReading> {
    let line = output.lines().next()?;
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    let name = fields.first().filter(|n| !n.is_empty())?;

    let number = |index: usize| fields.get(index).and_then(|v| v.parse::<f64>().ok());

    Some(GpuReading::from_parts(
        *name,
        number(1).map(|v| v as u64),
        number(2).map(|v| v as u64),
        number(3),
        number(4),
    ))
}

fn host_video_controller(ctx: &ProbeContext<'_>) -> Option<GpuReading> {
    let value = bridge::powershell_json(ctx.host, VIDEO_CONTROLLER_SCRIPT)?;
    parse_video_controllers(&value)
}

/// Prefer a real adapter over the basic display driver.
pub fn parse_video_controllers(value: &serde_json::Value) -> Option<GpuReading> {
    let adapters: Vec<(&str, Option<u64>)> = bridge::json_items(value)
        .into_iter()
        .filter_map(|item| {
            let name = item.get("Name")?.as_str()?;
            let ram = item.get("AdapterRAM").and_then(|v| v.as_u64());
            Some((name, ram))
        })
        .collect();

    let (name, ram) = adapters
        .iter()
        .find(|(name, _)| !name.contains("Microsoft Basic"))
        .or_else(|| adapters.first())?;

    Some(GpuReading::from_parts(
        *name,
        None,
        ram.map(|bytes| bytes / (1024 * 1024)),
        None,
        None,
    ))
}

fn vendor_name(id: &str) -> Option<&'static str> {
    match id.trim().to_lowercase().as_str() {
        "0x1002" => Some("AMD"),
        "0x10de" => Some("NVIDIA"),
        "0x8086" => Some("Intel"),
        _ => None,
    }
}

/// amdgpu and i915 expose identity, VRAM and load under `/sys/class/drm/cardN/device`.
fn sysfs_drm(ctx: &ProbeContext<'_>) -> Option<GpuReading> {
    let base = "/sys/class/drm";
    let mut cards: Vec<String> = ctx
        .host
        .list_dir(base)
        .into_iter()
        .filter(|name| name.starts_with("card") && !name.contains('-'))
        .collect();
    cards.sort();

    cards.into_iter().find_map(|card| {
        let device = format!("{}/{}/device", base, card);
        let vendor = vendor_name(&ctx.host.read_file(&format!("{}/vendor", device))?)?;

        let read_u64 = |file: &str| -> Option<u64> {
            ctx.host
                .read_file(&format!("{}/{}", device, file))?
                .trim()
                .parse()
                .ok()
        };
        let mib = |bytes: u64| bytes / (1024 * 1024);

        let temperature = ctx
            .host
            .list_dir(&format!("{}/hwmon", device))
            .first()
            .and_then(|hwmon| read_u64(&format!("hwmon/{}/temp1_input", hwmon)))
            .map(|milli| milli as f64 / 1000.0);

        Some(GpuReading::from_parts(
            format!("{} GPU ({})", vendor, card),
            read_u64("mem_info_vram_used").map(mib),
            read_u64("mem_info_vram_total").map(mib),
            temperature,
            read_u64("gpu_busy_percent").map(|p| p as f64),
        ))
    })
}

fn system_profiler(ctx: &ProbeContext<'_>) -> Option<GpuReading> {
    let output = ctx.host.run("system_profiler", &["SPDisplaysDataType", "-json"])?;
    let value: serde_json::Value = serde_json::from_str(&output).ok()?;
    parse_system_profiler_displays(&value)
}

pub fn parse_system_profiler_displays(value: &serde_json::Value) -> Option<GpuReading> {
    let display = value.get("SPDisplaysDataType")?.as_array()?.first()?;
    let name = display
        .get("sppci_model")
        .or_else(|| display.get("_name"))?
        .as_str()?;

    let vram = display
        .get("spdisplays_vram")
        .or_else(|| display.get("spdisplays_vram_shared"))
        .and_then(|v| v.as_str())
        .and_then(parse_vram_label);

    Some(GpuReading::from_parts(name, None, vram, None, None))
}

/// `1536 MB` or `8 GB` to MiB.
fn parse_vram_label(label: &str) -> Option<u64> {
    let mut parts = label.split_whitespace();
    let amount: u64 = parts.next()?.parse().ok()?;
    match parts.next()?.to_uppercase().as_str() {
        "MB" => Some(amount),
        "GB" => Some(amount * 1024),
        _ => None,
    }
}
