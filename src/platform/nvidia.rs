use crate::core::sampler::GpuReading;

#[cfg(feature = "nvml")]
use nvml_wrapper::{enum_wrappers::device::TemperatureSensor, Nvml};
#[cfg(feature = "nvml")]
use once_cell::sync::Lazy;

/// Singleton - NVML must be initialized ONCE only
///
/// NVML is the library nvidia-smi itself uses; querying it avoids spawning a process
/// on every GPU cadence tick.
#[cfg(feature = "nvml")]
static NVML: Lazy<Option<Nvml>> = Lazy::new(|| Nvml::init().ok());

/// Query one NVIDIA device through NVML.
///
/// `None` when the feature is disabled, the driver is missing, or the index is invalid.
pub fn query_nvml(device_index: u32) -> Option<GpuReading> {
    #[cfg(feature = "nvml")]
    {
        let nvml = NVML.as_ref()?;
        let device = match nvml.device_by_index(device_index) {
            Ok(device) => device,
            Err(e) => {
                log::debug!("NVML device {} unavailable: {}", device_index, e);
                return None;
            }
        };

        let name = device
            .name()
            .unwrap_or_else(|_| "Unknown NVIDIA GPU".to_string());

        let memory = device.memory_info().ok();
        let temperature = device.temperature(TemperatureSensor::Gpu).ok();
        let utilization = device.utilization_rates().ok().map(|u| u.gpu);

        Some(GpuReading::from_parts(
            name,
            memory.as_ref().map(|m| m.used / (1024 * 1024)),
            memory.as_ref().map(|m| m.total / (1024 * 1024)),
            temperature.map(f64::from),
            utilization.map(f64::from),
        ))
    }
    #[cfg(not(feature = "nvml"))]
    {
        let _ = device_index;
        None
    }
}
