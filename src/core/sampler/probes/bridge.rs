//! Host-side tools reached through the translation layer's interop.

use crate::platform::HostSource;

const POWERSHELL: &str = "powershell.exe";
const POWERSHELL_PATHS: &[&str] = &[
    "/mnt/c/Windows/System32/WindowsPowerShell/v1.0/powershell.exe",
    "/mnt/c/Windows/System32/powershell.exe",
];

const WMIC: &str = "wmic.exe";
const WMIC_PATH: &str = "/mnt/c/Windows/System32/wbem/wmic.exe";

/// Resolve the host PowerShell: `PATH` first, then the well-known mount locations.
pub fn resolve_powershell(host: &dyn HostSource) -> Option<String> {
    if let Some(path) = host.find_tool(POWERSHELL) {
        return Some(path);
    }

    POWERSHELL_PATHS
        .iter()
        .find(|path| host.exists(path))
        .map(|path| path.to_string())
}

/// Run one PowerShell command string on the host.
pub fn powershell(host: &dyn HostSource, script: &str) -> Option<String> {
    let exe = resolve_powershell(host)?;
    host.run(&exe, &["-NoProfile", "-NonInteractive", "-Command", script])
}

/// Run a PowerShell pipeline and parse its `ConvertTo-Json` output.
pub fn powershell_json(host: &dyn HostSource, script: &str) -> Option<serde_json::Value> {
    let raw = powershell(host, script)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::debug!("Unparseable PowerShell JSON: {}", e);
            None
        }
    }
}

pub fn resolve_wmic(host: &dyn HostSource) -> String {
    if host.exists(WMIC_PATH) {
        WMIC_PATH.to_string()
    } else {
        WMIC.to_string()
    }
}

/// Single objects come back as a JSON object, several as an array.
pub fn json_items(value: &serde_json::Value) -> Vec<&serde_json::Value> {
    match value {
        serde_json::Value::Array(items) => items.iter().collect(),
        serde_json::Value::Null => Vec::new(),
        other => vec![other],
    }
}
