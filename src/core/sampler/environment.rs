//! Host classification.
//!
//! The kernel release marker is read exactly once at startup. Every probe orders its
//! strategy chain from the resulting profile instead of branching on the OS itself.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GravityError, Result};
use crate::platform::HostSource;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentKind {
    /// Linux userland on a foreign kernel that exposes the physical host (WSL)
    TranslationLayer,
    NativeLinux,
    #[default]
    NativeUnix,
}

/// Data sources a probe may reasonably try in this environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityHint {
    /// Host-side tools reachable through the interop layer (powershell.exe, wmic.exe)
    HostBridge,
    ProcFs,
    SysFs,
    /// macOS-style command line tools (sysctl, system_profiler, diskutil)
    DesktopTools,
    NativeSampler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceClass {
    Loopback,
    Wired,
    Wireless,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentProfile {
    pub kind: EnvironmentKind,
    pub hints: Vec<CapabilityHint>,
    /// Kernel release the classification was made from, empty when overridden
    pub release: String,
    pub wireless_prefixes: Vec<String>,
    pub wireless_markers: Vec<String>,
}

/// Classify a kernel release and kernel name. Never fails.
pub fn classify(release: &str, kernel_name: &str) -> EnvironmentKind {
    let release = release.to_lowercase();
    if release.contains("microsoft") || release.contains("wsl") {
        return EnvironmentKind::TranslationLayer;
    }

    if kernel_name.eq_ignore_ascii_case("linux") {
        EnvironmentKind::NativeLinux
    } else {
        EnvironmentKind::NativeUnix
    }
}

impl EnvironmentProfile {
    /// Detect the environment from the host, or honor an explicit override.
    ///
    /// Without an override, an unreadable release marker is a structural failure.
    pub fn detect(host: &dyn HostSource, override_kind: Option<EnvironmentKind>) -> Result<Self> {
        let release = host.kernel_release();

        let kind = match (override_kind, release.as_deref()) {
            (Some(kind), _) => {
                log::info!("Environment forced to {}", kind);
                kind
            }
            (None, Some(release)) => classify(release, &host.kernel_name()),
            (None, None) => {
                return Err(GravityError::environment(
                    "kernel release marker could not be read",
                ))
            }
        };

        let profile = Self::for_kind(kind, release.unwrap_or_default());
        log::debug!("Environment profile: {:?}", profile);
        Ok(profile)
    }

    pub fn for_kind(kind: EnvironmentKind, release: impl Into<String>) -> Self {
        use CapabilityHint::*;

        let (hints, prefixes, markers): (Vec<CapabilityHint>, &[&str], &[&str]) = match kind {
            EnvironmentKind::TranslationLayer => (
                vec![HostBridge, ProcFs, SysFs, NativeSampler],
                &["wl", "wifi"],
                &["wi-fi", "wireless", "wlan", "802.11"],
            ),
            EnvironmentKind::NativeLinux => (
                vec![ProcFs, SysFs, NativeSampler],
                &["wl", "wifi", "ath"],
                &[],
            ),
            EnvironmentKind::NativeUnix => (
                vec![DesktopTools, NativeSampler],
                &["wl", "awdl", "llw"],
                &["wi-fi", "airport"],
            ),
        };

        Self {
            kind,
            hints,
            release: release.into(),
            wireless_prefixes: prefixes.iter().map(|s| s.to_string()).collect(),
            wireless_markers: markers.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn has(&self, hint: CapabilityHint) -> bool {
        self.hints.contains(&hint)
    }

    /// Classify an interface by name only.
    pub fn classify_interface(&self, name: &str) -> InterfaceClass {
        let lower = name.to_lowercase();

        if lower == "lo" || lower.starts_with("lo0") || lower.contains("loopback") {
            return InterfaceClass::Loopback;
        }

        let wireless = self.wireless_prefixes.iter().any(|p| lower.starts_with(p.as_str()))
            || self.wireless_markers.iter().any(|m| lower.contains(m.as_str()));

        if wireless {
            InterfaceClass::Wireless
        } else {
            InterfaceClass::Wired
        }
    }
}

impl fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnvironmentKind::TranslationLayer => "translation-layer",
            EnvironmentKind::NativeLinux => "linux",
            EnvironmentKind::NativeUnix => "unix",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for EnvironmentKind {
    type Err = GravityError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "wsl" | "translation-layer" | "translation_layer" => Ok(EnvironmentKind::TranslationLayer),
            "linux" | "native-linux" | "native_linux" => Ok(EnvironmentKind::NativeLinux),
            "unix" | "macos" | "darwin" | "native-unix" | "native_unix" => {
                Ok(EnvironmentKind::NativeUnix)
            }
            other => Err(GravityError::config(format!("unknown environment '{}'", other))),
        }
    }
}
