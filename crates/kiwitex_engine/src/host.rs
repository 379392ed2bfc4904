use std::path::Path;
use std::process::{Command, Stdio};

use crate::output::ensure_output_dir;

/// Capabilities the engine consumes from the hosting application.
pub trait HostEnvironment: Send + Sync {
    /// Whether the process may perform a machine-wide installation.
    fn is_elevated(&self) -> bool;

    /// Creates `dir` if needed and confirms it is writable.
    fn check_destination(&self, dir: &Path) -> Result<(), String>;
}

/// The real machine. Elevation is probed once, at construction.
#[derive(Debug, Clone, Copy)]
pub struct NativeHost {
    elevated: bool,
}

impl NativeHost {
    pub fn detect() -> Self {
        Self {
            elevated: probe_elevation(),
        }
    }
}

impl HostEnvironment for NativeHost {
    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn check_destination(&self, dir: &Path) -> Result<(), String> {
        ensure_output_dir(dir).map_err(|e| e.to_string())
    }
}

/// `net session` only succeeds from an elevated prompt.
#[cfg(windows)]
fn probe_elevation() -> bool {
    Command::new("net")
        .arg("session")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(not(windows))]
fn probe_elevation() -> bool {
    Command::new("id")
        .arg("-u")
        .stderr(Stdio::null())
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).trim() == "0")
        .unwrap_or(false)
}
