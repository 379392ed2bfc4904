use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Placeholder in installer arguments replaced by the install directory.
pub const INSTALL_DIR_PLACEHOLDER: &str = "{install_dir}";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub detect_timeout_secs: u64,
    pub install_timeout_secs: u64,
    /// Applies to each compiler pass separately.
    pub compile_timeout_secs: u64,
    pub keep_auxiliary_files: bool,
    pub toolchain: ToolchainSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            detect_timeout_secs: 15,
            install_timeout_secs: 60 * 60,
            compile_timeout_secs: 5 * 60,
            keep_auxiliary_files: false,
            toolchain: ToolchainSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn detect_timeout(&self) -> Duration {
        Duration::from_secs(self.detect_timeout_secs)
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }
}

/// Where the toolchain lives and how its executables are invoked.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    pub install_dir: PathBuf,
    /// Directory holding the compiler, relative to `install_dir`.
    pub bin_subdir: PathBuf,
    /// Compiler executable name without platform suffix.
    pub compiler: String,
    pub version_args: Vec<String>,
    /// Passed to every compiler pass before the output directory and source.
    pub compiler_args: Vec<String>,
    /// Unattended installer. Relative paths are resolved by the caller.
    pub installer: PathBuf,
    pub installer_args: Vec<String>,
    pub install_requires_elevation: bool,
    /// Also look for the compiler on `PATH`.
    pub search_system_path: bool,
}

#[cfg(windows)]
impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from(r"C:\Program Files\MiKTeX"),
            bin_subdir: PathBuf::from(r"miktex\bin\x64"),
            compiler: "pdflatex".to_string(),
            version_args: vec!["--version".to_string()],
            compiler_args: default_compiler_args(),
            installer: PathBuf::from(r"requirements\basic-miktex-x64.exe"),
            installer_args: vec![
                "--shared".to_string(),
                format!("--directory={INSTALL_DIR_PLACEHOLDER}"),
                "--unattended".to_string(),
            ],
            install_requires_elevation: true,
            search_system_path: true,
        }
    }
}

#[cfg(not(windows))]
impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from("/usr/local/texlive"),
            bin_subdir: PathBuf::from("bin"),
            compiler: "pdflatex".to_string(),
            version_args: vec!["--version".to_string()],
            compiler_args: default_compiler_args(),
            installer: PathBuf::from("requirements/install-tl"),
            installer_args: vec![
                "--no-interaction".to_string(),
                "--scheme=scheme-basic".to_string(),
                format!("--texdir={INSTALL_DIR_PLACEHOLDER}"),
            ],
            install_requires_elevation: true,
            search_system_path: true,
        }
    }
}

fn default_compiler_args() -> Vec<String> {
    vec![
        "-interaction=nonstopmode".to_string(),
        "-halt-on-error".to_string(),
        "-file-line-error".to_string(),
    ]
}

impl ToolchainSettings {
    /// Resolves a relative installer path against `base`, typically the
    /// directory the application binary lives in.
    pub fn resolve_installer(&mut self, base: &Path) {
        if self.installer.is_relative() {
            self.installer = base.join(&self.installer);
        }
    }
}
