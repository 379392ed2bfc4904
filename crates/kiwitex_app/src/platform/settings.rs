use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};
use kiwitex_engine::EngineSettings;
use thiserror::Error;

const SETTINGS_FILENAME: &str = "kiwitex.ron";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings in {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Directory holding the running executable; relative installer paths and
/// the default settings file are resolved against it.
pub fn executable_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Loads settings from `explicit`, or from `kiwitex.ron` in `base` when it
/// exists. Missing defaults are filled in by serde.
///
/// A relative installer path is resolved against the directory of the file
/// that named it, or against `base` when no file was given.
pub fn load(explicit: Option<&Path>, base: &Path) -> Result<EngineSettings, SettingsError> {
    let (mut settings, installer_base) = match explicit {
        Some(path) => (read(path)?, path.parent().unwrap_or(base)),
        None => {
            let path = base.join(SETTINGS_FILENAME);
            let settings = match read(&path) {
                Ok(settings) => settings,
                Err(SettingsError::Read { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    engine_info!("No settings file at {:?}; using defaults", path);
                    EngineSettings::default()
                }
                Err(err) => return Err(err),
            };
            (settings, base)
        }
    };
    settings.toolchain.resolve_installer(installer_base);
    if !settings.toolchain.installer.exists() {
        engine_warn!(
            "Installer {:?} does not exist; installation will fail if LaTeX is missing",
            settings.toolchain.installer
        );
    }
    Ok(settings)
}

fn read(path: &Path) -> Result<EngineSettings, SettingsError> {
    let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = ron::from_str(&content).map_err(|err| SettingsError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    engine_info!("Loaded settings from {:?}", path);
    Ok(settings)
}
