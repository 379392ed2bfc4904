//! Logging initialization for kiwitex.
//!
//! The terminal shows warnings (everything with `--verbose`); the log
//! directory receives every entry through [`Logger`].

use std::env;
use std::path::{Path, PathBuf};

use chrono::Local;
use engine_logging::{LogLevel, LogStream, Logger};
use log::LevelFilter;
use simplelog::{ColorChoice, Config, ConfigBuilder, TermLogger, TerminalMode};

const COMPONENT: &str = "app";

/// Installs the terminal logger and opens the log files in `log_dir`.
pub fn initialize(log_dir: &Path, verbose: bool) -> anyhow::Result<Logger> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let _ = TermLogger::init(level, build_config(), TerminalMode::Stderr, ColorChoice::Auto);

    let logger = Logger::to_directory(log_dir, LogLevel::Debug)?;
    write_banner(&logger, log_dir);
    Ok(logger)
}

/// `<exe dir>/logs`, or `./logs` when the executable path is unknown.
pub fn default_log_dir() -> PathBuf {
    super::settings::executable_dir().join("logs")
}

fn build_config() -> Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .build()
}

fn write_banner(logger: &Logger, log_dir: &Path) {
    let cwd = env::current_dir()
        .map(|dir| dir.display().to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());
    let lines = [
        format!(
            "{} {} starting at {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            Local::now().format("%Y-%m-%d %H:%M:%S %z")
        ),
        format!("os: {} ({})", env::consts::OS, env::consts::ARCH),
        format!("working directory: {cwd}"),
        format!("log directory: {}", log_dir.display()),
    ];
    for line in lines {
        logger.info(LogStream::Application, COMPONENT, line);
    }
}
