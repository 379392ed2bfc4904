//! Multi-sink logger shared by every engine component.
//!
//! One [`Logger`] lives for the whole application run. Each entry is written to
//! the process-wide sink and to the sink of its [`LogStream`], then mirrored to
//! the `log` facade so a terminal logger installed by the binary sees it too.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

/// File name of the process-wide stream that receives every entry.
const COMBINED_FILENAME: &str = "kiwitex.log";

/// Severity of a log entry, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    /// Diagnostic detail, including raw toolchain output.
    Debug,
    /// Normal lifecycle milestones.
    Info,
    /// Recoverable problems.
    Warn,
    /// Failures reported to the user.
    Error,
}

impl LogLevel {
    /// Upper-case label used in the formatted line.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// Functional area a log entry belongs to. Each stream has its own sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStream {
    /// Overall application lifecycle.
    Application,
    /// Job sequencing: detection, installation, compilation hand-offs.
    Orchestration,
    /// Raw toolchain output.
    Compiler,
}

impl LogStream {
    /// All streams, in the order their sinks are opened.
    pub const ALL: [LogStream; 3] = [
        LogStream::Application,
        LogStream::Orchestration,
        LogStream::Compiler,
    ];

    /// Stream name; also the file stem of its sink and the `log` target.
    pub fn name(self) -> &'static str {
        match self {
            LogStream::Application => "application",
            LogStream::Orchestration => "orchestration",
            LogStream::Compiler => "compiler",
        }
    }
}

/// A single immutable log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// When the entry was created.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Stream the entry was routed to.
    pub stream: LogStream,
    /// Component that produced the entry, e.g. `installer`.
    pub component: String,
    /// Free-text message.
    pub message: String,
}

impl LogEntry {
    /// Formats the entry as `timestamp | level | component | message`.
    pub fn format_line(&self) -> String {
        format!(
            "{} | {} | {} | {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level,
            self.component,
            self.message
        )
    }
}

/// Errors raised while opening log sinks.
#[derive(Debug, Error)]
pub enum LoggerError {
    /// The log directory could not be created.
    #[error("cannot create log directory {path:?}: {source}")]
    CreateDir {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// A log file could not be opened for appending.
    #[error("cannot open log file {path:?}: {source}")]
    OpenFile {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

enum SinkTarget {
    File(FileSink),
    Memory(Arc<Mutex<Vec<LogEntry>>>),
}

struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    /// Set after the first failed write; later failures stay quiet.
    failed: bool,
}

impl FileSink {
    fn write_line(&mut self, line: &str) {
        // Flush per entry so a crash never loses the tail of the log.
        let result = writeln!(self.writer, "{line}").and_then(|_| self.writer.flush());
        if let Err(err) = result {
            if !self.failed {
                crate::engine_warn!("cannot write log file {:?}: {err}", self.path);
            }
            self.failed = true;
        }
    }
}

struct Sink {
    /// `None` routes every entry to this sink.
    stream: Option<LogStream>,
    target: SinkTarget,
}

impl Sink {
    fn accepts(&self, stream: LogStream) -> bool {
        self.stream.is_none_or(|own| own == stream)
    }

    fn write(&mut self, entry: &LogEntry, line: &str) {
        match &mut self.target {
            SinkTarget::File(file) => file.write_line(line),
            SinkTarget::Memory(entries) => lock(entries).push(entry.clone()),
        }
    }
}

struct Inner {
    min_level: LogLevel,
    sinks: Mutex<Vec<Sink>>,
}

/// Cloneable handle to the process-wide logger.
///
/// Writes from concurrent components are serialized by an internal mutex.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("min_level", &self.inner.min_level)
            .finish_non_exhaustive()
    }
}

impl Logger {
    /// Opens `kiwitex.log` plus one `<stream>.log` per [`LogStream`] inside
    /// `dir`, creating the directory if needed. Files are appended to.
    pub fn to_directory(dir: &Path, min_level: LogLevel) -> Result<Self, LoggerError> {
        fs::create_dir_all(dir).map_err(|source| LoggerError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut sinks = Vec::with_capacity(LogStream::ALL.len() + 1);
        sinks.push(Sink {
            stream: None,
            target: SinkTarget::File(open_append(&dir.join(COMBINED_FILENAME))?),
        });
        for stream in LogStream::ALL {
            let path = dir.join(format!("{}.log", stream.name()));
            sinks.push(Sink {
                stream: Some(stream),
                target: SinkTarget::File(open_append(&path)?),
            });
        }
        Ok(Self::with_sinks(min_level, sinks))
    }

    /// Logger that keeps every entry in memory. Used by tests and by callers
    /// that want to inspect what a job logged.
    pub fn in_memory(min_level: LogLevel) -> (Self, MemoryLog) {
        let entries = Arc::new(Mutex::new(Vec::new()));
        let sink = Sink {
            stream: None,
            target: SinkTarget::Memory(entries.clone()),
        };
        (Self::with_sinks(min_level, vec![sink]), MemoryLog { entries })
    }

    /// Logger without sinks; entries still reach the `log` facade.
    pub fn facade_only(min_level: LogLevel) -> Self {
        Self::with_sinks(min_level, Vec::new())
    }

    fn with_sinks(min_level: LogLevel, sinks: Vec<Sink>) -> Self {
        Self {
            inner: Arc::new(Inner {
                min_level,
                sinks: Mutex::new(sinks),
            }),
        }
    }

    /// Records an entry and returns it. Entries below the minimum level are
    /// returned but not written.
    pub fn log(
        &self,
        stream: LogStream,
        level: LogLevel,
        component: &str,
        message: impl Into<String>,
    ) -> LogEntry {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            stream,
            component: component.to_string(),
            message: message.into(),
        };
        if level < self.inner.min_level {
            return entry;
        }

        let line = entry.format_line();
        {
            let mut sinks = lock(&self.inner.sinks);
            for sink in sinks.iter_mut().filter(|s| s.accepts(stream)) {
                sink.write(&entry, &line);
            }
        }
        log::log!(
            target: stream.name(),
            level.into(),
            "{}: {}",
            entry.component,
            entry.message
        );
        entry
    }

    /// Shorthand for [`Logger::log`] at [`LogLevel::Debug`].
    pub fn debug(&self, stream: LogStream, component: &str, message: impl Into<String>) -> LogEntry {
        self.log(stream, LogLevel::Debug, component, message)
    }

    /// Shorthand for [`Logger::log`] at [`LogLevel::Info`].
    pub fn info(&self, stream: LogStream, component: &str, message: impl Into<String>) -> LogEntry {
        self.log(stream, LogLevel::Info, component, message)
    }

    /// Shorthand for [`Logger::log`] at [`LogLevel::Warn`].
    pub fn warn(&self, stream: LogStream, component: &str, message: impl Into<String>) -> LogEntry {
        self.log(stream, LogLevel::Warn, component, message)
    }

    /// Shorthand for [`Logger::log`] at [`LogLevel::Error`].
    pub fn error(&self, stream: LogStream, component: &str, message: impl Into<String>) -> LogEntry {
        self.log(stream, LogLevel::Error, component, message)
    }
}

/// Read handle onto the entries captured by [`Logger::in_memory`].
#[derive(Debug, Clone)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLog {
    /// Snapshot of every captured entry in write order.
    pub fn entries(&self) -> Vec<LogEntry> {
        lock(&self.entries).clone()
    }

    /// Captured entries belonging to `stream`.
    pub fn stream(&self, stream: LogStream) -> Vec<LogEntry> {
        lock(&self.entries)
            .iter()
            .filter(|e| e.stream == stream)
            .cloned()
            .collect()
    }
}

fn open_append(path: &Path) -> Result<FileSink, LoggerError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggerError::OpenFile {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(FileSink {
        path: path.to_path_buf(),
        writer: BufWriter::new(file),
        failed: false,
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock leaves the sinks usable.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
