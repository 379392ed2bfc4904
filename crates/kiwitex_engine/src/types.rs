use std::fmt;
use std::path::{Path, PathBuf};

use engine_logging::LogEntry;

pub type JobId = u64;

/// Coarse phase of a conversion, in the order a job passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Detecting,
    Installing,
    Compiling,
    Finalizing,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Detecting => "detecting",
            Phase::Installing => "installing",
            Phase::Compiling => "compiling",
            Phase::Finalizing => "finalizing",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: Phase,
    /// 0..=100.
    pub percent: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(phase: Phase, percent: u8, message: impl Into<String>) -> Self {
        Self {
            phase,
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Idle,
    Detecting,
    Installing,
    Compiling,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Legal edges of the job lifecycle. Every non-terminal state may fail.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Completed | Failed, _) => false,
            (_, Failed) => true,
            (Idle, Detecting)
            | (Detecting, Installing)
            | (Detecting, Compiling)
            | (Installing, Compiling)
            | (Compiling, Completed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolchainStatus {
    pub installed: bool,
    pub executable_path: Option<PathBuf>,
    pub version: Option<String>,
}

impl ToolchainStatus {
    pub fn absent() -> Self {
        Self::default()
    }
}

/// Stable failure categories surfaced to the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ToolchainNotFound,
    NetworkUnavailable,
    InstallationFailed,
    PermissionDenied,
    SourceFileMissing,
    CompilationSyntaxError,
    MissingResource,
    ArtifactMissing,
    Timeout,
    UnknownCompilationError,
    JobAlreadyRunning,
    Cancelled,
}

impl ErrorKind {
    /// Machine-readable code, stable across releases.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ToolchainNotFound => "toolchain_not_found",
            ErrorKind::NetworkUnavailable => "network_unavailable",
            ErrorKind::InstallationFailed => "installation_failed",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::SourceFileMissing => "source_file_missing",
            ErrorKind::CompilationSyntaxError => "compilation_syntax_error",
            ErrorKind::MissingResource => "missing_resource",
            ErrorKind::ArtifactMissing => "artifact_missing",
            ErrorKind::Timeout => "timeout",
            ErrorKind::UnknownCompilationError => "unknown_compilation_error",
            ErrorKind::JobAlreadyRunning => "job_already_running",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// One-line explanation for users who have never seen a TeX log.
    pub fn summary(self) -> &'static str {
        match self {
            ErrorKind::ToolchainNotFound => "The LaTeX toolchain is not installed.",
            ErrorKind::NetworkUnavailable => {
                "The installer could not reach the internet. Check your connection and try again."
            }
            ErrorKind::InstallationFailed => "Installing the LaTeX toolchain did not succeed.",
            ErrorKind::PermissionDenied => {
                "Permission was denied. Try running as administrator or choose another folder."
            }
            ErrorKind::SourceFileMissing => "The document (or a file it includes) could not be found.",
            ErrorKind::CompilationSyntaxError => "The document contains an error that LaTeX cannot process.",
            ErrorKind::MissingResource => "The document needs a package or file that is not available.",
            ErrorKind::ArtifactMissing => "LaTeX finished but no PDF was produced.",
            ErrorKind::Timeout => "The operation took too long and was stopped.",
            ErrorKind::UnknownCompilationError => "Compilation failed for an unrecognised reason. See the log.",
            ErrorKind::JobAlreadyRunning => "A conversion is already running. Wait for it to finish.",
            ErrorKind::Cancelled => "The conversion was cancelled.",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position in a source file derived from compiler output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}:{}", self.line),
            None => write!(f, "line {}", self.line),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub detail: String,
    pub location: Option<SourceLocation>,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)?;
        if let Some(location) = &self.location {
            write!(f, " (at {location})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ClassifiedError {}

/// One user request, owned by the worker until it is handed back in
/// [`EngineEvent::Finished`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub id: JobId,
    pub source: PathBuf,
    pub destination: PathBuf,
    state: JobState,
    pub log: Vec<LogEntry>,
    pub artifact: Option<PathBuf>,
    pub error: Option<ClassifiedError>,
}

impl ConversionJob {
    pub fn new(id: JobId, source: PathBuf, destination: PathBuf) -> Self {
        Self {
            id,
            source,
            destination,
            state: JobState::Idle,
            log: Vec::new(),
            artifact: None,
            error: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub(crate) fn transition(&mut self, next: JobState) -> Result<(), ClassifiedError> {
        if !self.state.can_transition_to(next) {
            return Err(ClassifiedError::new(
                ErrorKind::UnknownCompilationError,
                format!("illegal job transition {:?} -> {:?}", self.state, next),
            ));
        }
        self.state = next;
        Ok(())
    }

    pub(crate) fn complete(&mut self, artifact: PathBuf) -> Result<(), ClassifiedError> {
        self.transition(JobState::Completed)?;
        self.artifact = Some(artifact);
        Ok(())
    }

    pub(crate) fn fail(&mut self, error: ClassifiedError) {
        // Failing is legal from every non-terminal state.
        if !self.state.is_terminal() {
            self.state = JobState::Failed;
        }
        self.artifact = None;
        self.error = Some(error);
    }

    /// Terminal outcome; `None` while the job is still running.
    pub fn result(&self) -> Option<Result<&Path, &ClassifiedError>> {
        match self.state {
            JobState::Completed => self.artifact.as_deref().map(Ok),
            JobState::Failed => self.error.as_ref().map(Err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    StateChanged { job_id: JobId, state: JobState },
    Progress { job_id: JobId, event: ProgressEvent },
    /// Terminal event; nothing else is emitted for `job.id` afterwards.
    Finished(ConversionJob),
}

impl EngineEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            EngineEvent::StateChanged { job_id, .. } | EngineEvent::Progress { job_id, .. } => {
                *job_id
            }
            EngineEvent::Finished(job) => job.id,
        }
    }
}
