//! KiwiTeX engine: toolchain detection, installation and two-pass compilation.
mod classify;
mod compile;
mod detect;
mod host;
mod install;
mod manager;
mod output;
mod process;
mod progress;
mod settings;
mod toolchain;
mod types;

pub use classify::{classify_compilation, classify_installation, classify_process_error, TAIL_LINES};
pub use compile::CompilationRunner;
pub use detect::ToolchainDetector;
pub use host::{HostEnvironment, NativeHost};
pub use install::Installer;
pub use manager::{ChannelProgressSink, EngineComponents, JobHandle, JobManager};
pub use output::{ensure_output_dir, remove_auxiliary_files, ArtifactGuard, OutputError};
pub use process::{ProcessError, ProcessOutput, ProcessRunner, TokioProcessRunner};
pub use progress::{CompilePass, ProgressGate, ProgressMonitor, ProgressSink};
pub use settings::{EngineSettings, ToolchainSettings, INSTALL_DIR_PLACEHOLDER};
pub use toolchain::{CommandSpec, LatexProvider, ToolchainProvider};
pub use types::{
    ClassifiedError, ConversionJob, EngineEvent, ErrorKind, JobId, JobState, Phase,
    ProgressEvent, SourceLocation, ToolchainStatus,
};
