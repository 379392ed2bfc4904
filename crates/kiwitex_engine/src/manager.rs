use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use engine_logging::{LogStream, Logger};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::compile::CompilationRunner;
use crate::detect::ToolchainDetector;
use crate::host::{HostEnvironment, NativeHost};
use crate::install::Installer;
use crate::process::{ProcessRunner, TokioProcessRunner};
use crate::progress::{ProgressGate, ProgressSink};
use crate::settings::EngineSettings;
use crate::toolchain::{LatexProvider, ToolchainProvider};
use crate::{
    ClassifiedError, ConversionJob, EngineEvent, ErrorKind, JobId, JobState, Phase,
    ProgressEvent,
};

const COMPONENT: &str = "job_manager";

/// Identifies the job started by [`JobManager::convert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle {
    id: JobId,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }
}

/// Collaborators the manager drives. Production code uses
/// [`JobManager::new`]; tests inject fakes through [`JobManager::with_components`].
#[derive(Clone)]
pub struct EngineComponents {
    pub provider: Arc<dyn ToolchainProvider>,
    pub runner: Arc<dyn ProcessRunner>,
    pub host: Arc<dyn HostEnvironment>,
}

enum EngineCommand {
    Convert {
        job_id: JobId,
        source: PathBuf,
        destination: PathBuf,
        cancel: CancellationToken,
    },
}

struct ActiveJob {
    id: JobId,
    cancel: CancellationToken,
}

type ActiveSlot = Arc<Mutex<Option<ActiveJob>>>;

/// Accepts conversion requests and runs them one at a time on a worker
/// thread. Every call returns immediately; results arrive as [`EngineEvent`]s.
pub struct JobManager {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
    active: ActiveSlot,
    next_id: AtomicU64,
    logger: Logger,
}

impl JobManager {
    pub fn new(settings: EngineSettings, logger: Logger) -> Self {
        let components = EngineComponents {
            provider: Arc::new(LatexProvider::new(settings.toolchain.clone())),
            runner: Arc::new(TokioProcessRunner),
            host: Arc::new(NativeHost::detect()),
        };
        Self::with_components(&settings, components, logger)
    }

    pub fn with_components(
        settings: &EngineSettings,
        components: EngineComponents,
        logger: Logger,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let active: ActiveSlot = Arc::new(Mutex::new(None));
        let pipeline = Pipeline::new(settings, components, logger.clone());
        let worker_slot = active.clone();

        thread::spawn(move || {
            let runtime = Runtime::new().map_err(|err| {
                ClassifiedError::new(
                    ErrorKind::UnknownCompilationError,
                    format!("async runtime unavailable: {err}"),
                )
            });
            while let Ok(command) = cmd_rx.recv() {
                handle_command(&runtime, &pipeline, command, &event_tx, &worker_slot);
            }
        });

        Self {
            cmd_tx,
            event_rx,
            active,
            next_id: AtomicU64::new(1),
            logger,
        }
    }

    /// Starts a conversion, or fails with `JobAlreadyRunning` if one is
    /// still active. Request validation happens on the worker and is
    /// reported through the job's terminal event.
    pub fn convert(
        &self,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Result<JobHandle, ClassifiedError> {
        let mut active = lock(&self.active);
        if let Some(job) = active.as_ref() {
            return Err(ClassifiedError::new(
                ErrorKind::JobAlreadyRunning,
                format!("job {} is still running", job.id),
            ));
        }

        let job_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let command = EngineCommand::Convert {
            job_id,
            source: source.into(),
            destination: destination.into(),
            cancel: cancel.clone(),
        };
        if self.cmd_tx.send(command).is_err() {
            return Err(ClassifiedError::new(
                ErrorKind::UnknownCompilationError,
                "the engine worker has stopped",
            ));
        }
        *active = Some(ActiveJob { id: job_id, cancel });
        self.logger.info(
            LogStream::Application,
            COMPONENT,
            format!("job {job_id} accepted"),
        );
        Ok(JobHandle { id: job_id })
    }

    /// Requests cancellation. A no-op once the job has finished.
    pub fn cancel(&self, handle: &JobHandle) {
        let active = lock(&self.active);
        if let Some(job) = active.as_ref().filter(|job| job.id == handle.id) {
            job.cancel.cancel();
            self.logger.info(
                LogStream::Application,
                COMPONENT,
                format!("job {} cancellation requested", handle.id),
            );
        }
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.active).is_some()
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

fn lock(slot: &ActiveSlot) -> MutexGuard<'_, Option<ActiveJob>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn handle_command(
    runtime: &Result<Runtime, ClassifiedError>,
    pipeline: &Pipeline,
    command: EngineCommand,
    event_tx: &mpsc::Sender<EngineEvent>,
    slot: &ActiveSlot,
) {
    match command {
        EngineCommand::Convert {
            job_id,
            source,
            destination,
            cancel,
        } => {
            let mut job = ConversionJob::new(job_id, source, destination);
            let outcome = match runtime {
                Ok(runtime) => runtime.block_on(pipeline.run(&mut job, &cancel, event_tx)),
                Err(error) => Err(error.clone()),
            };
            pipeline.finish(&mut job, outcome);

            // Free before the terminal events go out.
            lock(slot).take();
            let _ = event_tx.send(EngineEvent::StateChanged {
                job_id,
                state: job.state(),
            });
            let _ = event_tx.send(EngineEvent::Finished(job));
        }
    }
}

/// Forwards progress of one job onto the event channel.
pub struct ChannelProgressSink {
    job_id: JobId,
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(job_id: JobId, tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { job_id, tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(EngineEvent::Progress {
            job_id: self.job_id,
            event,
        });
    }
}

/// Detect, install if needed, compile.
struct Pipeline {
    detector: ToolchainDetector,
    installer: Installer,
    compiler: CompilationRunner,
    host: Arc<dyn HostEnvironment>,
    logger: Logger,
}

impl Pipeline {
    fn new(settings: &EngineSettings, components: EngineComponents, logger: Logger) -> Self {
        let EngineComponents {
            provider,
            runner,
            host,
        } = components;
        let detector = ToolchainDetector::new(
            provider.clone(),
            runner.clone(),
            settings.detect_timeout(),
            logger.clone(),
        );
        let installer = Installer::new(
            provider.clone(),
            runner.clone(),
            host.clone(),
            detector.clone(),
            settings.install_timeout(),
            logger.clone(),
        );
        let compiler = CompilationRunner::new(
            provider,
            runner,
            settings.compile_timeout(),
            settings.keep_auxiliary_files,
            logger.clone(),
        );
        Self {
            detector,
            installer,
            compiler,
            host,
            logger,
        }
    }

    async fn run(
        &self,
        job: &mut ConversionJob,
        cancel: &CancellationToken,
        event_tx: &mpsc::Sender<EngineEvent>,
    ) -> Result<PathBuf, ClassifiedError> {
        self.validate(job)?;
        let sink = ProgressGate::new(ChannelProgressSink::new(job.id, event_tx.clone()));

        self.enter(job, JobState::Detecting, event_tx)?;
        sink.emit(ProgressEvent::new(Phase::Detecting, 0, "Looking for LaTeX"));
        let mut status = self.detector.detect().await;
        sink.emit(ProgressEvent::new(Phase::Detecting, 100, "Detection finished"));
        if cancel.is_cancelled() {
            return Err(ClassifiedError::new(ErrorKind::Cancelled, "cancelled by user"));
        }

        if !status.installed {
            self.enter(job, JobState::Installing, event_tx)?;
            status = self.installer.install(&sink, cancel).await?;
        }
        let executable = status.executable_path.ok_or_else(|| {
            ClassifiedError::new(
                ErrorKind::ToolchainNotFound,
                "no compiler executable was reported",
            )
        })?;

        self.enter(job, JobState::Compiling, event_tx)?;
        let source = job.source.clone();
        let destination = job.destination.clone();
        self.compiler
            .compile(&executable, &source, &destination, &sink, cancel)
            .await
    }

    /// Rejects unusable requests before any process is spawned and makes
    /// both paths absolute.
    fn validate(&self, job: &mut ConversionJob) -> Result<(), ClassifiedError> {
        job.source = absolute(&job.source, ErrorKind::SourceFileMissing)?;
        job.destination = absolute(&job.destination, ErrorKind::PermissionDenied)?;
        if !job.source.is_file() {
            return Err(ClassifiedError::new(
                ErrorKind::SourceFileMissing,
                format!("source file not found: {}", job.source.display()),
            ));
        }
        self.host
            .check_destination(&job.destination)
            .map_err(|reason| {
                ClassifiedError::new(
                    ErrorKind::PermissionDenied,
                    format!(
                        "destination {} is unusable: {reason}",
                        job.destination.display()
                    ),
                )
            })
    }

    fn enter(
        &self,
        job: &mut ConversionJob,
        state: JobState,
        event_tx: &mpsc::Sender<EngineEvent>,
    ) -> Result<(), ClassifiedError> {
        job.transition(state)?;
        let entry = self.logger.info(
            LogStream::Orchestration,
            COMPONENT,
            format!("job {} -> {state:?}", job.id),
        );
        job.log.push(entry);
        let _ = event_tx.send(EngineEvent::StateChanged {
            job_id: job.id,
            state,
        });
        Ok(())
    }

    fn finish(&self, job: &mut ConversionJob, outcome: Result<PathBuf, ClassifiedError>) {
        let outcome = outcome.and_then(|artifact| job.complete(artifact));
        let entry = match outcome {
            Ok(()) => self.logger.info(
                LogStream::Orchestration,
                COMPONENT,
                format!(
                    "job {} completed: {}",
                    job.id,
                    job.artifact.as_deref().unwrap_or(Path::new("")).display()
                ),
            ),
            Err(error) => {
                let entry = self.logger.error(
                    LogStream::Orchestration,
                    COMPONENT,
                    format!("job {} failed: {error}", job.id),
                );
                job.fail(error);
                entry
            }
        };
        job.log.push(entry);
    }
}

fn absolute(path: &Path, kind: ErrorKind) -> Result<PathBuf, ClassifiedError> {
    std::path::absolute(path).map_err(|err| {
        ClassifiedError::new(
            kind,
            format!("cannot resolve {}: {err}", path.display()),
        )
    })
}
