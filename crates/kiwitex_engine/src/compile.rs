use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{LogStream, Logger};
use tokio_util::sync::CancellationToken;

use crate::classify::{classify_compilation, classify_process_error};
use crate::output::{remove_auxiliary_files, ArtifactGuard};
use crate::process::ProcessRunner;
use crate::progress::{CompilePass, ProgressMonitor, ProgressSink};
use crate::toolchain::ToolchainProvider;
use crate::{ClassifiedError, ErrorKind, Phase, ProgressEvent};

const COMPONENT: &str = "compiler";

/// Two-pass compile of one source file into the destination directory.
pub struct CompilationRunner {
    provider: Arc<dyn ToolchainProvider>,
    runner: Arc<dyn ProcessRunner>,
    timeout: Duration,
    keep_auxiliary_files: bool,
    logger: Logger,
}

impl CompilationRunner {
    pub fn new(
        provider: Arc<dyn ToolchainProvider>,
        runner: Arc<dyn ProcessRunner>,
        timeout: Duration,
        keep_auxiliary_files: bool,
        logger: Logger,
    ) -> Self {
        Self {
            provider,
            runner,
            timeout,
            keep_auxiliary_files,
            logger,
        }
    }

    /// Compiles `source` twice and returns the produced PDF.
    ///
    /// On any failure, a PDF written by this call is removed again.
    pub async fn compile(
        &self,
        executable: &Path,
        source: &Path,
        destination: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ClassifiedError> {
        let guard = ArtifactGuard::new(self.provider.artifact_path(source, destination));

        let outcome = match self.run_passes(executable, source, destination, sink, cancel).await {
            Ok(()) if guard.was_written() => Ok(()),
            Ok(()) => Err(ClassifiedError::new(
                ErrorKind::ArtifactMissing,
                format!(
                    "the compiler succeeded but did not write {}",
                    guard.path().display()
                ),
            )),
            Err(error) => Err(error),
        };

        if let Err(error) = outcome {
            self.discard_partial(&guard);
            return Err(error);
        }

        sink.emit(ProgressEvent::new(Phase::Finalizing, 0, "Finalizing"));
        if !self.keep_auxiliary_files {
            self.clean_auxiliary(source, destination);
        }
        sink.emit(ProgressEvent::new(Phase::Finalizing, 100, "PDF ready"));
        Ok(guard.path().to_path_buf())
    }

    async fn run_passes(
        &self,
        executable: &Path,
        source: &Path,
        destination: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), ClassifiedError> {
        for pass in [CompilePass::First, CompilePass::Second] {
            if cancel.is_cancelled() {
                return Err(ClassifiedError::new(ErrorKind::Cancelled, "cancelled by user"));
            }
            self.run_pass(pass, executable, source, destination, sink, cancel)
                .await?;
        }
        Ok(())
    }

    async fn run_pass(
        &self,
        pass: CompilePass,
        executable: &Path,
        source: &Path,
        destination: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<(), ClassifiedError> {
        let command = self.provider.compiler_command(executable, source, destination);
        self.logger.info(
            LogStream::Orchestration,
            COMPONENT,
            format!("pass {}: {command}", pass.number()),
        );
        sink.emit(ProgressEvent::new(
            Phase::Compiling,
            pass.offset(),
            format!("Pass {}: starting", pass.number()),
        ));

        let monitor = ProgressMonitor::compiling(pass);
        let logger = &self.logger;
        let mut on_line = |line: &str| {
            logger.debug(LogStream::Compiler, COMPONENT, line);
            if let Some(event) = monitor.classify(line) {
                sink.emit(event);
            }
        };

        let output = self
            .runner
            .run(&command, self.timeout, cancel, &mut on_line)
            .await
            .map_err(|err| classify_process_error(&err, ErrorKind::ToolchainNotFound))?;

        if output.success() {
            return Ok(());
        }
        let error = classify_compilation(output.exit_code, &output.lines);
        self.logger.error(
            LogStream::Orchestration,
            COMPONENT,
            format!("pass {} failed: {error}", pass.number()),
        );
        Err(error)
    }

    fn discard_partial(&self, guard: &ArtifactGuard) {
        match guard.discard() {
            Ok(true) => {
                self.logger.info(
                    LogStream::Orchestration,
                    COMPONENT,
                    format!("removed partial {}", guard.path().display()),
                );
            }
            Ok(false) => {}
            Err(err) => {
                self.logger.warn(
                    LogStream::Orchestration,
                    COMPONENT,
                    format!("could not remove {}: {err}", guard.path().display()),
                );
            }
        }
    }

    fn clean_auxiliary(&self, source: &Path, destination: &Path) {
        let Some(stem) = source.file_stem().and_then(|s| s.to_str()) else {
            return;
        };
        match remove_auxiliary_files(destination, stem) {
            Ok(removed) => {
                self.logger.debug(
                    LogStream::Orchestration,
                    COMPONENT,
                    format!("removed {} auxiliary files", removed.len()),
                );
            }
            Err(err) => {
                self.logger.warn(
                    LogStream::Orchestration,
                    COMPONENT,
                    format!("auxiliary cleanup failed: {err}"),
                );
            }
        }
    }
}
