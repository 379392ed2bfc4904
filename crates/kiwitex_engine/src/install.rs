use std::sync::Arc;
use std::time::Duration;

use engine_logging::{LogStream, Logger};
use tokio_util::sync::CancellationToken;

use crate::classify::{classify_installation, classify_process_error};
use crate::detect::ToolchainDetector;
use crate::host::HostEnvironment;
use crate::process::ProcessRunner;
use crate::progress::{ProgressMonitor, ProgressSink};
use crate::toolchain::ToolchainProvider;
use crate::{ClassifiedError, ErrorKind, Phase, ProgressEvent, ToolchainStatus};

const COMPONENT: &str = "installer";

/// Runs the toolchain's unattended installer and verifies the result.
///
/// Never retries; the caller decides whether to try again.
pub struct Installer {
    provider: Arc<dyn ToolchainProvider>,
    runner: Arc<dyn ProcessRunner>,
    host: Arc<dyn HostEnvironment>,
    detector: ToolchainDetector,
    timeout: Duration,
    logger: Logger,
}

impl Installer {
    pub fn new(
        provider: Arc<dyn ToolchainProvider>,
        runner: Arc<dyn ProcessRunner>,
        host: Arc<dyn HostEnvironment>,
        detector: ToolchainDetector,
        timeout: Duration,
        logger: Logger,
    ) -> Self {
        Self {
            provider,
            runner,
            host,
            detector,
            timeout,
            logger,
        }
    }

    /// Installs the toolchain and returns the verified status.
    pub async fn install(
        &self,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ToolchainStatus, ClassifiedError> {
        sink.emit(ProgressEvent::new(Phase::Installing, 0, "Preparing installer"));

        if self.provider.install_requires_elevation() && !self.host.is_elevated() {
            return Err(ClassifiedError::new(
                ErrorKind::PermissionDenied,
                "installing the toolchain requires administrator privileges",
            ));
        }

        let command = self.provider.installer_command();
        if !command.program.is_file() && which::which(&command.program).is_err() {
            return Err(ClassifiedError::new(
                ErrorKind::InstallationFailed,
                format!("installer not found at {}", command.program.display()),
            ));
        }

        self.logger.info(
            LogStream::Orchestration,
            COMPONENT,
            format!("running {command}"),
        );
        let monitor = ProgressMonitor::installing();
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
            .map_err(|err| classify_process_error(&err, ErrorKind::InstallationFailed))?;

        if !output.success() {
            let error = classify_installation(output.exit_code, &output.lines);
            self.logger.error(
                LogStream::Orchestration,
                COMPONENT,
                format!("installer failed: {error}"),
            );
            return Err(error);
        }

        sink.emit(ProgressEvent::new(
            Phase::Installing,
            95,
            "Verifying installation",
        ));
        let status = self.detector.detect().await;
        if !status.installed {
            return Err(ClassifiedError::new(
                ErrorKind::InstallationFailed,
                "the installer finished but the toolchain is still not detected",
            ));
        }

        sink.emit(ProgressEvent::new(Phase::Installing, 100, "Toolchain installed"));
        self.logger.info(
            LogStream::Orchestration,
            COMPONENT,
            "installation verified",
        );
        Ok(status)
    }
}
