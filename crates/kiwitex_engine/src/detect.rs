use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{LogStream, Logger};
use tokio_util::sync::CancellationToken;

use crate::process::ProcessRunner;
use crate::toolchain::ToolchainProvider;
use crate::ToolchainStatus;

const COMPONENT: &str = "detector";

/// Finds a usable compiler. Absence is a normal result, never an error.
#[derive(Clone)]
pub struct ToolchainDetector {
    provider: Arc<dyn ToolchainProvider>,
    runner: Arc<dyn ProcessRunner>,
    timeout: Duration,
    logger: Logger,
}

impl ToolchainDetector {
    pub fn new(
        provider: Arc<dyn ToolchainProvider>,
        runner: Arc<dyn ProcessRunner>,
        timeout: Duration,
        logger: Logger,
    ) -> Self {
        Self {
            provider,
            runner,
            timeout,
            logger,
        }
    }

    pub async fn detect(&self) -> ToolchainStatus {
        for candidate in self.candidates() {
            if let Some(version) = self.query_version(&candidate).await {
                self.logger.info(
                    LogStream::Orchestration,
                    COMPONENT,
                    format!("found {} at {}", version, candidate.display()),
                );
                return ToolchainStatus {
                    installed: true,
                    executable_path: Some(candidate),
                    version: Some(version),
                };
            }
        }
        self.logger.info(
            LogStream::Orchestration,
            COMPONENT,
            format!("{} not found", self.provider.name()),
        );
        ToolchainStatus::absent()
    }

    fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = self
            .provider
            .candidate_executables()
            .into_iter()
            .filter(|path| path.is_file())
            .collect();
        if let Some(name) = self.provider.search_path_name() {
            if let Ok(found) = which::which(&name) {
                if !candidates.contains(&found) {
                    candidates.push(found);
                }
            }
        }
        candidates
    }

    /// First non-empty line of a successful version query.
    async fn query_version(&self, executable: &std::path::Path) -> Option<String> {
        let command = self.provider.version_command(executable);
        // Detection is short and bounded by its own timeout; it is not
        // tied to the job's cancellation.
        let cancel = CancellationToken::new();
        let mut ignore = |_: &str| {};
        match self
            .runner
            .run(&command, self.timeout, &cancel, &mut ignore)
            .await
        {
            Ok(output) if output.success() => {
                let version = output
                    .lines
                    .iter()
                    .map(|line| line.trim())
                    .find(|line| !line.is_empty())
                    .unwrap_or("unknown version")
                    .to_string();
                Some(version)
            }
            Ok(output) => {
                self.logger.warn(
                    LogStream::Orchestration,
                    COMPONENT,
                    format!(
                        "{} is present but the version query exited with {:?}",
                        executable.display(),
                        output.exit_code
                    ),
                );
                None
            }
            Err(err) => {
                self.logger.warn(
                    LogStream::Orchestration,
                    COMPONENT,
                    format!("{} is not executable: {err}", executable.display()),
                );
                None
            }
        }
    }
}
