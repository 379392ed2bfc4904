use std::io;
use std::process::Stdio;
use std::time::Duration;

use command_group::{AsyncCommandGroup, AsyncGroupChild};
use engine_logging::engine_warn;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::toolchain::CommandSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// stdout and stderr lines in arrival order.
    pub lines: Vec<String>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("process exceeded {limit:?} and was terminated")]
    Timeout { limit: Duration, lines: Vec<String> },
    #[error("process was cancelled")]
    Cancelled { lines: Vec<String> },
    #[error("io error while supervising process: {0}")]
    Io(#[from] io::Error),
}

impl ProcessError {
    /// Output collected before the process stopped, if any.
    pub fn lines(&self) -> &[String] {
        match self {
            ProcessError::Timeout { lines, .. } | ProcessError::Cancelled { lines } => lines,
            ProcessError::Spawn { .. } | ProcessError::Io(_) => &[],
        }
    }
}

/// Supervised child process execution.
///
/// Every line is handed to `on_line` as soon as it is read, so callers can
/// derive progress while the process is still running.
#[async_trait::async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        command: &CommandSpec,
        timeout: Duration,
        cancel: &CancellationToken,
        on_line: &mut (dyn for<'l> FnMut(&'l str) + Send),
    ) -> Result<ProcessOutput, ProcessError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioProcessRunner;

#[async_trait::async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        timeout: Duration,
        cancel: &CancellationToken,
        on_line: &mut (dyn for<'l> FnMut(&'l str) + Send),
    ) -> Result<ProcessOutput, ProcessError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        // The child leads its own process group (a job object on Windows),
        // so helpers it starts are killed along with it.
        let mut child = cmd.group_spawn().map_err(|source| ProcessError::Spawn {
            program: command.program.display().to_string(),
            source,
        })?;
        let mut stdout = child.inner().stdout.take().map(LineReader::new);
        let mut stderr = child.inner().stderr.take().map(LineReader::new);

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        let mut lines = Vec::new();

        while stdout.is_some() || stderr.is_some() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    terminate(&mut child).await;
                    return Err(ProcessError::Cancelled { lines });
                }
                _ = &mut deadline => {
                    terminate(&mut child).await;
                    return Err(ProcessError::Timeout { limit: timeout, lines });
                }
                line = next_line(&mut stdout), if stdout.is_some() => {
                    deliver(line, &mut stdout, &mut lines, on_line);
                }
                line = next_line(&mut stderr), if stderr.is_some() => {
                    deliver(line, &mut stderr, &mut lines, on_line);
                }
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                terminate(&mut child).await;
                return Err(ProcessError::Cancelled { lines });
            }
            _ = &mut deadline => {
                terminate(&mut child).await;
                return Err(ProcessError::Timeout { limit: timeout, lines });
            }
            status = child.wait() => status?,
        };

        Ok(ProcessOutput {
            exit_code: status.code(),
            lines,
        })
    }
}

/// Kills the child's whole process group and reaps the child.
async fn terminate(child: &mut AsyncGroupChild) {
    if let Err(err) = child.kill().await {
        engine_warn!("failed to terminate child process group: {err}");
    }
}

fn deliver<R>(
    line: io::Result<Option<String>>,
    reader: &mut Option<LineReader<R>>,
    lines: &mut Vec<String>,
    on_line: &mut (dyn for<'l> FnMut(&'l str) + Send),
) {
    match line {
        Ok(Some(line)) => {
            on_line(&line);
            lines.push(line);
        }
        Ok(None) => *reader = None,
        Err(err) => {
            engine_warn!("stopped reading child output: {err}");
            *reader = None;
        }
    }
}

async fn next_line<R: AsyncRead + Unpin>(
    reader: &mut Option<LineReader<R>>,
) -> io::Result<Option<String>> {
    match reader {
        Some(reader) => reader.next_line().await,
        None => Ok(None),
    }
}

/// Line reader tolerant of non-UTF-8 output (TeX logs often use the
/// system code page). Partial lines survive a cancelled read.
struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
    eof: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
            eof: false,
        }
    }

    async fn next_line(&mut self) -> io::Result<Option<String>> {
        if self.eof {
            return Ok(None);
        }
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 {
            self.eof = true;
            if self.buf.is_empty() {
                return Ok(None);
            }
        }
        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(&['\n', '\r'][..])
            .to_string();
        self.buf.clear();
        Ok(Some(line))
    }
}
