#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use engine_logging::{LogLevel, Logger, MemoryLog};
use kiwitex_engine::{
    ensure_output_dir, CommandSpec, EngineComponents, EngineEvent, EngineSettings,
    HostEnvironment, JobManager, LatexProvider, ProcessError, ProcessOutput, ProcessRunner,
    ProgressEvent, ProgressSink, ToolchainSettings,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

pub const INSTALLER_NAME: &str = "fake-installer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Version,
    Installer,
    Compiler,
}

/// Scripted outcome of one fake process.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub exit_code: Option<i32>,
    pub lines: Vec<String>,
    /// Writes `<output-directory>/<stem>.pdf` before exiting.
    pub writes_pdf: bool,
    /// Extra files created before exiting.
    pub creates: Vec<PathBuf>,
    /// Blocks until the job is cancelled.
    pub waits_for_cancel: bool,
}

impl Reply {
    pub fn ok(lines: &[&str]) -> Self {
        Self {
            exit_code: Some(0),
            lines: lines.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn exit(code: i32, lines: &[&str]) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::ok(lines)
        }
    }

    pub fn compiled(lines: &[&str]) -> Self {
        Self {
            writes_pdf: true,
            ..Self::ok(lines)
        }
    }

    pub fn creating(mut self, path: impl Into<PathBuf>) -> Self {
        self.creates.push(path.into());
        self
    }

    pub fn until_cancelled() -> Self {
        Self {
            writes_pdf: true,
            waits_for_cancel: true,
            ..Self::ok(&["This is pdfTeX, Version 3.141592653"])
        }
    }
}

/// Records every command and answers from per-kind queues.
#[derive(Default)]
pub struct FakeRunner {
    version: Mutex<VecDeque<Reply>>,
    installer: Mutex<VecDeque<Reply>>,
    compiler: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<(CommandKind, CommandSpec)>>,
}

impl FakeRunner {
    pub fn push(&self, kind: CommandKind, reply: Reply) {
        self.queue(kind).lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<(CommandKind, CommandSpec)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, kind: CommandKind) -> usize {
        self.calls().iter().filter(|(k, _)| *k == kind).count()
    }

    fn queue(&self, kind: CommandKind) -> &Mutex<VecDeque<Reply>> {
        match kind {
            CommandKind::Version => &self.version,
            CommandKind::Installer => &self.installer,
            CommandKind::Compiler => &self.compiler,
        }
    }

    fn next_reply(&self, kind: CommandKind) -> Reply {
        let scripted = self.queue(kind).lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| match kind {
            CommandKind::Version => Reply::ok(&["pdfTeX 3.141592653-2.6-1.40.25 (fake)"]),
            CommandKind::Installer => Reply::ok(&["installation finished"]),
            CommandKind::Compiler => Reply::compiled(&[
                "This is pdfTeX, Version 3.141592653",
                "Output written on doc.pdf (1 page, 1234 bytes).",
            ]),
        })
    }
}

fn kind_of(command: &CommandSpec) -> CommandKind {
    let name = command
        .program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name == INSTALLER_NAME {
        CommandKind::Installer
    } else if command.args.iter().any(|a| a == "--version") {
        CommandKind::Version
    } else {
        CommandKind::Compiler
    }
}

fn artifact_of(command: &CommandSpec) -> Option<PathBuf> {
    let out_dir = command
        .args
        .iter()
        .find_map(|a| a.strip_prefix("-output-directory="))?;
    let source = command.args.last()?;
    let stem = Path::new(source).file_stem()?;
    Some(Path::new(out_dir).join(stem).with_extension("pdf"))
}

#[async_trait::async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        _timeout: Duration,
        cancel: &CancellationToken,
        on_line: &mut (dyn for<'l> FnMut(&'l str) + Send),
    ) -> Result<ProcessOutput, ProcessError> {
        let kind = kind_of(command);
        self.calls.lock().unwrap().push((kind, command.clone()));
        let reply = self.next_reply(kind);

        for line in &reply.lines {
            on_line(line);
        }
        for path in &reply.creates {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, b"created").unwrap();
        }
        if reply.writes_pdf {
            if let Some(pdf) = artifact_of(command) {
                fs::write(pdf, b"%PDF-1.5 fake").unwrap();
            }
        }
        if reply.waits_for_cancel {
            let _ = tokio::time::timeout(Duration::from_secs(10), cancel.cancelled()).await;
            return Err(ProcessError::Cancelled { lines: reply.lines });
        }
        Ok(ProcessOutput {
            exit_code: reply.exit_code,
            lines: reply.lines,
        })
    }
}

pub struct FakeHost {
    pub elevated: bool,
    pub destination_error: Option<String>,
}

impl HostEnvironment for FakeHost {
    fn is_elevated(&self) -> bool {
        self.elevated
    }

    fn check_destination(&self, dir: &Path) -> Result<(), String> {
        if let Some(reason) = &self.destination_error {
            return Err(reason.clone());
        }
        ensure_output_dir(dir).map_err(|e| e.to_string())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Temporary workspace with a fake toolchain layout.
pub struct Fixture {
    pub dir: TempDir,
    pub settings: EngineSettings,
    pub runner: Arc<FakeRunner>,
    pub elevated: bool,
    pub destination_error: Option<String>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let installer = dir.path().join("media").join(INSTALLER_NAME);
        fs::create_dir_all(installer.parent().unwrap()).unwrap();
        fs::write(&installer, b"#!/bin/sh\n").unwrap();

        let toolchain = ToolchainSettings {
            install_dir: dir.path().join("tex"),
            bin_subdir: PathBuf::from("bin"),
            compiler: "pdflatex".to_string(),
            version_args: vec!["--version".to_string()],
            installer,
            installer_args: vec!["--directory={install_dir}".to_string()],
            install_requires_elevation: true,
            search_system_path: false,
            ..ToolchainSettings::default()
        };
        let settings = EngineSettings {
            toolchain,
            ..EngineSettings::default()
        };
        Self {
            dir,
            settings,
            runner: Arc::new(FakeRunner::default()),
            elevated: true,
            destination_error: None,
        }
    }

    pub fn compiler_path(&self) -> PathBuf {
        let provider = LatexProvider::new(self.settings.toolchain.clone());
        kiwitex_engine::ToolchainProvider::candidate_executables(&provider).remove(0)
    }

    pub fn install_compiler(&self) -> PathBuf {
        let path = self.compiler_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"binary").unwrap();
        path
    }

    pub fn source(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join("src").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "\\documentclass{article}\\begin{document}Hi\\end{document}").unwrap();
        path
    }

    pub fn destination(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn components(&self) -> EngineComponents {
        EngineComponents {
            provider: Arc::new(LatexProvider::new(self.settings.toolchain.clone())),
            runner: self.runner.clone(),
            host: Arc::new(FakeHost {
                elevated: self.elevated,
                destination_error: self.destination_error.clone(),
            }),
        }
    }

    pub fn manager(&self) -> (JobManager, MemoryLog) {
        let (logger, memory) = Logger::in_memory(LogLevel::Debug);
        let manager = JobManager::with_components(&self.settings, self.components(), logger);
        (manager, memory)
    }
}

/// Drains events up to and including the terminal one.
pub fn run_to_end(manager: &JobManager) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Some(event) = manager.recv_timeout(Duration::from_secs(10)) {
        let done = matches!(event, EngineEvent::Finished(_));
        events.push(event);
        if done {
            return events;
        }
    }
    panic!("job did not finish; events so far: {events:#?}");
}

/// Waits for the first event matching `pred`, keeping everything seen.
pub fn wait_for(
    manager: &JobManager,
    seen: &mut Vec<EngineEvent>,
    pred: impl Fn(&EngineEvent) -> bool,
) {
    while let Some(event) = manager.recv_timeout(Duration::from_secs(10)) {
        let hit = pred(&event);
        seen.push(event);
        if hit {
            return;
        }
    }
    panic!("expected event never arrived; events so far: {seen:#?}");
}

pub fn finished_job(events: &[EngineEvent]) -> kiwitex_engine::ConversionJob {
    match events.last() {
        Some(EngineEvent::Finished(job)) => job.clone(),
        other => panic!("last event is not terminal: {other:?}"),
    }
}

pub fn states(events: &[EngineEvent]) -> Vec<kiwitex_engine::JobState> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::StateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

pub fn progress(events: &[EngineEvent]) -> Vec<ProgressEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Progress { event, .. } => Some(event.clone()),
            _ => None,
        })
        .collect()
}
