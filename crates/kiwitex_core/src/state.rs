use std::path::PathBuf;

use crate::view_model::AppViewModel;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Converting,
    Finished,
}

/// What the front-end shows for the running job. Ordered like the engine's
/// phases, with `Waiting` before the first event and `Done` after the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Stage {
    #[default]
    Waiting,
    Detecting,
    Installing,
    Compiling,
    Finalizing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionResult {
    Success {
        artifact: PathBuf,
    },
    Failed {
        /// Stable machine code of the error kind.
        code: String,
        /// One friendly line for the user.
        summary: String,
        detail: String,
    },
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    session: SessionState,
    job_id: Option<JobId>,
    source: Option<PathBuf>,
    stage: Stage,
    percent: u8,
    message: String,
    cancel_requested: bool,
    last_result: Option<ConversionResult>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            session: self.session,
            job_id: self.job_id,
            source: self.source.clone(),
            stage: self.stage,
            percent: self.percent,
            message: self.message.clone(),
            cancel_requested: self.cancel_requested,
            last_result: self.last_result.clone(),
            dirty: self.dirty,
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    pub fn job_id(&self) -> Option<JobId> {
        self.job_id
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn begin(&mut self, source: PathBuf) {
        self.session = SessionState::Converting;
        self.job_id = None;
        self.source = Some(source);
        self.stage = Stage::Waiting;
        self.percent = 0;
        self.message = "Starting".to_string();
        self.cancel_requested = false;
        self.last_result = None;
        self.dirty = true;
    }

    pub(crate) fn accept(&mut self, job_id: JobId) {
        if self.session == SessionState::Converting && self.job_id.is_none() {
            self.job_id = Some(job_id);
            self.dirty = true;
        }
    }

    pub(crate) fn reject(&mut self, code: String, summary: String) {
        if self.session != SessionState::Converting {
            return;
        }
        self.session = SessionState::Finished;
        self.stage = Stage::Done;
        self.message = summary.clone();
        self.last_result = Some(ConversionResult::Failed {
            code,
            summary,
            detail: String::new(),
        });
        self.dirty = true;
    }

    pub(crate) fn request_cancel(&mut self) -> Option<JobId> {
        let job_id = self.job_id.filter(|_| self.session == SessionState::Converting)?;
        if self.cancel_requested {
            return None;
        }
        self.cancel_requested = true;
        self.message = "Cancelling".to_string();
        self.dirty = true;
        Some(job_id)
    }

    pub(crate) fn apply_progress(&mut self, job_id: JobId, stage: Stage, percent: u8, message: String) {
        if !self.is_current(job_id) || stage < self.stage {
            return;
        }
        if stage > self.stage {
            self.stage = stage;
            self.percent = percent;
        } else {
            self.percent = self.percent.max(percent);
        }
        self.message = message;
        self.dirty = true;
    }

    pub(crate) fn apply_done(&mut self, job_id: JobId, result: ConversionResult) {
        if !self.is_current(job_id) {
            return;
        }
        self.session = SessionState::Finished;
        self.stage = Stage::Done;
        self.percent = if result.is_success() { 100 } else { self.percent };
        self.message = match &result {
            ConversionResult::Success { artifact } => format!("Created {}", artifact.display()),
            ConversionResult::Failed { summary, .. } => summary.clone(),
        };
        self.last_result = Some(result);
        self.dirty = true;
    }

    fn is_current(&self, job_id: JobId) -> bool {
        self.session == SessionState::Converting && self.job_id == Some(job_id)
    }
}
