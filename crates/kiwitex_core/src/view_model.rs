use std::path::PathBuf;

use crate::{ConversionResult, JobId, SessionState, Stage};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub session: SessionState,
    pub job_id: Option<JobId>,
    pub source: Option<PathBuf>,
    pub stage: Stage,
    pub percent: u8,
    pub message: String,
    pub cancel_requested: bool,
    pub last_result: Option<ConversionResult>,
    pub dirty: bool,
}

impl AppViewModel {
    /// `[#####.....]  50%`-style bar, `width` cells wide.
    pub fn progress_bar(&self, width: usize) -> String {
        let filled = width * usize::from(self.percent.min(100)) / 100;
        format!(
            "[{}{}] {:>3}%",
            "#".repeat(filled),
            ".".repeat(width - filled),
            self.percent
        )
    }
}
