use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User asked to convert `source` into `destination`.
    ConvertRequested {
        source: PathBuf,
        destination: PathBuf,
    },
    /// The engine accepted the request under this id.
    ConversionAccepted { job_id: crate::JobId },
    /// The engine refused the request outright (e.g. a job is still running).
    ConversionRejected { code: String, summary: String },
    /// User clicked Cancel.
    CancelClicked,
    /// Engine progress for a job.
    JobProgress {
        job_id: crate::JobId,
        stage: crate::Stage,
        percent: u8,
        message: String,
    },
    /// Engine completion for a job.
    JobDone {
        job_id: crate::JobId,
        result: crate::ConversionResult,
    },
    /// Render tick to coalesce output.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
