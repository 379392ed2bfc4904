use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartConversion {
        source: PathBuf,
        destination: PathBuf,
    },
    CancelJob {
        job_id: crate::JobId,
    },
}
