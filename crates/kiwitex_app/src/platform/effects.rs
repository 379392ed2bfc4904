use std::time::Duration;

use engine_logging::{engine_info, engine_warn};
use kiwitex_core::{ConversionResult, Effect, Msg, Stage};
use kiwitex_engine::{ConversionJob, EngineEvent, JobHandle, JobManager, JobState, Phase};

/// Executes core effects against the engine and turns engine events back
/// into core messages.
pub struct EffectRunner {
    engine: JobManager,
    current: Option<JobHandle>,
}

impl EffectRunner {
    pub fn new(engine: JobManager) -> Self {
        Self {
            engine,
            current: None,
        }
    }

    pub fn run(&mut self, effects: Vec<Effect>) -> Vec<Msg> {
        let mut replies = Vec::new();
        for effect in effects {
            match effect {
                Effect::StartConversion {
                    source,
                    destination,
                } => {
                    engine_info!("StartConversion source={:?} destination={:?}", source, destination);
                    match self.engine.convert(source, destination) {
                        Ok(handle) => {
                            self.current = Some(handle);
                            replies.push(Msg::ConversionAccepted {
                                job_id: handle.id(),
                            });
                        }
                        Err(err) => {
                            engine_warn!("Conversion rejected: {}", err);
                            replies.push(Msg::ConversionRejected {
                                code: err.kind.as_str().to_string(),
                                summary: err.kind.summary().to_string(),
                            });
                        }
                    }
                }
                Effect::CancelJob { job_id } => match self.current {
                    Some(handle) if handle.id() == job_id => self.engine.cancel(&handle),
                    _ => engine_warn!("Cancel for unknown job {}", job_id),
                },
            }
        }
        replies
    }

    /// Waits up to `timeout` for the next engine event.
    pub fn poll(&mut self, timeout: Duration) -> Option<Msg> {
        let event = self.engine.recv_timeout(timeout)?;
        if let EngineEvent::Finished(job) = &event {
            if self.current.is_some_and(|handle| handle.id() == job.id) {
                self.current = None;
            }
        }
        Some(map_event(event))
    }
}

fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::Progress { job_id, event } => Msg::JobProgress {
            job_id,
            stage: map_phase(event.phase),
            percent: event.percent,
            message: event.message,
        },
        EngineEvent::StateChanged { job_id, state } => match map_state(state) {
            Some((stage, message)) => Msg::JobProgress {
                job_id,
                stage,
                percent: 0,
                message: message.to_string(),
            },
            None => Msg::NoOp,
        },
        EngineEvent::Finished(job) => Msg::JobDone {
            job_id: job.id,
            result: map_result(&job),
        },
    }
}

fn map_phase(phase: Phase) -> Stage {
    match phase {
        Phase::Detecting => Stage::Detecting,
        Phase::Installing => Stage::Installing,
        Phase::Compiling => Stage::Compiling,
        Phase::Finalizing => Stage::Finalizing,
    }
}

fn map_state(state: JobState) -> Option<(Stage, &'static str)> {
    match state {
        JobState::Detecting => Some((Stage::Detecting, "Looking for LaTeX")),
        JobState::Installing => Some((Stage::Installing, "Installing LaTeX")),
        JobState::Compiling => Some((Stage::Compiling, "Compiling")),
        JobState::Idle | JobState::Completed | JobState::Failed => None,
    }
}

fn map_result(job: &ConversionJob) -> ConversionResult {
    match job.result() {
        Some(Ok(artifact)) => ConversionResult::Success {
            artifact: artifact.to_path_buf(),
        },
        Some(Err(error)) => {
            engine_warn!("Job {} failed: {}", job.id, error);
            ConversionResult::Failed {
                code: error.kind.as_str().to_string(),
                summary: error.kind.summary().to_string(),
                detail: error.to_string(),
            }
        }
        None => ConversionResult::Failed {
            code: "unknown_compilation_error".to_string(),
            summary: "The job ended without a result.".to_string(),
            detail: format!("job {} finished in state {:?}", job.id, job.state()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiwitex_engine::ProgressEvent;
    use pretty_assertions::assert_eq;

    #[test]
    fn progress_events_keep_phase_and_percent() {
        let msg = map_event(EngineEvent::Progress {
            job_id: 3,
            event: ProgressEvent::new(Phase::Compiling, 62, "Pass 2: page 3"),
        });
        assert_eq!(
            msg,
            Msg::JobProgress {
                job_id: 3,
                stage: Stage::Compiling,
                percent: 62,
                message: "Pass 2: page 3".to_string(),
            }
        );
    }

    #[test]
    fn terminal_state_changes_carry_no_message() {
        let msg = map_event(EngineEvent::StateChanged {
            job_id: 1,
            state: JobState::Completed,
        });
        assert_eq!(msg, Msg::NoOp);
    }

    #[test]
    fn installing_state_is_announced() {
        let msg = map_event(EngineEvent::StateChanged {
            job_id: 1,
            state: JobState::Installing,
        });
        assert!(matches!(
            msg,
            Msg::JobProgress {
                stage: Stage::Installing,
                ..
            }
        ));
    }
}
