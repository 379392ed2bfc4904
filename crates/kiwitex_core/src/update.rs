use crate::{AppState, Effect, Msg, SessionState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ConvertRequested {
            source,
            destination,
        } => {
            if state.session() == SessionState::Converting {
                return (state, Vec::new());
            }
            state.begin(source.clone());
            vec![Effect::StartConversion {
                source,
                destination,
            }]
        }
        Msg::ConversionAccepted { job_id } => {
            state.accept(job_id);
            Vec::new()
        }
        Msg::ConversionRejected { code, summary } => {
            state.reject(code, summary);
            Vec::new()
        }
        Msg::CancelClicked => match state.request_cancel() {
            Some(job_id) => vec![Effect::CancelJob { job_id }],
            None => Vec::new(),
        },
        Msg::JobProgress {
            job_id,
            stage,
            percent,
            message,
        } => {
            state.apply_progress(job_id, stage, percent, message);
            Vec::new()
        }
        Msg::JobDone { job_id, result } => {
            state.apply_done(job_id, result);
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
