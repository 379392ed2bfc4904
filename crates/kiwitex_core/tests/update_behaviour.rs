use std::path::PathBuf;
use std::sync::Once;

use kiwitex_core::{update, AppState, ConversionResult, Effect, Msg, SessionState, Stage};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn request(state: AppState) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::ConvertRequested {
            source: PathBuf::from("/docs/thesis.tex"),
            destination: PathBuf::from("/out"),
        },
    )
}

fn started(job_id: u64) -> AppState {
    let (state, _) = request(AppState::new());
    let (state, _) = update(state, Msg::ConversionAccepted { job_id });
    state
}

fn progress(job_id: u64, stage: Stage, percent: u8) -> Msg {
    Msg::JobProgress {
        job_id,
        stage,
        percent,
        message: format!("{stage:?} {percent}"),
    }
}

#[test]
fn convert_request_starts_a_conversion() {
    init_logging();
    let (mut state, effects) = request(AppState::new());

    assert_eq!(
        effects,
        vec![Effect::StartConversion {
            source: PathBuf::from("/docs/thesis.tex"),
            destination: PathBuf::from("/out"),
        }]
    );
    let view = state.view();
    assert_eq!(view.session, SessionState::Converting);
    assert_eq!(view.stage, Stage::Waiting);
    assert_eq!(view.source, Some(PathBuf::from("/docs/thesis.tex")));
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}

#[test]
fn second_request_while_converting_is_ignored() {
    init_logging();
    let state = started(1);
    let before = state.clone();

    let (state, effects) = request(state);

    assert!(effects.is_empty());
    assert_eq!(state, before);
}

#[test]
fn progress_advances_stage_and_never_moves_back() {
    init_logging();
    let state = started(7);

    let (state, _) = update(state, progress(7, Stage::Detecting, 100));
    let (state, _) = update(state, progress(7, Stage::Compiling, 20));
    assert_eq!(state.view().stage, Stage::Compiling);
    assert_eq!(state.view().percent, 20);

    let (state, _) = update(state, progress(7, Stage::Compiling, 10));
    assert_eq!(state.view().percent, 20);

    let (state, _) = update(state, progress(7, Stage::Detecting, 50));
    assert_eq!(state.view().stage, Stage::Compiling);
    assert_eq!(state.view().percent, 20);
}

#[test]
fn progress_for_another_job_is_ignored() {
    init_logging();
    let mut state = started(2);
    state.consume_dirty();

    let (mut state, _) = update(state, progress(99, Stage::Compiling, 40));

    assert_eq!(state.view().stage, Stage::Waiting);
    assert!(!state.consume_dirty());
}

#[test]
fn successful_completion_finishes_the_session() {
    init_logging();
    let state = started(3);
    let (state, _) = update(state, progress(3, Stage::Finalizing, 100));
    let (state, _) = update(
        state,
        Msg::JobDone {
            job_id: 3,
            result: ConversionResult::Success {
                artifact: PathBuf::from("/out/thesis.pdf"),
            },
        },
    );

    let view = state.view();
    assert_eq!(view.session, SessionState::Finished);
    assert_eq!(view.stage, Stage::Done);
    assert_eq!(view.percent, 100);
    assert_eq!(view.message, "Created /out/thesis.pdf");
    assert!(view.last_result.unwrap().is_success());
}

#[test]
fn failure_shows_the_friendly_summary() {
    init_logging();
    let state = started(4);
    let (state, _) = update(state, progress(4, Stage::Compiling, 30));
    let (state, _) = update(
        state,
        Msg::JobDone {
            job_id: 4,
            result: ConversionResult::Failed {
                code: "compilation_syntax_error".to_string(),
                summary: "The document contains an error.".to_string(),
                detail: "Undefined control sequence. (at main.tex:7)".to_string(),
            },
        },
    );

    let view = state.view();
    assert_eq!(view.session, SessionState::Finished);
    assert_eq!(view.percent, 30);
    assert_eq!(view.message, "The document contains an error.");
}

#[test]
fn cancel_is_sent_once_for_the_running_job() {
    init_logging();
    let state = started(5);

    let (state, effects) = update(state, Msg::CancelClicked);
    assert_eq!(effects, vec![Effect::CancelJob { job_id: 5 }]);
    assert!(state.view().cancel_requested);

    let (_state, effects) = update(state, Msg::CancelClicked);
    assert!(effects.is_empty());
}

#[test]
fn cancel_before_acceptance_or_when_idle_does_nothing() {
    init_logging();
    let (_state, effects) = update(AppState::new(), Msg::CancelClicked);
    assert!(effects.is_empty());

    let (state, _) = request(AppState::new());
    let (_state, effects) = update(state, Msg::CancelClicked);
    assert!(effects.is_empty());
}

#[test]
fn rejection_ends_the_pending_request() {
    init_logging();
    let (state, _) = request(AppState::new());
    let (state, _) = update(
        state,
        Msg::ConversionRejected {
            code: "job_already_running".to_string(),
            summary: "A conversion is already running.".to_string(),
        },
    );

    let view = state.view();
    assert_eq!(view.session, SessionState::Finished);
    assert_eq!(
        view.last_result,
        Some(ConversionResult::Failed {
            code: "job_already_running".to_string(),
            summary: "A conversion is already running.".to_string(),
            detail: String::new(),
        })
    );
}

#[test]
fn new_request_after_finish_resets_the_view() {
    init_logging();
    let state = started(6);
    let (state, _) = update(
        state,
        Msg::JobDone {
            job_id: 6,
            result: ConversionResult::Success {
                artifact: PathBuf::from("/out/thesis.pdf"),
            },
        },
    );

    let (state, effects) = request(state);

    assert_eq!(effects.len(), 1);
    let view = state.view();
    assert_eq!(view.session, SessionState::Converting);
    assert_eq!(view.job_id, None);
    assert_eq!(view.percent, 0);
    assert_eq!(view.last_result, None);
}

#[test]
fn progress_bar_renders_proportionally() {
    init_logging();
    let state = started(8);
    let (state, _) = update(state, progress(8, Stage::Compiling, 50));
    assert_eq!(state.view().progress_bar(10), "[#####.....]  50%");
}
