use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal};
use std::process::ExitCode;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use engine_logging::{engine_info, LogStream, Logger};
use kiwitex_core::{update, AppState, ConversionResult, Msg, SessionState};
use kiwitex_engine::JobManager;

use super::effects::EffectRunner;
use super::{logging, render, settings};
use crate::cli::Cli;

const POLL_INTERVAL: Duration = Duration::from_millis(75);
const COMPONENT: &str = "app";

pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    let log_dir = cli.log_dir.clone().unwrap_or_else(logging::default_log_dir);
    let logger = logging::initialize(&log_dir, cli.verbose)
        .with_context(|| format!("failed to open log directory {}", log_dir.display()))?;
    let settings = settings::load(cli.config.as_deref(), &settings::executable_dir())?;

    let mut effects = EffectRunner::new(JobManager::new(settings, logger.clone()));
    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    if io::stdin().is_terminal() {
        eprintln!("Type c and press Enter to cancel.");
    }
    spawn_cancel_listener(msg_tx.clone());

    let _ = msg_tx.send(Msg::ConvertRequested {
        source: cli.source.clone(),
        destination: cli.destination(),
    });

    let mut state = AppState::new();
    let mut printed: Vec<String> = Vec::new();
    loop {
        let mut inbox: VecDeque<Msg> = msg_rx.try_iter().collect();
        if let Some(msg) = effects.poll(POLL_INTERVAL) {
            inbox.push_back(msg);
        }
        inbox.push_back(Msg::Tick);

        while let Some(msg) = inbox.pop_front() {
            let (next, requested) = update(state, msg);
            state = next;
            inbox.extend(effects.run(requested));
        }

        if state.consume_dirty() {
            for line in render::render(&state.view()) {
                if !printed.contains(&line) {
                    println!("{line}");
                    printed.push(line);
                }
            }
        }

        if state.session() == SessionState::Finished {
            return Ok(finish(&logger, &state));
        }
    }
}

fn finish(logger: &Logger, state: &AppState) -> ExitCode {
    match state.view().last_result {
        Some(ConversionResult::Success { artifact }) => {
            logger.info(
                LogStream::Application,
                COMPONENT,
                format!("conversion finished: {}", artifact.display()),
            );
            ExitCode::SUCCESS
        }
        Some(ConversionResult::Failed { code, .. }) => {
            logger.warn(
                LogStream::Application,
                COMPONENT,
                format!("conversion failed: {code}"),
            );
            ExitCode::from(1)
        }
        None => ExitCode::FAILURE,
    }
}

/// Reads stdin lines; `c`, `cancel` or `q` request cancellation.
fn spawn_cancel_listener(msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if matches!(line.trim(), "c" | "cancel" | "q") {
                engine_info!("Cancellation requested from terminal");
                if msg_tx.send(Msg::CancelClicked).is_err() {
                    break;
                }
            }
        }
    });
}
