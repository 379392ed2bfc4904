use kiwitex_core::{AppViewModel, ConversionResult, SessionState, Stage};

const BAR_WIDTH: usize = 30;

/// One status line per state change; a summary once the session ends.
pub fn render(view: &AppViewModel) -> Vec<String> {
    match view.session {
        SessionState::Idle => Vec::new(),
        SessionState::Converting => vec![format!(
            "{} {:<11} {}",
            view.progress_bar(BAR_WIDTH),
            stage_label(view.stage),
            view.message
        )],
        SessionState::Finished => match &view.last_result {
            Some(ConversionResult::Success { artifact }) => {
                vec![format!("Done: {}", artifact.display())]
            }
            Some(ConversionResult::Failed {
                code,
                summary,
                detail,
            }) => {
                let mut lines = vec![format!("Failed [{code}]: {summary}")];
                lines.extend(detail.lines().filter(|l| !l.is_empty()).map(|l| format!("  {l}")));
                lines
            }
            None => Vec::new(),
        },
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Waiting => "waiting",
        Stage::Detecting => "detecting",
        Stage::Installing => "installing",
        Stage::Compiling => "compiling",
        Stage::Finalizing => "finalizing",
        Stage::Done => "done",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn failure_summary_is_followed_by_indented_detail() {
        let view = AppViewModel {
            session: SessionState::Finished,
            last_result: Some(ConversionResult::Failed {
                code: "timeout".to_string(),
                summary: "The operation took too long and was stopped.".to_string(),
                detail: "timeout: no result after 300 seconds".to_string(),
            }),
            ..AppViewModel::default()
        };
        assert_eq!(
            render(&view),
            vec![
                "Failed [timeout]: The operation took too long and was stopped.".to_string(),
                "  timeout: no result after 300 seconds".to_string(),
            ]
        );
    }

    #[test]
    fn converting_shows_bar_and_stage() {
        let view = AppViewModel {
            session: SessionState::Converting,
            stage: Stage::Compiling,
            percent: 50,
            message: "Pass 1: page 2".to_string(),
            source: Some(PathBuf::from("a.tex")),
            ..AppViewModel::default()
        };
        let lines = render(&view);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" 50%"));
        assert!(lines[0].contains("compiling"));
        assert!(lines[0].ends_with("Pass 1: page 2"));
    }
}
