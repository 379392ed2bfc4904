use std::sync::{LazyLock, Mutex};

use regex::Regex;

use crate::{Phase, ProgressEvent};

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// `[3]`, `[12{/usr/share/texmf/pdftex.map}]`: a shipped-out page.
static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)(?:[\]{\s]|$)").expect("valid page regex"));

/// `[12/345, 00:10/01:30] install: amsmath` as printed by install-tl.
static INSTALL_COUNTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)/(\d+)[,\]]").expect("valid counter regex"));

/// Pages after which the page marker stops advancing the estimate.
const PAGE_CEILING: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilePass {
    First,
    Second,
}

impl CompilePass {
    pub fn number(self) -> u8 {
        match self {
            CompilePass::First => 1,
            CompilePass::Second => 2,
        }
    }

    /// Start of this pass inside the 0..=100 compiling range.
    pub fn offset(self) -> u8 {
        match self {
            CompilePass::First => 0,
            CompilePass::Second => 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Installing,
    Compiling(CompilePass),
}

/// Maps single lines of toolchain output to progress estimates.
///
/// Stateless: the same line always yields the same event. Percentages are
/// heuristic; ordering across lines is enforced by [`ProgressGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressMonitor {
    context: Context,
}

impl ProgressMonitor {
    pub fn installing() -> Self {
        Self {
            context: Context::Installing,
        }
    }

    pub fn compiling(pass: CompilePass) -> Self {
        Self {
            context: Context::Compiling(pass),
        }
    }

    pub fn classify(&self, line: &str) -> Option<ProgressEvent> {
        match self.context {
            Context::Installing => classify_install_line(line),
            Context::Compiling(pass) => classify_compile_line(line).map(|(within, message)| {
                // Each pass owns half of the compiling range.
                let percent = pass.offset() + within / 2;
                ProgressEvent::new(
                    Phase::Compiling,
                    percent,
                    format!("Pass {}: {message}", pass.number()),
                )
            }),
        }
    }
}

fn classify_compile_line(line: &str) -> Option<(u8, String)> {
    let trimmed = line.trim();
    if trimmed.starts_with("This is ") && trimmed.contains("TeX") {
        return Some((5, "starting compiler".to_string()));
    }
    if trimmed.contains("entering extended mode") {
        return Some((10, "compiler ready".to_string()));
    }
    if trimmed.starts_with("LaTeX2e <") {
        return Some((15, "loading LaTeX".to_string()));
    }
    if trimmed.starts_with("Document Class:") {
        return Some((25, "loading document class".to_string()));
    }
    if trimmed.starts_with("No file ") && trimmed.ends_with(".aux.") {
        return Some((35, "no cross-reference data yet".to_string()));
    }
    if trimmed.starts_with("Output written on") {
        return Some((95, "writing PDF".to_string()));
    }
    if trimmed.starts_with("Transcript written on") {
        return Some((100, "pass finished".to_string()));
    }
    let page = PAGE_MARKER
        .captures_iter(trimmed)
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max()?;
    let within = 40 + page.min(PAGE_CEILING) * 4;
    Some((within as u8, format!("typesetting page {page}")))
}

fn classify_install_line(line: &str) -> Option<ProgressEvent> {
    if let Some(caps) = INSTALL_COUNTER.captures(line) {
        let done: u64 = caps[1].parse().ok()?;
        let total: u64 = caps[2].parse().ok()?;
        if total > 0 && done <= total {
            let percent = 15 + (75 * done / total) as u8;
            return Some(ProgressEvent::new(
                Phase::Installing,
                percent,
                format!("Installing package {done} of {total}"),
            ));
        }
    }

    let lower = line.to_ascii_lowercase();
    let (percent, message) = if lower.contains("checking") || lower.contains("preparing") {
        (5, "Preparing installation")
    } else if lower.contains("download") {
        (20, "Downloading packages")
    } else if lower.contains("extract") || lower.contains("unpack") {
        (45, "Unpacking packages")
    } else if lower.contains("installing") {
        (60, "Installing packages")
    } else if lower.contains("file name database") || lower.contains("configur") {
        (85, "Configuring toolchain")
    } else if lower.contains("finished") || lower.contains("completed") {
        (95, "Finishing installation")
    } else {
        return None;
    };
    Some(ProgressEvent::new(Phase::Installing, percent, message))
}

/// Enforces job-wide ordering in front of another sink.
///
/// Events for a phase earlier than the current one are dropped; within a
/// phase the percentage never goes backwards.
pub struct ProgressGate<S> {
    inner: S,
    last: Mutex<Option<(Phase, u8)>>,
}

impl<S: ProgressSink> ProgressGate<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            last: Mutex::new(None),
        }
    }
}

impl<S: ProgressSink> ProgressSink for ProgressGate<S> {
    fn emit(&self, mut event: ProgressEvent) {
        let mut last = self.last.lock().unwrap_or_else(|p| p.into_inner());
        match *last {
            Some((phase, _)) if event.phase < phase => return,
            Some((phase, percent)) if event.phase == phase && event.percent < percent => {
                event.percent = percent;
            }
            _ => {}
        }
        *last = Some((event.phase, event.percent));
        self.inner.emit(event);
    }
}
