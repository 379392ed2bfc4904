//! Deterministic mapping from a failed process to a [`ClassifiedError`].
//!
//! Categories are checked in a fixed priority order over the whole output;
//! the first category with a matching line wins.

use std::io;
use std::sync::LazyLock;

use regex::Regex;

use crate::process::ProcessError;
use crate::{ClassifiedError, ErrorKind, SourceLocation};

/// Lines kept from the end of the output when nothing more specific matched.
pub const TAIL_LINES: usize = 20;

/// `./chapter.tex:42: Undefined control sequence.` (`-file-line-error`).
static FILE_LINE_ERROR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?):(\d+): (.+)$").expect("valid file-line regex"));

/// `l.42 \foo` context line TeX prints after an error.
static CONTEXT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^l\.(\d+)").expect("valid context regex"));

/// ``File `natbib.sty' not found`` and friends; captures the file name.
static FILE_NOT_FOUND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"File `([^']+)' not found").expect("valid not-found regex"));

const SYNTAX_MARKERS: &[&str] = &[
    "undefined control sequence",
    "missing $ inserted",
    "missing } inserted",
    "missing { inserted",
    "extra }, or forgotten",
    "extra alignment tab",
    "misplaced alignment tab",
    "runaway argument",
    "paragraph ended before",
    "missing \\begin{document}",
    "ended by \\end",
    "too many }'s",
    "double superscript",
    "double subscript",
    "missing number",
    "illegal unit",
];

const PERMISSION_MARKERS: &[&str] = &[
    "permission denied",
    "access is denied",
    "i can't write on file",
    "not writable",
    "operation not permitted",
];

const NETWORK_MARKERS: &[&str] = &[
    "could not resolve",
    "name resolution",
    "network is unreachable",
    "no internet",
    "connection refused",
    "connection timed out",
    "couldn't connect",
    "unable to connect",
    "failed to download",
    "no route to host",
    "remote package repository",
];

/// Classifies a compiler pass that exited unsuccessfully.
pub fn classify_compilation(exit_code: Option<i32>, lines: &[String]) -> ClassifiedError {
    if let Some(error) = find_missing_input(lines) {
        return error;
    }
    if let Some(error) = find_syntax_error(lines) {
        return error;
    }
    if let Some(error) = find_missing_resource(lines) {
        return error;
    }
    if let Some(line) = find_marker(lines, PERMISSION_MARKERS) {
        return ClassifiedError::new(ErrorKind::PermissionDenied, line.trim());
    }
    ClassifiedError::new(
        ErrorKind::UnknownCompilationError,
        format!("{}\n{}", describe_exit(exit_code), tail(lines)),
    )
}

/// Classifies an installer that exited unsuccessfully.
pub fn classify_installation(exit_code: Option<i32>, lines: &[String]) -> ClassifiedError {
    if let Some(line) = find_marker(lines, NETWORK_MARKERS) {
        return ClassifiedError::new(ErrorKind::NetworkUnavailable, line.trim());
    }
    if let Some(line) = find_marker(lines, PERMISSION_MARKERS) {
        return ClassifiedError::new(ErrorKind::PermissionDenied, line.trim());
    }
    ClassifiedError::new(
        ErrorKind::InstallationFailed,
        format!("installer {}\n{}", describe_exit(exit_code), tail(lines)),
    )
}

/// Maps a supervision failure. `not_found` is the kind reported when the
/// executable itself does not exist.
pub fn classify_process_error(error: &ProcessError, not_found: ErrorKind) -> ClassifiedError {
    match error {
        ProcessError::Timeout { limit, .. } => ClassifiedError::new(
            ErrorKind::Timeout,
            format!("no result after {} seconds", limit.as_secs()),
        ),
        ProcessError::Cancelled { .. } => {
            ClassifiedError::new(ErrorKind::Cancelled, "cancelled by user")
        }
        ProcessError::Spawn { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
            ClassifiedError::new(ErrorKind::PermissionDenied, error.to_string())
        }
        ProcessError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound => {
            ClassifiedError::new(not_found, error.to_string())
        }
        ProcessError::Spawn { .. } | ProcessError::Io(_) => {
            ClassifiedError::new(ErrorKind::UnknownCompilationError, error.to_string())
        }
    }
}

fn find_missing_input(lines: &[String]) -> Option<ClassifiedError> {
    lines.iter().find_map(|line| {
        if let Some(rest) = line.split("! I can't find file").nth(1) {
            let name = rest.trim().trim_matches(|c: char| c == '`' || c == '\'' || c == '.');
            return Some(ClassifiedError::new(
                ErrorKind::SourceFileMissing,
                format!("input file not found: {name}"),
            ));
        }
        let name = not_found_file(line)?;
        is_tex_input(&name).then(|| {
            ClassifiedError::new(
                ErrorKind::SourceFileMissing,
                format!("input file not found: {name}"),
            )
        })
    })
}

fn find_syntax_error(lines: &[String]) -> Option<ClassifiedError> {
    let (index, line) = lines.iter().enumerate().find(|(_, line)| {
        let lower = line.to_ascii_lowercase();
        SYNTAX_MARKERS.iter().any(|m| lower.contains(m))
            || (lower.contains("latex error: environment") && lower.contains("undefined"))
    })?;

    let (message, location) = match FILE_LINE_ERROR.captures(line.trim()) {
        Some(caps) => {
            let location = caps[2].parse().ok().map(|line| SourceLocation {
                file: Some(caps[1].to_string()),
                line,
            });
            (caps[3].to_string(), location)
        }
        None => {
            let message = line.trim().trim_start_matches('!').trim().to_string();
            (message, context_line_after(lines, index))
        }
    };
    Some(ClassifiedError::new(ErrorKind::CompilationSyntaxError, message).with_location(location))
}

fn find_missing_resource(lines: &[String]) -> Option<ClassifiedError> {
    lines.iter().find_map(|line| {
        if let Some(name) = not_found_file(line) {
            return Some(ClassifiedError::new(
                ErrorKind::MissingResource,
                format!("required file not found: {name}"),
            ));
        }
        let lower = line.to_ascii_lowercase();
        (lower.contains("font ") && lower.contains("not loadable")).then(|| {
            ClassifiedError::new(ErrorKind::MissingResource, line.trim().trim_start_matches("! "))
        })
    })
}

/// TeX prints `l.<n>` a few lines below the `!` line it belongs to.
fn context_line_after(lines: &[String], index: usize) -> Option<SourceLocation> {
    lines.iter().skip(index + 1).take(8).find_map(|line| {
        let caps = CONTEXT_LINE.captures(line.trim_start())?;
        let line = caps[1].parse().ok()?;
        Some(SourceLocation { file: None, line })
    })
}

fn not_found_file(line: &str) -> Option<String> {
    FILE_NOT_FOUND
        .captures(line)
        .map(|caps| caps[1].to_string())
}

fn is_tex_input(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".tex") || !lower.contains('.')
}

fn find_marker<'a>(lines: &'a [String], markers: &[&str]) -> Option<&'a String> {
    lines.iter().find(|line| {
        let lower = line.to_ascii_lowercase();
        markers.iter().any(|m| lower.contains(m))
    })
}

fn describe_exit(exit_code: Option<i32>) -> String {
    match exit_code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

fn tail(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..].join("\n")
}
