use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;
use thiserror::Error;

/// Extensions that survive auxiliary cleanup.
const KEEP_EXTENSIONS: &[&str] = &["tex", "pdf"];

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), OutputError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| OutputError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(OutputError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| OutputError::OutputDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| OutputError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Remembers the artifact's state before a compile so a failed or cancelled
/// run can remove what it wrote without touching an older, untouched file.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
    baseline: Option<Fingerprint>,
}

/// Modification time and length, enough to tell a rewrite from an old file.
type Fingerprint = (SystemTime, u64);

impl ArtifactGuard {
    pub fn new(path: PathBuf) -> Self {
        let baseline = fingerprint(&path);
        Self { path, baseline }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the artifact exists and appeared or changed since the guard
    /// was made. A leftover from an earlier run does not count.
    pub fn was_written(&self) -> bool {
        match fingerprint(&self.path) {
            Some(current) => Some(current) != self.baseline,
            None => false,
        }
    }

    /// Deletes the artifact if it appeared or changed since the guard was made.
    pub fn discard(&self) -> io::Result<bool> {
        if !self.was_written() {
            return Ok(false);
        }
        fs::remove_file(&self.path)?;
        Ok(true)
    }
}

fn fingerprint(path: &Path) -> Option<Fingerprint> {
    let meta = fs::metadata(path).ok()?;
    if !meta.is_file() {
        return None;
    }
    Some((meta.modified().ok()?, meta.len()))
}

/// Removes `<stem>.*` files in `dir` other than `.tex` and `.pdf`, which is
/// what a pdfLaTeX run leaves behind (`.aux`, `.log`, `.out`, `.toc`, ...).
pub fn remove_auxiliary_files(dir: &Path, stem: &str) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
            continue;
        }
        if path.file_stem().and_then(|s| s.to_str()) != Some(stem) {
            continue;
        }
        let keep = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| KEEP_EXTENSIONS.iter().any(|k| k.eq_ignore_ascii_case(ext)));
        if keep {
            continue;
        }
        fs::remove_file(&path)?;
        removed.push(path);
    }
    removed.sort();
    Ok(removed)
}
