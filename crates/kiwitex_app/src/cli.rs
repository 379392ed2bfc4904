//! Command line arguments.

use std::path::{Path, PathBuf};

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "kiwitex")]
#[command(version, about = "Convert a LaTeX document to PDF, installing LaTeX first if needed", long_about = None)]
pub struct Cli {
    /// LaTeX source file
    pub source: PathBuf,

    /// Directory for the PDF (defaults to the source's directory)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// RON settings file (defaults to kiwitex.ron next to the executable, if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for log files
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Also show compiler output on the terminal
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn destination(&self) -> PathBuf {
        match &self.out {
            Some(out) => out.clone(),
            None => match self.source.parent() {
                Some(parent) if parent != Path::new("") => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }
}
