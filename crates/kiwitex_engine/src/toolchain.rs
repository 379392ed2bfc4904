use std::env::consts::EXE_SUFFIX;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::settings::{ToolchainSettings, INSTALL_DIR_PLACEHOLDER};

/// A fully described child process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Platform adapter supplying the paths and argument lists for one toolchain.
pub trait ToolchainProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Places the compiler is expected when installed by us, most preferred first.
    fn candidate_executables(&self) -> Vec<PathBuf>;

    /// Name to look up on `PATH`, if system-wide installations count.
    fn search_path_name(&self) -> Option<String>;

    fn version_command(&self, executable: &Path) -> CommandSpec;

    fn installer_command(&self) -> CommandSpec;

    fn install_requires_elevation(&self) -> bool;

    /// One compiler pass. Runs in the source's directory and writes into
    /// `destination`.
    fn compiler_command(&self, executable: &Path, source: &Path, destination: &Path) -> CommandSpec;

    /// Where a successful compile leaves the artifact.
    fn artifact_path(&self, source: &Path, destination: &Path) -> PathBuf {
        let stem = source.file_stem().unwrap_or(source.as_os_str());
        let mut name = stem.to_os_string();
        name.push(".pdf");
        destination.join(name)
    }
}

/// Settings-driven provider for pdfLaTeX distributions (MiKTeX, TeX Live).
#[derive(Debug, Clone)]
pub struct LatexProvider {
    settings: ToolchainSettings,
}

impl LatexProvider {
    pub fn new(settings: ToolchainSettings) -> Self {
        Self { settings }
    }

    fn compiler_file_name(&self) -> String {
        format!("{}{}", self.settings.compiler, EXE_SUFFIX)
    }
}

impl ToolchainProvider for LatexProvider {
    fn name(&self) -> &str {
        &self.settings.compiler
    }

    /// The bin directory itself, then each directory inside it. TeX Live
    /// installs into `bin/<arch>/` (for example `bin/x86_64-linux`).
    fn candidate_executables(&self) -> Vec<PathBuf> {
        let bin_dir = self.settings.install_dir.join(&self.settings.bin_subdir);
        let file_name = self.compiler_file_name();

        let mut arch_dirs: Vec<PathBuf> = fs::read_dir(&bin_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|entry| entry.path())
                    .filter(|path| path.is_dir())
                    .collect()
            })
            .unwrap_or_default();
        arch_dirs.sort();

        std::iter::once(bin_dir.join(&file_name))
            .chain(arch_dirs.into_iter().map(|dir| dir.join(&file_name)))
            .collect()
    }

    fn search_path_name(&self) -> Option<String> {
        self.settings
            .search_system_path
            .then(|| self.settings.compiler.clone())
    }

    fn version_command(&self, executable: &Path) -> CommandSpec {
        CommandSpec::new(executable).args(self.settings.version_args.iter().cloned())
    }

    fn installer_command(&self) -> CommandSpec {
        let install_dir = self.settings.install_dir.display().to_string();
        CommandSpec::new(&self.settings.installer).args(
            self.settings
                .installer_args
                .iter()
                .map(|arg| arg.replace(INSTALL_DIR_PLACEHOLDER, &install_dir)),
        )
    }

    fn install_requires_elevation(&self) -> bool {
        self.settings.install_requires_elevation
    }

    fn compiler_command(&self, executable: &Path, source: &Path, destination: &Path) -> CommandSpec {
        let work_dir = match source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());

        CommandSpec::new(executable)
            .args(self.settings.compiler_args.iter().cloned())
            .arg(format!("-output-directory={}", destination.display()))
            .arg(file_name)
            .current_dir(work_dir)
    }
}
