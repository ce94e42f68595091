//! Subprocess execution utilities.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};

/// Builder for subprocess execution.
///
/// Arguments are kept as an argument vector and never pass through a shell.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_os_string()));
        self
    }

    /// Set the working directory of the child.
    ///
    /// The parent's working directory is never changed.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Get the working directory, if one was set.
    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute with inherited stdio and return the exit status.
    pub fn status(&self) -> Result<ExitStatus> {
        let mut cmd = self.build_command();
        let status = cmd
            .status()
            .with_context(|| format!("failed to execute `{}`", self.program.display()))?;
        Ok(status)
    }

    /// Display the command for error messages.
    ///
    /// Lossy for non-UTF-8 arguments; the child receives them unchanged.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().map(|a| a.to_string_lossy().into_owned()));
        parts.join(" ")
    }
}

/// How a finished subprocess exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

impl ExitInfo {
    /// A clean exit with the given code.
    pub fn code(code: i32) -> Self {
        ExitInfo { code: Some(code) }
    }

    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        ExitInfo {
            code: status.code(),
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Runs external programs on behalf of the pipeline.
///
/// Every invocation blocks until the child exits.
pub trait Executor {
    /// Run the command to completion and report how it exited.
    ///
    /// `Err` means the program could not be started at all.
    fn run(&self, cmd: &ProcessBuilder) -> Result<ExitInfo>;
}

/// Executor that spawns real processes with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, cmd: &ProcessBuilder) -> Result<ExitInfo> {
        tracing::debug!("running `{}`", cmd.display_command());
        if let Some(cwd) = cmd.get_cwd() {
            tracing::debug!("  in {}", cwd.display());
        }
        Ok(cmd.status()?.into())
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Locate a program given either as a path or as a bare name on PATH.
pub fn locate_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    program.to_str().and_then(find_executable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("zipalign").args(["-p", "-v", "-f", "4", "in.apk", "out.apk"]);

        assert_eq!(pb.display_command(), "zipalign -p -v -f 4 in.apk out.apk");
    }

    #[test]
    fn test_cwd_is_recorded() {
        let pb = ProcessBuilder::new("ninja").arg("install").cwd("/tmp/build.rel");
        assert_eq!(pb.get_cwd(), Some(Path::new("/tmp/build.rel")));
        assert_eq!(pb.get_args(), [OsString::from("install")]);
    }

    #[test]
    fn test_exit_info_display() {
        assert_eq!(ExitInfo::code(3).to_string(), "exit code 3");
        assert_eq!(ExitInfo { code: None }.to_string(), "terminated by signal");
        assert!(ExitInfo::code(0).success());
        assert!(!ExitInfo::code(1).success());
    }

    #[test]
    fn test_locate_program_checks_explicit_paths() {
        let tmp = tempfile::TempDir::new().unwrap();
        let java = tmp.path().join("java");
        std::fs::write(&java, "").unwrap();

        assert_eq!(locate_program(&java), Some(java.clone()));
        assert_eq!(locate_program(&tmp.path().join("missing")), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_arguments_pass_through() {
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"lib/\xffcoop.so");
        let pb = ProcessBuilder::new("zipalign").arg(raw);
        assert_eq!(pb.get_args()[0].as_bytes(), raw.as_bytes());
        assert!(pb.display_command().starts_with("zipalign lib/"));
    }

    #[cfg(unix)]
    #[test]
    fn test_system_executor_reports_status() {
        let exit = SystemExecutor.run(&ProcessBuilder::new("true")).unwrap();
        assert!(exit.success());

        let exit = SystemExecutor.run(&ProcessBuilder::new("false")).unwrap();
        assert_eq!(exit.code, Some(1));
    }
}
