//! Device bridge wrappers.
//!
//! Each operation is a single `adb` invocation with inherited stdio. None of
//! them touch pipeline state.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::util::process::{Executor, ExitInfo, ProcessBuilder};

/// Thin front end over the SDK's `adb`.
pub struct DeviceBridge<'a> {
    adb: PathBuf,
    exec: &'a dyn Executor,
}

impl<'a> DeviceBridge<'a> {
    pub fn new(adb: impl Into<PathBuf>, exec: &'a dyn Executor) -> Self {
        DeviceBridge {
            adb: adb.into(),
            exec,
        }
    }

    /// `adb devices`
    pub fn list_devices(&self) -> Result<()> {
        self.run(&["devices"])
    }

    /// `adb connect <target>`
    pub fn connect(&self, target: &str) -> Result<()> {
        if target.trim().is_empty() {
            bail!("connect target must not be empty");
        }
        self.run(&["connect", target])
    }

    /// `adb install -r --streaming <apk>`, replacing any installed copy.
    pub fn install(&self, apk: &Path) -> Result<()> {
        if !apk.is_file() {
            bail!("package to install does not exist: {}", apk.display());
        }
        let apk = apk.to_string_lossy();
        self.run(&["install", "-r", "--streaming", &apk])
    }

    /// `adb logcat <filters>`; blocks until adb exits or is interrupted.
    ///
    /// Logcat only ends on a signal in normal use, so termination by a
    /// signal is the end of the stream rather than a failure.
    pub fn stream_logs(&self, filters: &[String]) -> Result<()> {
        let mut args = vec!["logcat"];
        args.extend(filters.iter().map(String::as_str));
        let exit = self.exec.run(&self.command(&args))?;
        if exit.code.is_none() {
            tracing::info!("logcat stopped");
            return Ok(());
        }
        check(&args, exit)
    }

    fn run(&self, args: &[&str]) -> Result<()> {
        let exit = self.exec.run(&self.command(args))?;
        check(args, exit)
    }

    fn command(&self, args: &[&str]) -> ProcessBuilder {
        ProcessBuilder::new(&self.adb).args(args)
    }
}

fn check(args: &[&str], exit: ExitInfo) -> Result<()> {
    if !exit.success() {
        bail!("`adb {}` failed with {}", args.join(" "), exit);
    }
    Ok(())
}
