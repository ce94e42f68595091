//! CMake/Ninja driver for the native shared library.
//!
//! The project itself is opaque: it is configured once per build directory
//! with the NDK toolchain and then driven through Ninja's `install` and
//! `clean` targets.

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::core::layout::BuildDirectory;
use crate::ops::errors::{PipelineError, Stage};
use crate::ops::run_tool;
use crate::util::context::GlobalContext;
use crate::util::process::ProcessBuilder;

/// Result of a configure request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureOutcome {
    /// The build directory was created and the generator ran.
    Generated,
    /// The build directory already existed; nothing ran.
    Reused,
}

/// CMake build driver bound to one build directory.
pub struct CMakeBuilder<'a> {
    ctx: &'a GlobalContext,
}

impl<'a> CMakeBuilder<'a> {
    pub fn new(ctx: &'a GlobalContext) -> Self {
        CMakeBuilder { ctx }
    }

    pub fn build_dir(&self) -> &BuildDirectory {
        &self.ctx.layout().build_dir
    }

    /// Cache options for the generator, ordered by key.
    ///
    /// Each entry renders as key immediately followed by value.
    pub fn configure_options(&self) -> BTreeMap<&'static str, String> {
        let config = self.ctx.config();
        let sdk = self.ctx.sdk();
        let abi = config.target_abi.to_string();

        let mut options = BTreeMap::new();
        options.insert("-DANDROID_NDK=", sdk.ndk().display().to_string());
        options.insert("-DANDROID_ABI=", abi.clone());
        options.insert("-DANDROID_PLATFORM=", config.min_sdk.to_string());
        options.insert("-DCMAKE_ANDROID_ARCH_ABI=", abi);
        options.insert("-DANDROID_STL=", config.stl.clone());
        options.insert("-DCMAKE_SYSTEM_NAME=", "Android".to_string());
        options.insert(
            "-DCMAKE_TOOLCHAIN_FILE=",
            sdk.toolchain_file().display().to_string(),
        );

        options.insert("-DCOOP_OUTRELDIR=", config.install_dir.display().to_string());
        options.insert("-DCOOP_SHARED_NAME=", config.lib_name.clone());
        options.insert("-DCOOP_VERSION=", config.version.clone());

        options.insert("-DCMAKE_BUILD_TYPE=", config.build_type().to_string());
        options.insert("-DCMAKE_MAKE_PROGRAM=", sdk.ninja().display().to_string());
        options.insert("-DCMAKE_EXPORT_COMPILE_COMMANDS=", "On".to_string());
        options.insert("-G", "Ninja".to_string());
        options
    }

    /// The full generator invocation, run from inside the build directory.
    pub fn configure_command(&self) -> ProcessBuilder {
        let args = self
            .configure_options()
            .into_iter()
            .map(|(key, value)| format!("{}{}", key, value));

        ProcessBuilder::new(self.ctx.sdk().cmake())
            .args(args)
            .arg(self.ctx.project_dir())
            .cwd(self.build_dir().path())
    }

    /// Create and configure the build directory unless it already exists.
    pub fn configure(&self) -> Result<ConfigureOutcome> {
        let build_dir = self.build_dir();

        if build_dir.exists() {
            if !build_dir.is_configured() {
                tracing::warn!(
                    "build directory {} exists but has no CMake cache; remove it to reconfigure",
                    build_dir.path().display()
                );
            }
            tracing::debug!("reusing build directory {}", build_dir.path().display());
            return Ok(ConfigureOutcome::Reused);
        }

        std::fs::create_dir_all(build_dir.path()).with_context(|| {
            format!("failed to create build directory: {}", build_dir.path().display())
        })?;

        let cmd = self.configure_command();
        tracing::info!("Configuring {}", build_dir.path().display());
        tracing::debug!("CMake options: {:?}", cmd.get_args());

        // No rollback: the directory stays as the generator left it.
        run_tool(self.ctx.executor(), Stage::Configure, "cmake", &cmd).with_context(|| {
            format!(
                "build directory {} is left partially configured; remove it before retrying",
                build_dir.path().display()
            )
        })?;

        Ok(ConfigureOutcome::Generated)
    }

    /// Run `ninja install`, populating the install directory.
    pub fn install(&self) -> Result<()> {
        let build_dir = self.build_dir();
        if build_dir.exists() && !build_dir.is_configured() {
            return Err(PipelineError::missing(
                Stage::Build,
                "CMake cache",
                build_dir.path().join("CMakeCache.txt"),
            )
            .with_hint("remove the build directory and run with --configure")
            .into());
        }
        self.ninja(Stage::Build, "install")
    }

    /// Run `ninja clean`.
    pub fn clean(&self) -> Result<()> {
        self.ninja(Stage::Clean, "clean")
    }

    fn ninja(&self, stage: Stage, target: &str) -> Result<()> {
        let build_dir = self.build_dir();
        if !build_dir.exists() {
            return Err(PipelineError::missing(stage, "build directory", build_dir.path())
                .with_hint("run with --configure first")
                .into());
        }

        tracing::info!("Running ninja {} in {}", target, build_dir.path().display());
        let cmd = ProcessBuilder::new(self.ctx.sdk().ninja())
            .arg(target)
            .cwd(build_dir.path());
        run_tool(self.ctx.executor(), stage, "ninja", &cmd)
    }
}
