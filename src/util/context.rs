//! Global context for pipeline operations.
//!
//! Everything an operation needs is resolved once at startup: the
//! configuration, the signing identity, the SDK tool locations and the
//! release layout. Resolution failures are fatal before any stage runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::android::AndroidSdk;
use crate::core::layout::ReleaseLayout;
use crate::util::config::{Config, SigningIdentity};
use crate::util::process::{Executor, SystemExecutor};

/// Global context containing configuration, paths and the process executor.
#[derive(Clone)]
pub struct GlobalContext {
    /// Current working directory at startup
    cwd: PathBuf,

    config: Config,

    signing: SigningIdentity,

    sdk: AndroidSdk,

    layout: ReleaseLayout,

    executor: Arc<dyn Executor>,
}

impl std::fmt::Debug for GlobalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalContext")
            .field("cwd", &self.cwd)
            .field("config", &self.config)
            .field("sdk", &self.sdk)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl GlobalContext {
    /// Load the configuration file and resolve everything from it.
    pub fn load(config_path: &Path) -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        let config = Config::load(config_path)?;
        let signing = config.signing_identity()?;
        let sdk = AndroidSdk::discover(&config)?;

        Ok(Self::new(cwd, config, signing, sdk, Arc::new(SystemExecutor)))
    }

    /// Assemble a context from already-resolved parts.
    pub fn new(
        cwd: PathBuf,
        config: Config,
        signing: SigningIdentity,
        sdk: AndroidSdk,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let layout = ReleaseLayout::from_config(&config);
        GlobalContext {
            cwd,
            config,
            signing,
            sdk,
            layout,
            executor,
        }
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn signing(&self) -> &SigningIdentity {
        &self.signing
    }

    pub fn sdk(&self) -> &AndroidSdk {
        &self.sdk
    }

    pub fn layout(&self) -> &ReleaseLayout {
        &self.layout
    }

    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    /// Root of the CMake project: the configured directory or the cwd.
    pub fn project_dir(&self) -> &Path {
        self.config.project_dir.as_deref().unwrap_or(&self.cwd)
    }
}
