//! Stage-tagged pipeline errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::util::process::ExitInfo;

/// A step of the release pipeline, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configure,
    Build,
    Decompile,
    Patch,
    Prune,
    CopyArtifacts,
    Recompile,
    Align,
    Sign,
    Verify,
    Clean,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Configure => "configure",
            Stage::Build => "build",
            Stage::Decompile => "decompile",
            Stage::Patch => "patch",
            Stage::Prune => "prune",
            Stage::CopyArtifacts => "copy-artifacts",
            Stage::Recompile => "recompile",
            Stage::Align => "align",
            Stage::Sign => "sign",
            Stage::Verify => "verify",
            Stage::Clean => "clean",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline failure. Every variant names the stage it happened in.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: `{tool}` exited with {status}\n  command: {command}")]
    ToolFailed {
        stage: Stage,
        tool: String,
        status: ExitInfo,
        command: String,
    },

    #[error("{stage} stage failed: {what} not found at `{}`{}", .path.display(), hint_suffix(.hint))]
    MissingState {
        stage: Stage,
        what: &'static str,
        path: PathBuf,
        hint: Option<&'static str>,
    },

    #[error("{stage} stage failed: {message}")]
    Invalid { stage: Stage, message: String },
}

fn hint_suffix(hint: &Option<&'static str>) -> String {
    match hint {
        Some(hint) => format!("\n  help: {}", hint),
        None => String::new(),
    }
}

impl PipelineError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::ToolFailed { stage, .. }
            | PipelineError::MissingState { stage, .. }
            | PipelineError::Invalid { stage, .. } => *stage,
        }
    }

    pub(crate) fn missing(stage: Stage, what: &'static str, path: impl Into<PathBuf>) -> Self {
        PipelineError::MissingState {
            stage,
            what,
            path: path.into(),
            hint: None,
        }
    }

    pub(crate) fn with_hint(mut self, help: &'static str) -> Self {
        if let PipelineError::MissingState { ref mut hint, .. } = self {
            *hint = Some(help);
        }
        self
    }
}
