//! High-level operations.
//!
//! This module contains the release pipeline stages and teardown.

pub mod assemble;
pub mod errors;
pub mod teardown;

use anyhow::{Context, Result};

use crate::util::process::{Executor, ProcessBuilder};

pub use assemble::{assemble, AssembleReport, Extraction, Freshness};
pub use errors::{PipelineError, Stage};
pub use teardown::{clean, CleanReport};

/// Run one external tool for a stage and require a zero exit status.
pub(crate) fn run_tool(
    exec: &dyn Executor,
    stage: Stage,
    tool: &str,
    cmd: &ProcessBuilder,
) -> Result<()> {
    let status = exec
        .run(cmd)
        .with_context(|| format!("{} stage failed: could not start `{}`", stage, tool))?;

    if !status.success() {
        return Err(PipelineError::ToolFailed {
            stage,
            tool: tool.to_string(),
            status,
            command: cmd.display_command(),
        }
        .into());
    }
    Ok(())
}
