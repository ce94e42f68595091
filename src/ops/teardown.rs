//! Teardown of build outputs.
//!
//! Runs the build system's own clean target, then empties the install
//! directory except for the release package and the extraction tree.

use std::path::{Path, PathBuf};

use anyhow::Result;
use walkdir::WalkDir;

use crate::builder::cmake::CMakeBuilder;
use crate::util::context::GlobalContext;
use crate::util::fs::{list_dir, remove_path};

/// What a clean removed and what it kept.
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    /// Top-level install directory entries that were deleted.
    pub removed: Vec<PathBuf>,
    /// Number of regular files under the removed entries.
    pub files_removed: usize,
    /// Preserved entries that were present.
    pub kept: Vec<PathBuf>,
}

/// Clean the build directory and the install directory.
///
/// Fails without touching the install directory when the build directory
/// does not exist.
pub fn clean(ctx: &GlobalContext) -> Result<CleanReport> {
    CMakeBuilder::new(ctx).clean()?;

    let layout = ctx.layout();
    let mut report = CleanReport::default();

    if !layout.install_dir.is_dir() {
        tracing::debug!("install directory {} does not exist", layout.install_dir.display());
        return Ok(report);
    }

    let preserved = layout.preserved();
    for entry in list_dir(&layout.install_dir)? {
        if preserved.contains(&entry.as_path()) {
            report.kept.push(entry);
            continue;
        }

        report.files_removed += count_files(&entry);
        tracing::info!("Removing {}", entry.display());
        remove_path(&entry)?;
        report.removed.push(entry);
    }

    Ok(report)
}

fn count_files(path: &Path) -> usize {
    WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}
