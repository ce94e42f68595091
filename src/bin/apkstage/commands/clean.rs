//! `apkstage --clean`

use anyhow::Result;

use super::status;
use apkstage::ops;
use apkstage::GlobalContext;

pub fn execute(ctx: &GlobalContext) -> Result<()> {
    let report = ops::clean(ctx)?;

    for entry in &report.removed {
        status("Removed", entry.display());
    }
    for entry in &report.kept {
        status("Kept", entry.display());
    }
    status(
        "Cleaned",
        format!(
            "{} entries ({} files)",
            report.removed.len(),
            report.files_removed
        ),
    );
    Ok(())
}
