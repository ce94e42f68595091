//! `apkstage --assemble`

use anyhow::Result;

use super::status;
use apkstage::ops::{self, Extraction, Freshness};
use apkstage::GlobalContext;

pub fn execute(ctx: &GlobalContext) -> Result<()> {
    let report = ops::assemble(ctx)?;

    let tree = ctx.layout().extraction_tree.root().display();
    match report.extraction {
        Extraction::Extracted => status("Extracted", tree),
        Extraction::Reused(Freshness::Stale) => status("Reused", format!("{} (stale)", tree)),
        Extraction::Reused(_) => status("Reused", tree),
    }
    status("Copied", format!("{} libraries", report.copied.len()));

    match report.verified {
        Some(true) => status("Verified", "signature"),
        Some(false) => status("Unverified", "signature check failed (advisory)"),
        None => {}
    }
    status("Finished", report.release.display());
    Ok(())
}
