//! `apkstage --configure`

use anyhow::Result;

use super::status;
use apkstage::builder::{CMakeBuilder, ConfigureOutcome};
use apkstage::GlobalContext;

pub fn execute(ctx: &GlobalContext) -> Result<()> {
    let builder = CMakeBuilder::new(ctx);
    let dir = builder.build_dir().path().display();

    match builder.configure()? {
        ConfigureOutcome::Generated => status("Configured", dir),
        ConfigureOutcome::Reused => status("Fresh", dir),
    }
    Ok(())
}
