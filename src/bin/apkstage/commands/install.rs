//! `apkstage --install`

use anyhow::Result;

use super::status;
use apkstage::{DeviceBridge, GlobalContext};

pub fn execute(ctx: &GlobalContext) -> Result<()> {
    let release = &ctx.layout().release;
    if !release.exists() {
        tracing::info!("{} not found, assembling first", release.path().display());
        super::assemble::execute(ctx)?;
    }

    status("Installing", release.path().display());
    DeviceBridge::new(ctx.sdk().adb(), ctx.executor()).install(release.path())?;
    status("Installed", release.path().display());
    Ok(())
}
