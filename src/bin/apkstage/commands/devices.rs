//! Device commands: `--list-devices`, `--connect`, `--stream-logs`

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

use super::status;
use apkstage::{DeviceBridge, GlobalContext};

fn bridge(ctx: &GlobalContext) -> DeviceBridge<'_> {
    DeviceBridge::new(ctx.sdk().adb(), ctx.executor())
}

pub fn list(ctx: &GlobalContext) -> Result<()> {
    bridge(ctx).list_devices()
}

pub fn connect(ctx: &GlobalContext, target: &str) -> Result<()> {
    status("Connecting", target);
    bridge(ctx).connect(target)
}

/// Set while logcat runs; Ctrl-C then stops adb instead of apkstage.
static STREAMING: AtomicBool = AtomicBool::new(false);
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Install the Ctrl-C handler used around `--stream-logs`.
///
/// Outside of logcat an interrupt exits with status 130 as usual. While
/// logcat runs, only adb receives it and the remaining actions still run.
pub fn install_interrupt_handler() -> Result<()> {
    ctrlc::set_handler(|| {
        if STREAMING.load(Ordering::SeqCst) {
            INTERRUPTED.store(true, Ordering::SeqCst);
        } else {
            eprintln!("\ninterrupted");
            std::process::exit(130);
        }
    })
    .context("failed to install the interrupt handler")
}

pub fn stream_logs(ctx: &GlobalContext) -> Result<()> {
    let filters = ctx.config().logcat_filters();
    status("Logcat", filters.join(" "));

    STREAMING.store(true, Ordering::SeqCst);
    let result = bridge(ctx).stream_logs(&filters);
    STREAMING.store(false, Ordering::SeqCst);

    match result {
        // adb may exit with its own status after the interrupt.
        Err(e) if INTERRUPTED.load(Ordering::SeqCst) => {
            tracing::debug!("logcat interrupted: {:#}", e);
            Ok(())
        }
        result => result,
    }
}
