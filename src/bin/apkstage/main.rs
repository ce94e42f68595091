//! apkstage CLI - Android native library build and APK release pipeline

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use apkstage::GlobalContext;
use cli::Cli;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("apkstage=debug")
    } else {
        EnvFilter::new("apkstage=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    if !cli.has_action() {
        eprintln!("nothing to do; run `apkstage --help` to list the available actions");
        return Ok(());
    }

    let ctx = GlobalContext::load(&cli.config)?;

    if cli.stream_logs {
        commands::devices::install_interrupt_handler()?;
    }

    if cli.configure {
        commands::configure::execute(&ctx)?;
    }
    if cli.assemble {
        commands::assemble::execute(&ctx)?;
    }
    if cli.list_devices {
        commands::devices::list(&ctx)?;
    }
    if let Some(ref target) = cli.connect {
        commands::devices::connect(&ctx, target)?;
    }
    if cli.install {
        commands::install::execute(&ctx)?;
    }
    if cli.stream_logs {
        commands::devices::stream_logs(&ctx)?;
    }
    if cli.clean {
        commands::clean::execute(&ctx)?;
    }

    Ok(())
}
