//! CLI definitions using clap.

use std::path::PathBuf;

use apkstage::util::config::DEFAULT_CONFIG_FILE;
use clap::Parser;

/// apkstage - build the native library and assemble a signed APK
///
/// Actions can be combined and always run in this order: configure,
/// assemble, list-devices, connect, install, stream-logs, clean.
#[derive(Parser)]
#[command(name = "apkstage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file (JSON, or TOML with a .toml extension)
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Configure the native build directory
    #[arg(short = 'b', long, visible_alias = "build")]
    pub configure: bool,

    /// Build the library and assemble the signed release APK
    #[arg(short = 'g', long, visible_alias = "genapk")]
    pub assemble: bool,

    /// Install the release APK on the connected device
    #[arg(short, long)]
    pub install: bool,

    /// List attached devices
    #[arg(short = 'd', long, visible_alias = "devices")]
    pub list_devices: bool,

    /// Connect to a device over the network
    #[arg(short = 'C', long, value_name = "TARGET")]
    pub connect: Option<String>,

    /// Stream filtered device logs
    #[arg(short = 'l', long, visible_alias = "logcat")]
    pub stream_logs: bool,

    /// Remove build outputs, keeping the release APK
    #[arg(short = 'c', long)]
    pub clean: bool,
}

impl Cli {
    /// Whether any action was requested.
    pub fn has_action(&self) -> bool {
        self.configure
            || self.assemble
            || self.install
            || self.list_devices
            || self.connect.is_some()
            || self.stream_logs
            || self.clean
    }
}
