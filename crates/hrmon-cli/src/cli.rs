//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "hrmon")]
#[command(author, version, about = "Heart-rate monitor for BLE sensors", long_about = None)]
#[command(after_help = "While running: press Enter to use the action button, \
                        'd' + Enter to disconnect, 'q' + Enter to quit.")]
pub struct Cli {
    /// Use a simulated sensor instead of Bluetooth hardware
    #[arg(long)]
    pub demo: bool,

    /// Print samples as JSON lines on stdout
    #[arg(long)]
    pub json: bool,

    /// Configuration file (defaults to <config dir>/hrmon/config.toml)
    #[arg(short, long, env = "HRMON_CONFIG")]
    pub config: Option<PathBuf>,

    /// How long to scan for a sensor, in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub scan_secs: Option<u64>,

    /// Enable verbose output
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
