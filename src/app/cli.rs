//! Command-line argument definitions (clap).

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pankha-hwstate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hardware state aggregation and PSU/PDU hot-plug agent", long_about = None)]
pub struct Args {
    /// Path to the JSON configuration file
    #[arg(short = 'c', long)]
    pub config: Option<String>,

    /// Set log level (TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL)
    #[arg(long = "log-level")]
    pub log_level: Option<String>,

    /// Publish a single snapshot to stdout and exit
    #[arg(long, conflicts_with = "check")]
    pub once: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check: bool,

    /// Print the effective configuration and exit
    #[arg(long = "show-config")]
    pub show_config: bool,
}
