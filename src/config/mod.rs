pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use chrono::NaiveDate;
#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "olx-price-index")]
#[command(about = "Daily price index for products listed on OLX.ro")]
pub struct CliConfig {
    /// Path to the products configuration file
    #[arg(short, long, default_value = "products.toml")]
    pub config: String,

    /// Directory that holds data/, images/ and README.md
    #[arg(long, default_value = ".")]
    pub root: String,

    /// Observation date (defaults to today, local time)
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Fetch again even when today's row is already recorded
    #[arg(long)]
    pub force: bool,

    /// Only re-render charts and README from existing history
    #[arg(long)]
    pub readme_only: bool,

    /// Show what would be processed without fetching anything
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,
}
