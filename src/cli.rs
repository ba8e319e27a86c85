use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "census-ctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Roll up cloud capacity by workload and region")]
#[command(long_about = "Aggregates inventoried cloud resources across accounts into capacity totals by workload kind and region, without double counting parent/child hierarchies, and correlates them with backup protection.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate an inventory snapshot into a capacity report
    Aggregate {
        /// Inventory snapshot (JSON) to aggregate
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,

        /// Output format [default: table]
        #[arg(short, long, value_parser = ["table", "json", "yaml", "csv"])]
        format: Option<String>,

        /// Write the report to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Names to pseudonymize [default: none]
        #[arg(long, value_parser = ["none", "resource-groups", "objects", "all"])]
        anonymize: Option<String>,

        /// Salt for pseudonyms; reuse it to get the same tokens across runs
        #[arg(long, env = "CENSUS_SALT", hide_env_values = true)]
        salt: Option<String>,

        /// Which storage figure contributes bytes [default: service-level]
        #[arg(long, value_parser = ["account-level", "service-level"])]
        storage_mode: Option<String>,

        /// Accounts collected at once [default: 4]
        #[arg(long, value_name = "N")]
        max_concurrency: Option<usize>,

        /// Per-account collection timeout in seconds [default: 300]
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Include one row per resource
        #[arg(long)]
        details: bool,
    },

    /// Print a fresh random anonymization salt
    Salt,
}

impl Cli {
    /// Initialize logging based on verbosity level
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env()
            .filter_level(level)
            .init();
    }
}
