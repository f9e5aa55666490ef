use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::download::{DEFAULT_URL, LOCALES};

#[derive(Parser, Debug)]
#[command(name = "geolite2-import")]
#[command(version, about = "Load the GeoLite2 City CSV archive into SQLite")]
pub struct Cli {
    /// Default log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info", env = "GEOIP_LOG_LEVEL")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Rows per location insert
    #[arg(long, default_value_t = 500, env = "GEOIP_LOCATION_BATCH_SIZE")]
    pub location_batch_size: usize,

    /// Rows per block insert
    #[arg(long, default_value_t = 2000, env = "GEOIP_BLOCK_BATCH_SIZE")]
    pub block_batch_size: usize,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download, extract and load the dataset (full replace)
    Import {
        /// SQLite database path
        db: PathBuf,

        /// Archive URL
        #[arg(long, default_value = DEFAULT_URL, env = "GEOIP_URL")]
        url: String,

        /// Use a local zip archive instead of downloading
        #[arg(long, conflicts_with = "url", env = "GEOIP_ARCHIVE")]
        archive: Option<PathBuf>,

        /// Location file locale
        #[arg(long, default_value = "en", value_parser = clap::builder::PossibleValuesParser::new(LOCALES.iter().copied()), env = "GEOIP_LOCALE")]
        locale: String,

        /// Owner of the working directory
        #[arg(long, env = "USER", default_value = "default")]
        identity: String,

        /// Base directory for working files
        #[arg(long, env = "GEOIP_BASE_DIR")]
        base_dir: Option<PathBuf>,

        /// Write run diagnostics to this file
        #[arg(long, env = "GEOIP_LOG_FILE")]
        log_file: Option<PathBuf>,

        /// Seconds a stalled download or a store lock wait may take
        #[arg(long, default_value_t = 600, env = "GEOIP_TIME_LIMIT")]
        time_limit: u64,

        #[command(flatten)]
        batch: BatchArgs,

        /// Show the terminal UI
        #[arg(long)]
        tui: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download and extract the archive, keeping the CSV files
    Download {
        /// Output directory
        output: PathBuf,

        /// Archive URL
        #[arg(long, default_value = DEFAULT_URL, env = "GEOIP_URL")]
        url: String,

        /// Location file locale
        #[arg(long, default_value = "en", value_parser = clap::builder::PossibleValuesParser::new(LOCALES.iter().copied()))]
        locale: String,

        /// Seconds a stalled download may take
        #[arg(long, default_value_t = 600, env = "GEOIP_TIME_LIMIT")]
        time_limit: u64,
    },

    /// Load already extracted CSV files into SQLite
    Load {
        /// SQLite database path
        db: PathBuf,

        /// GeoLite2-City-Locations-<locale>.csv
        location_csv: PathBuf,

        /// GeoLite2-City-Blocks-IPv4.csv
        block_csv: PathBuf,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Print the CREATE TABLE statements
    Schema {
        /// Only this table
        table: Option<String>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
