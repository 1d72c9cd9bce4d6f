use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sqldb-replay")]
#[command(about = "Feed recorded chain events into the SQL database", long_about = None)]
pub struct Args {
    /// JSON-lines file of chain events, or `-` for stdin
    pub events: PathBuf,

    /// Path to configuration file (optional, uses defaults if not provided)
    #[arg(short, long)]
    pub config_path: Option<PathBuf>,

    /// Database connection string
    #[arg(short, long, env = "SQL_DB_URI")]
    pub uri: Option<String>,

    /// Maximum number of queued events
    #[arg(short, long)]
    pub queue_size: Option<usize>,

    /// Drop and recreate all tables before ingesting
    #[arg(long)]
    pub resync: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

pub fn parse_args() -> Args {
    Args::parse()
}
