//! Replays recorded chain events through the SQL ingestion pipeline

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use anyhow::Context;
use sqldb::{cli, ChainEvent, SqlDbConfig, SqlDbPlugin};
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    let args = cli::parse_args();
    init_logging(&args);

    let mut config = match &args.config_path {
        Some(path) => SqlDbConfig::load(path).with_context(|| format!("failed to load {}", path.display()))?,
        None => SqlDbConfig::default(),
    };
    config.apply_cli_overrides(&args);

    let mut plugin = SqlDbPlugin::start(&config).context("failed to start SQL ingestion")?;

    let reader: Box<dyn BufRead> = if args.events.as_os_str() == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&args.events).with_context(|| format!("failed to open {}", args.events.display()))?;
        Box::new(BufReader::new(file))
    };

    let mut replayed = 0u64;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ChainEvent>(&line) {
            Ok(ChainEvent::Applied(block)) => plugin.on_block_applied(block),
            Ok(ChainEvent::Irreversible(block)) => plugin.on_block_irreversible(block),
            Err(e) => {
                warn!("Skipping malformed event on line {}: {}", index + 1, e);
                continue;
            }
        }
        replayed += 1;
    }

    plugin.shutdown();
    info!("Replayed {} events", replayed);
    Ok(())
}

fn init_logging(args: &cli::Args) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt().with_env_filter(filter).with_target(false).init();
}
