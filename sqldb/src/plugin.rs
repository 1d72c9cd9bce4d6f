//! Entry points called by the node: block callbacks and lifecycle

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chain_core::{BlockTrace, IrreversibleBlock};
use tracing::{error, info, warn};

use crate::config::SqlDbConfig;
use crate::database::Database;
use crate::error::{Result, SqlDbError};
use crate::event::ChainEvent;
use crate::fifo::Fifo;
use crate::indexer::IndexerService;

const CONSUMER_THREAD_NAME: &str = "sqldb-consumer";

/// Hands chain events to a dedicated writer thread through a bounded queue.
pub struct SqlDbPlugin {
    queue: Option<Arc<Fifo<ChainEvent>>>,
    consumer: Option<JoinHandle<()>>,
}

impl SqlDbPlugin {
    /// A plugin that accepts and ignores every event.
    pub fn disabled() -> Self {
        Self { queue: None, consumer: None }
    }

    /// Connects, prepares the schema and starts the writer thread. Returns
    /// once the database is ready.
    pub fn start(config: &SqlDbConfig) -> Result<Self> {
        if !config.is_enabled() {
            warn!("No database URI configured, SQL ingestion disabled");
            return Ok(Self::disabled());
        }

        let queue = Arc::new(Fifo::new(config.queue_size));
        let (ready_tx, ready_rx) = mpsc::channel();

        let consumer = thread::Builder::new().name(CONSUMER_THREAD_NAME.to_string()).spawn({
            let queue = queue.clone();
            let config = config.clone();
            move || consume(config, queue, ready_tx)
        })?;

        let startup = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(SqlDbError::Internal("writer thread exited during startup".to_string())));
        if let Err(e) = startup {
            if consumer.join().is_err() {
                error!("Writer thread panicked during startup");
            }
            return Err(e);
        }

        info!("SQL ingestion started (queue size {})", queue.capacity());
        Ok(Self {
            queue: Some(queue),
            consumer: Some(consumer),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    /// Number of events waiting for the writer.
    pub fn backlog(&self) -> usize {
        self.queue.as_ref().map_or(0, |queue| queue.len())
    }

    /// Queues a newly applied block, waiting while the queue is full.
    pub fn on_block_applied(&self, block: BlockTrace) {
        self.enqueue(ChainEvent::Applied(block));
    }

    /// Queues notice that a block became irreversible.
    pub fn on_block_irreversible(&self, block: IrreversibleBlock) {
        self.enqueue(ChainEvent::Irreversible(block));
    }

    fn enqueue(&self, event: ChainEvent) {
        let Some(queue) = &self.queue else {
            return;
        };
        if let Err(event) = queue.push(event) {
            warn!("Event queue closed, dropping event for block {}", event.block_num());
        }
    }

    /// Stops accepting events and waits for the writer to drain the queue.
    pub fn shutdown(&mut self) {
        if let Some(queue) = self.queue.take() {
            info!("Shutting down SQL ingestion, {} events pending", queue.len());
            queue.close();
        }
        if let Some(consumer) = self.consumer.take() {
            if consumer.join().is_err() {
                error!("Writer thread panicked");
            }
        }
    }
}

impl Drop for SqlDbPlugin {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn consume(config: SqlDbConfig, queue: Arc<Fifo<ChainEvent>>, ready: mpsc::Sender<Result<()>>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };

    let database = match runtime.block_on(open_database(&config)) {
        Ok(database) => Arc::new(database),
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    IndexerService::new(database, config.abi_cache_size).run(&runtime, &queue);
}

async fn open_database(config: &SqlDbConfig) -> Result<Database> {
    let database = Database::connect(&config.uri).await?;
    if config.wipe_on_startup() {
        database.wipe().await?;
    } else {
        database.ensure_schema().await?;
    }
    Ok(database)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_disabled_plugin_ignores_events() {
        let mut plugin = SqlDbPlugin::start(&SqlDbConfig::default()).unwrap();
        assert!(!plugin.is_enabled());

        plugin.on_block_applied(BlockTrace {
            block_num: 1,
            block_id: "01".to_string(),
            previous: String::new(),
            producer: chain_core::SYSTEM_ACCOUNT,
            timestamp: Utc::now(),
            transactions: vec![],
        });
        plugin.on_block_irreversible(IrreversibleBlock { block_num: 1, block_id: "01".to_string() });
        assert_eq!(plugin.backlog(), 0);
        plugin.shutdown();
    }

    #[test]
    fn test_bad_uri_fails_start() {
        let config = SqlDbConfig { uri: "mysql://localhost/chain".to_string(), ..Default::default() };
        assert!(SqlDbPlugin::start(&config).is_err());
    }
}
