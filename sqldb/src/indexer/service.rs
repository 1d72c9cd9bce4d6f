//! Main indexer service

use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::{error, info};

use crate::database::Database;
use crate::error::Result;
use crate::event::ChainEvent;
use crate::fifo::Fifo;
use crate::indexer::block_indexer::BlockIndexer;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub processed: u64,
    pub failed: u64,
}

pub struct IndexerService {
    block_indexer: BlockIndexer,
}

impl IndexerService {
    pub fn new(database: Arc<Database>, abi_cache_size: usize) -> Self {
        Self {
            block_indexer: BlockIndexer::new(database, abi_cache_size),
        }
    }

    pub async fn process(&self, event: ChainEvent) -> Result<()> {
        match event {
            ChainEvent::Applied(block) => {
                self.block_indexer.index(&block).await?;
            }
            ChainEvent::Irreversible(block) => {
                self.block_indexer.mark_irreversible(&block).await?;
            }
        }
        Ok(())
    }

    /// Drains `queue` until it is closed and empty. A failing event is
    /// logged and dropped.
    pub fn run(&self, runtime: &Runtime, queue: &Fifo<ChainEvent>) -> ConsumerStats {
        info!("Starting indexer service");
        let mut stats = ConsumerStats::default();

        while let Some(event) = queue.pop() {
            let block_num = event.block_num();
            match runtime.block_on(self.process(event)) {
                Ok(()) => stats.processed += 1,
                Err(e) => {
                    stats.failed += 1;
                    error!("Dropping event for block {}: {}", block_num, e);
                }
            }
        }

        info!("Indexer service stopped: {} events processed, {} failed", stats.processed, stats.failed);
        stats
    }
}
