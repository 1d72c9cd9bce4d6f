//! Consumer side of the pipeline: turns chain events into table writes

pub mod action_indexer;
pub mod block_indexer;
pub mod service;

pub use action_indexer::{ActionContext, ActionIndexer, ActionKind, ActionOutcome};
pub use block_indexer::{BlockIndexer, BlockSummary};
pub use service::{ConsumerStats, IndexerService};
