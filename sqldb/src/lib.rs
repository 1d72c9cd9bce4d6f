//! Relational ingestion of chain events
//!
//! The node hands applied and irreversible blocks to [`SqlDbPlugin`], which
//! queues them for a single writer thread. The writer stores blocks,
//! transactions and actions and projects recognized actions into account,
//! token balance, stake and vote tables.

pub mod cache;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod event;
pub mod fifo;
pub mod indexer;
pub mod plugin;
pub mod tables;

pub use config::SqlDbConfig;
pub use error::{Result, SqlDbError};
pub use event::ChainEvent;
pub use plugin::SqlDbPlugin;
