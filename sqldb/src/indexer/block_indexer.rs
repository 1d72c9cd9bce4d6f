//! Block indexing logic

use std::sync::Arc;

use chain_core::{BlockTrace, IrreversibleBlock};
use sqlx::Connection;
use tracing::{debug, warn};

use crate::database::Database;
use crate::error::Result;
use crate::indexer::action_indexer::{ActionContext, ActionIndexer, ActionOutcome};

/// Counts of what one applied block produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockSummary {
    pub transactions: usize,
    pub actions: usize,
    /// Actions of accounts without an ABI.
    pub without_abi: usize,
    /// Actions that could not be decoded.
    pub skipped: usize,
    pub projection_failures: usize,
}

pub struct BlockIndexer {
    database: Arc<Database>,
    actions: ActionIndexer,
}

impl BlockIndexer {
    pub fn new(database: Arc<Database>, abi_cache_size: usize) -> Self {
        Self {
            actions: ActionIndexer::new(database.clone(), abi_cache_size),
            database,
        }
    }

    /// Writes the block, its transactions and their actions.
    ///
    /// An action that cannot be decoded is skipped; a storage error aborts
    /// the rest of the block.
    pub async fn index(&self, block: &BlockTrace) -> Result<BlockSummary> {
        let tables = self.database.tables();
        let timestamp = block.timestamp.timestamp();
        let mut summary = BlockSummary::default();

        {
            let mut conn = self.database.acquire().await;
            tables.blocks.add(&mut conn, block).await?;
        }

        for trx in &block.transactions {
            {
                let mut conn = self.database.acquire().await;
                tables.transactions.add(&mut conn, block.block_num, trx).await?;
            }
            summary.transactions += 1;

            let all_actions = trx.context_free_actions.iter().chain(&trx.actions);
            for (seq, action) in all_actions.enumerate() {
                let ctx = ActionContext { transaction_id: &trx.id, timestamp, seq: seq as u32 };
                match self.actions.index(action, &ctx).await {
                    Ok(ActionOutcome::Applied { .. }) => summary.actions += 1,
                    Ok(ActionOutcome::NoAbi) => summary.without_abi += 1,
                    Ok(ActionOutcome::ProjectionFailed { .. }) => {
                        summary.actions += 1;
                        summary.projection_failures += 1;
                    }
                    Err(e) if e.is_decode() => {
                        warn!(
                            "Skipping action {}::{} #{} in transaction {}: {}",
                            action.account, action.name, seq, trx.id, e
                        );
                        summary.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        debug!(
            "Indexed block {} ({} transactions, {} actions, {} skipped)",
            block.block_num, summary.transactions, summary.actions, summary.skipped
        );
        Ok(summary)
    }

    /// Flags the block final and clears the pending flag of its transactions.
    /// Returns false if the block was unknown or already final.
    pub async fn mark_irreversible(&self, block: &IrreversibleBlock) -> Result<bool> {
        let tables = self.database.tables();
        let mut conn = self.database.acquire().await;

        let mut tx = conn.begin().await?;
        let marked = tables.blocks.mark_irreversible(&mut tx, block.block_num).await?;
        let cleared = tables.transactions.clear_pending(&mut tx, block.block_num).await?;
        tx.commit().await?;

        if marked {
            debug!("Block {} is irreversible, {} transactions confirmed", block.block_num, cleared);
        } else {
            debug!("Block {} unknown or already irreversible", block.block_num);
        }
        Ok(marked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_core::{Action, Name, TransactionTrace};
    use chrono::{TimeZone, Utc};
    use sqlx::Row;
    use tempfile::{tempdir, TempDir};

    async fn setup() -> (TempDir, Arc<Database>, BlockIndexer) {
        let temp_dir = tempdir().unwrap();
        let uri = format!("sqlite://{}?mode=rwc", temp_dir.path().join("blocks.db").display());
        let db = Arc::new(Database::connect(&uri).await.unwrap());
        db.ensure_schema().await.unwrap();
        let indexer = BlockIndexer::new(db.clone(), 8);
        (temp_dir, db, indexer)
    }

    fn block(block_num: u32, actions: Vec<Action>) -> BlockTrace {
        BlockTrace {
            block_num,
            block_id: format!("{block_num:064x}"),
            previous: format!("{:064x}", block_num - 1),
            producer: Name::from_str_unchecked("eosio"),
            timestamp: Utc.with_ymd_and_hms(2018, 6, 1, 12, 0, 0).unwrap(),
            transactions: vec![TransactionTrace {
                id: format!("{block_num:02x}trx"),
                ref_block_num: (block_num - 1) as u16,
                ref_block_prefix: 7,
                expiration: 1_527_854_430,
                context_free_actions: vec![],
                actions,
            }],
        }
    }

    async fn scalar(db: &Database, sql: &str) -> i64 {
        let mut conn = db.acquire().await;
        sqlx::query(sql).fetch_one(&mut *conn).await.unwrap().get::<i64, _>(0)
    }

    #[tokio::test]
    async fn test_undecodable_action_is_skipped() {
        let (_dir, db, indexer) = setup().await;
        let garbage = Action {
            account: Name::from_str_unchecked("eosio"),
            name: Name::from_str_unchecked("newaccount"),
            authorization: vec![],
            data: vec![1, 2, 3],
        };
        let unknown = Action {
            account: Name::from_str_unchecked("nobody"),
            name: Name::from_str_unchecked("hello"),
            authorization: vec![],
            data: vec![],
        };

        let summary = indexer.index(&block(2, vec![garbage, unknown])).await.unwrap();
        assert_eq!(summary.transactions, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.without_abi, 1);
        assert_eq!(summary.actions, 0);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM blocks").await, 1);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM transactions").await, 1);
    }

    #[tokio::test]
    async fn test_account_row_without_abi_skips_only_its_action() {
        let (_dir, db, indexer) = setup().await;
        let bob = Name::from_str_unchecked("bob");
        {
            let mut conn = db.acquire().await;
            db.tables().accounts.add(&mut conn, bob, 1_527_854_400).await.unwrap();
        }

        let hello = Action { account: bob, name: Name::from_str_unchecked("hi"), authorization: vec![], data: vec![] };
        let vote = Action {
            account: chain_core::SYSTEM_ACCOUNT,
            name: Name::from_str_unchecked("voteproducer"),
            authorization: vec![chain_core::PermissionLevel::new(bob, Name::from_str_unchecked("active"))],
            data: chain_core::abi::AbiSerializer::new(&chain_core::abi::system_abi().unwrap())
                .unwrap()
                .encode_action(
                    Name::from_str_unchecked("voteproducer"),
                    &serde_json::json!({ "voter": "bob", "proxy": "", "producers": ["prod.a"] }),
                )
                .unwrap(),
        };

        let summary = indexer.index(&block(6, vec![hello, vote])).await.unwrap();
        assert_eq!(summary.without_abi, 1);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.actions, 1);
        assert_eq!(summary.projection_failures, 0);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM actions WHERE account = 'bob'").await, 0);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM actions").await, 1);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM votes").await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_block_is_a_storage_error() {
        let (_dir, _db, indexer) = setup().await;
        indexer.index(&block(3, vec![])).await.unwrap();
        let err = indexer.index(&block(3, vec![])).await.unwrap_err();
        assert!(!err.is_decode());
    }

    #[tokio::test]
    async fn test_irreversible_is_marked_once() {
        let (_dir, db, indexer) = setup().await;
        indexer.index(&block(4, vec![])).await.unwrap();
        indexer.index(&block(5, vec![])).await.unwrap();

        let irreversible = IrreversibleBlock { block_num: 4, block_id: format!("{:064x}", 4) };
        assert!(indexer.mark_irreversible(&irreversible).await.unwrap());
        assert!(!indexer.mark_irreversible(&irreversible).await.unwrap());

        let unknown = IrreversibleBlock { block_num: 40, block_id: String::new() };
        assert!(!indexer.mark_irreversible(&unknown).await.unwrap());

        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM blocks WHERE irreversible").await, 1);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM blocks WHERE block_number = 5 AND irreversible").await, 0);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM transactions WHERE pending").await, 1);
        assert_eq!(scalar(&db, "SELECT COUNT(*) FROM transactions WHERE block_id = 4 AND pending").await, 0);
    }
}
