use async_trait::async_trait;
use chain_core::BlockTrace;
use sqlx::AnyConnection;

use crate::database::Dialect;
use crate::error::Result;
use crate::tables::Projection;

pub struct BlocksTable {
    dialect: Dialect,
}

impl BlocksTable {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub async fn add(&self, conn: &mut AnyConnection, block: &BlockTrace) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO blocks (
                block_number, block_id, prev_block_id, producer,
                timestamp, num_transactions
            ) VALUES ($1, $2, $3, $4, {}, $6)
            "#,
            self.dialect.from_unixtime(5)
        );

        sqlx::query(&sql)
            .bind(block.block_num as i64)
            .bind(&block.block_id)
            .bind(&block.previous)
            .bind(block.producer.to_string())
            .bind(block.timestamp.timestamp())
            .bind(block.transactions.len() as i32)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Flags the block as final. Returns false if it was unknown or already
    /// flagged.
    pub async fn mark_irreversible(&self, conn: &mut AnyConnection, block_num: u32) -> Result<bool> {
        let result = sqlx::query("UPDATE blocks SET irreversible = $1 WHERE block_number = $2 AND irreversible = $3")
            .bind(true)
            .bind(block_num as i64)
            .bind(false)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Projection for BlocksTable {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn tables(&self) -> &'static [&'static str] {
        &["blocks"]
    }

    fn schema(&self) -> Vec<String> {
        let d = self.dialect;
        vec![
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS blocks (
                    block_number BIGINT PRIMARY KEY,
                    block_id VARCHAR(64) NOT NULL,
                    prev_block_id VARCHAR(64) NOT NULL,
                    producer VARCHAR(13) NOT NULL,
                    timestamp {ts} NOT NULL,
                    num_transactions INTEGER NOT NULL DEFAULT 0,
                    irreversible BOOLEAN NOT NULL DEFAULT FALSE,
                    created_at {ts} NOT NULL DEFAULT {now}
                )
                "#,
                ts = d.timestamp_type(),
                now = d.now(),
            ),
            "CREATE INDEX IF NOT EXISTS idx_blocks_producer ON blocks (producer)".to_string(),
        ]
    }
}
