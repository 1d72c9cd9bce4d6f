use async_trait::async_trait;
use chain_core::TransactionTrace;
use sqlx::AnyConnection;

use crate::database::Dialect;
use crate::error::Result;
use crate::tables::Projection;

pub struct TransactionsTable {
    dialect: Dialect,
}

impl TransactionsTable {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub async fn add(&self, conn: &mut AnyConnection, block_num: u32, trx: &TransactionTrace) -> Result<()> {
        let sql = format!(
            r#"
            INSERT INTO transactions (
                id, block_id, ref_block_num, ref_block_prefix,
                expiration, pending, num_actions
            ) VALUES ($1, $2, $3, $4, {}, $6, $7)
            "#,
            self.dialect.from_unixtime(5)
        );

        sqlx::query(&sql)
            .bind(&trx.id)
            .bind(block_num as i64)
            .bind(trx.ref_block_num as i32)
            .bind(trx.ref_block_prefix as i64)
            .bind(trx.expiration as i64)
            .bind(true)
            .bind(trx.total_actions() as i32)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Clears the pending flag of every transaction in the block. Returns the
    /// number of transactions updated.
    pub async fn clear_pending(&self, conn: &mut AnyConnection, block_num: u32) -> Result<u64> {
        let result = sqlx::query("UPDATE transactions SET pending = $1 WHERE block_id = $2 AND pending = $3")
            .bind(false)
            .bind(block_num as i64)
            .bind(true)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Projection for TransactionsTable {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn tables(&self) -> &'static [&'static str] {
        &["transactions"]
    }

    fn schema(&self) -> Vec<String> {
        let d = self.dialect;
        vec![
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS transactions (
                    id VARCHAR(64) PRIMARY KEY,
                    block_id BIGINT NOT NULL REFERENCES blocks (block_number) ON DELETE CASCADE,
                    ref_block_num INTEGER NOT NULL,
                    ref_block_prefix BIGINT NOT NULL,
                    expiration {ts} NOT NULL,
                    pending BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at {ts} NOT NULL DEFAULT {now},
                    num_actions INTEGER NOT NULL DEFAULT 0
                )
                "#,
                ts = d.timestamp_type(),
                now = d.now(),
            ),
            "CREATE INDEX IF NOT EXISTS idx_transactions_block_id ON transactions (block_id)".to_string(),
        ]
    }
}
