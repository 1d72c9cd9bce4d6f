use async_trait::async_trait;
use chain_core::{Asset, Name, SymbolCode};
use sqlx::{AnyConnection, Row};
use tracing::debug;

use crate::database::Dialect;
use crate::error::{Result, SqlDbError};
use crate::tables::Projection;

/// Token balances per (account, symbol), in the smallest unit of the symbol.
pub struct TokensTable {
    dialect: Dialect,
}

impl TokensTable {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Adds `quantity` to the balance, creating the row on first credit.
    /// A balance held at another precision is left untouched and an error is
    /// returned.
    pub async fn credit(&self, conn: &mut AnyConnection, account: Name, quantity: &Asset) -> Result<()> {
        if self.stored_precision(conn, account, quantity).await?.is_none() {
            sqlx::query("INSERT INTO tokens (account, symbol, decimals, amount) VALUES ($1, $2, $3, $4)")
                .bind(account.to_string())
                .bind(quantity.symbol.code().to_string())
                .bind(quantity.symbol.precision() as i32)
                .bind(quantity.amount)
                .execute(&mut *conn)
                .await?;
            return Ok(());
        }

        sqlx::query("UPDATE tokens SET amount = amount + $1 WHERE account = $2 AND symbol = $3")
            .bind(quantity.amount)
            .bind(account.to_string())
            .bind(quantity.symbol.code().to_string())
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Subtracts `quantity` from an existing balance. No balance check is
    /// made; an account without a row is left alone and false is returned.
    pub async fn debit(&self, conn: &mut AnyConnection, account: Name, quantity: &Asset) -> Result<bool> {
        if self.stored_precision(conn, account, quantity).await?.is_none() {
            debug!("No {} balance to debit for {}", quantity.symbol.code(), account);
            return Ok(false);
        }

        sqlx::query("UPDATE tokens SET amount = amount - $1 WHERE account = $2 AND symbol = $3")
            .bind(quantity.amount)
            .bind(account.to_string())
            .bind(quantity.symbol.code().to_string())
            .execute(conn)
            .await?;
        Ok(true)
    }

    /// Precision of the existing balance, checked against `quantity`.
    async fn stored_precision(&self, conn: &mut AnyConnection, account: Name, quantity: &Asset) -> Result<Option<u8>> {
        let row = sqlx::query("SELECT decimals FROM tokens WHERE account = $1 AND symbol = $2")
            .bind(account.to_string())
            .bind(quantity.symbol.code().to_string())
            .fetch_optional(conn)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let stored = row.try_get::<i32, _>(0)? as u8;
        let given = quantity.symbol.precision();
        if stored != given {
            return Err(SqlDbError::PrecisionMismatch {
                account: account.to_string(),
                symbol: quantity.symbol.code().to_string(),
                stored,
                given,
            });
        }
        Ok(Some(stored))
    }

    /// Current balance in smallest units.
    pub async fn balance(&self, conn: &mut AnyConnection, account: Name, symbol: SymbolCode) -> Result<Option<i64>> {
        let row = sqlx::query("SELECT amount FROM tokens WHERE account = $1 AND symbol = $2")
            .bind(account.to_string())
            .bind(symbol.to_string())
            .fetch_optional(conn)
            .await?;
        row.map(|r| r.try_get::<i64, _>(0)).transpose().map_err(Into::into)
    }
}

#[async_trait]
impl Projection for TokensTable {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn tables(&self) -> &'static [&'static str] {
        &["tokens"]
    }

    fn schema(&self) -> Vec<String> {
        vec![
            r#"
            CREATE TABLE IF NOT EXISTS tokens (
                account VARCHAR(13) NOT NULL,
                symbol VARCHAR(7) NOT NULL,
                decimals INTEGER NOT NULL,
                amount BIGINT NOT NULL,
                PRIMARY KEY (account, symbol)
            )
            "#
            .to_string(),
            "CREATE INDEX IF NOT EXISTS idx_tokens_account ON tokens (account)".to_string(),
            "CREATE INDEX IF NOT EXISTS idx_tokens_symbol_account ON tokens (symbol, account)".to_string(),
        ]
    }
}
