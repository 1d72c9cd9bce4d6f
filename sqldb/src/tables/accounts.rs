use async_trait::async_trait;
use chain_core::Name;
use sqlx::{AnyConnection, Row};
use tracing::warn;

use crate::database::Dialect;
use crate::error::Result;
use crate::tables::Projection;

pub struct AccountsTable {
    dialect: Dialect,
}

impl AccountsTable {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Inserts an account created at `timestamp` (unix seconds).
    pub async fn add(&self, conn: &mut AnyConnection, name: Name, timestamp: i64) -> Result<()> {
        let sql = format!(
            "INSERT INTO accounts (name, created_at, updated_at) VALUES ($1, {ts}, {ts})",
            ts = self.dialect.from_unixtime(2)
        );
        sqlx::query(&sql)
            .bind(name.to_string())
            .bind(timestamp)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn exists(&self, conn: &mut AnyConnection, name: Name) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) FROM accounts WHERE name = $1")
            .bind(name.to_string())
            .fetch_one(conn)
            .await?;
        Ok(row.try_get::<i64, _>(0)? > 0)
    }

    /// The stored ABI JSON of `name`, if the account exists and has one.
    pub async fn abi(&self, conn: &mut AnyConnection, name: Name) -> Result<Option<String>> {
        let sql = format!(
            "SELECT {} AS abi FROM accounts WHERE name = $1",
            self.dialect.json_text_or_empty("abi")
        );
        let row = sqlx::query(&sql)
            .bind(name.to_string())
            .fetch_optional(conn)
            .await?;

        match row {
            Some(row) => {
                let abi: String = row.try_get("abi")?;
                Ok(Some(abi).filter(|abi| !abi.trim().is_empty()))
            }
            None => Ok(None),
        }
    }

    /// Replaces the ABI of `name`; `None` clears it. Returns false if the
    /// account is unknown.
    pub async fn set_abi(
        &self,
        conn: &mut AnyConnection,
        name: Name,
        abi_json: Option<&str>,
        timestamp: i64,
    ) -> Result<bool> {
        let (abi, param) = match abi_json {
            Some(_) => (self.dialect.json_param(1), 1),
            None => ("NULL".to_string(), 0),
        };
        let sql = format!(
            "UPDATE accounts SET abi = {abi}, updated_at = {} WHERE name = ${}",
            self.dialect.from_unixtime(param + 1),
            param + 2
        );

        let mut query = sqlx::query(&sql);
        if let Some(json) = abi_json {
            query = query.bind(json);
        }
        let result = query.bind(timestamp).bind(name.to_string()).execute(conn).await?;

        if result.rows_affected() == 0 {
            warn!("setabi for unknown account {}", name);
            return Ok(false);
        }
        Ok(true)
    }

    pub async fn add_key(&self, conn: &mut AnyConnection, account: Name, public_key: &str, permission: &str) -> Result<()> {
        sqlx::query("INSERT INTO accounts_keys (account, public_key, permission) VALUES ($1, $2, $3)")
            .bind(account.to_string())
            .bind(public_key)
            .bind(permission)
            .execute(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Projection for AccountsTable {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn tables(&self) -> &'static [&'static str] {
        &["accounts", "accounts_keys"]
    }

    fn schema(&self) -> Vec<String> {
        let d = self.dialect;
        vec![
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS accounts (
                    name VARCHAR(13) PRIMARY KEY,
                    abi {json},
                    created_at {ts} NOT NULL DEFAULT {now},
                    updated_at {ts} NOT NULL DEFAULT {now}
                )
                "#,
                json = d.json_type(),
                ts = d.timestamp_type(),
                now = d.now(),
            ),
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS accounts_keys (
                    id {serial},
                    account VARCHAR(13) NOT NULL REFERENCES accounts (name) ON DELETE CASCADE,
                    public_key VARCHAR(256) NOT NULL,
                    permission VARCHAR(13) NOT NULL
                )
                "#,
                serial = d.serial_key(),
            ),
            "CREATE INDEX IF NOT EXISTS idx_accounts_keys_account ON accounts_keys (account)".to_string(),
        ]
    }
}
