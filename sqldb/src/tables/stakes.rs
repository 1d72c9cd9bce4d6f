use async_trait::async_trait;
use chain_core::{Asset, Name};
use sqlx::{AnyConnection, Row};

use crate::database::Dialect;
use crate::error::Result;
use crate::tables::Projection;

pub struct StakesTable {
    dialect: Dialect,
}

impl StakesTable {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Replaces the stake of `account`.
    pub async fn upsert(&self, conn: &mut AnyConnection, account: Name, cpu: &Asset, net: &Asset) -> Result<()> {
        let values = ["$1", "$2", "$3"].map(String::from);
        let sql = self.dialect.upsert("stakes", &["account"], &["account", "cpu", "net"], &values);
        sqlx::query(&sql)
            .bind(account.to_string())
            .bind(cpu.amount)
            .bind(net.amount)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// `(cpu, net)` in smallest units.
    pub async fn get(&self, conn: &mut AnyConnection, account: Name) -> Result<Option<(i64, i64)>> {
        let row = sqlx::query("SELECT cpu, net FROM stakes WHERE account = $1")
            .bind(account.to_string())
            .fetch_optional(conn)
            .await?;
        match row {
            Some(row) => Ok(Some((row.try_get("cpu")?, row.try_get("net")?))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Projection for StakesTable {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn tables(&self) -> &'static [&'static str] {
        &["stakes"]
    }

    fn schema(&self) -> Vec<String> {
        vec![r#"
            CREATE TABLE IF NOT EXISTS stakes (
                account VARCHAR(13) PRIMARY KEY,
                cpu BIGINT NOT NULL,
                net BIGINT NOT NULL
            )
            "#
        .to_string()]
    }
}
