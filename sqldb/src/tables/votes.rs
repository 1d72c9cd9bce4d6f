use async_trait::async_trait;
use chain_core::Name;
use sqlx::{AnyConnection, Row};

use crate::database::Dialect;
use crate::error::Result;
use crate::tables::Projection;

pub struct VotesTable {
    dialect: Dialect,
}

impl VotesTable {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Replaces the producer list of `voter`.
    pub async fn upsert(&self, conn: &mut AnyConnection, voter: Name, producers: &[Name]) -> Result<()> {
        let producers = serde_json::to_string(producers)?;
        let values = ["$1".to_string(), self.dialect.json_param(2)];
        let sql = self.dialect.upsert("votes", &["account"], &["account", "producers"], &values);
        sqlx::query(&sql)
            .bind(voter.to_string())
            .bind(producers)
            .execute(conn)
            .await?;
        Ok(())
    }

    pub async fn producers(&self, conn: &mut AnyConnection, voter: Name) -> Result<Option<Vec<Name>>> {
        let sql = format!("SELECT {} AS producers FROM votes WHERE account = $1", self.dialect.json_text("producers"));
        let row = sqlx::query(&sql)
            .bind(voter.to_string())
            .fetch_optional(conn)
            .await?;
        match row {
            Some(row) => {
                let json: String = row.try_get("producers")?;
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Projection for VotesTable {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn tables(&self) -> &'static [&'static str] {
        &["votes"]
    }

    fn schema(&self) -> Vec<String> {
        vec![format!(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                account VARCHAR(13) PRIMARY KEY,
                producers {} NOT NULL
            )
            "#,
            self.dialect.json_type()
        )]
    }
}
