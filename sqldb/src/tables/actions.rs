use async_trait::async_trait;
use chain_core::{Name, PermissionLevel};
use sqlx::{AnyConnection, Row};

use crate::database::Dialect;
use crate::error::Result;
use crate::tables::Projection;

/// Action row as stored, before the id is assigned.
pub struct NewAction<'a> {
    pub transaction_id: &'a str,
    pub account: Name,
    pub name: Name,
    pub seq: u32,
    /// Unix seconds of the containing block.
    pub created_at: i64,
    pub data: &'a str,
}

pub struct ActionsTable {
    dialect: Dialect,
}

impl ActionsTable {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    /// Inserts the action and returns its generated id.
    pub async fn add(&self, conn: &mut AnyConnection, action: &NewAction<'_>) -> Result<i64> {
        let sql = format!(
            r#"
            INSERT INTO actions (account, transaction_id, seq, name, created_at, data)
            VALUES ($1, $2, $3, $4, {}, {})
            RETURNING id
            "#,
            self.dialect.from_unixtime(5),
            self.dialect.json_param(6)
        );

        let row = sqlx::query(&sql)
            .bind(action.account.to_string())
            .bind(action.transaction_id)
            .bind(action.seq as i32)
            .bind(action.name.to_string())
            .bind(action.created_at)
            .bind(action.data)
            .fetch_one(conn)
            .await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    pub async fn add_authorization(&self, conn: &mut AnyConnection, action_id: i64, level: &PermissionLevel) -> Result<()> {
        sqlx::query("INSERT INTO actions_accounts (action_id, actor, permission) VALUES ($1, $2, $3)")
            .bind(action_id)
            .bind(level.actor.to_string())
            .bind(level.permission.to_string())
            .execute(conn)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Projection for ActionsTable {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn tables(&self) -> &'static [&'static str] {
        &["actions", "actions_accounts"]
    }

    fn schema(&self) -> Vec<String> {
        let d = self.dialect;
        vec![
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS actions (
                    id {serial},
                    account VARCHAR(13) NOT NULL,
                    transaction_id VARCHAR(64) NOT NULL REFERENCES transactions (id) ON DELETE CASCADE,
                    seq INTEGER NOT NULL,
                    name VARCHAR(13) NOT NULL,
                    created_at {ts} NOT NULL,
                    data {json}
                )
                "#,
                serial = d.serial_key(),
                ts = d.timestamp_type(),
                json = d.json_type(),
            ),
            r#"
            CREATE TABLE IF NOT EXISTS actions_accounts (
                action_id BIGINT NOT NULL REFERENCES actions (id) ON DELETE CASCADE,
                actor VARCHAR(13) NOT NULL,
                permission VARCHAR(13) NOT NULL
            )
            "#
            .to_string(),
            "CREATE INDEX IF NOT EXISTS idx_actions_account ON actions (account)".to_string(),
            "CREATE INDEX IF NOT EXISTS idx_actions_transaction_id ON actions (transaction_id)".to_string(),
            "CREATE INDEX IF NOT EXISTS idx_actions_created_at ON actions (created_at)".to_string(),
            "CREATE INDEX IF NOT EXISTS idx_actions_accounts_actor ON actions_accounts (actor)".to_string(),
            "CREATE INDEX IF NOT EXISTS idx_actions_accounts_action_id ON actions_accounts (action_id)".to_string(),
        ]
    }
}
