//! Relational projections of chain data, one writer per entity group.

pub mod accounts;
pub mod actions;
pub mod blocks;
pub mod stakes;
pub mod tokens;
pub mod transactions;
pub mod votes;

pub use accounts::AccountsTable;
pub use actions::ActionsTable;
pub use blocks::BlocksTable;
pub use stakes::StakesTable;
pub use tokens::TokensTable;
pub use transactions::TransactionsTable;
pub use votes::VotesTable;

use async_trait::async_trait;
use sqlx::AnyConnection;
use tracing::{debug, warn};

use crate::database::Dialect;
use crate::error::Result;

/// Schema lifecycle shared by every table writer.
#[async_trait]
pub trait Projection: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Tables owned by this projection, in creation order.
    fn tables(&self) -> &'static [&'static str];

    /// `CREATE ... IF NOT EXISTS` statements for tables and indexes.
    fn schema(&self) -> Vec<String>;

    async fn ensure_schema(&self, conn: &mut AnyConnection) -> Result<()> {
        for statement in self.schema() {
            sqlx::query(&statement).execute(&mut *conn).await?;
        }
        Ok(())
    }

    async fn drop_schema(&self, conn: &mut AnyConnection) -> Result<()> {
        for table in self.tables().iter().rev() {
            let statement = self.dialect().drop_table(table);
            match sqlx::query(&statement).execute(&mut *conn).await {
                Ok(_) => debug!("Dropped table {}", table),
                Err(e) => warn!("Failed to drop table {}: {}", table, e),
            }
        }
        Ok(())
    }
}

/// All projections, bound to one dialect.
pub struct Tables {
    pub blocks: BlocksTable,
    pub accounts: AccountsTable,
    pub transactions: TransactionsTable,
    pub actions: ActionsTable,
    pub tokens: TokensTable,
    pub stakes: StakesTable,
    pub votes: VotesTable,
}

impl Tables {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            blocks: BlocksTable::new(dialect),
            accounts: AccountsTable::new(dialect),
            transactions: TransactionsTable::new(dialect),
            actions: ActionsTable::new(dialect),
            tokens: TokensTable::new(dialect),
            stakes: StakesTable::new(dialect),
            votes: VotesTable::new(dialect),
        }
    }

    /// Projections in foreign key order: referenced tables come first.
    pub fn projections(&self) -> [&dyn Projection; 7] {
        [
            &self.blocks,
            &self.accounts,
            &self.transactions,
            &self.actions,
            &self.tokens,
            &self.stakes,
            &self.votes,
        ]
    }
}
