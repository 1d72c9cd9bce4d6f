//! Block, transaction and action traces as delivered by the node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::name::Name;

/// An `actor@permission` pair authorizing an action.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionLevel {
    pub actor: Name,
    pub permission: Name,
}

impl PermissionLevel {
    pub fn new(actor: Name, permission: Name) -> Self {
        Self { actor, permission }
    }
}

/// A single contract invocation with its ABI-encoded arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub account: Name,
    pub name: Name,
    #[serde(default)]
    pub authorization: Vec<PermissionLevel>,
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTrace {
    /// Hex transaction id.
    pub id: String,
    pub ref_block_num: u16,
    pub ref_block_prefix: u32,
    /// Seconds since the unix epoch.
    pub expiration: u32,
    #[serde(default)]
    pub context_free_actions: Vec<Action>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl TransactionTrace {
    pub fn total_actions(&self) -> usize {
        self.context_free_actions.len() + self.actions.len()
    }
}

/// A block the node has just applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockTrace {
    pub block_num: u32,
    pub block_id: String,
    #[serde(default)]
    pub previous: String,
    pub producer: Name,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub transactions: Vec<TransactionTrace>,
}

/// Notification that a previously applied block became final.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrreversibleBlock {
    pub block_num: u32,
    pub block_id: String,
}
