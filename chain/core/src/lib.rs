//! Chain primitives shared by the ingestion crates: names, symbols and
//! assets, key text forms, trace types and the ABI serializer.

pub mod abi;
pub mod asset;
pub mod block;
pub mod crypto;
pub mod errors;
pub mod name;

pub use asset::{Asset, Symbol, SymbolCode};
pub use block::{Action, BlockTrace, IrreversibleBlock, PermissionLevel, TransactionTrace};
pub use crypto::{KeyType, PublicKey, Signature};
pub use errors::{ChainError, ChainResult};
pub use name::Name;

/// The account whose actions carry built-in semantics.
pub const SYSTEM_ACCOUNT: Name = Name::from_str_unchecked("eosio");
