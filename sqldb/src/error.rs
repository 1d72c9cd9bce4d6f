//! Error types for the SQL ingestion pipeline

use chain_core::abi::AbiError;
use chain_core::ChainError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlDbError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    #[error("Chain data error: {0}")]
    Chain(#[from] ChainError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{account} holds {symbol} with {stored} decimals, got an amount with {given}")]
    PrecisionMismatch {
        account: String,
        symbol: String,
        stored: u8,
        given: u8,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SqlDbError {
    /// Errors caused by action payloads or ABIs rather than by storage.
    pub fn is_decode(&self) -> bool {
        matches!(self, SqlDbError::Abi(_) | SqlDbError::Chain(_) | SqlDbError::Serialization(_))
    }
}

pub type Result<T> = std::result::Result<T, SqlDbError>;
