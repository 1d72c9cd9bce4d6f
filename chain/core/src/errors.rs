use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid asset: {0}")]
    InvalidAsset(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(u32),
}

pub type ChainResult<T> = Result<T, ChainError>;
