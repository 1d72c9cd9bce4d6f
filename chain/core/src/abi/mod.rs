//! Contract ABIs: the definition model, the binary serializer driven by it,
//! and the built-in ABI of the system contract.

pub mod def;
pub mod serializer;
pub mod stream;
pub mod system;

pub use def::{AbiDef, ActionDef, FieldDef, StructDef, TypeDef, VariantDef};
pub use serializer::AbiSerializer;
pub use system::system_abi;

use thiserror::Error;

use crate::errors::ChainError;
use crate::name::Name;

#[derive(Error, Debug)]
pub enum AbiError {
    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unsupported ABI version: {0}")]
    UnsupportedVersion(String),

    #[error("Invalid ABI definition: {0}")]
    InvalidDefinition(String),

    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Action {0} is not declared in the ABI")]
    UnknownAction(Name),

    #[error("Recursion depth limit exceeded")]
    RecursionLimit,

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid value for {type_name}: {reason}")]
    InvalidValue { type_name: String, reason: String },

    #[error("{path}: {source}")]
    Field {
        path: String,
        #[source]
        source: Box<AbiError>,
    },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl AbiError {
    pub(crate) fn invalid_value(type_name: &str, reason: impl ToString) -> Self {
        AbiError::InvalidValue { type_name: type_name.to_string(), reason: reason.to_string() }
    }

    /// Prefixes the error with the struct field it occurred in.
    pub(crate) fn in_field(self, struct_name: &str, field: &str) -> Self {
        match self {
            AbiError::Field { path, source } => {
                AbiError::Field { path: format!("{struct_name}.{field}.{path}"), source }
            }
            other => AbiError::Field { path: format!("{struct_name}.{field}"), source: Box::new(other) },
        }
    }
}
