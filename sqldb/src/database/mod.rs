//! Database access layer

pub mod connection;
pub mod dialect;

pub use connection::Database;
pub use dialect::Dialect;
