//! Error types for stockbook operations.
//!
//! One enum covers the whole crate. Validation failures and missing rows get
//! their own variants so callers can distinguish "bad input" from "not here"
//! from "the store misbehaved"; everything database-level funnels through
//! `DbErr`. Multi-step operations run in transactions, so any error implies
//! nothing was applied.

use thiserror::Error;

/// All the ways a stockbook operation can fail
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before touching the store (empty name, non-positive
    /// quantity or price, malformed row).
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A referenced product does not exist under its normalized name.
    #[error("Product not found: {name}")]
    ProductNotFound { name: String },

    /// A referenced invoice id does not exist.
    #[error("Invoice not found: {id}")]
    InvoiceNotFound { id: i64 },

    /// An invoice kind string that is neither `purchase` nor in the
    /// `sales` family.
    #[error("Unsupported invoice kind: {value}")]
    UnsupportedInvoiceKind { value: String },

    /// Configuration problems: unreadable config file, bad settings values.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Anything the database layer reports, including constraint
    /// violations and lock timeouts.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem failures while reading import files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
