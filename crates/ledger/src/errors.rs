//! Error types for ledger and signer access

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// The ledger declined the write. The reason is the ledger's own text.
    #[error("{0}")]
    Rejected(String),

    #[error("no records for this owner")]
    NoRecords,

    #[error("record not found: {record_key}")]
    NotFound { record_key: String },

    #[error("unknown transaction: {tx_ref}")]
    UnknownTransaction { tx_ref: String },

    #[error("ledger unreachable: {0}")]
    Unreachable(String),

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("no signer available: {0}")]
    Unavailable(String),

    #[error("authorization declined by user")]
    Declined,
}

pub type Result<T> = std::result::Result<T, LedgerError>;
