//! Error taxonomy for uploads and provenance queries

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Rejected core configuration values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("confirmation_timeout_secs must be greater than zero")]
    ZeroConfirmationTimeout,

    #[error("fetch_concurrency must be at most {max}, got {actual}")]
    FetchConcurrencyTooHigh { max: usize, actual: usize },
}

/// Stable classification of every failure the core can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    StorageUnavailable,
    AuthorizationUnavailable,
    UserRejected,
    LedgerRejected,
    ConfirmationTimeout,
    InvalidOwnerIdentity,
    LedgerUnreachable,
    EmptyContent,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::StorageUnavailable => "storage_unavailable",
            ErrorKind::AuthorizationUnavailable => "authorization_unavailable",
            ErrorKind::UserRejected => "user_rejected",
            ErrorKind::LedgerRejected => "ledger_rejected",
            ErrorKind::ConfirmationTimeout => "confirmation_timeout",
            ErrorKind::InvalidOwnerIdentity => "invalid_owner_identity",
            ErrorKind::LedgerUnreachable => "ledger_unreachable",
            ErrorKind::EmptyContent => "empty_content",
            ErrorKind::Internal => "internal",
        }
    }

    /// Whether the record may still have been committed.
    pub fn commit_status_unknown(&self) -> bool {
        matches!(self, ErrorKind::ConfirmationTimeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of one upload orchestration.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum UploadError {
    #[error("upload content is empty")]
    EmptyContent,

    #[error("invalid owner identity: {0}")]
    InvalidOwnerIdentity(String),

    #[error("content store unavailable: {0}")]
    StorageUnavailable(String),

    #[error("no signer available: {0}")]
    AuthorizationUnavailable(String),

    #[error("authorization declined by user")]
    UserRejected,

    #[error("ledger rejected the record: {0}")]
    LedgerRejected(String),

    #[error(
        "no confirmation for {tx_ref} within {timeout_secs}s; the record may still land, re-query the owner's uploads"
    )]
    ConfirmationTimeout { tx_ref: String, timeout_secs: u64 },

    /// The driver fed the state machine an input it cannot accept.
    #[error("internal orchestration error: {0}")]
    Internal(String),
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::EmptyContent => ErrorKind::EmptyContent,
            UploadError::InvalidOwnerIdentity(_) => ErrorKind::InvalidOwnerIdentity,
            UploadError::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            UploadError::AuthorizationUnavailable(_) => ErrorKind::AuthorizationUnavailable,
            UploadError::UserRejected => ErrorKind::UserRejected,
            UploadError::LedgerRejected(_) => ErrorKind::LedgerRejected,
            UploadError::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            UploadError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Failure of a provenance listing as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("invalid owner identity: {0}")]
    InvalidOwnerIdentity(String),

    #[error("ledger unreachable: {0}")]
    LedgerUnreachable(String),
}

impl IndexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexError::InvalidOwnerIdentity(_) => ErrorKind::InvalidOwnerIdentity,
            IndexError::LedgerUnreachable(_) => ErrorKind::LedgerUnreachable,
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
