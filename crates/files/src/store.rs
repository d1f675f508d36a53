//! The content store seam.

use async_trait::async_trait;
use hashvault_types::{ContentAddress, ContentAddressError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content store transport error: {0}")]
    Transport(String),

    #[error("content store returned status {status}: {body}")]
    Server { status: u16, body: String },

    #[error("content store response was malformed: {0}")]
    MalformedResponse(String),

    #[error("content store returned an invalid address: {0}")]
    InvalidAddress(#[from] ContentAddressError),

    #[error("content store is offline")]
    Offline,
}

impl From<reqwest::Error> for StoreError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Content-addressable blob service.
///
/// `put` must be idempotent: the same bytes always yield the same address.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store `data` and return its content address.
    async fn put(&self, data: &[u8]) -> Result<ContentAddress>;
}
