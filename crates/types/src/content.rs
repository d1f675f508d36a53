//! Content addresses and the record keys derived from them.

use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest content address accepted from a store.
pub const MAX_CONTENT_ADDRESS_LEN: usize = 128;

/// Multihash prefix for a 32-byte sha2-256 digest.
const SHA2_256_MULTIHASH: [u8; 2] = [0x12, 0x20];
const CID_V0_LEN: usize = 46;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentAddressError {
    #[error("content address is empty")]
    Empty,
    #[error("content address exceeds {max} bytes (got {actual})")]
    TooLong { max: usize, actual: usize },
    #[error("content address contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Identifier returned by the content store for a stored blob.
///
/// The store decides the scheme; this type only guarantees a bounded,
/// printable, whitespace-free string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentAddress(String);

impl ContentAddress {
    pub fn new(value: impl Into<String>) -> Result<Self, ContentAddressError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ContentAddressError::Empty);
        }
        if value.len() > MAX_CONTENT_ADDRESS_LEN {
            return Err(ContentAddressError::TooLong {
                max: MAX_CONTENT_ADDRESS_LEN,
                actual: value.len(),
            });
        }
        if let Some(bad) = value
            .chars()
            .find(|c| c.is_whitespace() || c.is_control())
        {
            return Err(ContentAddressError::InvalidCharacter(bad));
        }
        Ok(Self(value))
    }

    /// CIDv0 (`Qm…`) address for a sha2-256 digest of the stored bytes.
    pub fn cid_v0_for(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut multihash = Vec::with_capacity(SHA2_256_MULTIHASH.len() + digest.len());
        multihash.extend_from_slice(&SHA2_256_MULTIHASH);
        multihash.extend_from_slice(&digest);
        Self(bs58::encode(multihash).into_string())
    }

    /// Whether the address has the shape of a CIDv0 sha2-256 multihash.
    pub fn is_cid_v0(&self) -> bool {
        if self.0.len() != CID_V0_LEN || !self.0.starts_with("Qm") {
            return false;
        }
        match bs58::decode(&self.0).into_vec() {
            Ok(bytes) => bytes.len() == 34 && bytes[..2] == SHA2_256_MULTIHASH,
            Err(_) => false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ledger lookup key for this address.
    pub fn record_key(&self) -> RecordKey {
        RecordKey::derive(self)
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentAddress({})", self.0)
    }
}

impl FromStr for ContentAddress {
    type Err = ContentAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<ContentAddress> for String {
    fn from(value: ContentAddress) -> Self {
        value.0
    }
}

impl TryFrom<String> for ContentAddress {
    type Error = ContentAddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordKeyError {
    #[error("record key must be 0x followed by 64 hex characters, got {0} characters")]
    InvalidLength(usize),
    #[error("record key must be valid hex: {0}")]
    InvalidHex(String),
}

/// Primary ledger key for a provenance record.
///
/// Keccak-256 over the UTF-8 bytes of the content address string. It depends
/// on the address alone, so identical addresses always share a key even if
/// the underlying bytes were chunked differently by the store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordKey([u8; 32]);

impl RecordKey {
    pub fn derive(address: &ContentAddress) -> Self {
        let digest = Keccak256::digest(address.as_str().as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self(key)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse `0x`-prefixed (or bare) hex.
    pub fn from_hex(value: &str) -> Result<Self, RecordKeyError> {
        let body = value.strip_prefix("0x").unwrap_or(value);
        if body.len() != 64 {
            return Err(RecordKeyError::InvalidLength(value.len()));
        }
        let mut key = [0u8; 32];
        hex::decode_to_slice(body, &mut key)
            .map_err(|err| RecordKeyError::InvalidHex(err.to_string()))?;
        Ok(Self(key))
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordKey({})", self.to_hex())
    }
}

impl FromStr for RecordKey {
    type Err = RecordKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<RecordKey> for String {
    fn from(value: RecordKey) -> Self {
        value.to_hex()
    }
}

impl TryFrom<String> for RecordKey {
    type Error = RecordKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}
