use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing an owner identity.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum OwnerIdError {
    #[error("owner identity is empty")]
    Empty,
    #[error("owner identity must be {expected} hex characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("owner identity is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("owner identity has mixed case but fails its checksum")]
    ChecksumMismatch,
}

/// Number of raw bytes in an owner identity.
pub const OWNER_BYTES: usize = 20;
/// Number of hex digits in an encoded owner identity (without the prefix).
pub const OWNER_HEX_LEN: usize = OWNER_BYTES * 2;

/// Canonical identity of the party that submits or manages a record.
///
/// Accepts the usual account notations (`0x`-prefixed or bare, any case) and
/// always renders as lowercase `0x…`. Mixed-case input is treated as an
/// EIP-55 checksummed address and must verify.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId([u8; OWNER_BYTES]);

impl OwnerId {
    pub fn from_bytes(bytes: [u8; OWNER_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; OWNER_BYTES] {
        &self.0
    }

    /// Parse and normalize an identity string.
    pub fn parse(input: &str) -> Result<Self, OwnerIdError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(OwnerIdError::Empty);
        }

        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if body.len() != OWNER_HEX_LEN {
            return Err(OwnerIdError::InvalidLength {
                expected: OWNER_HEX_LEN,
                actual: body.len(),
            });
        }

        let decoded = hex::decode(body)?;
        let bytes: [u8; OWNER_BYTES] =
            decoded
                .try_into()
                .map_err(|_| OwnerIdError::InvalidLength {
                    expected: OWNER_HEX_LEN,
                    actual: body.len(),
                })?;
        let owner = Self(bytes);

        let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
        if has_lower && has_upper && owner.checksum_body() != body {
            return Err(OwnerIdError::ChecksumMismatch);
        }

        Ok(owner)
    }

    /// Canonical lowercase rendering, `0x` prefixed.
    pub fn to_canonical(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// EIP-55 mixed-case checksum rendering for display.
    pub fn to_checksum(&self) -> String {
        format!("0x{}", self.checksum_body())
    }

    fn checksum_body(&self) -> String {
        let lower = hex::encode(self.0);
        let digest = Keccak256::digest(lower.as_bytes());

        lower
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let nibble = if i % 2 == 0 {
                    digest[i / 2] >> 4
                } else {
                    digest[i / 2] & 0x0f
                };
                if c.is_ascii_alphabetic() && nibble >= 8 {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerId({})", self.to_canonical())
    }
}

impl FromStr for OwnerId {
    type Err = OwnerIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<OwnerId> for String {
    fn from(value: OwnerId) -> Self {
        value.to_canonical()
    }
}

impl TryFrom<String> for OwnerId {
    type Error = OwnerIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}
