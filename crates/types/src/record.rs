//! Provenance records and the ledger-side shapes that carry them.

use crate::{ContentAddress, OwnerId, RecordKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger-assigned reference for a submitted write.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(String);

impl TxRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxRef({})", self.0)
    }
}

/// Uncommitted record built by the client once a content address and a
/// signing identity are known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRecord {
    pub content_address: ContentAddress,
    pub record_key: RecordKey,
    /// Seconds since the Unix epoch, supplied by the client.
    pub created_at: u64,
    pub owner: OwnerId,
    pub authorized_party: OwnerId,
}

impl DraftRecord {
    /// Build a draft owned and managed by `owner`, deriving the record key.
    pub fn new(content_address: ContentAddress, owner: OwnerId, created_at: u64) -> Self {
        let record_key = content_address.record_key();
        Self {
            content_address,
            record_key,
            created_at,
            owner,
            authorized_party: owner,
        }
    }

    pub fn with_authorized_party(mut self, party: OwnerId) -> Self {
        self.authorized_party = party;
        self
    }
}

/// Durable provenance entry as held by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    pub content_address: ContentAddress,
    pub record_key: RecordKey,
    pub created_at: u64,
    pub owner: OwnerId,
    pub authorized_party: OwnerId,
    /// Tombstone flag. Readers treat `false` as absent.
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_ref: Option<TxRef>,
}

impl ProvenanceRecord {
    /// Committed form of a draft.
    pub fn from_draft(draft: DraftRecord, tx_ref: Option<TxRef>) -> Self {
        Self {
            content_address: draft.content_address,
            record_key: draft.record_key,
            created_at: draft.created_at,
            owner: draft.owner,
            authorized_party: draft.authorized_party,
            exists: true,
            tx_ref,
        }
    }

    /// Whether the stored key is the one derived from the stored address.
    pub fn key_matches_address(&self) -> bool {
        self.content_address.record_key() == self.record_key
    }
}

/// Per-owner parallel collections as laid out by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerIndex {
    pub record_keys: Vec<RecordKey>,
    pub content_addresses: Vec<ContentAddress>,
}

impl OwnerIndex {
    pub fn push(&mut self, key: RecordKey, address: ContentAddress) {
        self.record_keys.push(key);
        self.content_addresses.push(address);
    }

    /// Number of positions usable as (key, address) pairs.
    pub fn len(&self) -> usize {
        self.record_keys.len().min(self.content_addresses.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Both collections have the same length.
    pub fn is_consistent(&self) -> bool {
        self.record_keys.len() == self.content_addresses.len()
    }

    /// Pairs in ledger order, truncated to the shorter collection.
    pub fn pairs(&self) -> impl Iterator<Item = (&RecordKey, &ContentAddress)> {
        self.record_keys.iter().zip(self.content_addresses.iter())
    }
}

/// Acknowledgement that a write was accepted for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendReceipt {
    pub record_key: RecordKey,
    pub tx_ref: TxRef,
}

/// Durable acceptance of a previously appended record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub record_key: RecordKey,
    pub tx_ref: TxRef,
    /// Ledger time of the commit, in seconds.
    pub committed_at: u64,
}
