//! Per-owner provenance history reconstructed from the ledger layout.
//!
//! The ledger keeps, per owner, two parallel collections (record keys and
//! content addresses) plus a key-addressed record map. A listing reads the
//! collections, fetches every record with a bounded fan-out, and filters,
//! de-duplicates and orders the result. Per-record failures never fail the
//! listing; they are reported in [`Listing::dropped`].

use crate::cache::IndexCache;
use crate::config::CoreConfig;
use crate::errors::{IndexError, Result};
use futures::stream::{self, StreamExt};
use hashvault_ledger::{LedgerClient, LedgerError};
use hashvault_types::{ContentAddress, OwnerId, ProvenanceRecord, RecordKey};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingOutcome {
    /// The ledger holds nothing for this owner.
    NoLedgerRecords,
    Resolved,
}

/// A record listed in the owner index that could not be included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedRecord {
    pub record_key: RecordKey,
    pub content_address: ContentAddress,
    pub reason: String,
}

/// Result of one owner query, including what was left out and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub owner: OwnerId,
    pub outcome: ListingOutcome,
    /// Live records, newest first.
    pub records: Vec<ProvenanceRecord>,
    pub dropped: Vec<DroppedRecord>,
    /// Records skipped because the ledger marks them as non-existent.
    pub tombstoned: usize,
}

impl Listing {
    pub fn empty(owner: OwnerId) -> Self {
        Self {
            owner,
            outcome: ListingOutcome::NoLedgerRecords,
            records: Vec::new(),
            dropped: Vec::new(),
            tombstoned: 0,
        }
    }

    /// Whether any indexed record could not be fetched or verified.
    pub fn is_partial(&self) -> bool {
        !self.dropped.is_empty()
    }
}

/// Read side of the provenance ledger.
pub struct ProvenanceIndex {
    ledger: Arc<dyn LedgerClient>,
    cache: IndexCache,
    fetch_concurrency: usize,
}

impl ProvenanceIndex {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: &CoreConfig) -> Self {
        Self {
            ledger,
            cache: IndexCache::new(config.cache_ttl()),
            fetch_concurrency: config.fetch_concurrency(),
        }
    }

    pub fn cache(&self) -> &IndexCache {
        &self.cache
    }

    /// Listing for `owner`, served from cache while fresh.
    pub async fn list(&self, owner: &str) -> Result<Listing> {
        let owner = OwnerId::parse(owner)
            .map_err(|err| IndexError::InvalidOwnerIdentity(err.to_string()))?;
        if let Some(listing) = self.cache.get(&owner) {
            debug!(%owner, "serving cached listing");
            return Ok(listing);
        }
        self.refresh(&owner).await
    }

    /// Live records for `owner`, newest first.
    pub async fn list_uploads(&self, owner: &str) -> Result<Vec<ProvenanceRecord>> {
        Ok(self.list(owner).await?.records)
    }

    /// Query the ledger regardless of cache state and store the result.
    pub async fn refresh(&self, owner: &OwnerId) -> Result<Listing> {
        let generation = self.cache.generation(owner);
        let listing = self.resolve(owner).await?;
        if !self.cache.insert(&listing, generation) {
            debug!(%owner, "listing not cached");
        }
        Ok(listing)
    }

    pub fn invalidate(&self, owner: &OwnerId) {
        if self.cache.invalidate(owner) {
            debug!(%owner, "listing cache invalidated");
        }
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    #[instrument(skip(self), fields(owner = %owner))]
    async fn resolve(&self, owner: &OwnerId) -> Result<Listing> {
        let index = match self.ledger.query_by_owner(owner).await {
            Ok(index) => index,
            Err(LedgerError::NoRecords) => {
                debug!("owner has no ledger records");
                return Ok(Listing::empty(*owner));
            }
            Err(err) => return Err(IndexError::LedgerUnreachable(err.to_string())),
        };

        if !index.is_consistent() {
            warn!(
                record_keys = index.record_keys.len(),
                content_addresses = index.content_addresses.len(),
                "owner index collections differ in length; using common prefix"
            );
        }

        let mut seen = HashSet::new();
        let entries: Vec<(RecordKey, ContentAddress)> = index
            .pairs()
            .filter(|(key, _)| seen.insert(**key))
            .map(|(key, address)| (*key, address.clone()))
            .collect();
        if entries.len() < index.len() {
            debug!(
                duplicates = index.len() - entries.len(),
                "skipping repeated record keys"
            );
        }

        let ledger = &self.ledger;
        let fetched: Vec<_> = stream::iter(entries)
            .map(|(key, address)| async move {
                let result = ledger.get(&key).await;
                (key, address, result)
            })
            .buffered(self.fetch_concurrency)
            .collect()
            .await;

        let mut listing = Listing {
            owner: *owner,
            outcome: ListingOutcome::Resolved,
            records: Vec::with_capacity(fetched.len()),
            dropped: Vec::new(),
            tombstoned: 0,
        };

        for (record_key, content_address, result) in fetched {
            let record = match result {
                Ok(record) => record,
                Err(err) => {
                    warn!(%record_key, error = %err, "dropping record that failed to load");
                    listing.dropped.push(DroppedRecord {
                        record_key,
                        content_address,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            if record.content_address != content_address {
                warn!(
                    %record_key,
                    indexed = %content_address,
                    stored = %record.content_address,
                    "dropping inconsistent record"
                );
                listing.dropped.push(DroppedRecord {
                    record_key,
                    reason: format!(
                        "content address mismatch: index has {content_address}, record has {}",
                        record.content_address
                    ),
                    content_address,
                });
                continue;
            }

            if !record.exists {
                listing.tombstoned += 1;
                continue;
            }
            listing.records.push(record);
        }

        // Stable: equal timestamps keep ledger order.
        listing
            .records
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));

        info!(
            records = listing.records.len(),
            dropped = listing.dropped.len(),
            tombstoned = listing.tombstoned,
            "owner listing resolved"
        );
        Ok(listing)
    }
}
