//! In-memory content store.

use crate::store::{ContentStore, Result, StoreError};
use async_trait::async_trait;
use hashvault_types::ContentAddress;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Content store that keeps blobs in memory (for testing and offline use).
///
/// Addresses are CIDv0 strings over the sha2-256 digest of the whole buffer,
/// so they are deterministic but not chunked the way an IPFS node would
/// chunk large files.
#[derive(Clone, Default)]
pub struct MemoryContentStore {
    inner: Arc<MemoryContentStoreInner>,
}

#[derive(Default)]
struct MemoryContentStoreInner {
    blobs: RwLock<HashMap<ContentAddress, Vec<u8>>>,
    offline: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `put` calls fail with [`StoreError::Offline`].
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    pub fn get(&self, address: &ContentAddress) -> Option<Vec<u8>> {
        self.inner.blobs.read().get(address).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, data: &[u8]) -> Result<ContentAddress> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Offline);
        }

        let address = ContentAddress::cid_v0_for(data);
        self.inner
            .blobs
            .write()
            .entry(address.clone())
            .or_insert_with(|| data.to_vec());

        Ok(address)
    }
}
