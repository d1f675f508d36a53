//! In-memory ledger with the owner-indexed layout of the storage contract.

use crate::client::LedgerClient;
use crate::errors::{LedgerError, Result};
use crate::signer::Authorization;
use async_trait::async_trait;
use hashvault_types::{
    unix_now_secs, AppendReceipt, Confirmation, DraftRecord, OwnerId, OwnerIndex,
    ProvenanceRecord, RecordKey, TxRef,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// How the ledger answers `await_confirmation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationMode {
    Immediate,
    After(Duration),
    /// Never confirm; the write is still visible to queries.
    Never,
}

/// Ledger double that keeps everything in memory.
///
/// Writes are applied when appended, so a record is discoverable by owner
/// queries even if nobody ever waits for its confirmation.
#[derive(Clone)]
pub struct MemoryLedger {
    inner: Arc<MemoryLedgerInner>,
}

struct MemoryLedgerInner {
    state: RwLock<LedgerState>,

    /// Submitted transactions: tx ref -> (record key, submitted at)
    transactions: RwLock<HashMap<TxRef, (RecordKey, u64)>>,

    confirmation: RwLock<ConfirmationMode>,
    failing_gets: RwLock<HashSet<RecordKey>>,
    unreachable: AtomicBool,
    tx_nonce: AtomicU64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerState {
    /// Owner -> parallel (record key, content address) collections
    owners: HashMap<OwnerId, OwnerIndex>,

    /// Record key -> record
    records: HashMap<RecordKey, ProvenanceRecord>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::from_state(LedgerState::default())
    }

    fn from_state(state: LedgerState) -> Self {
        Self {
            inner: Arc::new(MemoryLedgerInner {
                state: RwLock::new(state),
                transactions: RwLock::new(HashMap::new()),
                confirmation: RwLock::new(ConfirmationMode::Immediate),
                failing_gets: RwLock::new(HashSet::new()),
                unreachable: AtomicBool::new(false),
                tx_nonce: AtomicU64::new(0),
            }),
        }
    }

    pub fn with_confirmation(self, mode: ConfirmationMode) -> Self {
        self.set_confirmation_mode(mode);
        self
    }

    pub fn set_confirmation_mode(&self, mode: ConfirmationMode) {
        *self.inner.confirmation.write() = mode;
    }

    /// Simulate a transport outage for every call.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Make `get` fail for this key until failures are cleared.
    pub fn fail_get(&self, record_key: RecordKey) {
        self.inner.failing_gets.write().insert(record_key);
    }

    pub fn clear_failures(&self) {
        self.inner.failing_gets.write().clear();
    }

    /// Flip the tombstone flag of a stored record. Returns false if the key
    /// is unknown.
    pub fn set_exists(&self, record_key: &RecordKey, exists: bool) -> bool {
        match self.inner.state.write().records.get_mut(record_key) {
            Some(record) => {
                record.exists = exists;
                true
            }
            None => false,
        }
    }

    /// Insert a record directly, bypassing authorization and duplicate
    /// checks. The owner index is appended to even for a repeated key.
    pub fn import_record(&self, record: ProvenanceRecord) {
        let mut state = self.inner.state.write();
        state
            .owners
            .entry(record.owner)
            .or_default()
            .push(record.record_key, record.content_address.clone());
        state.records.insert(record.record_key, record);
    }

    pub fn record_count(&self) -> usize {
        self.inner.state.read().records.len()
    }

    /// Load a snapshot written by [`MemoryLedger::save_snapshot`].
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let state: LedgerState = serde_json::from_slice(&bytes)?;
        info!(
            path = %path.as_ref().display(),
            records = state.records.len(),
            "loaded ledger snapshot"
        );
        Ok(Self::from_state(state))
    }

    /// Load a snapshot if the file exists, otherwise start empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load_snapshot(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Persist owners and records as JSON. Pending transactions are not saved.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = {
            let state = self.inner.state.read();
            serde_json::to_vec_pretty(&*state)?
        };
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.inner.unreachable.load(Ordering::SeqCst) {
            return Err(LedgerError::Unreachable("ledger endpoint offline".to_string()));
        }
        Ok(())
    }

    fn next_tx_ref(&self, record_key: &RecordKey) -> TxRef {
        let nonce = self.inner.tx_nonce.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Keccak256::new();
        hasher.update(record_key.as_bytes());
        hasher.update(nonce.to_be_bytes());
        TxRef::new(format!("0x{}", hex::encode(hasher.finalize())))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn append(
        &self,
        record: &DraftRecord,
        authorization: &Authorization,
    ) -> Result<AppendReceipt> {
        self.ensure_reachable()?;

        if authorization.identity != record.owner {
            return Err(LedgerError::Rejected(
                "caller is not the record owner".to_string(),
            ));
        }
        if record.content_address.record_key() != record.record_key {
            return Err(LedgerError::Rejected(
                "record key does not match content address".to_string(),
            ));
        }

        {
            let mut state = self.inner.state.write();
            if state.records.contains_key(&record.record_key) {
                return Err(LedgerError::Rejected("record already exists".to_string()));
            }
            state
                .owners
                .entry(record.owner)
                .or_default()
                .push(record.record_key, record.content_address.clone());
            state.records.insert(
                record.record_key,
                ProvenanceRecord::from_draft(record.clone(), None),
            );
        }

        let tx_ref = self.next_tx_ref(&record.record_key);
        self.inner
            .transactions
            .write()
            .insert(tx_ref.clone(), (record.record_key, unix_now_secs()));

        debug!(record_key = %record.record_key, tx = %tx_ref, "record appended");
        Ok(AppendReceipt {
            record_key: record.record_key,
            tx_ref,
        })
    }

    async fn await_confirmation(&self, tx_ref: &TxRef) -> Result<Confirmation> {
        self.ensure_reachable()?;

        let (record_key, submitted_at) = self
            .inner
            .transactions
            .read()
            .get(tx_ref)
            .copied()
            .ok_or_else(|| LedgerError::UnknownTransaction {
                tx_ref: tx_ref.to_string(),
            })?;

        let mode = *self.inner.confirmation.read();
        match mode {
            ConfirmationMode::Immediate => {}
            ConfirmationMode::After(delay) => tokio::time::sleep(delay).await,
            ConfirmationMode::Never => std::future::pending::<()>().await,
        }

        Ok(Confirmation {
            record_key,
            tx_ref: tx_ref.clone(),
            committed_at: unix_now_secs().max(submitted_at),
        })
    }

    async fn query_by_owner(&self, owner: &OwnerId) -> Result<OwnerIndex> {
        self.ensure_reachable()?;

        match self.inner.state.read().owners.get(owner) {
            Some(index) if !index.is_empty() => Ok(index.clone()),
            _ => Err(LedgerError::NoRecords),
        }
    }

    async fn get(&self, record_key: &RecordKey) -> Result<ProvenanceRecord> {
        self.ensure_reachable()?;

        if self.inner.failing_gets.read().contains(record_key) {
            return Err(LedgerError::Unreachable(format!(
                "fetch of {record_key} timed out"
            )));
        }

        self.inner
            .state
            .read()
            .records
            .get(record_key)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound {
                record_key: record_key.to_hex(),
            })
    }
}
