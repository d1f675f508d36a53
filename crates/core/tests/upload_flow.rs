use async_trait::async_trait;
use hashvault_core::{
    CoreConfig, ErrorKind, ListingOutcome, ProvenanceIndex, UploadError, UploadOrchestrator,
};
use hashvault_files::{ContentStore, MemoryContentStore};
use hashvault_ledger::{
    Authorization, ConfirmationMode, LedgerClient, LedgerError, MemoryLedger, ScriptedSigner,
    StaticSigner,
};
use hashvault_types::{
    AppendReceipt, Confirmation, ContentAddress, DraftRecord, OwnerId, OwnerIndex,
    ProvenanceRecord, RecordKey, TxRef,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const OWNER: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

fn owner() -> OwnerId {
    OwnerId::parse(OWNER).unwrap()
}

/// Memory ledger wrapper that counts calls and can corrupt responses.
#[derive(Default)]
struct InstrumentedLedger {
    inner: MemoryLedger,
    appends: AtomicUsize,
    gets: AtomicUsize,
    rewritten: Mutex<HashMap<RecordKey, ContentAddress>>,
    extra_keys: Mutex<Vec<RecordKey>>,
}

impl InstrumentedLedger {
    fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerClient for InstrumentedLedger {
    async fn append(
        &self,
        record: &DraftRecord,
        authorization: &Authorization,
    ) -> Result<AppendReceipt, LedgerError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.inner.append(record, authorization).await
    }

    async fn await_confirmation(&self, tx_ref: &TxRef) -> Result<Confirmation, LedgerError> {
        self.inner.await_confirmation(tx_ref).await
    }

    async fn query_by_owner(&self, owner: &OwnerId) -> Result<OwnerIndex, LedgerError> {
        let mut index = self.inner.query_by_owner(owner).await?;
        index.record_keys.extend(self.extra_keys.lock().iter().copied());
        Ok(index)
    }

    async fn get(&self, record_key: &RecordKey) -> Result<ProvenanceRecord, LedgerError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let mut record = self.inner.get(record_key).await?;
        if let Some(address) = self.rewritten.lock().get(record_key) {
            record.content_address = address.clone();
        }
        Ok(record)
    }
}

/// Memory ledger whose next owner query pauses after reading the index.
#[derive(Default)]
struct GatedLedger {
    inner: MemoryLedger,
    armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl LedgerClient for GatedLedger {
    async fn append(
        &self,
        record: &DraftRecord,
        authorization: &Authorization,
    ) -> Result<AppendReceipt, LedgerError> {
        self.inner.append(record, authorization).await
    }

    async fn await_confirmation(&self, tx_ref: &TxRef) -> Result<Confirmation, LedgerError> {
        self.inner.await_confirmation(tx_ref).await
    }

    async fn query_by_owner(&self, owner: &OwnerId) -> Result<OwnerIndex, LedgerError> {
        let index = self.inner.query_by_owner(owner).await;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        index
    }

    async fn get(&self, record_key: &RecordKey) -> Result<ProvenanceRecord, LedgerError> {
        self.inner.get(record_key).await
    }
}

fn setup(ledger: Arc<dyn LedgerClient>) -> (UploadOrchestrator, Arc<ProvenanceIndex>) {
    let index = Arc::new(ProvenanceIndex::new(ledger.clone(), &CoreConfig::default()));
    let orchestrator = UploadOrchestrator::new(Arc::new(MemoryContentStore::new()), ledger)
        .with_signer(Arc::new(StaticSigner::new(owner())))
        .with_index(index.clone());
    (orchestrator, index)
}

fn imported(content: &[u8], created_at: u64) -> ProvenanceRecord {
    let draft = DraftRecord::new(ContentAddress::cid_v0_for(content), owner(), created_at);
    ProvenanceRecord::from_draft(draft, None)
}

#[tokio::test]
async fn committed_upload_is_listed_once() {
    let ledger = Arc::new(MemoryLedger::new());
    let (orchestrator, index) = setup(ledger.clone());

    let record = orchestrator
        .upload(b"annual report", Some(OWNER))
        .await
        .expect("upload commits");
    assert_eq!(record.owner, owner());
    assert_eq!(record.authorized_party, owner());
    assert!(record.tx_ref.is_some());
    assert!(record.key_matches_address());

    let records = index.list_uploads(OWNER).await.expect("listing");
    let matching: Vec<_> = records
        .iter()
        .filter(|r| r.content_address == record.content_address)
        .collect();
    assert_eq!(matching.len(), 1);
    assert!(matching[0].exists);
}

#[tokio::test]
async fn addressing_is_idempotent() {
    let store = MemoryContentStore::new();
    let first = store.put(b"same bytes").await.unwrap();
    let second = store.put(b"same bytes").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.record_key(), second.record_key());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn listing_is_newest_first() {
    let ledger = Arc::new(MemoryLedger::new());
    let ticks = Arc::new(AtomicUsize::new(0));
    let clock_ticks = ticks.clone();
    let (orchestrator, index) = setup(ledger.clone());
    let orchestrator = orchestrator.with_clock(move || {
        [10, 30, 20][clock_ticks.fetch_add(1, Ordering::SeqCst) % 3]
    });

    for content in [&b"ten"[..], b"thirty", b"twenty"] {
        orchestrator.upload(content, None).await.unwrap();
    }
    assert_eq!(ticks.load(Ordering::SeqCst), 3);

    let created: Vec<u64> = index
        .list_uploads(OWNER)
        .await
        .unwrap()
        .iter()
        .map(|r| r.created_at)
        .collect();
    assert_eq!(created, vec![30, 20, 10]);
}

#[tokio::test]
async fn tombstoned_records_are_hidden() {
    let ledger = Arc::new(MemoryLedger::new());
    let visible = imported(b"visible", 2);
    let hidden = imported(b"hidden", 1);
    ledger.import_record(visible.clone());
    ledger.import_record(hidden.clone());
    ledger.set_exists(&hidden.record_key, false);

    let (_, index) = setup(ledger.clone());
    let listing = index.list(OWNER).await.unwrap();
    assert_eq!(listing.records, vec![visible]);
    assert_eq!(listing.tombstoned, 1);
    assert!(listing.dropped.is_empty());
}

#[tokio::test]
async fn unknown_owner_lists_empty() {
    let ledger = Arc::new(MemoryLedger::new());
    let (_, index) = setup(ledger);

    let listing = index.list(OWNER).await.expect("empty owner is not an error");
    assert_eq!(listing.outcome, ListingOutcome::NoLedgerRecords);
    assert!(listing.records.is_empty());
}

#[tokio::test]
async fn failed_fetch_is_dropped_not_fatal() {
    let ledger = Arc::new(MemoryLedger::new());
    let oldest = imported(b"oldest", 10);
    let broken = imported(b"broken", 20);
    let newest = imported(b"newest", 30);
    for record in [&oldest, &broken, &newest] {
        ledger.import_record(record.clone());
    }
    ledger.fail_get(broken.record_key);

    let (_, index) = setup(ledger.clone());
    let listing = index.list(OWNER).await.unwrap();
    assert_eq!(listing.records, vec![newest, oldest]);
    assert_eq!(listing.dropped.len(), 1);
    assert_eq!(listing.dropped[0].record_key, broken.record_key);
    assert!(listing.is_partial());
    assert!(index.cache().get(&owner()).is_none());
}

#[tokio::test]
async fn declined_authorization_never_appends() {
    let ledger = Arc::new(InstrumentedLedger::new());
    let signer = ScriptedSigner::declining();
    let orchestrator = UploadOrchestrator::new(Arc::new(MemoryContentStore::new()), ledger.clone())
        .with_signer(Arc::new(signer.clone()));

    let err = orchestrator.upload(b"private", None).await.unwrap_err();
    assert_eq!(err, UploadError::UserRejected);
    assert_eq!(err.kind().as_str(), "user_rejected");
    assert_eq!(signer.requests(), 1);
    assert_eq!(ledger.appends.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn confirmation_timeout_leaves_record_discoverable() {
    let ledger = Arc::new(MemoryLedger::new().with_confirmation(ConfirmationMode::Never));
    let (orchestrator, index) = setup(ledger.clone());
    let orchestrator = orchestrator.with_confirmation_timeout(Duration::from_millis(50));

    let err = orchestrator.upload(b"slow chain", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfirmationTimeout);
    assert!(err.kind().commit_status_unknown());

    let records = index.list_uploads(OWNER).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].content_address,
        ContentAddress::cid_v0_for(b"slow chain")
    );
}

#[tokio::test]
async fn repeated_upload_is_rejected_by_ledger() {
    let ledger = Arc::new(MemoryLedger::new());
    let (orchestrator, index) = setup(ledger.clone());

    orchestrator.upload(b"twice", None).await.unwrap();
    let err = orchestrator.upload(b"twice", None).await.unwrap_err();
    assert_eq!(
        err,
        UploadError::LedgerRejected("record already exists".to_string())
    );
    assert_eq!(index.list_uploads(OWNER).await.unwrap().len(), 1);
}

#[tokio::test]
async fn commit_invalidates_cached_listing() {
    let ledger = Arc::new(MemoryLedger::new());
    let (orchestrator, index) = setup(ledger.clone());

    ledger.import_record(imported(b"existing", 1));
    assert_eq!(index.list_uploads(OWNER).await.unwrap().len(), 1);
    assert!(index.cache().get(&owner()).is_some());

    orchestrator.upload(b"fresh", None).await.unwrap();
    assert!(index.cache().get(&owner()).is_none());
    assert_eq!(index.list_uploads(OWNER).await.unwrap().len(), 2);
}

#[tokio::test]
async fn inconsistent_and_repeated_entries_are_handled() {
    let ledger = Arc::new(InstrumentedLedger::new());
    let good = imported(b"good", 2);
    let tampered = imported(b"tampered", 1);
    ledger.inner.import_record(good.clone());
    ledger.inner.import_record(good.clone());
    ledger.inner.import_record(tampered.clone());
    ledger.rewritten.lock().insert(
        tampered.record_key,
        ContentAddress::cid_v0_for(b"something else"),
    );

    let (_, index) = setup(ledger.clone());
    let listing = index.list(OWNER).await.unwrap();

    assert_eq!(listing.records, vec![good]);
    assert_eq!(listing.dropped.len(), 1);
    assert!(listing.dropped[0].reason.contains("mismatch"));
    assert_eq!(ledger.gets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn uneven_owner_index_uses_common_prefix() {
    let ledger = Arc::new(InstrumentedLedger::new());
    let only = imported(b"only", 5);
    ledger.inner.import_record(only.clone());
    ledger
        .extra_keys
        .lock()
        .push(ContentAddress::cid_v0_for(b"orphan").record_key());

    let (_, index) = setup(ledger.clone());
    let listing = index.list(OWNER).await.unwrap();
    assert_eq!(listing.records, vec![only]);
    assert!(listing.dropped.is_empty());
    assert_eq!(ledger.gets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hint_must_match_signer_identity() {
    let ledger = Arc::new(MemoryLedger::new());
    let (orchestrator, _) = setup(ledger.clone());
    let other = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

    let err = orchestrator.upload(b"mine", Some(other)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AuthorizationUnavailable);
    assert_eq!(ledger.record_count(), 0);

    let err = orchestrator
        .upload(b"mine", Some("0x1234"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOwnerIdentity);
}

#[tokio::test]
async fn empty_content_is_rejected_before_store() {
    let store = MemoryContentStore::new();
    let ledger = Arc::new(MemoryLedger::new());
    let orchestrator = UploadOrchestrator::new(Arc::new(store.clone()), ledger)
        .with_signer(Arc::new(StaticSigner::new(owner())));

    let err = orchestrator.upload(b"", None).await.unwrap_err();
    assert_eq!(err, UploadError::EmptyContent);
    assert!(store.is_empty());
}

#[tokio::test]
async fn confirmation_timeout_invalidates_cached_listing() {
    let ledger = Arc::new(MemoryLedger::new().with_confirmation(ConfirmationMode::Never));
    ledger.import_record(imported(b"existing", 1));
    let (orchestrator, index) = setup(ledger.clone());
    let orchestrator = orchestrator.with_confirmation_timeout(Duration::from_millis(50));

    assert_eq!(index.list_uploads(OWNER).await.unwrap().len(), 1);
    assert!(index.cache().get(&owner()).is_some());

    let err = orchestrator.upload(b"unconfirmed", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfirmationTimeout);
    assert!(index.cache().get(&owner()).is_none());

    let records = index.list_uploads(OWNER).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .any(|r| r.content_address == ContentAddress::cid_v0_for(b"unconfirmed")));
}

#[tokio::test]
async fn listing_read_before_commit_is_not_cached() {
    let ledger = Arc::new(GatedLedger::default());
    ledger.inner.import_record(imported(b"existing", 1));
    let (orchestrator, index) = setup(ledger.clone());

    ledger.armed.store(true, Ordering::SeqCst);
    let reader = tokio::spawn({
        let index = index.clone();
        async move { index.list_uploads(OWNER).await }
    });
    ledger.entered.notified().await;

    orchestrator.upload(b"fresh", None).await.unwrap();
    ledger.release.notify_one();

    // The in-flight reader still returns what it saw.
    assert_eq!(reader.await.unwrap().unwrap().len(), 1);
    assert!(index.cache().get(&owner()).is_none());
    assert_eq!(index.list_uploads(OWNER).await.unwrap().len(), 2);
}

#[tokio::test]
async fn dropped_handle_still_commits() {
    let ledger = Arc::new(
        MemoryLedger::new().with_confirmation(ConfirmationMode::After(Duration::from_millis(50))),
    );
    let (orchestrator, index) = setup(ledger.clone());

    let mut handle = orchestrator.submit_upload(b"abandoned".to_vec(), None);
    let first = handle.next_event().await.expect("first event");
    assert_eq!(first.state.name(), "addressing");
    drop(handle);

    tokio::time::timeout(Duration::from_secs(5), async {
        while ledger.record_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("record appended after the observer went away");

    let records = index.list_uploads(OWNER).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].content_address,
        ContentAddress::cid_v0_for(b"abandoned")
    );
}
