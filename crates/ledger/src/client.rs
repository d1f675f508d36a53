use crate::errors::Result;
use crate::signer::Authorization;
use async_trait::async_trait;
use hashvault_types::{
    AppendReceipt, Confirmation, DraftRecord, OwnerId, OwnerIndex, ProvenanceRecord, RecordKey,
    TxRef,
};

/// Read/write contract of the provenance ledger.
///
/// Implementations are shared between tasks and must not assume exclusive
/// access to the underlying store.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit a draft signed by `authorization`.
    ///
    /// Fails with `LedgerError::Rejected` when the authorization check fails
    /// or the ledger declines the write (including a duplicate record key).
    async fn append(
        &self,
        record: &DraftRecord,
        authorization: &Authorization,
    ) -> Result<AppendReceipt>;

    /// Wait until the write behind `tx_ref` is durably accepted.
    async fn await_confirmation(&self, tx_ref: &TxRef) -> Result<Confirmation>;

    /// Parallel record-key and content-address collections for `owner`.
    ///
    /// An owner without records is reported as `LedgerError::NoRecords`.
    async fn query_by_owner(&self, owner: &OwnerId) -> Result<OwnerIndex>;

    /// Full record for `record_key`.
    async fn get(&self, record_key: &RecordKey) -> Result<ProvenanceRecord>;
}
