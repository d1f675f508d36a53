//! Upload lifecycle as a pure state machine.
//!
//! Every transition is a function of the current [`UploadState`] and one
//! [`MachineInput`]; it yields the next state plus an [`Effect`] the driver
//! must perform. No I/O or clock access happens here, so the whole lifecycle
//! can be replayed and serialized for display.

use crate::errors::UploadError;
use hashvault_types::{
    AppendReceipt, Confirmation, ContentAddress, DraftRecord, OwnerId, ProvenanceRecord, TxRef,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadState {
    Idle,
    Addressing {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner_hint: Option<OwnerId>,
    },
    AwaitingAuthorization {
        content_address: ContentAddress,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner_hint: Option<OwnerId>,
    },
    Submitting {
        draft: DraftRecord,
    },
    Confirming {
        draft: DraftRecord,
        tx_ref: TxRef,
    },
    Committed {
        record: ProvenanceRecord,
    },
    Failed {
        error: UploadError,
    },
}

/// Outcome of one external step, fed back into the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineInput {
    Start {
        content_len: usize,
        owner_hint: Option<String>,
    },
    ContentStored(ContentAddress),
    StoreFailed(String),
    Authorized {
        identity: OwnerId,
        /// Client clock reading, seconds since the epoch.
        created_at: u64,
    },
    AuthorizationUnavailable(String),
    AuthorizationDeclined,
    Appended(AppendReceipt),
    AppendRejected(String),
    Confirmed(Confirmation),
    ConfirmationTimedOut {
        timeout_secs: u64,
    },
    ConfirmationFailed(String),
}

impl MachineInput {
    fn name(&self) -> &'static str {
        match self {
            MachineInput::Start { .. } => "start",
            MachineInput::ContentStored(_) => "content_stored",
            MachineInput::StoreFailed(_) => "store_failed",
            MachineInput::Authorized { .. } => "authorized",
            MachineInput::AuthorizationUnavailable(_) => "authorization_unavailable",
            MachineInput::AuthorizationDeclined => "authorization_declined",
            MachineInput::Appended(_) => "appended",
            MachineInput::AppendRejected(_) => "append_rejected",
            MachineInput::Confirmed(_) => "confirmed",
            MachineInput::ConfirmationTimedOut { .. } => "confirmation_timed_out",
            MachineInput::ConfirmationFailed(_) => "confirmation_failed",
        }
    }
}

/// Work requested from the driver after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StoreContent,
    RequestAuthorization { preferred: Option<OwnerId> },
    AppendRecord(DraftRecord),
    AwaitConfirmation(TxRef),
    InvalidateOwner(OwnerId),
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: UploadState,
    pub effect: Effect,
}

impl Transition {
    fn to(state: UploadState, effect: Effect) -> Self {
        Self { state, effect }
    }

    fn fail(error: UploadError) -> Self {
        Self::to(UploadState::Failed { error }, Effect::None)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("input `{input}` is not valid in state `{state}`")]
pub struct TransitionError {
    pub state: &'static str,
    pub input: &'static str,
}

impl UploadState {
    pub fn name(&self) -> &'static str {
        match self {
            UploadState::Idle => "idle",
            UploadState::Addressing { .. } => "addressing",
            UploadState::AwaitingAuthorization { .. } => "awaiting_authorization",
            UploadState::Submitting { .. } => "submitting",
            UploadState::Confirming { .. } => "confirming",
            UploadState::Committed { .. } => "committed",
            UploadState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Committed { .. } | UploadState::Failed { .. }
        )
    }

    /// Human-readable line for rendering this state.
    pub fn describe(&self) -> String {
        match self {
            UploadState::Idle => "waiting for a file".to_string(),
            UploadState::Addressing { .. } => "uploading file to the content store".to_string(),
            UploadState::AwaitingAuthorization {
                content_address, ..
            } => format!("stored as {content_address}; waiting for signer authorization"),
            UploadState::Submitting { draft } => format!(
                "submitting provenance record {} for {}",
                draft.record_key, draft.content_address
            ),
            UploadState::Confirming { tx_ref, .. } => {
                format!("waiting for ledger confirmation of {tx_ref}")
            }
            UploadState::Committed { record } => format!(
                "{} registered to {} on the ledger",
                record.content_address, record.owner
            ),
            UploadState::Failed { error } => format!("{}: {}", error.kind(), error),
        }
    }

    /// Apply one input, producing the next state and the effect to perform.
    pub fn advance(&self, input: MachineInput) -> Result<Transition, TransitionError> {
        let invalid = TransitionError {
            state: self.name(),
            input: input.name(),
        };

        let transition = match (self, input) {
            (
                UploadState::Idle,
                MachineInput::Start {
                    content_len,
                    owner_hint,
                },
            ) => {
                if content_len == 0 {
                    return Ok(Transition::fail(UploadError::EmptyContent));
                }
                let owner_hint = match owner_hint.as_deref().map(OwnerId::parse).transpose() {
                    Ok(hint) => hint,
                    Err(err) => {
                        return Ok(Transition::fail(UploadError::InvalidOwnerIdentity(
                            err.to_string(),
                        )))
                    }
                };
                Transition::to(UploadState::Addressing { owner_hint }, Effect::StoreContent)
            }

            (UploadState::Addressing { owner_hint }, MachineInput::ContentStored(address)) => {
                Transition::to(
                    UploadState::AwaitingAuthorization {
                        content_address: address,
                        owner_hint: *owner_hint,
                    },
                    Effect::RequestAuthorization {
                        preferred: *owner_hint,
                    },
                )
            }
            (UploadState::Addressing { .. }, MachineInput::StoreFailed(reason)) => {
                Transition::fail(UploadError::StorageUnavailable(reason))
            }

            (
                UploadState::AwaitingAuthorization {
                    content_address,
                    owner_hint,
                },
                MachineInput::Authorized {
                    identity,
                    created_at,
                },
            ) => match owner_hint {
                Some(expected) if *expected != identity => {
                    Transition::fail(UploadError::AuthorizationUnavailable(format!(
                        "signer resolved a different account ({identity}) than requested ({expected})"
                    )))
                }
                _ => {
                    let draft = DraftRecord::new(content_address.clone(), identity, created_at);
                    Transition::to(
                        UploadState::Submitting {
                            draft: draft.clone(),
                        },
                        Effect::AppendRecord(draft),
                    )
                }
            },
            (
                UploadState::AwaitingAuthorization { .. },
                MachineInput::AuthorizationUnavailable(reason),
            ) => Transition::fail(UploadError::AuthorizationUnavailable(reason)),
            (UploadState::AwaitingAuthorization { .. }, MachineInput::AuthorizationDeclined) => {
                Transition::fail(UploadError::UserRejected)
            }

            (UploadState::Submitting { draft }, MachineInput::Appended(receipt)) => {
                Transition::to(
                    UploadState::Confirming {
                        draft: draft.clone(),
                        tx_ref: receipt.tx_ref.clone(),
                    },
                    Effect::AwaitConfirmation(receipt.tx_ref),
                )
            }
            (UploadState::Submitting { .. }, MachineInput::AppendRejected(reason)) => {
                Transition::fail(UploadError::LedgerRejected(reason))
            }

            (UploadState::Confirming { draft, .. }, MachineInput::Confirmed(confirmation)) => {
                let record = ProvenanceRecord::from_draft(draft.clone(), Some(confirmation.tx_ref));
                let owner = record.owner;
                Transition::to(
                    UploadState::Committed { record },
                    Effect::InvalidateOwner(owner),
                )
            }
            // The append already landed, so cached listings are stale either way.
            (
                UploadState::Confirming { draft, tx_ref },
                MachineInput::ConfirmationTimedOut { timeout_secs },
            ) => Transition::to(
                UploadState::Failed {
                    error: UploadError::ConfirmationTimeout {
                        tx_ref: tx_ref.to_string(),
                        timeout_secs,
                    },
                },
                Effect::InvalidateOwner(draft.owner),
            ),
            (UploadState::Confirming { draft, .. }, MachineInput::ConfirmationFailed(reason)) => {
                Transition::to(
                    UploadState::Failed {
                        error: UploadError::LedgerRejected(reason),
                    },
                    Effect::InvalidateOwner(draft.owner),
                )
            }

            _ => return Err(invalid),
        };

        Ok(transition)
    }
}
