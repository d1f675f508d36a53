//! Drives uploads through the lifecycle defined in [`crate::machine`].

use crate::config::CoreConfig;
use crate::errors::UploadError;
use crate::index::ProvenanceIndex;
use crate::machine::{Effect, MachineInput, UploadState};
use futures::stream::{self, Stream};
use hashvault_files::ContentStore;
use hashvault_ledger::{Authorization, LedgerClient, Signer, SignerError};
use hashvault_types::{unix_now_secs, OwnerId, ProvenanceRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle notification published on every state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadEvent {
    pub state: UploadState,
    pub detail: String,
}

impl UploadEvent {
    fn from_state(state: &UploadState) -> Self {
        Self {
            state: state.clone(),
            detail: state.describe(),
        }
    }
}

pub type UploadOutcome = std::result::Result<ProvenanceRecord, UploadError>;

/// Observer of a spawned upload.
///
/// Dropping the handle stops observation only; a ledger write that was
/// already issued still completes and shows up in later listings.
pub struct UploadHandle {
    events: mpsc::UnboundedReceiver<UploadEvent>,
}

impl UploadHandle {
    pub async fn next_event(&mut self) -> Option<UploadEvent> {
        self.events.recv().await
    }

    /// Drain events until the upload reaches a terminal state.
    ///
    /// Returns `None` if the run ended without publishing one (the task was
    /// aborted or panicked).
    pub async fn wait(mut self) -> Option<UploadState> {
        while let Some(event) = self.events.recv().await {
            if event.state.is_terminal() {
                return Some(event.state);
            }
        }
        None
    }

    pub fn into_stream(self) -> impl Stream<Item = UploadEvent> {
        stream::unfold(self.events, |mut events| async move {
            events.recv().await.map(|event| (event, events))
        })
    }
}

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Turns file bytes into a committed provenance record.
///
/// Each call runs exactly once with no retry. External services are shared
/// and the signer is consulted per invocation.
#[derive(Clone)]
pub struct UploadOrchestrator {
    store: Arc<dyn ContentStore>,
    ledger: Arc<dyn LedgerClient>,
    signer: Option<Arc<dyn Signer>>,
    index: Option<Arc<ProvenanceIndex>>,
    confirmation_timeout: Duration,
    clock: Clock,
}

impl UploadOrchestrator {
    pub fn new(store: Arc<dyn ContentStore>, ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            store,
            ledger,
            signer: None,
            index: None,
            confirmation_timeout: CoreConfig::default().confirmation_timeout(),
            clock: Arc::new(unix_now_secs),
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Index whose cache is invalidated after each commit.
    pub fn with_index(mut self, index: Arc<ProvenanceIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_config(mut self, config: &CoreConfig) -> Self {
        self.confirmation_timeout = config.confirmation_timeout();
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Replace the wall clock used for `created_at`.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Spawn the upload on the current tokio runtime.
    pub fn submit_upload(&self, data: Vec<u8>, owner_hint: Option<String>) -> UploadHandle {
        let (sender, events) = mpsc::unbounded_channel();
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let outcome = orchestrator
                .run(&data, owner_hint.as_deref(), &sender)
                .await;
            if let Err(err) = outcome {
                debug!(kind = %err.kind(), "spawned upload finished with failure");
            }
        });
        UploadHandle { events }
    }

    /// Run in place without publishing events.
    pub async fn upload(&self, data: &[u8], owner_hint: Option<&str>) -> UploadOutcome {
        let (sender, _events) = mpsc::unbounded_channel();
        self.run(data, owner_hint, &sender).await
    }

    /// Run in place, publishing every state entered to `events`.
    #[instrument(skip(self, data, events), fields(bytes = data.len()))]
    pub async fn run(
        &self,
        data: &[u8],
        owner_hint: Option<&str>,
        events: &mpsc::UnboundedSender<UploadEvent>,
    ) -> UploadOutcome {
        let mut state = UploadState::Idle;
        let mut input = MachineInput::Start {
            content_len: data.len(),
            owner_hint: owner_hint.map(str::to_string),
        };
        let mut authorization: Option<Authorization> = None;

        loop {
            let transition = match state.advance(input) {
                Ok(transition) => transition,
                Err(err) => {
                    error!(error = %err, "upload driver produced an invalid input");
                    return fail_internal(events, err.to_string());
                }
            };
            state = transition.state;
            debug!(state = state.name(), "upload state changed");
            // Observers may re-query as soon as they see the terminal event.
            if let Effect::InvalidateOwner(owner) = &transition.effect {
                self.invalidate(owner);
            }
            // A closed receiver only means nobody is watching.
            let _ = events.send(UploadEvent::from_state(&state));

            input = match transition.effect {
                Effect::StoreContent => match self.store.put(data).await {
                    Ok(address) => {
                        info!(content_address = %address, "content stored");
                        MachineInput::ContentStored(address)
                    }
                    Err(err) => {
                        warn!(error = %err, "content store failed");
                        MachineInput::StoreFailed(err.to_string())
                    }
                },
                Effect::RequestAuthorization { preferred } => {
                    let (next, granted) = self.authorize(preferred.as_ref()).await;
                    authorization = granted;
                    next
                }
                Effect::AppendRecord(draft) => {
                    let Some(granted) = authorization.as_ref() else {
                        return fail_internal(
                            events,
                            "append requested without an authorization".to_string(),
                        );
                    };
                    match self.ledger.append(&draft, granted).await {
                        Ok(receipt) => {
                            info!(
                                record_key = %receipt.record_key,
                                tx_ref = %receipt.tx_ref,
                                "provenance record submitted"
                            );
                            MachineInput::Appended(receipt)
                        }
                        Err(err) => {
                            warn!(error = %err, "ledger rejected provenance record");
                            MachineInput::AppendRejected(err.to_string())
                        }
                    }
                }
                Effect::AwaitConfirmation(tx_ref) => {
                    match timeout(
                        self.confirmation_timeout,
                        self.ledger.await_confirmation(&tx_ref),
                    )
                    .await
                    {
                        Ok(Ok(confirmation)) => MachineInput::Confirmed(confirmation),
                        Ok(Err(err)) => {
                            warn!(%tx_ref, error = %err, "confirmation failed");
                            MachineInput::ConfirmationFailed(err.to_string())
                        }
                        Err(_) => {
                            warn!(%tx_ref, "confirmation timed out");
                            MachineInput::ConfirmationTimedOut {
                                timeout_secs: self.confirmation_timeout.as_secs(),
                            }
                        }
                    }
                }
                Effect::InvalidateOwner(_) | Effect::None => return finish(state),
            };
        }
    }

    async fn authorize(
        &self,
        preferred: Option<&OwnerId>,
    ) -> (MachineInput, Option<Authorization>) {
        let signer = match &self.signer {
            Some(signer) if signer.is_available() => signer,
            Some(_) => {
                return (
                    MachineInput::AuthorizationUnavailable(
                        "signer reports no active session".to_string(),
                    ),
                    None,
                )
            }
            None => {
                return (
                    MachineInput::AuthorizationUnavailable("no signer configured".to_string()),
                    None,
                )
            }
        };

        match signer.request_authorization(preferred).await {
            Ok(authorization) => (
                MachineInput::Authorized {
                    identity: authorization.identity,
                    created_at: (self.clock)(),
                },
                Some(authorization),
            ),
            Err(SignerError::Declined) => (MachineInput::AuthorizationDeclined, None),
            Err(SignerError::Unavailable(reason)) => {
                (MachineInput::AuthorizationUnavailable(reason), None)
            }
        }
    }

    fn invalidate(&self, owner: &OwnerId) {
        if let Some(index) = &self.index {
            index.invalidate(owner);
        }
    }
}

fn fail_internal(events: &mpsc::UnboundedSender<UploadEvent>, detail: String) -> UploadOutcome {
    let error = UploadError::Internal(detail);
    let _ = events.send(UploadEvent::from_state(&UploadState::Failed {
        error: error.clone(),
    }));
    Err(error)
}

fn finish(state: UploadState) -> UploadOutcome {
    match state {
        UploadState::Committed { record } => {
            info!(
                content_address = %record.content_address,
                owner = %record.owner,
                "upload committed"
            );
            Ok(record)
        }
        UploadState::Failed { error } => Err(error),
        other => Err(UploadError::Internal(format!(
            "run stopped in non-terminal state `{}`",
            other.name()
        ))),
    }
}
