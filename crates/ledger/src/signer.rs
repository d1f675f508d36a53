//! Signing identities that authorize ledger writes.

use crate::errors::SignerError;
use async_trait::async_trait;
use hashvault_types::OwnerId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Proof that an identity approved a write for this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub identity: OwnerId,
}

impl Authorization {
    pub fn new(identity: OwnerId) -> Self {
        Self { identity }
    }
}

/// Interactive signing session.
///
/// `request_authorization` may wait on a human for an unbounded time. The
/// session is borrowed per call and never held across invocations.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Whether a signing backend is present at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Ask for the caller's identity, preferring `preferred` when given.
    async fn request_authorization(
        &self,
        preferred: Option<&OwnerId>,
    ) -> Result<Authorization, SignerError>;
}

/// Signer that always approves as a fixed identity.
#[derive(Debug, Clone)]
pub struct StaticSigner {
    identity: OwnerId,
}

impl StaticSigner {
    pub fn new(identity: OwnerId) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> OwnerId {
        self.identity
    }
}

#[async_trait]
impl Signer for StaticSigner {
    async fn request_authorization(
        &self,
        _preferred: Option<&OwnerId>,
    ) -> Result<Authorization, SignerError> {
        Ok(Authorization::new(self.identity))
    }
}

/// What a [`ScriptedSigner`] does when asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerBehavior {
    Approve(OwnerId),
    Decline,
    /// Backend present but refuses to open a session.
    Unavailable(String),
    /// No backend installed; `is_available` reports false.
    Absent,
}

/// Signer driven by a preset behavior, counting how often it was asked.
#[derive(Clone)]
pub struct ScriptedSigner {
    behavior: Arc<Mutex<SignerBehavior>>,
    requests: Arc<AtomicUsize>,
}

impl ScriptedSigner {
    pub fn new(behavior: SignerBehavior) -> Self {
        Self {
            behavior: Arc::new(Mutex::new(behavior)),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn approving(identity: OwnerId) -> Self {
        Self::new(SignerBehavior::Approve(identity))
    }

    pub fn declining() -> Self {
        Self::new(SignerBehavior::Decline)
    }

    pub fn set_behavior(&self, behavior: SignerBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Number of authorization requests received so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for ScriptedSigner {
    fn is_available(&self) -> bool {
        *self.behavior.lock() != SignerBehavior::Absent
    }

    async fn request_authorization(
        &self,
        _preferred: Option<&OwnerId>,
    ) -> Result<Authorization, SignerError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.lock().clone();
        match behavior {
            SignerBehavior::Approve(identity) => Ok(Authorization::new(identity)),
            SignerBehavior::Decline => Err(SignerError::Declined),
            SignerBehavior::Unavailable(reason) => Err(SignerError::Unavailable(reason)),
            SignerBehavior::Absent => Err(SignerError::Unavailable(
                "no signer installed".to_string(),
            )),
        }
    }
}
