//! Short-lived per-owner listing cache.

use crate::index::Listing;
use hashvault_types::OwnerId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Invalidation counter observed before a listing query starts.
///
/// A listing is only stored if no invalidation for its owner happened
/// between taking the generation and inserting the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    epoch: u64,
    owner: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<OwnerId, (Listing, Instant)>,
    /// Bumped per owner by `invalidate`.
    generations: HashMap<OwnerId, u64>,
    /// Bumped by `clear`.
    epoch: u64,
}

impl CacheState {
    fn generation(&self, owner: &OwnerId) -> Generation {
        Generation {
            epoch: self.epoch,
            owner: self.generations.get(owner).copied().unwrap_or(0),
        }
    }
}

/// Listings keyed by owner, each valid for `ttl` after insertion.
///
/// A zero TTL disables caching entirely.
#[derive(Debug)]
pub struct IndexCache {
    state: RwLock<CacheState>,
    ttl: Duration,
}

impl IndexCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh listing for `owner`, if any.
    pub fn get(&self, owner: &OwnerId) -> Option<Listing> {
        let state = self.state.read();
        let (listing, stored_at) = state.entries.get(owner)?;
        if stored_at.elapsed() < self.ttl {
            Some(listing.clone())
        } else {
            None
        }
    }

    /// Current invalidation generation for `owner`.
    pub fn generation(&self, owner: &OwnerId) -> Generation {
        self.state.read().generation(owner)
    }

    /// Store `listing` unless it is partial, caching is disabled, or the
    /// owner was invalidated since `seen` was taken.
    ///
    /// Returns whether the listing was cached.
    pub fn insert(&self, listing: &Listing, seen: Generation) -> bool {
        if self.ttl.is_zero() || listing.is_partial() {
            return false;
        }
        let mut state = self.state.write();
        if state.generation(&listing.owner) != seen {
            return false;
        }
        state
            .entries
            .insert(listing.owner, (listing.clone(), Instant::now()));
        true
    }

    /// Drop the owner's entry and reject in-flight listings started before.
    pub fn invalidate(&self, owner: &OwnerId) -> bool {
        let mut state = self.state.write();
        *state.generations.entry(*owner).or_insert(0) += 1;
        state.entries.remove(owner).is_some()
    }

    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.epoch += 1;
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.state
            .write()
            .entries
            .retain(|_, (_, stored_at)| stored_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}
