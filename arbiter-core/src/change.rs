//! Change tracking tokens
//!
//! A tracker is a (owner, counter) pair. Consumers store the token they
//! last saw and compare it against the live one before doing any expensive
//! recompute: a different owner means the tracked structure was rebuilt
//! wholesale, a higher counter under the same owner means it only
//! progressed in place.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide owner id allocator
static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

/// What a token comparison revealed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Change {
    /// Nothing happened since the stored token
    Unchanged,
    /// Same structure, new progress; a cheap refresh suffices
    Incremental,
    /// The structure was rebuilt; a full re-scan is required
    Structural,
}

/// Snapshot of a tracker's state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChangeToken {
    owner: u64,
    counter: u64,
}

impl ChangeToken {
    /// Token that compares as Structural against any live tracker,
    /// forcing a first full scan
    pub fn unseen() -> Self {
        Self {
            owner: 0,
            counter: 0,
        }
    }
}

/// Owner side of the token pair
#[derive(Debug)]
pub struct ChangeTracker {
    owner: u64,
    counter: u64,
}

impl ChangeTracker {
    /// Tracker with a fresh process-unique owner id
    pub fn new() -> Self {
        Self {
            owner: NEXT_OWNER.fetch_add(1, Ordering::Relaxed),
            counter: 0,
        }
    }

    /// Record one unit of progress
    pub fn bump(&mut self) {
        self.counter += 1;
    }

    /// Current token for consumers to store
    pub fn token(&self) -> ChangeToken {
        ChangeToken {
            owner: self.owner,
            counter: self.counter,
        }
    }

    /// Compare a stored token against the live state
    pub fn check(&self, stored: ChangeToken) -> Change {
        if stored.owner != self.owner {
            Change::Structural
        } else if stored.counter < self.counter {
            Change::Incremental
        } else {
            Change::Unchanged
        }
    }
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_token_is_structural() {
        let tracker = ChangeTracker::new();
        assert_eq!(tracker.check(ChangeToken::unseen()), Change::Structural);
    }

    #[test]
    fn test_same_token_is_unchanged() {
        let tracker = ChangeTracker::new();
        let token = tracker.token();
        assert_eq!(tracker.check(token), Change::Unchanged);
    }

    #[test]
    fn test_bump_is_incremental() {
        let mut tracker = ChangeTracker::new();
        let token = tracker.token();
        tracker.bump();
        assert_eq!(tracker.check(token), Change::Incremental);
        // Catching up returns to Unchanged
        assert_eq!(tracker.check(tracker.token()), Change::Unchanged);
    }

    #[test]
    fn test_rebuild_is_structural() {
        let old = ChangeTracker::new();
        let token = old.token();
        let rebuilt = ChangeTracker::new();
        assert_eq!(rebuilt.check(token), Change::Structural);
    }

    #[test]
    fn test_owner_ids_unique() {
        let a = ChangeTracker::new();
        let b = ChangeTracker::new();
        assert_ne!(a.token(), b.token());
    }
}
