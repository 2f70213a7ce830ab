//! In-memory history of emitted signals
//!
//! The collaborator-owned store that finalized values are pushed into.
//! Bounded history with newest-first reads, plus an active-actor count over
//! a trailing window for the "who else is signalling" display. Failures
//! anywhere downstream of this store never feed back into burst state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use crate::tap::aggregator::BurstOutcome;

/// Maximum number of records kept in history
const MAX_HISTORY_SIZE: usize = 500;

/// Trailing window for the active-actor count, in minutes
pub const ACTIVE_ACTOR_WINDOW_MINUTES: i64 = 5;

/// Trailing window for the active-actor count
pub fn active_actor_window() -> Duration {
    Duration::minutes(ACTIVE_ACTOR_WINDOW_MINUTES)
}

/// One emitted signal: value, originating actor, and when it was finalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    /// Emitted value, 1-5
    pub value: u8,
    /// Opaque id of the actor that produced the signal
    pub actor_id: String,
    /// Finalization time
    pub timestamp: DateTime<Utc>,
}

/// Bounded signal history
#[derive(Debug)]
pub struct SignalStore {
    /// Records, oldest first; newest are popped off the back for reads
    history: VecDeque<SignalRecord>,
    /// History cap
    max_size: usize,
    /// Signals recorded since creation or the last clear
    total_recorded: u64,
    /// Of those, how many came from clamped bursts
    total_clamped: u64,
}

impl SignalStore {
    /// Create an empty store with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_SIZE)
    }

    /// Create an empty store holding at most `max_size` records
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(max_size),
            max_size,
            total_recorded: 0,
            total_clamped: 0,
        }
    }

    /// Append a record, evicting the oldest when at capacity.
    pub fn record(&mut self, record: SignalRecord) {
        if self.history.len() >= self.max_size {
            self.history.pop_front();
        }
        self.history.push_back(record);
        self.total_recorded += 1;
    }

    /// Record a finalized burst from the given actor, stamped now.
    ///
    /// Returns the stored record so callers can broadcast it onward.
    pub fn record_outcome(&mut self, outcome: &BurstOutcome, actor_id: &str) -> SignalRecord {
        let record = SignalRecord {
            value: outcome.value,
            actor_id: actor_id.to_string(),
            timestamp: Utc::now(),
        };
        if outcome.clamped {
            self.total_clamped += 1;
        }
        self.record(record.clone());
        record
    }

    /// The newest `n` records, newest first.
    pub fn recent(&self, n: usize) -> Vec<SignalRecord> {
        self.history.iter().rev().take(n).cloned().collect()
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// True when no records are held
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Signals recorded since creation or the last clear
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Recorded signals that came from clamped bursts
    pub fn total_clamped(&self) -> u64 {
        self.total_clamped
    }

    /// Distinct actor ids seen within the trailing `window`.
    pub fn active_actors(&self, window: Duration) -> usize {
        let cutoff = Utc::now() - window;
        let actors: HashSet<&str> = self
            .history
            .iter()
            .filter(|r| r.timestamp > cutoff)
            .map(|r| r.actor_id.as_str())
            .collect();
        actors.len()
    }

    /// Drop all history and reset totals.
    pub fn clear(&mut self) {
        self.history.clear();
        self.total_recorded = 0;
        self.total_clamped = 0;
    }
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: u8, actor: &str) -> SignalRecord {
        SignalRecord {
            value,
            actor_id: actor.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_store_creation() {
        let store = SignalStore::new();
        assert!(store.is_empty());
        assert_eq!(store.total_recorded(), 0);
    }

    #[test]
    fn test_record_and_recent_order() {
        let mut store = SignalStore::new();
        store.record(record(1, "a"));
        store.record(record(2, "a"));
        store.record(record(3, "b"));

        let recent = store.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].value, 3, "recent() is newest first");
        assert_eq!(recent[1].value, 2);
        assert_eq!(store.total_recorded(), 3);
    }

    #[test]
    fn test_history_limit() {
        let mut store = SignalStore::with_capacity(10);
        for i in 0..25 {
            store.record(record((i % 5 + 1) as u8, "a"));
        }
        assert_eq!(store.len(), 10);
        // Totals keep counting past eviction
        assert_eq!(store.total_recorded(), 25);
    }

    #[test]
    fn test_record_outcome_tracks_clamped() {
        let mut store = SignalStore::new();
        let plain = BurstOutcome {
            value: 3,
            raw_count: 3,
            clamped: false,
        };
        let clamped = BurstOutcome {
            value: 5,
            raw_count: 9,
            clamped: true,
        };

        let stored = store.record_outcome(&plain, "actor1");
        assert_eq!(stored.value, 3);
        assert_eq!(stored.actor_id, "actor1");
        store.record_outcome(&clamped, "actor1");

        assert_eq!(store.total_recorded(), 2);
        assert_eq!(store.total_clamped(), 1);
    }

    #[test]
    fn test_active_actors_window() {
        let mut store = SignalStore::new();
        store.record(record(1, "alice"));
        store.record(record(2, "bob"));
        store.record(record(3, "alice"));

        // A record well outside the window is not counted
        store.record(SignalRecord {
            value: 4,
            actor_id: "carol".to_string(),
            timestamp: Utc::now() - Duration::minutes(10),
        });

        assert_eq!(store.active_actors(active_actor_window()), 2);
    }

    #[test]
    fn test_clear() {
        let mut store = SignalStore::new();
        store.record(record(5, "a"));
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.total_recorded(), 0);
        assert_eq!(store.total_clamped(), 0);
    }
}
