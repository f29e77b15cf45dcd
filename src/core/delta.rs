//! # Delta engine: cumulative counters to increase events.
//!
//! Keeps the last observed missed-block counter per producer and turns each new
//! observation into at most one [`DeltaEvent`].
//!
//! ## Transitions (per producer, `p` = stored value)
//! ```text
//! current == 0            → forget p (rotation reset)           → none
//! p absent, current > 0   → p = current                         → +current
//! current > p             → p = current                         → +(current - p)
//! current == p            → unchanged                           → none
//! current < p             → unchanged, logged as anomaly        → none
//! ```
//!
//! ## Rules
//! - A missing entry means "not seen with a nonzero counter since the last reset".
//! - Stored state never decreases except through the `0` reset.
//! - The engine is owned by one task (the scheduler), so observations for the same
//!   producer can never interleave.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::error;

use crate::chain::ProducerRecord;
use crate::events::DeltaEvent;

/// Per-producer counter state.
#[derive(Debug, Default)]
pub struct DeltaEngine {
    prev: HashMap<String, u64>,
}

impl DeltaEngine {
    /// Creates an engine with no history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one observation and returns the resulting event, if any.
    pub fn observe(&mut self, current: &ProducerRecord, at: DateTime<Utc>) -> Option<DeltaEvent> {
        let owner = current.name.as_str();
        let missed = current.missed_blocks;

        if missed == 0 {
            self.prev.remove(owner);
            return None;
        }

        let delta = match self.prev.get(owner).copied() {
            None => missed,
            Some(p) if missed > p => missed - p,
            Some(p) if missed == p => return None,
            Some(p) => {
                error!(owner, previous = p, current = missed, "missed-block counter went backwards");
                return None;
            }
        };

        self.prev.insert(owner.to_string(), missed);
        Some(DeltaEvent::new(owner, missed, delta, at))
    }

    /// Last stored counter for `owner`.
    pub fn previous(&self, owner: &str) -> Option<u64> {
        self.prev.get(owner).copied()
    }

    /// Number of producers with stored state.
    pub fn tracked(&self) -> usize {
        self.prev.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(engine: &mut DeltaEngine, owner: &str, missed: u64) -> Option<u64> {
        engine
            .observe(&ProducerRecord::new(owner, missed, true), Utc::now())
            .map(|ev| ev.delta)
    }

    #[test]
    fn test_sequence_with_reset() {
        let mut engine = DeltaEngine::new();
        let deltas: Vec<_> = [0, 5, 5, 9, 0, 3]
            .into_iter()
            .map(|m| feed(&mut engine, "alpha", m))
            .collect();
        assert_eq!(deltas, [None, Some(5), None, Some(4), None, Some(3)]);
    }

    #[test]
    fn test_unchanged_counter_is_silent() {
        let mut engine = DeltaEngine::new();
        assert_eq!(feed(&mut engine, "alpha", 7), Some(7));
        for _ in 0..5 {
            assert_eq!(feed(&mut engine, "alpha", 7), None);
        }
        assert_eq!(engine.previous("alpha"), Some(7));
    }

    #[test]
    fn test_decrease_keeps_state() {
        let mut engine = DeltaEngine::new();
        assert_eq!(feed(&mut engine, "alpha", 10), Some(10));
        assert_eq!(feed(&mut engine, "alpha", 4), None);
        assert_eq!(engine.previous("alpha"), Some(10));
        // Next round is measured against the frozen value.
        assert_eq!(feed(&mut engine, "alpha", 12), Some(2));
    }

    #[test]
    fn test_reset_makes_next_sighting_full() {
        let mut engine = DeltaEngine::new();
        feed(&mut engine, "alpha", 8);
        assert_eq!(feed(&mut engine, "alpha", 0), None);
        assert_eq!(engine.previous("alpha"), None);
        assert_eq!(feed(&mut engine, "alpha", 11), Some(11));
    }

    #[test]
    fn test_producers_are_independent() {
        let mut engine = DeltaEngine::new();
        assert_eq!(feed(&mut engine, "alpha", 2), Some(2));
        assert_eq!(feed(&mut engine, "bravo", 6), Some(6));
        assert_eq!(feed(&mut engine, "alpha", 0), None);
        assert_eq!(feed(&mut engine, "bravo", 9), Some(3));
        assert_eq!(engine.tracked(), 1);
    }

    #[test]
    fn test_event_fields() {
        let mut engine = DeltaEngine::new();
        let at = Utc::now();
        engine.observe(&ProducerRecord::new("alpha", 3, true), at);
        let ev = engine
            .observe(&ProducerRecord::new("alpha", 5, true), at)
            .unwrap();
        assert_eq!(ev, DeltaEvent::new("alpha", 5, 2, at));
    }
}
