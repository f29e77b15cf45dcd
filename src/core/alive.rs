//! # Tracker of supervised tasks that have not finished yet.
//!
//! ```text
//! Supervisor::spawn ──► mark_started(name)
//! task future ends  ──► mark_stopped(name)
//! grace exceeded    ──► snapshot() = stuck task names
//! ```

use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Thread-safe set of running task names.
///
/// Names are counted, so two tasks sharing a name are tracked independently.
#[derive(Default)]
pub struct AliveTracker {
    state: RwLock<BTreeMap<String, usize>>,
}

impl AliveTracker {
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a task as running.
    pub async fn mark_started(&self, name: &str) {
        *self.state.write().await.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Records a task as finished.
    pub async fn mark_stopped(&self, name: &str) {
        let mut state = self.state.write().await;
        if let Some(n) = state.get_mut(name) {
            *n -= 1;
            if *n == 0 {
                state.remove(name);
            }
        }
    }

    /// Returns the sorted names of tasks still running.
    pub async fn snapshot(&self) -> Vec<String> {
        self.state.read().await.keys().cloned().collect()
    }

    /// Returns true if a task with this name is running.
    pub async fn is_alive(&self, name: &str) -> bool {
        self.state.read().await.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_stop_snapshot() {
        let alive = AliveTracker::new();
        alive.mark_started("scheduler").await;
        alive.mark_started("chat-poster").await;
        alive.mark_started("chat-poster").await;
        assert_eq!(alive.snapshot().await, ["chat-poster", "scheduler"]);

        alive.mark_stopped("chat-poster").await;
        assert!(alive.is_alive("chat-poster").await);
        alive.mark_stopped("chat-poster").await;
        alive.mark_stopped("scheduler").await;
        assert!(alive.snapshot().await.is_empty());

        // Unknown names are ignored.
        alive.mark_stopped("ghost").await;
        assert!(!alive.is_alive("ghost").await);
    }
}
