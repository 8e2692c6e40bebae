//! Process-local in-flight call counters

use std::collections::HashMap;

use dashmap::DashMap;

/// Shared, concurrency-safe view of per-agent in-flight calls plus the
/// per-campaign round-robin cursors.
///
/// `decrement` is clamped at zero: a stray double-decrement must never wrap
/// a counter into a huge value that blocks an agent forever.
#[derive(Debug, Default)]
pub struct LoadTracker {
    active_calls: DashMap<String, u32>,
    round_robin_cursors: DashMap<String, usize>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, agent_id: &str) {
        *self.active_calls.entry(agent_id.to_string()).or_insert(0) += 1;
    }

    pub fn decrement(&self, agent_id: &str) {
        if let Some(mut count) = self.active_calls.get_mut(agent_id) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn active_calls(&self, agent_id: &str) -> u32 {
        self.active_calls.get(agent_id).map(|c| *c).unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<String, u32> {
        self.active_calls
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Fetch the campaign's cursor and advance it.
    pub fn next_round_robin(&self, campaign_id: &str) -> usize {
        let mut cursor = self.round_robin_cursors.entry(campaign_id.to_string()).or_insert(0);
        let current = *cursor;
        *cursor = cursor.wrapping_add(1);
        current
    }

    /// Test fixture support: forget all counters and cursors.
    pub fn reset(&self) {
        self.active_calls.clear();
        self.round_robin_cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_track_and_clamp() {
        let tracker = LoadTracker::new();
        assert_eq!(tracker.active_calls("a1"), 0);

        tracker.increment("a1");
        tracker.increment("a1");
        assert_eq!(tracker.active_calls("a1"), 2);

        tracker.decrement("a1");
        tracker.decrement("a1");
        tracker.decrement("a1"); // extra decrement clamps, never wraps
        assert_eq!(tracker.active_calls("a1"), 0);
    }

    #[test]
    fn round_robin_cursor_advances_per_campaign() {
        let tracker = LoadTracker::new();
        assert_eq!(tracker.next_round_robin("c1"), 0);
        assert_eq!(tracker.next_round_robin("c1"), 1);
        assert_eq!(tracker.next_round_robin("c2"), 0);
        assert_eq!(tracker.next_round_robin("c1"), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let tracker = LoadTracker::new();
        tracker.increment("a1");
        tracker.next_round_robin("c1");
        tracker.reset();
        assert_eq!(tracker.active_calls("a1"), 0);
        assert_eq!(tracker.next_round_robin("c1"), 0);
    }

    #[test]
    fn concurrent_updates_are_safe() {
        use std::sync::Arc;
        let tracker = Arc::new(LoadTracker::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let t = tracker.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    t.increment("shared");
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tracker.active_calls("shared"), 8000);
    }
}
