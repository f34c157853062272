// SPDX-License-Identifier: GPL-3.0-only

//! Time-windowed majority vote over raw detections
//!
//! Recognizers report a value per frame, and neighbouring frames disagree:
//! a partial read, a misread character, a second code at the edge of the
//! preview. The stabilizer keeps every raw value that arrived within the
//! window and, on each tick, exposes the most frequent one.
//!
//! # Tick semantics
//!
//! With self-refresh enabled (the default), a tick
//!
//! 1. votes over every entry currently held,
//! 2. evicts entries older than the window,
//! 3. re-inserts the winner stamped with the tick time.
//!
//! Step 3 keeps a value that keeps winning alive indefinitely, which makes
//! the output sticky toward the last stable value. Two readings that
//! alternate at similar rates then do not make the output flicker.
//!
//! With self-refresh disabled the tick evicts first, votes over what is
//! left, and re-inserts nothing, so the stable value disappears one window
//! after the last matching detection.
//!
//! # Ties
//!
//! Equal counts go to the value seen first in insertion order.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

use crate::constants::DEFAULT_WINDOW;

/// Stabilizer tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizerSettings {
    /// Entries older than this are evicted on tick
    pub window: Duration,
    /// Re-insert the winning value on every tick
    pub self_refresh: bool,
}

impl Default for StabilizerSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            self_refresh: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct WindowEntry {
    value: String,
    timestamp_ms: u64,
}

#[derive(Debug, Default)]
struct WindowState {
    /// Timestamps are non-decreasing from front to back
    entries: VecDeque<WindowEntry>,
    stable: Option<String>,
}

impl WindowState {
    fn push(&mut self, value: String, timestamp_ms: u64) {
        // Concurrent callers may stamp slightly out of order
        let floor = self.entries.back().map_or(0, |e| e.timestamp_ms);
        self.entries.push_back(WindowEntry {
            value,
            timestamp_ms: timestamp_ms.max(floor),
        });
    }

    fn evict(&mut self, now_ms: u64, window_ms: u64) -> usize {
        let mut evicted = 0;
        while self
            .entries
            .front()
            .is_some_and(|e| now_ms.saturating_sub(e.timestamp_ms) > window_ms)
        {
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Most frequent value; ties go to the earliest first occurrence
    fn majority(&self) -> Option<String> {
        let mut first_seen: Vec<(&str, usize)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for entry in &self.entries {
            let slot = *index.entry(entry.value.as_str()).or_insert_with(|| {
                first_seen.push((entry.value.as_str(), 0));
                first_seen.len() - 1
            });
            first_seen[slot].1 += 1;
        }

        let mut best: Option<(&str, usize)> = None;
        for (value, count) in first_seen {
            if best.is_none_or(|(_, best_count)| count > best_count) {
                best = Some((value, count));
            }
        }
        best.map(|(value, _)| value.to_string())
    }
}

/// Debounces a stream of raw detections into one stable value
///
/// Safe to share between the recognition worker, the tick scheduler and the
/// presentation layer. Every operation takes the internal lock once and
/// holds it only for its own read-modify-write sequence.
#[derive(Debug)]
pub struct DetectionStabilizer {
    state: Mutex<WindowState>,
    settings: StabilizerSettings,
}

impl Default for DetectionStabilizer {
    fn default() -> Self {
        Self::with_settings(StabilizerSettings::default())
    }
}

impl DetectionStabilizer {
    pub fn new(window: Duration) -> Self {
        Self::with_settings(StabilizerSettings {
            window,
            ..Default::default()
        })
    }

    pub fn with_settings(settings: StabilizerSettings) -> Self {
        Self {
            state: Mutex::new(WindowState::default()),
            settings,
        }
    }

    pub fn settings(&self) -> StabilizerSettings {
        self.settings
    }

    fn window_ms(&self) -> u64 {
        self.settings.window.as_millis() as u64
    }

    fn lock(&self) -> MutexGuard<'_, WindowState> {
        // A panic elsewhere must not take the stabilizer down with it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a raw detection
    ///
    /// A timestamp earlier than the newest held entry is raised to that
    /// entry's timestamp, so a late-stamped detection ages from the newer
    /// stamp rather than its own.
    pub fn insert(&self, value: impl Into<String>, timestamp_ms: u64) {
        let value = value.into();
        trace!(value = %value, timestamp_ms, "Stabilizer insert");
        self.lock().push(value, timestamp_ms);
    }

    /// Vote, evict and (optionally) refresh the winner
    ///
    /// Returns the new stable value, or `None` if nothing was held.
    pub fn tick(&self, now_ms: u64) -> Option<String> {
        let window_ms = self.window_ms();
        let mut state = self.lock();

        let (winner, evicted) = if self.settings.self_refresh {
            let winner = state.majority();
            let evicted = state.evict(now_ms, window_ms);
            if let Some(value) = &winner {
                state.push(value.clone(), now_ms);
            }
            (winner, evicted)
        } else {
            let evicted = state.evict(now_ms, window_ms);
            (state.majority(), evicted)
        };

        if state.stable != winner {
            debug!(
                previous = ?state.stable,
                current = ?winner,
                held = state.entries.len(),
                evicted,
                "Stable value changed"
            );
        }
        state.stable = winner.clone();
        winner
    }

    /// Drop every entry and the stable value
    pub fn reset(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.stable = None;
        debug!("Stabilizer reset");
    }

    /// Result of the most recent tick
    pub fn stable_value(&self) -> Option<String> {
        self.lock().stable.clone()
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stabilizer() -> DetectionStabilizer {
        DetectionStabilizer::new(Duration::from_millis(1000))
    }

    #[test]
    fn test_majority_wins() {
        let s = stabilizer();
        s.insert("A", 0);
        s.insert("B", 100);
        s.insert("B", 200);
        s.insert("A", 300);
        s.insert("B", 400);
        assert_eq!(s.tick(500).as_deref(), Some("B"));
        assert_eq!(s.stable_value().as_deref(), Some("B"));
    }

    #[test]
    fn test_tie_goes_to_first_seen() {
        let s = stabilizer();
        s.insert("X", 0);
        s.insert("Y", 10);
        s.insert("Y", 20);
        s.insert("X", 30);
        assert_eq!(s.tick(100).as_deref(), Some("X"));

        let s = stabilizer();
        s.insert("Y", 0);
        s.insert("X", 10);
        assert_eq!(s.tick(100).as_deref(), Some("Y"));
    }

    #[test]
    fn test_empty_tick() {
        let s = stabilizer();
        assert_eq!(s.tick(12_345), None);
        assert!(s.is_empty());
    }

    #[test]
    fn test_eviction_boundary() {
        let s = stabilizer();
        s.insert("A", 0);
        s.insert("B", 1);
        s.tick(1001);
        // "A" is 1001 ms old and gone, "B" is exactly 1000 ms old and kept,
        // plus the refreshed winner
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_winner_refreshed_at_tick_time() {
        let s = stabilizer();
        s.insert("A", 0);
        assert_eq!(s.tick(5000).as_deref(), Some("A"));
        assert_eq!(s.len(), 1);
        assert_eq!(s.tick(10_000).as_deref(), Some("A"));
    }

    #[test]
    fn test_without_self_refresh_value_ages_out() {
        let s = DetectionStabilizer::with_settings(StabilizerSettings {
            window: Duration::from_millis(1000),
            self_refresh: false,
        });
        s.insert("A", 0);
        assert_eq!(s.tick(500).as_deref(), Some("A"));
        assert_eq!(s.tick(1500), None);
        assert!(s.is_empty());
    }

    #[test]
    fn test_out_of_order_timestamp_clamped() {
        let s = stabilizer();
        s.insert("A", 500);
        s.insert("B", 400);
        // "B" is 1050 ms old by its own stamp but held as if stamped at 500
        s.tick(1450);
        assert_eq!(s.len(), 3);
        // Both entries stamped 500 go; the refreshed winner from 1450 stays
        assert_eq!(s.tick(1501).as_deref(), Some("A"));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_reset() {
        let s = stabilizer();
        s.insert("A", 0);
        s.tick(10);
        s.reset();
        assert!(s.is_empty());
        assert_eq!(s.stable_value(), None);
        assert_eq!(s.tick(20), None);
    }
}
