// MORAT RECENCY CACHE
// BOUNDED SUBJECT -> LAST-ACTION TABLE. PRE-ALLOCATED, LINEAR SCAN.
//
// ENTRIES ARE PERMANENT. ONCE THE TABLE IS FULL, NEW SUBJECTS ARE ALLOWED
// BUT NOT TRACKED, SO THEY CAN BE ACTED ON EVERY CYCLE. NO EVICTION, NO LRU.

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecencyEntry<K> {
    pub subject: K,
    pub last_action: Instant,
}

pub struct RecencyCache<K> {
    entries: Vec<RecencyEntry<K>>,
    capacity: usize,
}

impl<K: PartialEq + Copy> RecencyCache<K> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    // TRUE = ON COOLDOWN, SUPPRESS THE ACTION.
    // FALSE = ALLOW. STAMPS `now` WHEN THE SUBJECT IS (OR BECOMES) TRACKED.
    pub fn check_and_mark(&mut self, subject: K, now: Instant, cooldown: Duration) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.subject == subject) {
            if now.saturating_duration_since(entry.last_action) < cooldown {
                return true;
            }
            entry.last_action = now;
            return false;
        }

        if self.entries.len() < self.capacity {
            self.entries.push(RecencyEntry {
                subject,
                last_action: now,
            });
        }
        false
    }

    pub fn last_action(&self, subject: K) -> Option<Instant> {
        self.entries
            .iter()
            .find(|e| e.subject == subject)
            .map(|e| e.last_action)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
