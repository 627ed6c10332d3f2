//! Bounded draw history, newest first.

use std::collections::VecDeque;

use crate::protocol::HistoryEntry;

#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
    cap: usize,
}

impl HistoryLog {
    pub fn new(cap: usize) -> Self {
        Self { entries: VecDeque::new(), cap: cap.max(1) }
    }

    /// Replace with the room's history as sent on join (newest first)
    pub fn preload(&mut self, newest_first: Vec<HistoryEntry>) {
        self.entries = newest_first.into_iter().take(self.cap).collect();
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.cap);
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
