//! Virtual-time timer queue.
//!
//! Deadlines are plain milliseconds on a clock the owner advances. The binary
//! maps wall time onto it; tests fast-forward it. Ordering is earliest deadline
//! first, FIFO among equal deadlines.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Milliseconds on the session clock
pub type Millis = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct Scheduled<T> {
    at: Millis,
    seq: u64,
    payload: T,
}

impl<T> PartialEq for Scheduled<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<T> Eq for Scheduled<T> {}

impl<T> PartialOrd for Scheduled<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Scheduled<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest first)
        match other.at.cmp(&self.at) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

pub struct TimerQueue<T> {
    now: Millis,
    queue: BinaryHeap<Scheduled<T>>,
    live: HashSet<u64>,
    seq_counter: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            now: 0,
            queue: BinaryHeap::new(),
            live: HashSet::new(),
            seq_counter: 0,
        }
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    /// Schedule at an absolute time. Times in the past fire on the next advance.
    pub fn schedule_at(&mut self, at: Millis, payload: T) -> TimerId {
        self.seq_counter += 1;
        let seq = self.seq_counter;
        self.live.insert(seq);
        self.queue.push(Scheduled { at, seq, payload });
        TimerId(seq)
    }

    pub fn schedule_after(&mut self, delay: Millis, payload: T) -> TimerId {
        self.schedule_at(self.now.saturating_add(delay), payload)
    }

    /// Returns false if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.live.remove(&id.0)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.live.contains(&id.0)
    }

    pub fn next_deadline(&mut self) -> Option<Millis> {
        self.discard_cancelled();
        self.queue.peek().map(|s| s.at)
    }

    /// Number of live timers
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Move the clock forward and pop every timer that is due, in order.
    /// The clock never moves backwards.
    pub fn advance_to(&mut self, t: Millis) -> Vec<(Millis, T)> {
        self.now = self.now.max(t);
        let mut fired = Vec::new();
        loop {
            self.discard_cancelled();
            match self.queue.peek() {
                Some(s) if s.at <= self.now => {}
                _ => break,
            }
            if let Some(s) = self.queue.pop() {
                self.live.remove(&s.seq);
                fired.push((s.at, s.payload));
            }
        }
        fired
    }

    pub fn advance_by(&mut self, delta: Millis) -> Vec<(Millis, T)> {
        let target = self.now.saturating_add(delta);
        self.advance_to(target)
    }

    fn discard_cancelled(&mut self) {
        while let Some(s) = self.queue.peek() {
            if self.live.contains(&s.seq) {
                break;
            }
            self.queue.pop();
        }
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
