//! Staged reveal of confusion draws.
//!
//! [`reveal`] is the pure schedule: a lazy iterator of `(offset, step)` pairs.
//! [`RevealSequencer`] puts that schedule on a [`TimerQueue`] and can take it
//! back off again.

use crate::clock::{Millis, TimerId, TimerQueue};
use crate::protocol::{tally, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealTiming {
    pub initial_delay_ms: Millis,
    pub interval_ms: Millis,
    /// Pause between the last token and the counts
    pub settle_ms: Millis,
}

impl Default for RevealTiming {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2000,
            interval_ms: 300,
            settle_ms: 500,
        }
    }
}

impl RevealTiming {
    pub fn token_offset(&self, index: usize) -> Millis {
        self.initial_delay_ms + index as Millis * self.interval_ms
    }

    pub fn completion_offset(&self, n: usize) -> Millis {
        self.initial_delay_ms + n as Millis * self.interval_ms + self.settle_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealStep {
    Token { index: usize, kind: TokenKind },
    Complete { success: u32, complication: u32 },
}

/// Lazy reveal schedule. Offsets are relative to the start of the reveal and
/// strictly follow draw order; the completion step is always last.
pub struct Reveal<'a> {
    drawn: &'a [TokenKind],
    timing: RevealTiming,
    next: usize,
    done: bool,
}

impl Iterator for Reveal<'_> {
    type Item = (Millis, RevealStep);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(kind) = self.drawn.get(self.next) {
            let index = self.next;
            self.next += 1;
            return Some((self.timing.token_offset(index), RevealStep::Token { index, kind: *kind }));
        }
        self.done = true;
        let (success, complication) = tally(self.drawn);
        Some((
            self.timing.completion_offset(self.drawn.len()),
            RevealStep::Complete { success, complication },
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = if self.done { 0 } else { self.drawn.len() - self.next + 1 };
        (left, Some(left))
    }
}

pub fn reveal(drawn: &[TokenKind], timing: RevealTiming) -> Reveal<'_> {
    Reveal { drawn, timing, next: 0, done: false }
}

/// A reveal in progress on a timer queue
#[derive(Debug, Default)]
pub struct RevealSequencer {
    timers: Vec<TimerId>,
}

impl RevealSequencer {
    /// Schedule every step relative to the queue's current time. `wrap` turns
    /// a step into the queue's payload type.
    pub fn start<T, F>(queue: &mut TimerQueue<T>, drawn: &[TokenKind], timing: RevealTiming, wrap: F) -> Self
    where
        F: Fn(RevealStep) -> T,
    {
        let timers = reveal(drawn, timing)
            .map(|(offset, step)| queue.schedule_after(offset, wrap(step)))
            .collect();
        Self { timers }
    }

    pub fn is_active<T>(&self, queue: &TimerQueue<T>) -> bool {
        self.timers.iter().any(|id| queue.is_pending(*id))
    }

    /// Drop every step that has not fired yet. Returns how many were dropped.
    pub fn cancel<T>(&mut self, queue: &mut TimerQueue<T>) -> usize {
        self.timers.drain(..).filter(|id| queue.cancel(*id)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TokenKind::{Complication as C, Success as S};

    #[test]
    fn test_schedule_for_three_tokens() {
        let steps: Vec<_> = reveal(&[S, C, S], RevealTiming::default()).collect();
        assert_eq!(
            steps,
            vec![
                (2000, RevealStep::Token { index: 0, kind: S }),
                (2300, RevealStep::Token { index: 1, kind: C }),
                (2600, RevealStep::Token { index: 2, kind: S }),
                (3400, RevealStep::Complete { success: 2, complication: 1 }),
            ]
        );
    }

    #[test]
    fn test_empty_draw_only_completes() {
        let steps: Vec<_> = reveal(&[], RevealTiming::default()).collect();
        assert_eq!(steps, vec![(2500, RevealStep::Complete { success: 0, complication: 0 })]);
    }

    #[test]
    fn test_restart_is_a_fresh_schedule() {
        let drawn = [C, C];
        let mut first = reveal(&drawn, RevealTiming::default());
        first.next();
        let again: Vec<_> = reveal(&drawn, RevealTiming::default()).collect();
        assert_eq!(again.len(), 3);
        assert_eq!(again[0].0, 2000);
        assert_eq!(first.size_hint(), (2, Some(2)));
    }

    #[test]
    fn test_sequencer_fires_in_order_on_queue() {
        let mut q: TimerQueue<RevealStep> = TimerQueue::new();
        q.advance_to(10_000);
        let seq = RevealSequencer::start(&mut q, &[S, C, S], RevealTiming::default(), |s| s);
        assert!(seq.is_active(&q));

        assert!(q.advance_to(11_999).is_empty());
        let fired = q.advance_to(12_600);
        assert_eq!(fired.iter().map(|(t, _)| *t).collect::<Vec<_>>(), vec![12_000, 12_300, 12_600]);
        let done = q.advance_to(13_400);
        assert_eq!(done, vec![(13_400, RevealStep::Complete { success: 2, complication: 1 })]);
        assert!(!seq.is_active(&q));
    }

    #[test]
    fn test_cancel_drops_pending_steps() {
        let mut q: TimerQueue<RevealStep> = TimerQueue::new();
        let mut seq = RevealSequencer::start(&mut q, &[S, S], RevealTiming::default(), |s| s);
        assert_eq!(q.advance_to(2000).len(), 1);
        assert_eq!(seq.cancel(&mut q), 2);
        assert!(q.advance_to(10_000).is_empty());
        assert!(!seq.is_active(&q));
    }
}
