// src/watch/debounce.rs

//! Quiet-period buffering for bursty notifications.
//!
//! A [`Debouncer`] is an explicit three-state machine:
//!
//! - `Idle`: nothing pending, no deadline.
//! - `Armed`: items pending, fires once the deadline passes.
//! - `Fired`: the deadline passed but the batch has not been taken yet.
//!
//! Pushing always moves to `Armed` with a fresh deadline, which also absorbs a
//! fired-but-unconsumed signal. So a re-arm never double-fires, and items
//! are never lost: they stay in the buffer until the next fire.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Armed(Instant),
    Fired,
}

#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Vec<T>,
    state: DebounceState,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Vec::new(),
            state: DebounceState::Idle,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Buffer `item` and (re)arm the deadline at `now + delay`.
    pub fn push(&mut self, item: T, now: Instant) {
        self.pending.push(item);
        self.state = DebounceState::Armed(now + self.delay);
    }

    /// The instant the caller should wake up at, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Armed(deadline) => Some(deadline),
            DebounceState::Idle | DebounceState::Fired => None,
        }
    }

    /// Move `Armed` to `Fired` once `now` has reached the deadline.
    ///
    /// Returns true if this call performed the transition.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Armed(deadline) if now >= deadline => {
                self.state = DebounceState::Fired;
                true
            }
            _ => false,
        }
    }

    /// Consume the batch of a fired debouncer and return to `Idle`.
    ///
    /// Returns an empty batch when the debouncer has not fired.
    pub fn take(&mut self) -> Vec<T> {
        if self.state != DebounceState::Fired {
            return Vec::new();
        }
        self.state = DebounceState::Idle;
        std::mem::take(&mut self.pending)
    }

    /// Drop everything and go back to `Idle`.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.state = DebounceState::Idle;
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(100);

    #[test]
    fn push_arms_and_rearms() {
        let start = Instant::now();
        let mut d = Debouncer::new(DELAY);
        assert_eq!(d.deadline(), None);

        d.push(1, start);
        assert_eq!(d.deadline(), Some(start + DELAY));

        let later = start + Duration::from_millis(40);
        d.push(2, later);
        assert_eq!(d.deadline(), Some(later + DELAY));
        assert_eq!(d.pending_len(), 2);
    }

    #[test]
    fn does_not_fire_before_deadline() {
        let start = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.push("a", start);

        assert!(!d.fire(start + Duration::from_millis(99)));
        assert!(d.take().is_empty());
        assert_eq!(d.pending_len(), 1);
    }

    #[test]
    fn fire_then_take_yields_whole_batch_once() {
        let start = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.push("a", start);
        d.push("b", start);

        assert!(d.fire(start + DELAY));
        assert!(!d.fire(start + DELAY * 2), "second fire must be a no-op");
        assert_eq!(d.take(), vec!["a", "b"]);
        assert_eq!(d.state(), DebounceState::Idle);
        assert!(d.take().is_empty());
    }

    #[test]
    fn push_after_unconsumed_fire_keeps_items_and_rearms() {
        let start = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.push("a", start);
        assert!(d.fire(start + DELAY));

        let later = start + DELAY + Duration::from_millis(5);
        d.push("b", later);
        assert_eq!(d.state(), DebounceState::Armed(later + DELAY));
        assert!(d.take().is_empty(), "re-armed debouncer must not hand out a batch");

        assert!(d.fire(later + DELAY));
        assert_eq!(d.take(), vec!["a", "b"]);
    }

    #[test]
    fn reset_discards_pending() {
        let mut d = Debouncer::new(DELAY);
        d.push(1, Instant::now());
        d.reset();
        assert_eq!(d.state(), DebounceState::Idle);
        assert_eq!(d.pending_len(), 0);
    }
}
