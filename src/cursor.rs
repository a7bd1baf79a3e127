//! Shuffled round-robin navigation through a topic's questions
//!
//! A cursor walks a random permutation of `[0, count)` so that every
//! question is visited once before any repeats. The pending queue always
//! holds the rest of the permutation with the current position at its tail,
//! which makes stepping backwards the exact inverse of stepping forwards.

use std::collections::VecDeque;

/// A random-walk index generator with back/forward history
#[derive(Debug, Clone)]
pub struct NavigationCursor {
    /// Position currently shown
    current: usize,
    /// Upcoming positions; empty, or a permutation of all positions with
    /// `current` at the tail
    pending: VecDeque<usize>,
    /// Number of positions
    count: usize,
    rng: fastrand::Rng,
}

impl NavigationCursor {
    /// Creates a cursor over `count` positions starting at a random one
    pub fn new(count: usize) -> Self {
        Self::with_rng(count, fastrand::Rng::new())
    }

    /// Creates a cursor driven by a specific random number generator
    pub fn with_rng(count: usize, mut rng: fastrand::Rng) -> Self {
        let current = if count == 0 { 0 } else { rng.usize(..count) };
        Self {
            current,
            pending: VecDeque::new(),
            count,
            rng,
        }
    }

    /// The position currently shown, or `None` if there is nothing to show
    pub fn current(&self) -> Option<usize> {
        (self.current < self.count).then_some(self.current)
    }

    /// Number of positions
    pub fn count(&self) -> usize {
        self.count
    }

    /// Moves to the next position of the permutation
    pub fn go_next(&mut self) {
        if self.count <= 1 {
            return;
        }
        self.refill_if_empty();
        if let Some(next) = self.pending.pop_front() {
            self.pending.push_back(next);
            self.current = next;
        }
    }

    /// Moves back to the previous position of the permutation
    pub fn go_previous(&mut self) {
        if self.count <= 1 {
            return;
        }
        self.refill_if_empty();
        if let Some(last) = self.pending.pop_back() {
            self.pending.push_front(last);
        }
        if let Some(&previous) = self.pending.back() {
            self.current = previous;
        }
    }

    fn refill_if_empty(&mut self) {
        if !self.pending.is_empty() {
            return;
        }
        let mut order: Vec<usize> = (0..self.count).filter(|i| *i != self.current).collect();
        self.rng.shuffle(&mut order);
        order.push(self.current);
        self.pending = order.into();
    }
}
