#![forbid(unsafe_code)]

//! Virtual-time timers.
//!
//! Time only moves when [`Scheduler::advance`] is called, which makes
//! simulated latency deterministic in tests and in the demo.
//!
//! # Invariants
//!
//! 1. At most one pending timer per `(owner, key)`: scheduling again
//!    replaces the pending timer instead of queueing a second one.
//! 2. Timers fire in `(due, scheduling order)` order, each with the clock
//!    set to its due time.
//! 3. A cancelled timer never fires. Callbacks run with no scheduler borrow
//!    held, so they may schedule or cancel timers.

use std::cell::{Cell, RefCell};
use std::fmt;

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

struct Timer {
    id: TimerId,
    owner: u64,
    key: String,
    due: u64,
    callback: Box<dyn FnOnce()>,
}

#[derive(Default)]
pub struct Scheduler {
    now: Cell<u64>,
    next_id: Cell<u64>,
    timers: RefCell<Vec<Timer>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now.get())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }

    #[must_use]
    pub fn pending_for(&self, owner: u64) -> usize {
        self.timers.borrow().iter().filter(|t| t.owner == owner).count()
    }

    #[must_use]
    pub fn is_pending(&self, owner: u64, key: &str) -> bool {
        self.timers
            .borrow()
            .iter()
            .any(|t| t.owner == owner && t.key == key)
    }

    /// Run `callback` after `delay_ms`, replacing any pending `(owner, key)` timer.
    pub fn schedule(
        &self,
        owner: u64,
        key: &str,
        delay_ms: u64,
        callback: impl FnOnce() + 'static,
    ) -> TimerId {
        let id = TimerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let due = self.now().saturating_add(delay_ms);
        let mut timers = self.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|t| !(t.owner == owner && t.key == key));
        if timers.len() != before {
            tracing::debug!(message = "scheduler.replaced", owner, key);
        }
        timers.push(Timer {
            id,
            owner,
            key: key.to_owned(),
            due,
            callback: Box::new(callback),
        });
        tracing::trace!(message = "scheduler.scheduled", owner, key, due);
        id
    }

    pub fn cancel(&self, id: TimerId) -> bool {
        let mut timers = self.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|t| t.id != id);
        before != timers.len()
    }

    /// Cancel every timer of `owner`; returns how many were pending.
    pub fn cancel_owned(&self, owner: u64) -> usize {
        let mut timers = self.timers.borrow_mut();
        let before = timers.len();
        timers.retain(|t| t.owner != owner);
        let cancelled = before - timers.len();
        if cancelled > 0 {
            tracing::debug!(message = "scheduler.cancelled", owner, cancelled);
        }
        cancelled
    }

    fn take_next_due(&self, until: u64) -> Option<Timer> {
        let mut timers = self.timers.borrow_mut();
        let index = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= until)
            .min_by_key(|(_, t)| (t.due, t.id))
            .map(|(i, _)| i)?;
        Some(timers.remove(index))
    }

    /// Move the clock forward, firing due timers in order. Returns how many fired.
    pub fn advance(&self, ms: u64) -> usize {
        let until = self.now().saturating_add(ms);
        let mut fired = 0;
        while let Some(timer) = self.take_next_due(until) {
            self.now.set(timer.due.max(self.now()));
            tracing::trace!(message = "scheduler.fire", owner = timer.owner, key = %timer.key);
            (timer.callback)();
            fired += 1;
        }
        self.now.set(until);
        fired
    }
}
