#![forbid(unsafe_code)]

//! The observable application state store.
//!
//! [`Store`] holds the single [`AppState`] shared by every mounted unit.
//! State is replaced, never mutated in place: each effective update swaps in
//! a new `Rc<AppState>`, so a snapshot taken earlier never changes.
//!
//! # Architecture
//!
//! `Store` is a cheap-to-clone handle over `Rc` storage for single-threaded
//! use. Subscribers are held as `Weak` callbacks; the strong reference lives
//! in the [`Subscription`] guard returned by [`Store::subscribe`].
//!
//! # Invariants
//!
//! 1. Subscribers are notified synchronously, in registration order.
//! 2. Each fan-out iterates the subscriber list as it was when the fan-out
//!    started: a subscriber added during a fan-out is not called for it.
//! 3. Dispatch is queued. A `set_state` issued while a fan-out is running is
//!    enqueued and applied, with its own complete fan-out, after the current
//!    one finishes. A subscriber therefore never sees a change whose `new`
//!    differs from [`Store::snapshot`] at the time of the call.
//! 4. A patch that changes nothing is a no-op: no version bump, no fan-out.
//! 5. `version` increases by exactly one per effective update.
//!
//! # Failure Modes
//!
//! - **Subscription dropped mid-fan-out**: its callback is not invoked for
//!   the remainder of that fan-out.
//! - **Subscriber panics**: the dispatch guard resets, so later `set_state`
//!   calls still dispatch. Queued patches from the interrupted cycle are
//!   applied by the next call.
//! - **Store torn down**: further updates are ignored and logged.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use leanview_core::LeanLevel;
use serde::Serialize;

/// Default primary brand colour.
pub const DEFAULT_BRAND_PRIMARY: &str = "#1d4ed8";
/// Default secondary brand colour.
pub const DEFAULT_BRAND_SECONDARY: &str = "#b91c1c";

bitflags! {
    /// Which [`AppState`] fields an update changed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Changed: u8 {
        const LEAN_LEVEL = 1 << 0;
        const TOPIC = 1 << 1;
        const BRAND_PRIMARY = 1 << 2;
        const BRAND_SECONDARY = 1 << 3;
        const BRAND = Self::BRAND_PRIMARY.bits() | Self::BRAND_SECONDARY.bits();
    }
}

/// Process-wide application state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub lean_level: LeanLevel,
    pub topic: String,
    pub brand_primary: String,
    pub brand_secondary: String,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            lean_level: LeanLevel::NEUTRAL,
            topic: crate::config::DEFAULT_TOPIC.to_owned(),
            brand_primary: DEFAULT_BRAND_PRIMARY.to_owned(),
            brand_secondary: DEFAULT_BRAND_SECONDARY.to_owned(),
        }
    }
}

impl AppState {
    /// Shallow-merge `patch`, returning the merged state and what changed.
    #[must_use]
    pub fn merged(&self, patch: &StatePatch) -> (Self, Changed) {
        let mut next = self.clone();
        let mut delta = Changed::empty();
        if let Some(level) = patch.lean_level
            && level != next.lean_level
        {
            next.lean_level = level;
            delta |= Changed::LEAN_LEVEL;
        }
        if let Some(topic) = &patch.topic
            && *topic != next.topic
        {
            next.topic.clone_from(topic);
            delta |= Changed::TOPIC;
        }
        if let Some(color) = &patch.brand_primary
            && *color != next.brand_primary
        {
            next.brand_primary.clone_from(color);
            delta |= Changed::BRAND_PRIMARY;
        }
        if let Some(color) = &patch.brand_secondary
            && *color != next.brand_secondary
        {
            next.brand_secondary.clone_from(color);
            delta |= Changed::BRAND_SECONDARY;
        }
        (next, delta)
    }
}

/// A partial update. Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    pub lean_level: Option<LeanLevel>,
    pub topic: Option<String>,
    pub brand_primary: Option<String>,
    pub brand_secondary: Option<String>,
}

impl StatePatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lean_level(mut self, level: LeanLevel) -> Self {
        self.lean_level = Some(level);
        self
    }

    /// Level from an untrusted integer, clamped to `-2..=2`.
    #[must_use]
    pub fn raw_lean_level(self, value: i64) -> Self {
        self.lean_level(LeanLevel::new(value))
    }

    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    #[must_use]
    pub fn brand_primary(mut self, color: impl Into<String>) -> Self {
        self.brand_primary = Some(color.into());
        self
    }

    #[must_use]
    pub fn brand_secondary(mut self, color: impl Into<String>) -> Self {
        self.brand_secondary = Some(color.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lean_level.is_none()
            && self.topic.is_none()
            && self.brand_primary.is_none()
            && self.brand_secondary.is_none()
    }
}

/// What a subscriber receives.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub old: Rc<AppState>,
    pub new: Rc<AppState>,
    pub delta: Changed,
    pub version: u64,
}

/// Result of [`Store::set_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Applied and fanned out.
    Applied(Changed),
    /// Nothing changed; no fan-out.
    Unchanged,
    /// Called during a fan-out; will be applied after it.
    Queued,
}

type Callback = dyn Fn(&StateChange);

struct SubscriberEntry {
    id: u64,
    callback: Weak<Callback>,
}

struct StoreInner {
    state: RefCell<Rc<AppState>>,
    version: Cell<u64>,
    subscribers: RefCell<Vec<SubscriberEntry>>,
    next_id: Cell<u64>,
    queue: RefCell<VecDeque<StatePatch>>,
    dispatching: Cell<bool>,
    torn_down: Cell<bool>,
}

/// Shared handle to the state store.
///
/// Cloning creates another handle to the **same** store.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

/// Non-owning store handle.
#[derive(Clone)]
pub struct WeakStore {
    inner: Weak<StoreInner>,
}

impl WeakStore {
    #[must_use]
    pub fn upgrade(&self) -> Option<Store> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.inner.state.borrow())
            .field("version", &self.inner.version.get())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

/// Resets the dispatching flag even if a subscriber panics.
struct DispatchGuard<'a>(&'a Cell<bool>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl Store {
    #[must_use]
    pub fn new(initial: AppState) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(Rc::new(initial)),
                version: Cell::new(0),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                queue: RefCell::new(VecDeque::new()),
                dispatching: Cell::new(false),
                torn_down: Cell::new(false),
            }),
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakStore {
        WeakStore {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Immutable snapshot of the current state.
    #[must_use]
    pub fn snapshot(&self) -> Rc<AppState> {
        Rc::clone(&self.inner.state.borrow())
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Live subscriber count.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .filter(|s| s.callback.strong_count() > 0)
            .count()
    }

    #[must_use]
    pub fn is_dispatching(&self) -> bool {
        self.inner.dispatching.get()
    }

    /// Register a change callback.
    ///
    /// The callback stays registered while the returned [`Subscription`] is
    /// alive.
    pub fn subscribe(&self, callback: impl Fn(&StateChange) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let callback: Rc<Callback> = Rc::new(callback);
        self.inner.subscribers.borrow_mut().push(SubscriberEntry {
            id,
            callback: Rc::downgrade(&callback),
        });
        tracing::trace!(message = "store.subscribe", id);
        Subscription {
            id,
            store: Rc::downgrade(&self.inner),
            _callback: callback,
        }
    }

    /// Merge `patch` into the state and notify subscribers.
    pub fn set_state(&self, patch: StatePatch) -> Dispatch {
        if self.inner.torn_down.get() {
            tracing::warn!(message = "store.update_after_teardown", patch = ?patch);
            return Dispatch::Unchanged;
        }
        if self.inner.dispatching.get() {
            tracing::debug!(message = "store.queued", depth = self.inner.queue.borrow().len() + 1);
            self.inner.queue.borrow_mut().push_back(patch);
            return Dispatch::Queued;
        }

        self.inner.dispatching.set(true);
        let _guard = DispatchGuard(&self.inner.dispatching);
        let first = self.apply(&patch);
        loop {
            let next = self.inner.queue.borrow_mut().pop_front();
            let Some(next) = next else {
                break;
            };
            self.apply(&next);
        }
        first
    }

    fn apply(&self, patch: &StatePatch) -> Dispatch {
        let old = self.snapshot();
        let (merged, delta) = old.merged(patch);
        if delta.is_empty() {
            tracing::trace!(message = "store.unchanged");
            return Dispatch::Unchanged;
        }
        let new = Rc::new(merged);
        *self.inner.state.borrow_mut() = Rc::clone(&new);
        let version = self.inner.version.get() + 1;
        self.inner.version.set(version);

        let snapshot: Vec<Weak<Callback>> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|s| Weak::clone(&s.callback))
            .collect();
        tracing::debug!(
            message = "store.dispatch",
            version,
            delta = ?delta,
            subscribers = snapshot.len(),
        );

        let change = StateChange {
            old,
            new,
            delta,
            version,
        };
        for weak in snapshot {
            if let Some(callback) = weak.upgrade() {
                callback(&change);
            }
        }
        self.inner
            .subscribers
            .borrow_mut()
            .retain(|s| s.callback.strong_count() > 0);
        Dispatch::Applied(delta)
    }

    /// Drop every subscriber and refuse further updates.
    pub fn teardown(&self) {
        self.inner.torn_down.set(true);
        self.inner.subscribers.borrow_mut().clear();
        self.inner.queue.borrow_mut().clear();
        tracing::debug!(message = "store.teardown", version = self.version());
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.get()
    }
}

/// RAII guard for a store callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    store: Weak<StoreInner>,
    _callback: Rc<Callback>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    /// Unsubscribe now.
    pub fn unsubscribe(self) {}

    /// Whether the store still exists and has not been torn down.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.store
            .upgrade()
            .is_some_and(|inner| !inner.torn_down.get())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade()
            && let Ok(mut subscribers) = inner.subscribers.try_borrow_mut()
        {
            subscribers.retain(|s| s.id != self.id);
        }
        tracing::trace!(message = "store.unsubscribe", id = self.id);
    }
}
