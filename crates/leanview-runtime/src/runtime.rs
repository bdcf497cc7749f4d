#![forbid(unsafe_code)]

//! The component runtime.
//!
//! [`Runtime`] owns the view tree, the store, the scheduler and the theme
//! preference, and mounts [`Component`]s on host elements.
//!
//! # Lifecycle
//!
//! Attach reads the host's attributes, captures its server-rendered inner
//! markup, seeds the store, subscribes, and performs exactly one initial
//! render. Afterwards a unit re-renders on a local update or on a store
//! change in its interest set. Detach (explicit, or by removing any ancestor
//! of the host) releases the subscription and cancels pending timers before
//! returning.
//!
//! # Rendering
//!
//! A render builds the new subtree detached from the tree, resolves lean
//! variants and prepares content wrappers in it, then swaps it into the host
//! in one step. Focus on an element with an `id` inside the host is restored
//! after the swap. Defined custom elements appearing in the new subtree are
//! upgraded into units. Hosts of units nested directly in the rendered unit
//! are carried over into the new subtree in place of their freshly rendered
//! placeholders (matched by `id`, else by tag in order), so nested units keep
//! their state and pending timers. Units whose hosts are no longer present
//! after the swap are detached.
//!
//! # Invariants
//!
//! 1. No unit or tree borrow is held while the store fans out or while host
//!    event listeners run, so both may call back into the runtime.
//! 2. A detached unit is never rendered, never receives store changes and
//!    never sees a timer fire.
//! 3. Reactions apply in order: local re-render, store patch, events.
//!
//! # Failure Modes
//!
//! - **Render error**: logged at warn; the previous output stays in place and
//!   sibling units are unaffected.
//! - **Re-entrant access to a busy unit**: logged at warn and skipped.
//! - **Event target replaced**: events are dispatched from the nearest
//!   surviving ancestor of the original host.

use std::any::Any;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use leanview_core::dom::{Document, NodeId};
use leanview_core::{HostEvent, InputEvent, KeyEvent, PointerEvent};
use leanview_template::apply_variants;
use thiserror::Error;

use crate::component::{
    BindContext, Component, ComponentKind, EventContext, Lifecycle, Reaction, RenderContext, UnitId,
};
use crate::config::RuntimeConfig;
use crate::content;
use crate::preferences::{MemoryStorage, StorageBackend, Theme, ThemePreference};
use crate::scheduler::Scheduler;
use crate::store::{AppState, Changed, StateChange, StatePatch, Store, Subscription};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("node {0} is not an attached element")]
    HostNotAttached(NodeId),
    #[error("node {node} already hosts unit {unit}")]
    AlreadyMounted { node: NodeId, unit: UnitId },
    #[error("unit {0} is detached")]
    Detached(UnitId),
    #[error("unit {0} is busy")]
    Busy(UnitId),
}

/// Typed handle to a mounted unit.
pub struct Handle<C> {
    unit: UnitId,
    component: Weak<RefCell<C>>,
}

impl<C> Clone for Handle<C> {
    fn clone(&self) -> Self {
        Self {
            unit: self.unit,
            component: Weak::clone(&self.component),
        }
    }
}

impl<C> fmt::Debug for Handle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("unit", &self.unit).finish()
    }
}

impl<C> Handle<C> {
    #[must_use]
    pub const fn unit(&self) -> UnitId {
        self.unit
    }
}

/// A type-erased unit plus the `Any` view of the same allocation.
struct Erased {
    dynamic: Rc<RefCell<dyn Component>>,
    any: Rc<dyn Any>,
}

impl Erased {
    fn new<C: Component>(component: C) -> (Self, Rc<RefCell<C>>) {
        let typed = Rc::new(RefCell::new(component));
        let dynamic: Rc<RefCell<dyn Component>> = typed.clone();
        let any: Rc<dyn Any> = typed.clone();
        (Self { dynamic, any }, typed)
    }
}

type Factory = Rc<dyn Fn() -> Erased>;

struct Mounted {
    unit: UnitId,
    host: NodeId,
    kind: ComponentKind,
    interest: Changed,
    id_prefix: String,
    component: Rc<RefCell<dyn Component>>,
    any: Rc<dyn Any>,
    lifecycle: Cell<Lifecycle>,
    renders: Cell<u64>,
    subscription: RefCell<Option<Subscription>>,
}

struct RuntimeInner {
    doc: RefCell<Document>,
    store: Store,
    scheduler: Scheduler,
    config: RuntimeConfig,
    theme: ThemePreference,
    units: RefCell<AHashMap<UnitId, Rc<Mounted>>>,
    hosts: RefCell<AHashMap<NodeId, UnitId>>,
    definitions: RefCell<Vec<(String, Factory)>>,
    next_unit: Cell<u64>,
}

/// Shared runtime handle. Cloning creates another handle to the **same** runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("units", &self.inner.units.borrow().len())
            .field("store", &self.inner.store)
            .field("scheduler", &self.inner.scheduler)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Runtime over `doc` with in-memory preference storage.
    #[must_use]
    pub fn new(doc: Document, config: RuntimeConfig) -> Self {
        Self::with_storage(doc, config, Box::new(MemoryStorage::new()))
    }

    #[must_use]
    pub fn with_storage(doc: Document, config: RuntimeConfig, storage: Box<dyn StorageBackend>) -> Self {
        let theme = ThemePreference::load(storage, config.theme_key.clone());
        let store = Store::new(AppState {
            topic: config.default_topic.clone(),
            ..AppState::default()
        });
        let runtime = Self {
            inner: Rc::new(RuntimeInner {
                doc: RefCell::new(doc),
                store,
                scheduler: Scheduler::new(),
                config,
                theme,
                units: RefCell::new(AHashMap::new()),
                hosts: RefCell::new(AHashMap::new()),
                definitions: RefCell::new(Vec::new()),
                next_unit: Cell::new(1),
            }),
        };
        runtime.apply_theme_class();
        runtime
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Read access to the view tree. Do not hold across runtime calls.
    #[must_use]
    pub fn document(&self) -> Ref<'_, Document> {
        self.inner.doc.borrow()
    }

    /// The document root, without holding a tree borrow.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.inner.doc.borrow().root()
    }

    /// Host-page edit of the view tree. Units are not notified; use
    /// [`remove_node`](Self::remove_node) to take hosts out of the tree.
    pub fn with_document<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.inner.doc.borrow_mut())
    }

    /// Shorthand for a store update.
    pub fn set_state(&self, patch: StatePatch) {
        self.inner.store.set_state(patch);
    }

    #[must_use]
    pub fn state(&self) -> Rc<AppState> {
        self.inner.store.snapshot()
    }

    // ── Registration ────────────────────────────────────────────────────

    /// Register `C` for hosts with tag `tag`; see [`upgrade`](Self::upgrade).
    pub fn define<C: Component + Default>(&self, tag: &str) {
        self.define_with(tag, C::default);
    }

    /// Register a factory for hosts with tag `tag`.
    pub fn define_with<C: Component>(&self, tag: &str, factory: impl Fn() -> C + 'static) {
        let tag = tag.to_ascii_lowercase();
        let factory: Factory = Rc::new(move || Erased::new(factory()).0);
        let mut definitions = self.inner.definitions.borrow_mut();
        definitions.retain(|(t, _)| *t != tag);
        definitions.push((tag, factory));
    }

    /// Attach a unit to every defined, unmounted host under `root`, in
    /// document order. Returns the units attached.
    pub fn upgrade(&self, root: NodeId) -> Vec<UnitId> {
        let candidates: Vec<(NodeId, Factory)> = {
            let doc = self.inner.doc.borrow();
            let definitions = self.inner.definitions.borrow();
            let hosts = self.inner.hosts.borrow();
            if definitions.is_empty() {
                return Vec::new();
            }
            doc.descendants(root)
                .into_iter()
                .filter(|node| !hosts.contains_key(node))
                .filter_map(|node| {
                    let tag = doc.tag(node)?;
                    definitions
                        .iter()
                        .find(|(t, _)| t == tag)
                        .map(|(_, f)| (node, Rc::clone(f)))
                })
                .collect()
        };
        let mut attached = Vec::new();
        for (node, factory) in candidates {
            // Earlier attaches may have re-rendered and replaced this node.
            let live = {
                let doc = self.inner.doc.borrow();
                doc.exists(node) && doc.is_attached(node)
            };
            if !live || self.inner.hosts.borrow().contains_key(&node) {
                continue;
            }
            match self.mount(node, factory()) {
                Ok(unit) => attached.push(unit),
                Err(err) => tracing::warn!(message = "component.upgrade_failed", node = %node, error = %err),
            }
        }
        attached
    }

    // ── Attach / detach ─────────────────────────────────────────────────

    /// Attach `component` to the attached element `host`.
    pub fn attach<C: Component>(&self, host: NodeId, component: C) -> Result<Handle<C>, RuntimeError> {
        let (erased, typed) = Erased::new(component);
        let unit = self.mount(host, erased)?;
        Ok(Handle {
            unit,
            component: Rc::downgrade(&typed),
        })
    }

    /// Typed handle to the unit mounted on `host`, if it is a `C`.
    #[must_use]
    pub fn handle_at<C: Component>(&self, host: NodeId) -> Option<Handle<C>> {
        let unit = self.unit_at(host)?;
        let mounted = self.mounted(unit)?;
        let typed = Rc::clone(&mounted.any).downcast::<RefCell<C>>().ok()?;
        Some(Handle {
            unit,
            component: Rc::downgrade(&typed),
        })
    }

    fn mount(&self, host: NodeId, erased: Erased) -> Result<UnitId, RuntimeError> {
        let (attrs, inner_markup, host_id, tag) = {
            let doc = self.inner.doc.borrow();
            if !doc.is_element(host) || !doc.is_attached(host) {
                return Err(RuntimeError::HostNotAttached(host));
            }
            (
                doc.attributes(host),
                doc.inner_html(host),
                doc.attr(host, "id").map(str::to_owned),
                doc.tag(host).unwrap_or_default().to_owned(),
            )
        };
        if let Some(&unit) = self.inner.hosts.borrow().get(&host) {
            return Err(RuntimeError::AlreadyMounted { node: host, unit });
        }

        let unit = UnitId(self.inner.next_unit.get());
        self.inner.next_unit.set(unit.0 + 1);

        let state = self.inner.store.snapshot();
        let (kind, interest, seed) = {
            let mut component = erased
                .dynamic
                .try_borrow_mut()
                .map_err(|_| RuntimeError::Busy(unit))?;
            component.adopt_children(inner_markup);
            let seed = component.configure(&attrs, &state);
            (component.kind(), component.interest(), seed)
        };

        let mounted = Rc::new(Mounted {
            unit,
            host,
            kind,
            interest,
            id_prefix: host_id.unwrap_or_else(|| format!("{tag}-{}", unit.0)),
            component: erased.dynamic,
            any: erased.any,
            lifecycle: Cell::new(Lifecycle::Attached),
            renders: Cell::new(0),
            subscription: RefCell::new(None),
        });
        self.inner.units.borrow_mut().insert(unit, Rc::clone(&mounted));
        self.inner.hosts.borrow_mut().insert(host, unit);
        tracing::debug!(message = "component.attached", unit = %unit, kind = %kind, host = %host);

        if let Some(patch) = seed.filter(|p| !p.is_empty()) {
            tracing::debug!(message = "component.seed", unit = %unit, patch = ?patch);
            self.inner.store.set_state(patch);
            if !self.inner.doc.borrow().is_attached(host) {
                self.detach_mounted(&mounted);
                return Err(RuntimeError::HostNotAttached(host));
            }
        }

        let subscription = self.subscribe_unit(&mounted);
        *mounted.subscription.borrow_mut() = Some(subscription);

        self.render_mounted(&mounted);
        Ok(unit)
    }

    fn subscribe_unit(&self, mounted: &Rc<Mounted>) -> Subscription {
        let runtime = Rc::downgrade(&self.inner);
        let unit = Rc::downgrade(mounted);
        self.inner.store.subscribe(move |change: &StateChange| {
            let (Some(inner), Some(mounted)) = (runtime.upgrade(), unit.upgrade()) else {
                return;
            };
            if mounted.lifecycle.get() == Lifecycle::Detached {
                tracing::warn!(message = "component.stale_subscription", unit = %mounted.unit);
                return;
            }
            if !mounted.interest.intersects(change.delta) {
                return;
            }
            Self { inner }.on_store_change(&mounted, change);
        })
    }

    fn on_store_change(&self, mounted: &Rc<Mounted>, change: &StateChange) {
        let reaction = match mounted.component.try_borrow_mut() {
            Ok(mut component) => component.on_state_change(change),
            Err(_) => {
                tracing::warn!(message = "component.busy", unit = %mounted.unit, during = "state_change");
                return;
            }
        };
        self.apply_reaction(mounted, reaction);
    }

    /// Detach a unit, leaving its host in the tree.
    pub fn detach(&self, unit: UnitId) -> Result<(), RuntimeError> {
        let mounted = self.mounted(unit).ok_or(RuntimeError::Detached(unit))?;
        self.detach_mounted(&mounted);
        Ok(())
    }

    fn detach_mounted(&self, mounted: &Rc<Mounted>) {
        if mounted.lifecycle.replace(Lifecycle::Detached) == Lifecycle::Detached {
            return;
        }
        self.inner.units.borrow_mut().remove(&mounted.unit);
        {
            let mut hosts = self.inner.hosts.borrow_mut();
            if hosts.get(&mounted.host) == Some(&mounted.unit) {
                hosts.remove(&mounted.host);
            }
        }
        drop(mounted.subscription.borrow_mut().take());
        let cancelled = self.inner.scheduler.cancel_owned(mounted.unit.0);
        match mounted.component.try_borrow_mut() {
            Ok(mut component) => component.release(),
            Err(_) => tracing::warn!(message = "component.busy", unit = %mounted.unit, during = "release"),
        }
        tracing::debug!(
            message = "component.detached",
            unit = %mounted.unit,
            kind = %mounted.kind,
            cancelled_timers = cancelled,
        );
    }

    /// Units whose host is `root` or inside it.
    fn units_within(&self, root: NodeId, include_root: bool) -> Vec<Rc<Mounted>> {
        let doc = self.inner.doc.borrow();
        let mut found: Vec<Rc<Mounted>> = self
            .inner
            .units
            .borrow()
            .values()
            .filter(|m| (include_root || m.host != root) && doc.contains(root, m.host))
            .cloned()
            .collect();
        found.sort_by_key(|m| m.unit);
        found
    }

    /// Remove `node` from the tree, detaching every unit hosted in it first.
    pub fn remove_node(&self, node: NodeId) -> bool {
        for mounted in self.units_within(node, true) {
            self.detach_mounted(&mounted);
        }
        self.inner.doc.borrow_mut().remove(node)
    }

    // ── Queries ─────────────────────────────────────────────────────────

    fn mounted(&self, unit: UnitId) -> Option<Rc<Mounted>> {
        self.inner.units.borrow().get(&unit).cloned()
    }

    #[must_use]
    pub fn unit_at(&self, host: NodeId) -> Option<UnitId> {
        self.inner.hosts.borrow().get(&host).copied()
    }

    #[must_use]
    pub fn host_of(&self, unit: UnitId) -> Option<NodeId> {
        self.mounted(unit).map(|m| m.host)
    }

    #[must_use]
    pub fn lifecycle(&self, unit: UnitId) -> Lifecycle {
        self.mounted(unit)
            .map_or(Lifecycle::Detached, |m| m.lifecycle.get())
    }

    /// Completed renders of a mounted unit.
    #[must_use]
    pub fn render_count(&self, unit: UnitId) -> u64 {
        self.mounted(unit).map_or(0, |m| m.renders.get())
    }

    /// Mounted units in attach order.
    #[must_use]
    pub fn units(&self) -> Vec<UnitId> {
        let mut units: Vec<UnitId> = self.inner.units.borrow().keys().copied().collect();
        units.sort();
        units
    }

    // ── Rendering ───────────────────────────────────────────────────────

    /// Re-render a unit now.
    pub fn render(&self, unit: UnitId) -> Result<bool, RuntimeError> {
        let mounted = self.mounted(unit).ok_or(RuntimeError::Detached(unit))?;
        Ok(self.render_mounted(&mounted))
    }

    fn render_mounted(&self, mounted: &Rc<Mounted>) -> bool {
        if mounted.lifecycle.get() == Lifecycle::Detached {
            return false;
        }
        let state = self.inner.store.snapshot();
        let span = tracing::debug_span!(
            "component.render",
            unit = %mounted.unit,
            kind = %mounted.kind,
            level = %state.lean_level,
        );
        let _enter = span.enter();

        let markup = {
            let Ok(component) = mounted.component.try_borrow() else {
                tracing::warn!(message = "component.busy", unit = %mounted.unit, during = "render");
                return false;
            };
            component.render(&RenderContext {
                unit: mounted.unit,
                state: &state,
                config: &self.inner.config,
                id_prefix: &mounted.id_prefix,
                now_ms: self.inner.scheduler.now(),
            })
        };
        let markup = match markup {
            Ok(markup) => markup,
            Err(err) => {
                tracing::warn!(message = "component.render_failed", unit = %mounted.unit, error = %err);
                return false;
            }
        };

        let replaced = self.units_within(mounted.host, false);
        {
            let mut doc = self.inner.doc.borrow_mut();
            let doc = &mut *doc;
            let focus_id = doc
                .focused()
                .filter(|&f| doc.contains(mounted.host, f))
                .and_then(|f| doc.attr(f, "id").map(str::to_owned));

            let scratch = doc.create_element("template");
            for node in doc.parse_fragment(&markup) {
                apply_variants(doc, node, state.lean_level);
                content::prepare(doc, node);
                if let Err(err) = doc.append_child(scratch, node) {
                    tracing::debug!(message = "component.fragment_skip", error = %err);
                }
            }
            let kept = keep_nested_hosts(doc, mounted.host, scratch, &replaced);
            if kept > 0 {
                tracing::trace!(message = "component.kept_nested", unit = %mounted.unit, kept);
            }
            let fragment = doc.children(scratch).to_vec();
            doc.replace_children(mounted.host, fragment);
            doc.remove(scratch);

            if let Some(id) = focus_id
                && let Some(node) = doc.find_by_id_in(mounted.host, &id)
            {
                doc.focus(node);
            }
        }
        let stale: Vec<&Rc<Mounted>> = {
            let doc = self.inner.doc.borrow();
            replaced.iter().filter(|m| !doc.contains(mounted.host, m.host)).collect()
        };
        for unit in stale {
            self.detach_mounted(unit);
        }
        mounted.lifecycle.set(Lifecycle::Rendered);
        mounted.renders.set(mounted.renders.get() + 1);

        match mounted.component.try_borrow_mut() {
            Ok(mut component) => {
                let mut doc = self.inner.doc.borrow_mut();
                component.after_render(&mut BindContext {
                    doc: &mut doc,
                    host: mounted.host,
                    state: &state,
                    id_prefix: &mounted.id_prefix,
                });
            }
            Err(_) => tracing::warn!(message = "component.busy", unit = %mounted.unit, during = "after_render"),
        }
        tracing::trace!(message = "component.rendered", unit = %mounted.unit, bytes = markup.len());

        self.upgrade(mounted.host);
        true
    }

    // ── Reactions & events ──────────────────────────────────────────────

    fn apply_reaction(&self, mounted: &Rc<Mounted>, reaction: Reaction) {
        let origin = self.inner.doc.borrow().ancestors_inclusive(mounted.host);
        if reaction.rerender {
            self.render_mounted(mounted);
        }
        if let Some(patch) = reaction.patch {
            self.inner.store.set_state(patch);
        }
        if reaction.events.is_empty() {
            return;
        }
        let target = {
            let doc = self.inner.doc.borrow();
            origin
                .into_iter()
                .find(|&n| doc.is_attached(n))
                .unwrap_or_else(|| doc.root())
        };
        if target != mounted.host {
            tracing::debug!(message = "event.retargeted", unit = %mounted.unit, target = %target);
        }
        for detail in reaction.events {
            self.emit(HostEvent::new(target, detail));
        }
    }

    /// Dispatch a host event; listeners run with no runtime borrow held.
    pub fn emit(&self, event: HostEvent) -> usize {
        let listeners = self.inner.doc.borrow().listeners_for(&event);
        tracing::debug!(
            message = "event.emit",
            event = event.name(),
            target = %event.target,
            listeners = listeners.len(),
        );
        for listener in &listeners {
            listener(&event);
        }
        listeners.len()
    }

    /// Enclosing units of `target`, innermost first.
    fn units_enclosing(&self, target: NodeId) -> Vec<Rc<Mounted>> {
        let path = self.inner.doc.borrow().ancestors_inclusive(target);
        let hosts = self.inner.hosts.borrow();
        let units = self.inner.units.borrow();
        path.iter()
            .filter_map(|node| hosts.get(node).and_then(|u| units.get(u)).cloned())
            .collect()
    }

    fn activate_content(&self, target: NodeId) {
        let event = {
            let doc = self.inner.doc.borrow();
            content::wrapper_for(&doc, target)
                .map(|w| HostEvent::new(w, content::activation(&doc, w, self.inner.config.preview_chars)))
        };
        if let Some(event) = event {
            self.emit(event);
        }
    }

    /// Deliver input to `target`: content activation first, then the
    /// enclosing units innermost-first until one handles it.
    pub fn dispatch_input(&self, target: NodeId, input: &InputEvent) -> bool {
        if !self.inner.doc.borrow().exists(target) {
            return false;
        }
        if let InputEvent::Key(key) = input
            && !key.is_actionable()
        {
            return false;
        }
        if input.is_activation() {
            self.activate_content(target);
        }
        if let InputEvent::Pointer(pointer) = input
            && pointer.is_activation()
        {
            let mut doc = self.inner.doc.borrow_mut();
            if let Some(focusable) = doc.closest(target, |el| el.tag() == "button" || el.attr("tabindex").is_some()) {
                doc.focus(focusable);
            }
        }

        let state = self.inner.store.snapshot();
        for mounted in self.units_enclosing(target) {
            let reaction = {
                let doc = self.inner.doc.borrow();
                let Ok(mut component) = mounted.component.try_borrow_mut() else {
                    tracing::warn!(message = "component.busy", unit = %mounted.unit, during = "input");
                    continue;
                };
                let ctx = EventContext {
                    doc: &doc,
                    host: mounted.host,
                    target,
                    state: &state,
                    id_prefix: &mounted.id_prefix,
                };
                match input {
                    InputEvent::Key(key) => component.on_key(&ctx, key),
                    InputEvent::Pointer(pointer) => component.on_pointer(&ctx, pointer),
                }
            };
            if reaction.handled {
                tracing::trace!(message = "input.handled", unit = %mounted.unit);
                self.apply_reaction(&mounted, reaction);
                return true;
            }
        }
        false
    }

    pub fn key(&self, target: NodeId, key: KeyEvent) -> bool {
        self.dispatch_input(target, &InputEvent::Key(key))
    }

    /// Key press delivered to the focused element, or the root.
    pub fn press(&self, key: KeyEvent) -> bool {
        let target = {
            let doc = self.inner.doc.borrow();
            doc.focused().unwrap_or_else(|| doc.root())
        };
        self.key(target, key)
    }

    pub fn click(&self, target: NodeId) -> bool {
        self.dispatch_input(target, &InputEvent::Pointer(PointerEvent::click()))
    }

    // ── Local updates & timers ──────────────────────────────────────────

    /// Mutate a unit through its handle and apply the returned reaction.
    pub fn update<C: Component>(
        &self,
        handle: &Handle<C>,
        f: impl FnOnce(&mut C, &AppState) -> Reaction,
    ) -> Result<(), RuntimeError> {
        let mounted = self
            .mounted(handle.unit)
            .ok_or(RuntimeError::Detached(handle.unit))?;
        let typed = handle
            .component
            .upgrade()
            .ok_or(RuntimeError::Detached(handle.unit))?;
        let state = self.inner.store.snapshot();
        let reaction = {
            let mut component = typed
                .try_borrow_mut()
                .map_err(|_| RuntimeError::Busy(handle.unit))?;
            f(&mut component, &state)
        };
        self.apply_reaction(&mounted, reaction);
        Ok(())
    }

    /// Read a unit's fields.
    pub fn inspect<C: Component, R>(&self, handle: &Handle<C>, f: impl FnOnce(&C) -> R) -> Result<R, RuntimeError> {
        if self.mounted(handle.unit).is_none() {
            return Err(RuntimeError::Detached(handle.unit));
        }
        let typed = handle
            .component
            .upgrade()
            .ok_or(RuntimeError::Detached(handle.unit))?;
        let component = typed
            .try_borrow()
            .map_err(|_| RuntimeError::Busy(handle.unit))?;
        Ok(f(&component))
    }

    /// Run `f` as a local update after `delay_ms` of virtual time, replacing
    /// any pending timer of this unit with the same `key`. Cancelled on detach.
    pub fn schedule<C: Component>(
        &self,
        handle: &Handle<C>,
        key: &str,
        delay_ms: u64,
        f: impl FnOnce(&mut C, &AppState) -> Reaction + 'static,
    ) -> Result<(), RuntimeError> {
        if self.mounted(handle.unit).is_none() {
            return Err(RuntimeError::Detached(handle.unit));
        }
        let runtime = Rc::downgrade(&self.inner);
        let handle_for_timer = handle.clone();
        self.inner
            .scheduler
            .schedule(handle.unit.0, key, delay_ms, move || {
                let Some(inner) = runtime.upgrade() else {
                    return;
                };
                let runtime = Self { inner };
                if let Err(err) = runtime.update(&handle_for_timer, f) {
                    tracing::warn!(message = "timer.stale", error = %err);
                }
            });
        Ok(())
    }

    /// Advance virtual time, firing due timers. Returns how many fired.
    pub fn advance_time(&self, ms: u64) -> usize {
        self.inner.scheduler.advance(ms)
    }

    // ── Theme ───────────────────────────────────────────────────────────

    #[must_use]
    pub fn theme(&self) -> Theme {
        self.inner.theme.theme()
    }

    /// Flip and persist the theme; the root gets the matching class.
    pub fn toggle_theme(&self) -> Theme {
        let theme = self.inner.theme.toggle();
        self.apply_theme_class();
        tracing::debug!(message = "theme.toggled", theme = %theme);
        theme
    }

    fn apply_theme_class(&self) {
        let theme = self.inner.theme.theme();
        let mut doc = self.inner.doc.borrow_mut();
        let root = doc.root();
        if let Err(err) = doc.swap_classes(root, &Theme::CLASSES, theme.class()) {
            tracing::warn!(message = "theme.apply_failed", error = %err);
        }
    }

    /// Detach every unit and tear the store down.
    pub fn teardown(&self) {
        let mut all: Vec<Rc<Mounted>> = self.inner.units.borrow().values().cloned().collect();
        all.sort_by_key(|m| m.unit);
        for mounted in all {
            self.detach_mounted(&mounted);
        }
        self.inner.store.teardown();
    }
}

/// Swap the placeholders in a freshly rendered fragment under
/// `fragment_root` for the live hosts of units nested directly in `host`, so
/// those units keep their state across the parent render. A live host is
/// matched by tag and `id`; hosts without an id pair up in document order.
/// Returns how many were kept.
fn keep_nested_hosts(doc: &mut Document, host: NodeId, fragment_root: NodeId, nested: &[Rc<Mounted>]) -> usize {
    let hosts: Vec<NodeId> = nested.iter().map(|m| m.host).collect();
    let direct: Vec<NodeId> = doc
        .descendants(host)
        .into_iter()
        .filter(|n| hosts.contains(n))
        .filter(|&n| {
            !doc.ancestors_inclusive(n)
                .iter()
                .skip(1)
                .take_while(|&&a| a != host)
                .any(|a| hosts.contains(a))
        })
        .collect();

    let mut kept: Vec<NodeId> = Vec::new();
    for live in direct {
        let Some(tag) = doc.tag(live).map(str::to_owned) else {
            continue;
        };
        let id = doc.attr(live, "id").map(str::to_owned);
        let slot = doc
            .query_all(fragment_root, |el| el.tag() == tag)
            .into_iter()
            .filter(|&c| !kept.iter().any(|&k| doc.contains(k, c)))
            .find(|&c| doc.attr(c, "id") == id.as_deref());
        let Some(slot) = slot else {
            continue;
        };
        match doc.replace_node(slot, live) {
            Ok(()) => kept.push(live),
            Err(err) => tracing::debug!(message = "component.keep_nested_failed", error = %err),
        }
    }
    kept.len()
}

/// Emitted-event log for hosts and tests: records every event reaching `node`.
pub fn record_events(runtime: &Runtime, node: NodeId) -> Rc<RefCell<Vec<HostEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    runtime.with_document(|doc| {
        doc.add_listener(node, None, move |event| sink.borrow_mut().push(event.clone()));
    });
    log
}

/// Event detail kinds only, for compact assertions.
#[must_use]
pub fn event_names(log: &RefCell<Vec<HostEvent>>) -> Vec<&'static str> {
    log.borrow().iter().map(HostEvent::name).collect()
}
