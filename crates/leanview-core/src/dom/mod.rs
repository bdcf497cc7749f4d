#![forbid(unsafe_code)]

//! Headless view tree.
//!
//! [`Document`] is an arena of element and text nodes addressed by
//! generational [`NodeId`]s. It carries the pieces of browser state the
//! reactive core depends on: focus, live-region announcements, and bubbling
//! host-event listeners.
//!
//! # Invariants
//!
//! 1. A freed `NodeId` never resolves again; its slot is reused with a bumped
//!    generation.
//! 2. A node has at most one parent and appears exactly once in that parent's
//!    child list.
//! 3. `focused()` is `None` or an attached node.
//! 4. Text nodes hold trusted raw markup; serialization emits it verbatim.

mod parse;
mod serialize;

use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::attrs::Attributes;
use crate::host_event::{HostEvent, HostEventKind};

pub use parse::is_void_element;

/// Errors from structural tree operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    #[error("node {0} does not exist")]
    Missing(NodeId),
    #[error("node {0} is not an element")]
    NotElement(NodeId),
    #[error("inserting {child} under {parent} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("node {0} has no parent")]
    Orphan(NodeId),
}

/// Generational handle to a node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}v{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Element payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn set_attr(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => value.clone_into(&mut slot.1),
            None => self.attrs.push((name, value.to_owned())),
        }
    }

    fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|(k, _)| k != name);
        before != self.attrs.len()
    }

    fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_ascii_whitespace()
    }
}

/// Node payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct NodeSlot {
    generation: u32,
    node: Option<Node>,
}

/// Handle returned by [`Document::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Host-event listener callback.
pub type Listener = Rc<dyn Fn(&HostEvent)>;

struct ListenerEntry {
    id: ListenerId,
    node: NodeId,
    filter: Option<HostEventKind>,
    callback: Listener,
}

/// A live-region announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub region: NodeId,
    pub text: String,
}

/// The view tree.
pub struct Document {
    slots: Vec<NodeSlot>,
    free: Vec<u32>,
    root: NodeId,
    focused: Option<NodeId>,
    listeners: Vec<ListenerEntry>,
    next_listener: u64,
    announcements: Vec<Announcement>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.node_count())
            .field("focused", &self.focused)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with a `body` root.
    #[must_use]
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            focused: None,
            listeners: Vec::new(),
            next_listener: 0,
            announcements: Vec::new(),
        };
        doc.root = doc.alloc(NodeKind::Element(Element::new("body")));
        doc
    }

    /// Document whose root holds the parsed `markup`.
    #[must_use]
    pub fn from_html(markup: &str) -> Self {
        let mut doc = Self::new();
        let root = doc.root;
        let nodes = doc.parse_fragment(markup);
        doc.replace_children(root, nodes);
        doc
    }

    #[inline]
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, attached or not.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let node = Node {
            kind,
            parent: None,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(NodeSlot {
                generation: 0,
                node: Some(node),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element, DomError> {
        match self.node_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => Ok(el),
            Some(NodeKind::Text(_)) => Err(DomError::NotElement(id)),
            None => Err(DomError::Missing(id)),
        }
    }

    /// Whether `id` still refers to a live node.
    #[must_use]
    pub fn exists(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.node(id).map(|n| &n.kind)
    }

    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::tag)
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map_or(&[], |n| n.children.as_slice())
    }

    /// `id` followed by its parent chain up to the topmost ancestor.
    #[must_use]
    pub fn ancestors_inclusive(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut cursor = self.exists(id).then_some(id);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.parent(node);
        }
        path
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    #[must_use]
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors_inclusive(node).contains(&ancestor)
    }

    /// Connected to the document root.
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.ancestors_inclusive(id).last() == Some(&self.root)
    }

    /// Pre-order walk of `root` and its descendants.
    #[must_use]
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            out.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Elements under `root` (inclusive) matching `pred`, in document order.
    pub fn query_all(&self, root: NodeId, mut pred: impl FnMut(&Element) -> bool) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&id| self.element(id).is_some_and(&mut pred))
            .collect()
    }

    /// Elements under `root` (inclusive) carrying attribute `name`.
    #[must_use]
    pub fn elements_with_attr(&self, root: NodeId, name: &str) -> Vec<NodeId> {
        self.query_all(root, |el| el.attr(name).is_some())
    }

    /// First element under `root` (inclusive) with `id="..."`.
    #[must_use]
    pub fn find_by_id_in(&self, root: NodeId, id: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|&n| self.attr(n, "id") == Some(id))
    }

    /// First attached element with `id="..."`.
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_by_id_in(self.root, id)
    }

    /// Nearest inclusive ancestor element matching `pred`.
    pub fn closest(&self, node: NodeId, mut pred: impl FnMut(&Element) -> bool) -> Option<NodeId> {
        self.ancestors_inclusive(node)
            .into_iter()
            .find(|&id| self.element(id).is_some_and(&mut pred))
    }

    // ── Construction ────────────────────────────────────────────────────

    /// New detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeKind::Element(Element::new(tag)))
    }

    /// New detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeKind::Text(text.to_owned()))
    }

    /// Parse `markup` into detached top-level nodes.
    pub fn parse_fragment(&mut self, markup: &str) -> Vec<NodeId> {
        parse::parse_into(self, markup)
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.parent(child) {
            if let Some(p) = self.node_mut(parent) {
                p.children.retain(|&c| c != child);
            }
            if let Some(c) = self.node_mut(child) {
                c.parent = None;
            }
        }
    }

    /// Move `child` (and its subtree) to the end of `parent`'s children.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        if !self.exists(child) {
            return Err(DomError::Missing(child));
        }
        self.element_mut(parent)?;
        if self.contains(child, parent) {
            return Err(DomError::Cycle { parent, child });
        }
        self.detach(child);
        if let Some(p) = self.node_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.node_mut(child) {
            c.parent = Some(parent);
        }
        Ok(())
    }

    /// Move `replacement` (with its subtree) into `old`'s slot, then free
    /// `old`. Focus inside `replacement` survives the move.
    pub fn replace_node(&mut self, old: NodeId, replacement: NodeId) -> Result<(), DomError> {
        if !self.exists(replacement) {
            return Err(DomError::Missing(replacement));
        }
        let parent = self.parent(old).ok_or(DomError::Orphan(old))?;
        if old == replacement {
            return Ok(());
        }
        if self.contains(replacement, parent) {
            return Err(DomError::Cycle {
                parent,
                child: replacement,
            });
        }
        self.detach(replacement);
        if let Some(p) = self.node_mut(parent)
            && let Some(slot) = p.children.iter_mut().find(|c| **c == old)
        {
            *slot = replacement;
        }
        if let Some(r) = self.node_mut(replacement) {
            r.parent = Some(parent);
        }
        if let Some(o) = self.node_mut(old) {
            o.parent = None;
        }
        self.free_subtree(old);
        Ok(())
    }

    /// Detach `node` from its parent and free its whole subtree.
    pub fn remove(&mut self, node: NodeId) -> bool {
        if !self.exists(node) || node == self.root {
            return false;
        }
        self.detach(node);
        self.free_subtree(node);
        true
    }

    fn free_subtree(&mut self, node: NodeId) {
        let doomed = self.descendants(node);
        if self.focused.is_some_and(|f| doomed.contains(&f)) {
            self.focused = None;
        }
        self.listeners.retain(|l| !doomed.contains(&l.node));
        for id in doomed {
            let slot = &mut self.slots[id.index as usize];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
        }
    }

    /// Free the current children of `parent` and adopt `children` in one step.
    ///
    /// Nodes in `children` that are missing or would create a cycle are
    /// skipped.
    pub fn replace_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        let Some(node) = self.node(parent) else {
            return;
        };
        let old: Vec<NodeId> = node
            .children
            .iter()
            .copied()
            .filter(|c| !children.contains(c))
            .collect();
        for child in old {
            self.detach(child);
            self.free_subtree(child);
        }
        for child in children {
            if let Err(err) = self.append_child(parent, child) {
                tracing::debug!(message = "dom.replace_children.skip", error = %err);
            }
        }
    }

    /// Replace the children of `parent` with parsed `markup`.
    pub fn set_inner_html(&mut self, parent: NodeId, markup: &str) {
        let nodes = self.parse_fragment(markup);
        self.replace_children(parent, nodes);
    }

    // ── Attributes & classes ────────────────────────────────────────────

    #[must_use]
    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node).and_then(|el| el.attr(name))
    }

    #[must_use]
    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.element_mut(node)?.set_attr(name, value);
        Ok(())
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) -> bool {
        self.element_mut(node).is_ok_and(|el| el.remove_attr(name))
    }

    /// Normalized attribute snapshot for unit configuration.
    #[must_use]
    pub fn attributes(&self, node: NodeId) -> Attributes {
        self.element(node)
            .map(|el| Attributes::from_pairs(el.attrs()))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.element(node).is_some_and(|el| el.classes().any(|c| c == class))
    }

    #[must_use]
    pub fn class_list(&self, node: NodeId) -> Vec<String> {
        self.element(node)
            .map(|el| el.classes().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Remove every class in `remove`, then add `add`, as one attribute write.
    pub fn swap_classes(&mut self, node: NodeId, remove: &[&str], add: &str) -> Result<(), DomError> {
        let el = self.element_mut(node)?;
        let mut classes: Vec<String> = el
            .classes()
            .filter(|c| !remove.contains(c) && *c != add)
            .map(str::to_owned)
            .collect();
        if !add.is_empty() {
            classes.push(add.to_owned());
        }
        el.set_attr("class", &classes.join(" "));
        Ok(())
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), DomError> {
        self.swap_classes(node, &[], class)
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) -> Result<(), DomError> {
        self.swap_classes(node, &[class], "")
    }

    // ── Text ────────────────────────────────────────────────────────────

    /// Concatenated text of `node`'s subtree with basic entities decoded.
    #[must_use]
    pub fn text_content(&self, node: NodeId) -> String {
        let mut raw = String::new();
        for id in self.descendants(node) {
            if let Some(NodeKind::Text(text)) = self.kind(id) {
                raw.push_str(text);
            }
        }
        decode_entities(&raw)
    }

    /// Replace `node`'s children with a single raw text node.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        self.element_mut(node)?;
        let text_node = self.create_text(text);
        self.replace_children(node, vec![text_node]);
        Ok(())
    }

    // ── Focus ───────────────────────────────────────────────────────────

    #[must_use]
    pub const fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Focus an attached element. Returns whether focus moved there.
    pub fn focus(&mut self, node: NodeId) -> bool {
        if self.is_element(node) && self.is_attached(node) {
            self.focused = Some(node);
            true
        } else {
            false
        }
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    /// Whether focus is on `node` or inside it.
    #[must_use]
    pub fn focus_within(&self, node: NodeId) -> bool {
        self.focused.is_some_and(|f| self.contains(node, f))
    }

    // ── Live regions ────────────────────────────────────────────────────

    /// Set the live region's text and record the announcement.
    ///
    /// Identical consecutive text is still recorded, which is how a
    /// re-announcement is observed.
    pub fn announce(&mut self, region: NodeId, text: &str) -> Result<(), DomError> {
        self.set_text_content(region, text)?;
        self.announcements.push(Announcement {
            region,
            text: text.to_owned(),
        });
        Ok(())
    }

    #[must_use]
    pub fn announcements(&self) -> &[Announcement] {
        &self.announcements
    }

    #[must_use]
    pub fn last_announcement(&self) -> Option<&Announcement> {
        self.announcements.last()
    }

    // ── Host events ─────────────────────────────────────────────────────

    /// Listen for host events reaching `node` (itself or bubbling from below).
    pub fn add_listener(
        &mut self,
        node: NodeId,
        filter: Option<HostEventKind>,
        callback: impl Fn(&HostEvent) + 'static,
    ) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push(ListenerEntry {
            id,
            node,
            filter,
            callback: Rc::new(callback),
        });
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        before != self.listeners.len()
    }

    /// Listeners an event reaches, in bubbling order (target first).
    ///
    /// Returned as owned handles so callers can invoke them after releasing
    /// any borrow of the document.
    #[must_use]
    pub fn listeners_for(&self, event: &HostEvent) -> Vec<Listener> {
        let mut out = Vec::new();
        for node in self.ancestors_inclusive(event.target) {
            for entry in &self.listeners {
                if entry.node == node && entry.filter.is_none_or(|k| k == event.kind()) {
                    out.push(Rc::clone(&entry.callback));
                }
            }
        }
        out
    }

    /// Dispatch with the document borrowed. Listeners must not need the
    /// document mutably; use [`listeners_for`](Self::listeners_for) otherwise.
    pub fn dispatch(&self, event: &HostEvent) -> usize {
        let listeners = self.listeners_for(event);
        for listener in &listeners {
            listener(event);
        }
        listeners.len()
    }

    // ── Serialization ───────────────────────────────────────────────────

    #[must_use]
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(node) {
            serialize::write_node(self, child, &mut out);
        }
        out
    }

    #[must_use]
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        serialize::write_node(self, node, &mut out);
        out
    }
}

/// Decode the entities the serializer and common payloads use.
#[must_use]
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_owned();
    }
    raw.replace("&nbsp;", "\u{a0}")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
