//! In-memory host.
//!
//! An arena of elements, text nodes and anchors that behaves like a tiny
//! DOM. Every successful mutation is appended to a log so tests can assert
//! exactly which primitives a reconciliation pass issued.
//!
//! Removing a handle from its parent frees it together with its
//! descendants; the arena only holds what is reachable or not yet
//! attached. Freed handles are unknown to every later call.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::trace;

use super::{HandleId, Host};
use crate::error::HostError;
use crate::node::{Event, Listener};

/// One primitive operation applied to a [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    CreateElement { handle: HandleId, tag: String },
    CreateText { handle: HandleId, content: String },
    CreateAnchor { handle: HandleId },
    SetText { handle: HandleId, content: String },
    SetAttribute { handle: HandleId, name: String, value: String },
    RemoveAttribute { handle: HandleId, name: String },
    AddListener { handle: HandleId, event: String },
    RemoveListener { handle: HandleId, event: String },
    Insert { parent: HandleId, child: HandleId, before: Option<HandleId> },
    Remove { parent: HandleId, child: HandleId },
}

impl Mutation {
    /// Whether this mutation allocated a new handle.
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            Mutation::CreateElement { .. } | Mutation::CreateText { .. } | Mutation::CreateAnchor { .. }
        )
    }
}

#[derive(Debug)]
enum Content {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
        listeners: IndexMap<String, Listener>,
    },
    Text(String),
    Anchor,
}

#[derive(Debug)]
struct Entry {
    content: Content,
    parent: Option<HandleId>,
    children: Vec<HandleId>,
}

/// A headless [`Host`] backed by an arena.
#[derive(Debug, Default)]
pub struct MemoryHost {
    entries: IndexMap<HandleId, Entry>,
    next_id: u64,
    log: Vec<Mutation>,
}

impl MemoryHost {
    /// Create an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached container element and clear it from the log.
    ///
    /// Convenient as the mount point of a root.
    pub fn create_container(&mut self, tag: &str) -> HandleId {
        self.allocate(Content::Element {
            tag: tag.to_string(),
            attributes: IndexMap::new(),
            listeners: IndexMap::new(),
        })
    }

    /// All mutations recorded since creation or the last clear.
    pub fn mutations(&self) -> &[Mutation] {
        &self.log
    }

    /// Drain the mutation log.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.log)
    }

    pub fn clear_mutations(&mut self) {
        self.log.clear();
    }

    /// Serialize the mutation log as a JSON array.
    pub fn mutations_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.log)
    }

    /// Number of live handles, attached or not yet attached.
    pub fn handle_count(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, handle: HandleId) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn parent(&self, handle: HandleId) -> Option<HandleId> {
        self.entries.get(&handle).and_then(|entry| entry.parent)
    }

    /// Children of `handle` in order, anchors included.
    pub fn children(&self, handle: HandleId) -> &[HandleId] {
        self.entries
            .get(&handle)
            .map(|entry| entry.children.as_slice())
            .unwrap_or(&[])
    }

    /// Children of `handle` that are elements.
    pub fn element_children(&self, handle: HandleId) -> Vec<HandleId> {
        self.children(handle)
            .iter()
            .copied()
            .filter(|child| self.tag(*child).is_some())
            .collect()
    }

    /// Tag of an element handle.
    pub fn tag(&self, handle: HandleId) -> Option<&str> {
        match &self.entries.get(&handle)?.content {
            Content::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attribute(&self, handle: HandleId, name: &str) -> Option<&str> {
        match &self.entries.get(&handle)?.content {
            Content::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            _ => None,
        }
    }

    pub fn has_listener(&self, handle: HandleId, event: &str) -> bool {
        match self.entries.get(&handle).map(|entry| &entry.content) {
            Some(Content::Element { listeners, .. }) => listeners.contains_key(event),
            _ => false,
        }
    }

    pub fn is_anchor(&self, handle: HandleId) -> bool {
        matches!(
            self.entries.get(&handle).map(|entry| &entry.content),
            Some(Content::Anchor)
        )
    }

    /// Concatenated text of `handle` and all of its descendants.
    pub fn text_content(&self, handle: HandleId) -> String {
        let mut out = String::new();
        self.collect_text(handle, &mut out);
        out
    }

    fn collect_text(&self, handle: HandleId, out: &mut String) {
        let Some(entry) = self.entries.get(&handle) else {
            return;
        };
        if let Content::Text(content) = &entry.content {
            out.push_str(content);
        }
        for child in &entry.children {
            self.collect_text(*child, out);
        }
    }

    /// Render the subtree under `handle` as markup. Anchors are omitted.
    pub fn render(&self, handle: HandleId) -> String {
        let mut out = String::new();
        self.render_into(handle, &mut out);
        out
    }

    fn render_into(&self, handle: HandleId, out: &mut String) {
        let Some(entry) = self.entries.get(&handle) else {
            return;
        };
        match &entry.content {
            Content::Anchor => {}
            Content::Text(content) => out.push_str(content),
            Content::Element { tag, attributes, .. } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for child in &entry.children {
                    self.render_into(*child, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }

    /// Invoke the listener registered for `event` on `handle`.
    ///
    /// Returns `Ok(false)` when the element has no such listener.
    pub fn dispatch(&self, handle: HandleId, event: &str) -> Result<bool, HostError> {
        let entry = self.entry(handle)?;
        let Content::Element { listeners, .. } = &entry.content else {
            return Err(HostError::NotAnElement(handle));
        };
        let Some(listener) = listeners.get(event).cloned() else {
            return Ok(false);
        };
        listener.call(&Event::new(event, handle));
        Ok(true)
    }

    fn allocate(&mut self, content: Content) -> HandleId {
        self.next_id += 1;
        let handle = HandleId::from(self.next_id);
        self.entries.insert(
            handle,
            Entry {
                content,
                parent: None,
                children: Vec::new(),
            },
        );
        handle
    }

    fn record(&mut self, mutation: Mutation) {
        trace!(?mutation, "host mutation");
        self.log.push(mutation);
    }

    fn entry(&self, handle: HandleId) -> Result<&Entry, HostError> {
        self.entries
            .get(&handle)
            .ok_or(HostError::UnknownHandle(handle))
    }

    fn entry_mut(&mut self, handle: HandleId) -> Result<&mut Entry, HostError> {
        self.entries
            .get_mut(&handle)
            .ok_or(HostError::UnknownHandle(handle))
    }

    fn element_parts(
        &mut self,
        handle: HandleId,
    ) -> Result<(&mut IndexMap<String, String>, &mut IndexMap<String, Listener>), HostError> {
        match &mut self.entry_mut(handle)?.content {
            Content::Element {
                attributes,
                listeners,
                ..
            } => Ok((attributes, listeners)),
            _ => Err(HostError::NotAnElement(handle)),
        }
    }

    fn is_ancestor(&self, candidate: HandleId, of: HandleId) -> bool {
        let mut cursor = Some(of);
        while let Some(handle) = cursor {
            if handle == candidate {
                return true;
            }
            cursor = self.parent(handle);
        }
        false
    }

    fn detach(&mut self, child: HandleId) {
        if let Some(parent) = self.parent(child) {
            if let Some(entry) = self.entries.get_mut(&parent) {
                entry.children.retain(|c| *c != child);
            }
        }
        if let Some(entry) = self.entries.get_mut(&child) {
            entry.parent = None;
        }
    }

    /// Drop `handle` and everything below it from the arena.
    fn free(&mut self, handle: HandleId) {
        let mut pending = vec![handle];
        while let Some(current) = pending.pop() {
            if let Some(entry) = self.entries.swap_remove(&current) {
                pending.extend(entry.children);
            }
        }
    }
}

impl Host for MemoryHost {
    fn create_element(&mut self, tag: &str) -> HandleId {
        let handle = self.create_container(tag);
        self.record(Mutation::CreateElement {
            handle,
            tag: tag.to_string(),
        });
        handle
    }

    fn create_text(&mut self, content: &str) -> HandleId {
        let handle = self.allocate(Content::Text(content.to_string()));
        self.record(Mutation::CreateText {
            handle,
            content: content.to_string(),
        });
        handle
    }

    fn create_anchor(&mut self) -> HandleId {
        let handle = self.allocate(Content::Anchor);
        self.record(Mutation::CreateAnchor { handle });
        handle
    }

    fn set_text(&mut self, handle: HandleId, content: &str) -> Result<(), HostError> {
        match &mut self.entry_mut(handle)?.content {
            Content::Text(current) => *current = content.to_string(),
            _ => return Err(HostError::NotText(handle)),
        }
        self.record(Mutation::SetText {
            handle,
            content: content.to_string(),
        });
        Ok(())
    }

    fn set_attribute(&mut self, handle: HandleId, name: &str, value: &str) -> Result<(), HostError> {
        let (attributes, _) = self.element_parts(handle)?;
        attributes.insert(name.to_string(), value.to_string());
        self.record(Mutation::SetAttribute {
            handle,
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn remove_attribute(&mut self, handle: HandleId, name: &str) -> Result<(), HostError> {
        let (attributes, _) = self.element_parts(handle)?;
        attributes.shift_remove(name);
        self.record(Mutation::RemoveAttribute {
            handle,
            name: name.to_string(),
        });
        Ok(())
    }

    fn add_listener(&mut self, handle: HandleId, event: &str, listener: Listener) -> Result<(), HostError> {
        let (_, listeners) = self.element_parts(handle)?;
        listeners.insert(event.to_string(), listener);
        self.record(Mutation::AddListener {
            handle,
            event: event.to_string(),
        });
        Ok(())
    }

    fn remove_listener(&mut self, handle: HandleId, event: &str) -> Result<(), HostError> {
        let (_, listeners) = self.element_parts(handle)?;
        listeners.shift_remove(event);
        self.record(Mutation::RemoveListener {
            handle,
            event: event.to_string(),
        });
        Ok(())
    }

    fn insert(&mut self, parent: HandleId, child: HandleId, before: Option<HandleId>) -> Result<(), HostError> {
        self.entry(child)?;
        if !matches!(self.entry(parent)?.content, Content::Element { .. }) {
            return Err(HostError::NotAnElement(parent));
        }
        if self.is_ancestor(child, parent) {
            return Err(HostError::Cycle { parent, child });
        }
        if let Some(reference) = before {
            if self.parent(reference) != Some(parent) || reference == child {
                return Err(HostError::NotAChild {
                    parent,
                    child: reference,
                });
            }
        }

        self.detach(child);
        let entry = self.entry_mut(parent)?;
        let index = before
            .and_then(|reference| entry.children.iter().position(|c| *c == reference))
            .unwrap_or(entry.children.len());
        entry.children.insert(index, child);
        self.entry_mut(child)?.parent = Some(parent);

        self.record(Mutation::Insert {
            parent,
            child,
            before,
        });
        Ok(())
    }

    fn remove(&mut self, parent: HandleId, child: HandleId) -> Result<(), HostError> {
        self.entry(parent)?;
        if self.entry(child)?.parent != Some(parent) {
            return Err(HostError::NotAChild { parent, child });
        }
        self.detach(child);
        self.free(child);
        self.record(Mutation::Remove { parent, child });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn builds_and_renders_a_tree() {
        let mut host = MemoryHost::new();
        let list = host.create_element("ul");
        let item = host.create_element("li");
        let label = host.create_text("a");
        host.set_attribute(item, "class", "first").unwrap();
        host.insert(item, label, None).unwrap();
        host.insert(list, item, None).unwrap();

        assert_eq!(host.render(list), r#"<ul><li class="first">a</li></ul>"#);
        assert_eq!(host.text_content(list), "a");
        assert_eq!(host.mutations().len(), 6);
    }

    #[test]
    fn insert_before_orders_children() {
        let mut host = MemoryHost::new();
        let parent = host.create_element("div");
        let a = host.create_text("a");
        let b = host.create_text("b");
        let c = host.create_text("c");
        host.insert(parent, a, None).unwrap();
        host.insert(parent, c, None).unwrap();
        host.insert(parent, b, Some(c)).unwrap();

        assert_eq!(host.children(parent), &[a, b, c]);
    }

    #[test]
    fn insert_moves_an_attached_child() {
        let mut host = MemoryHost::new();
        let left = host.create_element("div");
        let right = host.create_element("div");
        let child = host.create_element("span");
        host.insert(left, child, None).unwrap();
        host.insert(right, child, None).unwrap();

        assert!(host.children(left).is_empty());
        assert_eq!(host.parent(child), Some(right));
    }

    #[test]
    fn rejects_structural_violations() {
        let mut host = MemoryHost::new();
        let outer = host.create_element("div");
        let inner = host.create_element("div");
        let text = host.create_text("x");
        host.insert(outer, inner, None).unwrap();

        assert_eq!(
            host.insert(inner, outer, None),
            Err(HostError::Cycle {
                parent: inner,
                child: outer
            })
        );
        assert_eq!(
            host.remove(inner, text),
            Err(HostError::NotAChild {
                parent: inner,
                child: text
            })
        );
        assert_eq!(host.insert(text, inner, None), Err(HostError::NotAnElement(text)));
        assert_eq!(
            host.set_attribute(HandleId::from(999), "a", "b"),
            Err(HostError::UnknownHandle(HandleId::from(999)))
        );
    }

    #[test]
    fn dispatch_invokes_listener() {
        let mut host = MemoryHost::new();
        let button = host.create_element("button");
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        host.add_listener(button, "click", Listener::new(move |_| counter.set(counter.get() + 1)))
            .unwrap();

        assert!(host.dispatch(button, "click").unwrap());
        assert!(!host.dispatch(button, "keydown").unwrap());
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn removal_frees_the_subtree() {
        let mut host = MemoryHost::new();
        let root = host.create_container("body");
        let list = host.create_element("ul");
        let item = host.create_element("li");
        let label = host.create_text("a");
        host.insert(item, label, None).unwrap();
        host.insert(list, item, None).unwrap();
        host.insert(root, list, None).unwrap();
        assert_eq!(host.handle_count(), 4);

        host.remove(root, list).unwrap();

        assert_eq!(host.handle_count(), 1);
        for handle in [list, item, label] {
            assert!(!host.contains(handle));
        }
        assert_eq!(
            host.set_text(label, "b"),
            Err(HostError::UnknownHandle(label))
        );
        assert_eq!(host.render(root), "<body></body>");
    }

    #[test]
    fn container_creation_is_not_logged() {
        let mut host = MemoryHost::new();
        let root = host.create_container("main");
        assert!(host.mutations().is_empty());
        assert_eq!(host.tag(root), Some("main"));
    }

    #[test]
    fn mutation_log_serializes_to_json() {
        let mut host = MemoryHost::new();
        host.create_anchor();
        let json = host.mutations_json().unwrap();
        assert!(json.contains("\"op\": \"create_anchor\""));
    }
}
