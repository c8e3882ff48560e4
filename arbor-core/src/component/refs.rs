//! Ref Registry
//!
//! Maps declared ref names to the live thing at that position: a component
//! instance for stateful nodes, a raw host handle for everything else. Each
//! instance owns one registry for the nodes its render output declares; a
//! root owns one for the top-level tree. The differ keeps entries in step
//! with creation, reuse, replacement and removal.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::ComponentHandle;
use crate::host::HandleId;
use crate::node::{Node, NodeKind};

/// A live child reachable by its declared ref name.
#[derive(Clone)]
pub enum Ref {
    Instance(ComponentHandle),
    Handle(HandleId),
}

impl Ref {
    /// The ref a materialized node should be registered under.
    pub(crate) fn of(node: &Node) -> Option<Ref> {
        match &node.kind {
            NodeKind::Stateful(stateful) if stateful.instance.is_some() => {
                stateful.instance.clone().map(Ref::Instance)
            }
            _ => node.first_handle().map(Ref::Handle),
        }
    }

    pub fn as_instance(&self) -> Option<&ComponentHandle> {
        match self {
            Ref::Instance(instance) => Some(instance),
            Ref::Handle(_) => None,
        }
    }

    pub fn as_handle(&self) -> Option<HandleId> {
        match self {
            Ref::Handle(handle) => Some(*handle),
            Ref::Instance(_) => None,
        }
    }

    /// Whether both refs point at the same live thing.
    pub fn same(&self, other: &Ref) -> bool {
        match (self, other) {
            (Ref::Instance(a), Ref::Instance(b)) => a.ptr_eq(b),
            (Ref::Handle(a), Ref::Handle(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Instance(instance) => write!(f, "Instance({})", instance.id()),
            Ref::Handle(handle) => write!(f, "Handle({handle})"),
        }
    }
}

/// Shared name-to-ref map.
#[derive(Clone, Default)]
pub(crate) struct RefRegistry(Rc<RefCell<IndexMap<String, Ref>>>);

impl RefRegistry {
    pub(crate) fn get(&self, name: &str) -> Option<Ref> {
        self.0.borrow().get(name).cloned()
    }

    /// Register whatever `node` resolves to under its declared ref name.
    pub(crate) fn register(&self, node: &Node) {
        let (Some(name), Some(target)) = (node.ref_name(), Ref::of(node)) else {
            return;
        };
        self.0.borrow_mut().insert(name.to_string(), target);
    }

    /// Drop the entry for `node`, unless the name now points elsewhere.
    pub(crate) fn unregister(&self, node: &Node) {
        let Some(name) = node.ref_name() else {
            return;
        };
        let mut refs = self.0.borrow_mut();
        let stale = match (refs.get(name), Ref::of(node)) {
            (Some(current), Some(target)) => current.same(&target),
            (Some(_), None) => true,
            (None, _) => false,
        };
        if stale {
            refs.shift_remove(name);
        }
    }

    /// Move a ref after a node was patched in place.
    pub(crate) fn rename(&self, previous: Option<&str>, node: &Node) {
        if let Some(previous) = previous {
            if Some(previous) != node.ref_name() {
                self.0.borrow_mut().shift_remove(previous);
            }
        }
        self.register(node);
    }

    pub(crate) fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.0.borrow().len()
    }
}

impl fmt::Debug for RefRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.borrow().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{element, Props};

    fn materialized(name: &str, handle: u64) -> Node {
        let mut node = element("div", Props::new().with("ref", name), vec![]);
        if let NodeKind::Element(el) = &mut node.kind {
            el.handle = Some(HandleId::from(handle));
        }
        node
    }

    #[test]
    fn register_and_unregister() {
        let refs = RefRegistry::default();
        let node = materialized("box", 3);
        refs.register(&node);
        assert_eq!(refs.get("box").and_then(|r| r.as_handle()), Some(HandleId::from(3)));

        refs.unregister(&node);
        assert!(refs.get("box").is_none());
    }

    #[test]
    fn unregister_keeps_entry_claimed_by_newer_node() {
        let refs = RefRegistry::default();
        let old = materialized("box", 3);
        let new = materialized("box", 9);
        refs.register(&old);
        refs.register(&new);

        refs.unregister(&old);
        assert_eq!(refs.get("box").and_then(|r| r.as_handle()), Some(HandleId::from(9)));
    }

    #[test]
    fn rename_moves_the_entry() {
        let refs = RefRegistry::default();
        let node = materialized("after", 5);
        refs.register(&materialized("before", 5));

        refs.rename(Some("before"), &node);
        assert_eq!(refs.names(), vec!["after".to_string()]);
        assert_eq!(refs.len(), 1);
    }

    #[test]
    fn nodes_without_ref_name_are_ignored() {
        let refs = RefRegistry::default();
        refs.register(&element("div", Props::new(), vec![]));
        assert_eq!(refs.len(), 0);
    }
}
