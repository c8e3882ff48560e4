//! Differ
//!
//! Reconciles the node that was at a position last pass against the node
//! that is there now, in place. Matching is positional: child `i` of the
//! new list is compared with child `i` of the old one, never by key.
//!
//! For each pair:
//!
//! 1. nothing on either side: nothing to do;
//! 2. only old: release it;
//! 3. only new: materialize it and attach it;
//! 4. old is detached: carry the old subtree forward untouched;
//! 5. new is detached: patch as usual, the marker sticks from now on;
//! 6. same stateful component type: reuse the instance and update it,
//!    unless the new node is detached;
//! 7. different kinds, tags or component types: replace;
//! 8. same kind otherwise: patch the element, text, fragment or function
//!    output in place;
//! 9. replacement means release old, materialize new, attach new where old
//!    was.
//!
//! Every insertion carries a `before` reference so new handles land at
//! their position among live siblings, including the tail of a stateful
//! instance whose subtree is bounded by its anchor.

use indexmap::IndexMap;
use tracing::trace;

use super::{Pass, Scope};
use crate::error::Error;
use crate::host::{HandleId, Handles};
use crate::node::{AttrValue, ElementNode, Listener, Node, NodeKind};

impl Pass<'_> {
    /// Bring the host in line with `new` at the position `old` held.
    ///
    /// `parent` is the host parent of the position and `before` the first
    /// live handle after it (or `None` at the end of the parent). Returns
    /// the handles now owned by the position.
    pub(crate) fn reconcile(
        &mut self,
        parent: HandleId,
        old: Option<Node>,
        new: Option<&mut Node>,
        before: Option<HandleId>,
        scope: &Scope,
    ) -> Result<Handles, Error> {
        match (old, new) {
            (None, None) => Ok(Handles::new()),
            (Some(old), None) => {
                self.release(old, parent, true, scope)?;
                Ok(Handles::new())
            }
            (None, Some(new)) => self.attach(new, parent, before, scope),
            (Some(old), Some(new)) => self.patch(old, new, parent, before, scope),
        }
    }

    fn attach(&mut self, node: &mut Node, parent: HandleId, before: Option<HandleId>, scope: &Scope) -> Result<Handles, Error> {
        let handles = self.materialize(node, parent, scope)?;
        for handle in &handles {
            self.host.insert(parent, *handle, before)?;
        }
        Ok(handles)
    }

    fn patch(
        &mut self,
        old: Node,
        new: &mut Node,
        parent: HandleId,
        before: Option<HandleId>,
        scope: &Scope,
    ) -> Result<Handles, Error> {
        if old.meta.detached {
            trace!(kind = old.kind_name(), "keeping detached subtree");
            *new = old;
            return Ok(new.handles());
        }

        let inner = scope.enter(new);
        let skip_update = new.meta.detached;
        let Node { kind, meta } = old;
        let previous_ref = meta.ref_name.clone();

        let unmatched = match (kind, &mut new.kind) {
            (NodeKind::Stateful(old), NodeKind::Stateful(next))
                if old.instance.is_some() && old.component.same_type(&next.component) =>
            {
                if let Some(instance) = old.instance {
                    instance.set_frame(inner.frame.clone());
                    next.instance = Some(instance.clone());
                    if !skip_update {
                        self.update_instance(&instance, Some(next.props.clone()), None)?;
                    }
                }
                None
            }
            (NodeKind::Element(old), NodeKind::Element(next)) if old.tag == next.tag => {
                self.patch_element(old, next, &inner)?;
                None
            }
            (NodeKind::Text(old), NodeKind::Text(next)) => {
                let handle = old.handle.ok_or(Error::Unmaterialized("text"))?;
                if old.content != next.content {
                    self.host.set_text(handle, &next.content)?;
                }
                next.handle = Some(handle);
                None
            }
            (NodeKind::Fragment(old), NodeKind::Fragment(next)) => {
                self.reconcile_children(parent, old.children, &mut next.children, before, &inner)?;
                None
            }
            (NodeKind::Function(old), NodeKind::Function(next))
                if old.component.same_type(&next.component) =>
            {
                let mut output = self.render_function(next);
                let previous = old.rendered.map(|rendered| *rendered);
                let result = self.nested(|pass| {
                    pass.reconcile(parent, previous, Some(&mut output), before, &inner)
                });
                next.rendered = Some(Box::new(output));
                result?;
                None
            }
            (kind, _) => Some(Node { kind, meta }),
        };

        match unmatched {
            None => {
                scope.refs.rename(previous_ref.as_deref(), new);
                Ok(new.handles())
            }
            Some(old) => {
                trace!(from = old.kind_name(), to = new.kind_name(), "replacing node");
                self.release(old, parent, true, scope)?;
                self.attach(new, parent, before, scope)
            }
        }
    }

    fn patch_element(&mut self, old: ElementNode, new: &mut ElementNode, scope: &Scope) -> Result<(), Error> {
        let handle = old.handle.ok_or(Error::Unmaterialized("element"))?;
        new.handle = Some(handle);
        self.patch_attributes(handle, &old.attributes, &new.attributes)?;
        self.patch_listeners(handle, &old.listeners, &new.listeners)?;
        self.reconcile_children(handle, old.children, &mut new.children, None, scope)
    }

    /// Pair children by index. Surplus old children are released, surplus
    /// new ones are attached in front of `before`.
    fn reconcile_children(
        &mut self,
        parent: HandleId,
        old: Vec<Node>,
        new: &mut [Node],
        before: Option<HandleId>,
        scope: &Scope,
    ) -> Result<(), Error> {
        // following[i]: first live handle after old child i.
        let mut following = vec![before; old.len()];
        let mut next = before;
        for (index, node) in old.iter().enumerate().rev() {
            following[index] = next;
            next = node.first_handle().or(next);
        }

        let mut old: Vec<Option<Node>> = old.into_iter().map(Some).collect();
        for (index, child) in new.iter_mut().enumerate() {
            let previous = old.get_mut(index).and_then(Option::take);
            let next = following.get(index).copied().unwrap_or(before);
            self.reconcile(parent, previous, Some(child), next, scope)?;
        }
        for stale in old.into_iter().skip(new.len()).flatten() {
            self.release(stale, parent, true, scope)?;
        }
        Ok(())
    }

    /// Apply only the attributes whose host value changed.
    fn patch_attributes(
        &mut self,
        handle: HandleId,
        old: &IndexMap<String, AttrValue>,
        new: &IndexMap<String, AttrValue>,
    ) -> Result<(), Error> {
        for (name, value) in new {
            let next = value.to_host_value();
            let previous = old.get(name).and_then(AttrValue::to_host_value);
            if next == previous {
                continue;
            }
            match next {
                Some(next) => self.host.set_attribute(handle, name, &next)?,
                None => self.host.remove_attribute(handle, name)?,
            }
        }
        for (name, value) in old {
            if !new.contains_key(name) && value.to_host_value().is_some() {
                self.host.remove_attribute(handle, name)?;
            }
        }
        Ok(())
    }

    fn patch_listeners(
        &mut self,
        handle: HandleId,
        old: &IndexMap<String, Listener>,
        new: &IndexMap<String, Listener>,
    ) -> Result<(), Error> {
        for (event, listener) in new {
            match old.get(event) {
                Some(previous) if previous.same(listener) => continue,
                Some(_) => {
                    self.host.remove_listener(handle, event)?;
                    self.host.add_listener(handle, event, listener.clone())?;
                }
                None => self.host.add_listener(handle, event, listener.clone())?,
            }
        }
        for event in old.keys() {
            if !new.contains_key(event) {
                self.host.remove_listener(handle, event)?;
            }
        }
        Ok(())
    }

    /// Tear down a node that left the tree.
    ///
    /// With `detach` the node's top-level handles are removed from `parent`;
    /// descendants are never removed one by one, they go with their
    /// ancestor. Instances anywhere below are unmounted either way.
    pub(crate) fn release(&mut self, node: Node, parent: HandleId, detach: bool, scope: &Scope) -> Result<(), Error> {
        scope.refs.unregister(&node);
        match node.kind {
            NodeKind::Element(element) => {
                let handle = element.handle;
                for child in element.children {
                    self.release(child, handle.unwrap_or(parent), false, scope)?;
                }
                if let (true, Some(handle)) = (detach, handle) {
                    self.host.remove(parent, handle)?;
                }
            }
            NodeKind::Text(text) => {
                if let (true, Some(handle)) = (detach, text.handle) {
                    self.host.remove(parent, handle)?;
                }
            }
            NodeKind::Fragment(fragment) => {
                for child in fragment.children {
                    self.release(child, parent, detach, scope)?;
                }
            }
            NodeKind::Function(function) => {
                if let Some(rendered) = function.rendered {
                    self.release(*rendered, parent, detach, scope)?;
                }
            }
            NodeKind::Stateful(stateful) => {
                if let Some(instance) = stateful.instance {
                    self.unmount_instance(&instance, detach)?;
                } else if let Some(fallback) = stateful.fallback {
                    self.release(*fallback, parent, detach, scope)?;
                }
            }
        }
        Ok(())
    }
}
