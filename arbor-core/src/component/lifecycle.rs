//! Lifecycle Manager
//!
//! Drives an instance through mount, update and unmount on behalf of a
//! [`Pass`], and fires the component hooks at the right moment:
//!
//! - `mounted` after the instance and its whole subtree are attached, in
//!   post-order across the pass;
//! - `updated` after the instance's new output has been reconciled, with
//!   the props it replaced;
//! - `before_unmount` before anything of the subtree is released.
//!
//! Hooks run while the instance is still in its `Mounting`, `Updating` or
//! `Unmounting` phase, so a hook that tries to drive its own instance is
//! rejected by the phase guard instead of re-entering the diff.

use std::mem;

use tracing::{debug, error, warn};

use super::instance::PhaseGuard;
use super::{AttachPoint, ComponentHandle, HookContext, Phase, RenderContext, UpdateOutcome};
use crate::error::{ComponentError, Error};
use crate::host::{HandleId, Handles};
use crate::node::{extract_slots, Node, Props};
use crate::render::{isolate, Pass, Scope};

/// Handles produced by mounting an instance.
pub(crate) struct Mounted {
    /// The rendered subtree's top-level handles, not yet attached.
    pub(crate) inner: Handles,
    pub(crate) anchor: HandleId,
}

enum Hook<'p> {
    Mounted,
    Updated(&'p Props),
    BeforeUnmount,
}

impl Hook<'_> {
    fn name(&self) -> &'static str {
        match self {
            Hook::Mounted => "mounted",
            Hook::Updated(_) => "updated",
            Hook::BeforeUnmount => "before_unmount",
        }
    }
}

impl Pass<'_> {
    /// Render an instance for the first time and materialize its output.
    ///
    /// The caller attaches the returned handles under `parent`. With a
    /// `placeholder` the caller inserts them before it and the placeholder
    /// becomes the anchor; otherwise a fresh anchor is created and must be
    /// attached right after them. Returns `None` when the instance is not
    /// in a state that allows mounting.
    pub(crate) fn materialize_instance(
        &mut self,
        handle: &ComponentHandle,
        parent: HandleId,
        placeholder: Option<HandleId>,
    ) -> Result<Option<Mounted>, Error> {
        if !handle.admit("mount") {
            return Ok(None);
        }
        if handle.0.state.borrow().attach.is_some() {
            warn!(instance = %handle.id(), component = handle.type_name(), "rejected mount: instance is already mounted");
            return Ok(None);
        }

        let guard = PhaseGuard::enter(handle, Phase::Mounting);
        let mut rendered = self.render_instance(handle);
        let scope = Scope::for_instance(handle);
        let inner = self.nested(|pass| pass.materialize(&mut rendered, parent, &scope))?;
        let anchor = match placeholder {
            Some(placeholder) => placeholder,
            None => self.host.create_anchor(),
        };

        {
            let mut state = handle.0.state.borrow_mut();
            state.rendered = Some(rendered);
            state.attach = Some(AttachPoint {
                parent,
                anchor,
                owns_anchor: placeholder.is_none(),
            });
        }
        self.mounted.push(handle.clone());
        guard.keep();

        debug!(instance = %handle.id(), component = handle.type_name(), %anchor, "materialized instance");
        Ok(Some(Mounted { inner, anchor }))
    }

    /// Run the component's render, substituting a placeholder on failure.
    fn render_instance(&mut self, handle: &ComponentHandle) -> Node {
        let result = self.check_depth().and_then(|()| {
            let component = handle
                .0
                .component
                .try_borrow()
                .map_err(|_| ComponentError::Busy)?;
            let mut cx = RenderContext::new(handle);
            isolate(|| component.render(&mut cx))
        });
        match result {
            Ok(node) => Node::normalize(node),
            Err(err) => self.renderer.error_node(handle.type_name(), &err),
        }
    }

    /// Fire `mounted` for every queued instance and return them to `Idle`.
    pub(crate) fn flush_mounted(&mut self) -> Result<(), Error> {
        for handle in mem::take(&mut self.mounted) {
            self.fire_hook(&handle, Hook::Mounted);
            {
                let mut state = handle.0.state.borrow_mut();
                state.phase = Phase::Idle;
                state.mounted = true;
            }
            self.finish_deferred_unmount(&handle)?;
        }
        Ok(())
    }

    /// Re-render a mounted instance and reconcile its output in place.
    ///
    /// `props` replaces the current props wholesale when given. `children`,
    /// when given, re-derives the slots.
    pub(crate) fn update_instance(
        &mut self,
        handle: &ComponentHandle,
        props: Option<Props>,
        children: Option<Vec<Node>>,
    ) -> Result<UpdateOutcome, Error> {
        if !handle.admit("update") {
            return Ok(UpdateOutcome::Rejected);
        }
        let attach = handle.0.state.borrow().attach;
        let Some(attach) = attach else {
            warn!(instance = %handle.id(), component = handle.type_name(), "rejected update: instance is not mounted");
            return Ok(UpdateOutcome::Rejected);
        };

        let guard = PhaseGuard::enter(handle, Phase::Updating);
        let (previous, old) = {
            let mut state = handle.0.state.borrow_mut();
            let previous = match props {
                Some(props) => mem::replace(&mut state.props, props),
                None => state.props.clone(),
            };
            if let Some(children) = &children {
                state.slots = extract_slots(children);
            }
            (previous, state.rendered.take())
        };

        let mut next = self.render_instance(handle);
        let scope = Scope::for_instance(handle);
        let outer = mem::take(&mut self.mounted);
        let result = self.nested(|pass| {
            pass.reconcile(attach.parent, old, Some(&mut next), Some(attach.anchor), &scope)
        });
        handle.0.state.borrow_mut().rendered = Some(next);
        let result = result.and_then(|_| self.flush_mounted());
        self.mounted = outer;
        result?;

        self.fire_hook(handle, Hook::Updated(&previous));
        drop(guard);
        debug!(instance = %handle.id(), component = handle.type_name(), "updated instance");
        self.finish_deferred_unmount(handle)?;
        Ok(UpdateOutcome::Applied)
    }

    /// Run `before_unmount`, release the rendered subtree and make the
    /// instance inert.
    ///
    /// With `detach` the subtree's handles and an owned anchor are removed
    /// from the parent; without it they are left for an ancestor's removal.
    ///
    /// An instance that is still mounting or updating further up the stack
    /// is only marked; the unmount runs as soon as it is back to `Idle`.
    pub(crate) fn unmount_instance(&mut self, handle: &ComponentHandle, detach: bool) -> Result<UpdateOutcome, Error> {
        if handle.defer_unmount(detach) {
            warn!(instance = %handle.id(), component = handle.type_name(), "deferred unmount: instance is busy");
            return Ok(UpdateOutcome::Rejected);
        }
        if !handle.admit("unmount") {
            return Ok(UpdateOutcome::Rejected);
        }
        let attach = handle.0.state.borrow().attach;
        let Some(attach) = attach else {
            warn!(instance = %handle.id(), component = handle.type_name(), "rejected unmount: instance is not mounted");
            return Ok(UpdateOutcome::Rejected);
        };

        let _guard = PhaseGuard::enter(handle, Phase::Unmounting);
        self.fire_hook(handle, Hook::BeforeUnmount);

        let rendered = {
            let mut state = handle.0.state.borrow_mut();
            state.attach = None;
            state.rendered.take()
        };
        let scope = Scope::for_instance(handle);
        if let Some(rendered) = rendered {
            self.release(rendered, attach.parent, detach, &scope)?;
        }
        if detach && attach.owns_anchor {
            self.host.remove(attach.parent, attach.anchor)?;
        }
        handle.refs().clear();
        handle.0.state.borrow_mut().unmounted = true;

        debug!(instance = %handle.id(), component = handle.type_name(), "unmounted instance");
        Ok(UpdateOutcome::Applied)
    }

    /// Complete an unmount requested while `handle` was busy.
    fn finish_deferred_unmount(&mut self, handle: &ComponentHandle) -> Result<(), Error> {
        let pending = handle.0.state.borrow_mut().pending_unmount.take();
        if let Some(detach) = pending {
            debug!(instance = %handle.id(), component = handle.type_name(), "running deferred unmount");
            self.unmount_instance(handle, detach)?;
        }
        Ok(())
    }

    fn fire_hook(&mut self, handle: &ComponentHandle, hook: Hook<'_>) {
        let name = hook.name();
        let Ok(mut component) = handle.0.component.try_borrow_mut() else {
            warn!(instance = %handle.id(), component = handle.type_name(), hook = name, "skipped hook: component is busy");
            return;
        };
        let mut cx = HookContext::new(handle, self.renderer, &mut *self.host);
        let result = isolate(|| match hook {
            Hook::Mounted => component.mounted(&mut cx),
            Hook::Updated(previous) => component.updated(previous, &mut cx),
            Hook::BeforeUnmount => component.before_unmount(&mut cx),
        });
        if let Err(err) = result {
            error!(instance = %handle.id(), component = handle.type_name(), hook = name, error = %err, "lifecycle hook failed");
        }
    }
}
