//! Component Instances
//!
//! An instance is the persistent runtime object behind a stateful node. It
//! holds the current props, the slots captured at construction, the
//! child-ref registry, context values it provided, the subtree it rendered
//! last and where that subtree is attached.
//!
//! # Phases
//!
//! ```text
//! Idle -> Mounting -> Idle -> (Updating -> Idle)* -> Unmounting -> Idle (inert)
//! ```
//!
//! Any lifecycle entry point called while the phase is not `Idle` is
//! rejected with a warning and does nothing. This is what stops a hook
//! from re-entering its own instance in the middle of a diff.
//!
//! The user component and the instance bookkeeping sit in separate cells:
//! the component is borrowed while its code runs, the bookkeeping only for
//! short, non-reentrant reads and writes.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::warn;

use super::context::ContextValues;
use super::{Component, ComponentType, ContextFrame, ContextKey, Ref, RefRegistry};
use crate::error::Error;
use crate::host::{HandleId, Handles, Host};
use crate::node::{extract_slots, Node, Props};
use crate::render::{Pass, Renderer};

/// Debugging identity of an instance, unique per [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Allocator for [`InstanceId`]s, owned by a renderer.
#[derive(Debug, Default)]
pub struct InstanceIds {
    next: Cell<u64>,
}

impl InstanceIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next unused ID.
    pub fn next_id(&self) -> InstanceId {
        let id = self.next.get();
        self.next.set(id + 1);
        InstanceId(id)
    }

    /// How many IDs have been handed out.
    pub fn allocated(&self) -> u64 {
        self.next.get()
    }
}

/// Lifecycle phase of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Mounting,
    Updating,
    Unmounting,
}

/// Whether a lifecycle call did anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// Rejected by the phase guard; see the logged warning.
    Rejected,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        *self == UpdateOutcome::Applied
    }
}

/// Where an instance's subtree lives: under `parent`, ending just before
/// `anchor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttachPoint {
    pub(crate) parent: HandleId,
    pub(crate) anchor: HandleId,
    /// False when the anchor was a caller-provided placeholder.
    pub(crate) owns_anchor: bool,
}

pub(crate) struct InstanceState {
    pub(crate) props: Props,
    pub(crate) slots: IndexMap<String, Vec<Node>>,
    pub(crate) provided: ContextValues,
    pub(crate) frame: Option<ContextFrame>,
    pub(crate) rendered: Option<Node>,
    pub(crate) attach: Option<AttachPoint>,
    pub(crate) phase: Phase,
    pub(crate) mounted: bool,
    pub(crate) unmounted: bool,
    /// Released by a parent while busy: unmount, detaching or not, once
    /// back to `Idle`.
    pub(crate) pending_unmount: Option<bool>,
}

pub(crate) struct Instance {
    pub(crate) id: InstanceId,
    pub(crate) ty: ComponentType,
    pub(crate) parent: Option<Weak<Instance>>,
    pub(crate) component: RefCell<Box<dyn Component>>,
    pub(crate) state: RefCell<InstanceState>,
    pub(crate) refs: RefRegistry,
}

/// Shared reference to a live component instance.
#[derive(Clone)]
pub struct ComponentHandle(pub(crate) Rc<Instance>);

impl ComponentHandle {
    pub(crate) fn new(
        id: InstanceId,
        ty: ComponentType,
        component: Box<dyn Component>,
        props: Props,
        children: &[Node],
        parent: Option<&ComponentHandle>,
        frame: Option<ContextFrame>,
    ) -> Self {
        Self(Rc::new(Instance {
            id,
            ty,
            parent: parent.map(|parent| Rc::downgrade(&parent.0)),
            component: RefCell::new(component),
            state: RefCell::new(InstanceState {
                props,
                slots: extract_slots(children),
                provided: ContextValues::new(),
                frame,
                rendered: None,
                attach: None,
                phase: Phase::Idle,
                mounted: false,
                unmounted: false,
                pending_unmount: None,
            }),
            refs: RefRegistry::default(),
        }))
    }

    pub fn id(&self) -> InstanceId {
        self.0.id
    }

    pub fn type_name(&self) -> &'static str {
        self.0.ty.name()
    }

    pub fn phase(&self) -> Phase {
        self.0.state.borrow().phase
    }

    /// Current props. Replaced wholesale by every update.
    pub fn props(&self) -> Props {
        self.0.state.borrow().props.clone()
    }

    /// Whether the mounted hook has run and the instance is not unmounted.
    pub fn is_mounted(&self) -> bool {
        let state = self.0.state.borrow();
        state.mounted && !state.unmounted
    }

    pub fn is_unmounted(&self) -> bool {
        self.0.state.borrow().unmounted
    }

    /// The live child registered under `name` by this instance's render.
    pub fn child_ref(&self, name: &str) -> Option<Ref> {
        self.0.refs.get(name)
    }

    pub fn ref_names(&self) -> Vec<String> {
        self.0.refs.names()
    }

    pub(crate) fn refs(&self) -> &RefRegistry {
        &self.0.refs
    }

    /// The parent instance, if it is still alive.
    pub fn parent(&self) -> Option<ComponentHandle> {
        self.0.parent.as_ref()?.upgrade().map(ComponentHandle)
    }

    /// Handles of the rendered subtree followed by the anchor.
    pub fn handles(&self) -> Handles {
        let state = self.0.state.borrow();
        let mut handles = state
            .rendered
            .as_ref()
            .map(Node::handles)
            .unwrap_or_default();
        if let Some(attach) = state.attach {
            handles.push(attach.anchor);
        }
        handles
    }

    /// First of [`handles`](Self::handles) without collecting the rest.
    pub fn first_handle(&self) -> Option<HandleId> {
        let state = self.0.state.borrow();
        state
            .rendered
            .as_ref()
            .and_then(Node::first_handle)
            .or(state.attach.map(|attach| attach.anchor))
    }

    /// The anchor marking the end of this instance's subtree.
    pub fn anchor(&self) -> Option<HandleId> {
        self.0.state.borrow().attach.map(|attach| attach.anchor)
    }

    /// A description of the subtree rendered last.
    pub fn rendered(&self) -> Option<Node> {
        self.0.state.borrow().rendered.clone()
    }

    pub fn slot(&self, name: &str) -> Vec<Node> {
        self.0
            .state
            .borrow()
            .slots
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn provide<T: Any>(&self, key: impl Into<ContextKey>, value: T) {
        self.0
            .state
            .borrow_mut()
            .provided
            .insert(key.into(), Rc::new(value));
    }

    /// Resolve a context value visible from this instance.
    pub fn context<T: Any>(&self, key: impl Into<ContextKey>) -> Option<Rc<T>> {
        self.lookup(&key.into())?.downcast::<T>().ok()
    }

    fn lookup(&self, key: &ContextKey) -> Option<Rc<dyn Any>> {
        let found = {
            let state = self.0.state.borrow();
            state
                .provided
                .get(key)
                .cloned()
                .or_else(|| state.frame.as_ref().and_then(|frame| frame.lookup(key)))
        };
        found.or_else(|| self.parent()?.lookup(key))
    }

    pub(crate) fn set_frame(&self, frame: Option<ContextFrame>) {
        self.0.state.borrow_mut().frame = frame;
    }

    pub fn ptr_eq(&self, other: &ComponentHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Mount this instance under `container`.
    ///
    /// With a `placeholder`, the subtree is inserted before it and the
    /// placeholder becomes the instance's anchor; otherwise a fresh anchor
    /// is appended after the subtree.
    pub fn mount(
        &self,
        renderer: &Renderer,
        host: &mut dyn Host,
        container: HandleId,
        placeholder: Option<HandleId>,
    ) -> Result<UpdateOutcome, Error> {
        let mut pass = Pass::new(renderer, host);
        let Some(mounted) = pass.materialize_instance(self, container, placeholder)? else {
            return Ok(UpdateOutcome::Rejected);
        };
        for handle in mounted.inner {
            pass.host.insert(container, handle, placeholder)?;
        }
        if placeholder.is_none() {
            pass.host.insert(container, mounted.anchor, None)?;
        }
        pass.flush_mounted()?;
        Ok(UpdateOutcome::Applied)
    }

    /// Re-render with `props`, or with the current props when `None`.
    pub fn update(
        &self,
        renderer: &Renderer,
        host: &mut dyn Host,
        props: Option<Props>,
    ) -> Result<UpdateOutcome, Error> {
        Pass::new(renderer, host).update_instance(self, props, None)
    }

    /// Like [`update`](Self::update), but also re-extract slots from
    /// `children`.
    pub fn update_with_slots(
        &self,
        renderer: &Renderer,
        host: &mut dyn Host,
        props: Option<Props>,
        children: Vec<Node>,
    ) -> Result<UpdateOutcome, Error> {
        Pass::new(renderer, host).update_instance(self, props, Some(children))
    }

    /// Run `before_unmount`, release the subtree and make the instance inert.
    pub fn unmount(&self, renderer: &Renderer, host: &mut dyn Host) -> Result<UpdateOutcome, Error> {
        Pass::new(renderer, host).unmount_instance(self, true)
    }

    /// Record an unmount that arrives while a mount or update of this
    /// instance is still running. Returns whether it was recorded.
    pub(crate) fn defer_unmount(&self, detach: bool) -> bool {
        let mut state = self.0.state.borrow_mut();
        let busy = matches!(state.phase, Phase::Mounting | Phase::Updating);
        if !busy || state.unmounted || state.attach.is_none() || state.pending_unmount.is_some() {
            return false;
        }
        state.pending_unmount = Some(detach);
        true
    }

    /// Check that a lifecycle transition may start, logging why not.
    pub(crate) fn admit(&self, operation: &'static str) -> bool {
        let state = self.0.state.borrow();
        let reason = if state.phase != Phase::Idle {
            "instance is busy"
        } else if state.unmounted {
            "instance is unmounted"
        } else {
            return true;
        };
        warn!(
            instance = %self.0.id,
            component = self.type_name(),
            phase = ?state.phase,
            operation,
            "rejected lifecycle call: {reason}"
        );
        false
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("ComponentHandle");
        debug.field("id", &self.0.id).field("type", &self.type_name());
        match self.0.state.try_borrow() {
            Ok(state) => debug
                .field("phase", &state.phase)
                .field("props", &state.props)
                .finish(),
            Err(_) => debug.finish_non_exhaustive(),
        }
    }
}

/// Puts an instance into a phase and returns it to `Idle` when dropped.
///
/// Keeps the state machine consistent when a pass bails out early with a
/// host error.
pub(crate) struct PhaseGuard<'a> {
    instance: &'a Instance,
    armed: bool,
}

impl<'a> PhaseGuard<'a> {
    pub(crate) fn enter(handle: &'a ComponentHandle, phase: Phase) -> Self {
        handle.0.state.borrow_mut().phase = phase;
        Self {
            instance: &handle.0,
            armed: true,
        }
    }

    /// Leave the phase in place on drop; someone else will finish it.
    pub(crate) fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.instance.state.try_borrow_mut() {
            state.phase = Phase::Idle;
        }
    }
}
