//! Components
//!
//! Two flavors of component exist:
//!
//! - Function components: any `Fn(&Props, &[Node]) -> RenderResult`. They
//!   are pure and keep no state between passes beyond the subtree they
//!   produced last.
//! - Stateful components: types implementing [`Component`]. Each position
//!   in the tree that holds one gets a persistent instance, reachable
//!   through a [`ComponentHandle`], which runs through the lifecycle
//!   `mount -> update* -> unmount` and calls back into the component's
//!   hooks.
//!
//! Identity of a component ("declared type") is its Rust `TypeId`: the
//! component type for stateful components, the closure type for function
//! components. Two nodes built from the same closure expression are the
//! same function component.

mod context;
mod instance;
mod lifecycle;
mod refs;

pub use context::{ContextFrame, ContextKey};
pub use instance::{ComponentHandle, InstanceId, InstanceIds, Phase, UpdateOutcome};
pub use refs::Ref;

pub(crate) use instance::AttachPoint;
pub(crate) use refs::RefRegistry;

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::rc::Rc;

use crate::error::{ComponentError, Error};
use crate::host::Host;
use crate::node::{Node, Props};
use crate::render::Renderer;

/// Result of a render: `Ok(None)` means "render nothing".
pub type RenderResult = Result<Option<Node>, ComponentError>;

/// Result of a lifecycle hook.
pub type HookResult = Result<(), ComponentError>;

/// A stateful component.
///
/// Hooks are fire-and-forget from the engine's point of view. A hook that
/// needs to do asynchronous work should start it and keep a
/// [`ComponentHandle`] (from [`HookContext::handle`]) to update the instance
/// once the work completes; by then the instance may be in any phase.
pub trait Component: 'static {
    /// Construct the component from its initial props.
    fn create(props: &Props) -> Self
    where
        Self: Sized;

    /// Describe the subtree this component currently wants on screen.
    fn render(&self, cx: &mut RenderContext<'_>) -> RenderResult;

    /// Called once, after this instance and all of its descendants are
    /// attached.
    fn mounted(&mut self, cx: &mut HookContext<'_>) -> HookResult {
        let _ = cx;
        Ok(())
    }

    /// Called after every applied update with the props it replaced.
    fn updated(&mut self, prev_props: &Props, cx: &mut HookContext<'_>) -> HookResult {
        let _ = (prev_props, cx);
        Ok(())
    }

    /// Called before the instance's subtree is released.
    fn before_unmount(&mut self, cx: &mut HookContext<'_>) -> HookResult {
        let _ = cx;
        Ok(())
    }
}

/// Declared type of a stateful component.
#[derive(Clone, Copy)]
pub struct ComponentType {
    id: TypeId,
    name: &'static str,
    construct: fn(&Props) -> Box<dyn Component>,
}

fn construct<C: Component>(props: &Props) -> Box<dyn Component> {
    Box::new(C::create(props))
}

impl ComponentType {
    pub fn of<C: Component>() -> Self {
        Self {
            id: TypeId::of::<C>(),
            name: short_name(type_name::<C>()),
            construct: construct::<C>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn same_type(&self, other: &ComponentType) -> bool {
        self.id == other.id
    }

    pub(crate) fn construct(&self, props: &Props) -> Box<dyn Component> {
        (self.construct)(props)
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentType({})", self.name)
    }
}

type RenderFn = dyn Fn(&Props, &[Node]) -> RenderResult;

/// A pure `props -> Node` component.
#[derive(Clone)]
pub struct FunctionComponent {
    id: TypeId,
    name: &'static str,
    render: Rc<RenderFn>,
}

impl FunctionComponent {
    pub fn new<F>(render: F) -> Self
    where
        F: Fn(&Props, &[Node]) -> RenderResult + 'static,
    {
        Self {
            id: TypeId::of::<F>(),
            name: short_name(type_name::<F>()),
            render: Rc::new(render),
        }
    }

    /// Override the diagnostic name, which defaults to the closure's type.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn same_type(&self, other: &FunctionComponent) -> bool {
        self.id == other.id
    }

    pub(crate) fn call(&self, props: &Props, children: &[Node]) -> RenderResult {
        (self.render)(props, children)
    }
}

impl fmt::Debug for FunctionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionComponent({})", self.name)
    }
}

/// Strip the module path from a type name, keeping generic arguments.
fn short_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(index) => &full[index + 2..],
        None => full,
    }
}

/// What a stateful component sees while rendering.
pub struct RenderContext<'a> {
    handle: &'a ComponentHandle,
    props: Props,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(handle: &'a ComponentHandle) -> Self {
        Self {
            props: handle.props(),
            handle,
        }
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Content passed for slot `name`, as captured at construction.
    pub fn slot(&self, name: &str) -> Vec<Node> {
        self.handle.slot(name)
    }

    pub fn has_slot(&self, name: &str) -> bool {
        !self.handle.slot(name).is_empty()
    }

    /// Publish a context value for descendants of this instance.
    pub fn provide<T: Any>(&mut self, key: impl Into<ContextKey>, value: T) {
        self.handle.provide(key, value);
    }

    pub fn context<T: Any>(&self, key: impl Into<ContextKey>) -> Option<Rc<T>> {
        self.handle.context(key)
    }

    pub fn child_ref(&self, name: &str) -> Option<Ref> {
        self.handle.child_ref(name)
    }

    pub fn handle(&self) -> &ComponentHandle {
        self.handle
    }
}

/// What a lifecycle hook sees.
///
/// Exposes the renderer and host so a hook can drive other instances, or
/// try to drive its own (which the phase guard rejects while the hook runs).
pub struct HookContext<'a> {
    handle: &'a ComponentHandle,
    renderer: &'a Renderer,
    host: &'a mut dyn Host,
}

impl<'a> HookContext<'a> {
    pub(crate) fn new(handle: &'a ComponentHandle, renderer: &'a Renderer, host: &'a mut dyn Host) -> Self {
        Self {
            handle,
            renderer,
            host,
        }
    }

    pub fn props(&self) -> Props {
        self.handle.props()
    }

    pub fn handle(&self) -> &ComponentHandle {
        self.handle
    }

    pub fn renderer(&self) -> &'a Renderer {
        self.renderer
    }

    pub fn host(&mut self) -> &mut dyn Host {
        &mut *self.host
    }

    /// Request an update of this hook's own instance.
    pub fn update(&mut self, props: Option<Props>) -> Result<UpdateOutcome, Error> {
        let handle = self.handle;
        handle.update(self.renderer, &mut *self.host, props)
    }

    pub fn provide<T: Any>(&mut self, key: impl Into<ContextKey>, value: T) {
        self.handle.provide(key, value);
    }

    pub fn context<T: Any>(&self, key: impl Into<ContextKey>) -> Option<Rc<T>> {
        self.handle.context(key)
    }

    pub fn child_ref(&self, name: &str) -> Option<Ref> {
        self.handle.child_ref(name)
    }
}
