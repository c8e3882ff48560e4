//! Rendering
//!
//! The [`Renderer`] turns node trees into host mutations. It has two halves:
//!
//! - the creator (`create.rs`) materializes a tree that has no live
//!   counterpart yet;
//! - the differ (`diff.rs`) reconciles an old tree against a new one at the
//!   same position and patches the host in place.
//!
//! Both run inside a [`Pass`]: one synchronous traversal started by a
//! public entry point (mounting a root, updating a root, updating or
//! unmounting an instance). A pass owns the host borrow, the queue of
//! instances waiting for their `mounted` hook, and the current component
//! nesting depth.
//!
//! # Ordering
//!
//! Siblings are processed in declared order. Instances are queued for
//! `mounted` after their own subtree, so the queue is post-order; it is
//! flushed only once the pass's outermost handles are attached, so a hook
//! never observes a detached handle.
//!
//! # Failure isolation
//!
//! User code (render functions, constructors, hooks) runs through
//! [`isolate`], which turns both returned errors and panics into a
//! [`ComponentError`]. Render failures become a visible placeholder at that
//! position; hook failures are logged. Host errors are not isolated: they
//! mean the caller broke a precondition and end the pass.

mod create;
mod diff;

use std::any::Any;
use std::borrow::Cow;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, error};

use crate::component::{ComponentHandle, ContextFrame, InstanceIds, Ref, RefRegistry};
use crate::config::RendererConfig;
use crate::error::{ComponentError, Error};
use crate::host::{HandleId, Handles, Host};
use crate::node::{element, Node, Props};

/// Entry point of the reconciliation engine.
///
/// A renderer holds configuration and the instance-ID allocator. It is
/// cheap to create; tests typically make one per case.
#[derive(Debug, Default)]
pub struct Renderer {
    config: RendererConfig,
    ids: InstanceIds,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            ids: InstanceIds::new(),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Instance IDs handed out so far.
    pub fn instance_count(&self) -> u64 {
        self.ids.allocated()
    }

    pub(crate) fn ids(&self) -> &InstanceIds {
        &self.ids
    }

    /// Materialize `node` and append it to `container`.
    pub fn mount(&self, host: &mut dyn Host, container: HandleId, node: Node) -> Result<Root, Error> {
        let mut root = Root {
            container,
            node: None,
            refs: RefRegistry::default(),
        };
        let mut node = node;
        let mut pass = Pass::new(self, host);
        let handles = pass.materialize(&mut node, container, &root.scope());
        root.node = Some(node);
        for handle in handles? {
            pass.host.insert(container, handle, None)?;
        }
        pass.flush_mounted()?;
        debug!(container = %container, "mounted root");
        Ok(root)
    }

    /// Construct a standalone instance of a stateful node, ready for
    /// [`ComponentHandle::mount`].
    pub fn instantiate(&self, node: &Node) -> Result<ComponentHandle, ComponentError> {
        match node.kind() {
            crate::node::NodeKind::Stateful(stateful) => {
                create::construct(self, stateful, &Scope::default())
            }
            _ => Err(ComponentError::msg(format!(
                "cannot instantiate a {} node",
                node.kind_name()
            ))),
        }
    }

    /// The placeholder rendered in place of a failed component.
    pub(crate) fn error_node(&self, component: &str, err: &ComponentError) -> Node {
        error!(component, error = %err, "component failed; rendering placeholder");
        let mut props = Props::new().with("data-component", component);
        if self.config.expose_errors {
            props.insert(self.config.error_attribute.as_str(), err.to_string());
        }
        element(self.config.error_tag.as_str(), props, Vec::new())
    }
}

/// A mounted top-level tree.
#[derive(Debug)]
pub struct Root {
    container: HandleId,
    node: Option<Node>,
    refs: RefRegistry,
}

impl Root {
    pub fn container(&self) -> HandleId {
        self.container
    }

    /// The tree as last reconciled, with its live state.
    pub fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    pub fn handles(&self) -> Handles {
        self.node.as_ref().map(Node::handles).unwrap_or_default()
    }

    /// A top-level child registered under `name`.
    pub fn child_ref(&self, name: &str) -> Option<Ref> {
        self.refs.get(name)
    }

    /// Reconcile the mounted tree against `node`.
    pub fn update(&mut self, renderer: &Renderer, host: &mut dyn Host, node: Node) -> Result<(), Error> {
        let scope = self.scope();
        let mut node = node;
        let mut pass = Pass::new(renderer, host);
        let result = pass.reconcile(self.container, self.node.take(), Some(&mut node), None, &scope);
        self.node = Some(node);
        result?;
        pass.flush_mounted()
    }

    /// Release the mounted tree, running every `before_unmount` hook.
    pub fn unmount(&mut self, renderer: &Renderer, host: &mut dyn Host) -> Result<(), Error> {
        let scope = self.scope();
        let mut pass = Pass::new(renderer, host);
        pass.reconcile(self.container, self.node.take(), None, None, &scope)?;
        debug!(container = %self.container, "unmounted root");
        Ok(())
    }

    fn scope(&self) -> Scope {
        Scope {
            owner: None,
            frame: None,
            refs: self.refs.clone(),
        }
    }
}

/// Where in the component tree a node is being processed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    /// Instance whose render output contains the node.
    pub(crate) owner: Option<ComponentHandle>,
    /// Frames declared between the owner and the node. Frames above the
    /// owner are reached through the owner's own lookup.
    pub(crate) frame: Option<ContextFrame>,
    /// Registry the node's ref name is recorded in.
    pub(crate) refs: RefRegistry,
}

impl Scope {
    /// The scope of an instance's own render output.
    pub(crate) fn for_instance(handle: &ComponentHandle) -> Scope {
        Scope {
            owner: Some(handle.clone()),
            frame: None,
            refs: handle.refs().clone(),
        }
    }

    /// The scope for `node`'s subtree, with its context frame chained in.
    pub(crate) fn enter(&self, node: &Node) -> Cow<'_, Scope> {
        match node.context() {
            None => Cow::Borrowed(self),
            Some(frame) => Cow::Owned(Scope {
                owner: self.owner.clone(),
                frame: Some(frame.chained(self.frame.as_ref())),
                refs: self.refs.clone(),
            }),
        }
    }
}

/// One synchronous reconciliation traversal.
pub(crate) struct Pass<'a> {
    pub(crate) renderer: &'a Renderer,
    pub(crate) host: &'a mut dyn Host,
    pub(crate) mounted: Vec<ComponentHandle>,
    pub(crate) depth: usize,
}

impl<'a> Pass<'a> {
    pub(crate) fn new(renderer: &'a Renderer, host: &'a mut dyn Host) -> Self {
        Self {
            renderer,
            host,
            mounted: Vec::new(),
            depth: 0,
        }
    }

    /// Fail with [`ComponentError::DepthExceeded`] once nesting hits the
    /// configured limit.
    pub(crate) fn check_depth(&self) -> Result<(), ComponentError> {
        let limit = self.renderer.config.max_depth;
        if self.depth >= limit {
            return Err(ComponentError::DepthExceeded(limit));
        }
        Ok(())
    }

    /// Run `f` one component level deeper.
    pub(crate) fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}

/// Run user code, converting panics into [`ComponentError::Panicked`].
pub(crate) fn isolate<T>(f: impl FnOnce() -> Result<T, ComponentError>) -> Result<T, ComponentError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(ComponentError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
