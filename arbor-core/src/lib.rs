//! Arbor Core
//!
//! This crate provides the reconciliation engine of the Arbor component
//! framework. It implements:
//!
//! - A declarative node model (elements, text, fragments, components)
//! - Materialization of node trees into host handles
//! - Positional, in-place diffing of successive trees
//! - Stateful component instances with mount/update/unmount hooks
//! - Context propagation and named child refs
//!
//! The engine never touches a real presentation layer. Everything goes
//! through the [`Host`] trait; [`MemoryHost`] is an in-memory
//! implementation used by tests and headless rendering.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `node`: Node model, props and the `create_node` factory
//! - `host`: Host abstraction and the in-memory host
//! - `component`: Component traits, instances, lifecycle, context and refs
//! - `render`: Renderer entry points, the creator and the differ
//! - `config`: Renderer configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_core::{element, text, MemoryHost, Props, Renderer};
//!
//! let mut host = MemoryHost::new();
//! let container = host.create_container("body");
//! let renderer = Renderer::default();
//!
//! // Mount a list
//! let list = |items: &[&str]| {
//!     element("ul", Props::new(), items.iter().map(|item| {
//!         element("li", Props::new(), vec![text(*item)])
//!     }).collect())
//! };
//! let mut root = renderer.mount(&mut host, container, list(&["a", "b"]))?;
//!
//! // Reconcile against a new tree: "b" is patched to "c", "d" is appended
//! root.update(&renderer, &mut host, list(&["a", "c", "d"]))?;
//! assert_eq!(host.render(container), "<body><ul><li>a</li><li>c</li><li>d</li></ul></body>");
//! ```

pub mod component;
pub mod config;
pub mod error;
pub mod host;
pub mod node;
pub mod render;

pub use component::{
    Component, ComponentHandle, ComponentType, ContextFrame, ContextKey, FunctionComponent,
    HookContext, HookResult, InstanceId, Phase, Ref, RenderContext, RenderResult, UpdateOutcome,
};
pub use config::RendererConfig;
pub use error::{ComponentError, Error, HostError};
pub use host::{HandleId, Handles, Host, MemoryHost, Mutation};
pub use node::{
    component, create_node, element, fragment, function, text, AttrValue, Event, Listener, Node,
    NodeKind, NodeType, PropValue, Props,
};
pub use render::{Renderer, Root};
