//! Presentation Host
//!
//! The host is the live tree the reconciler mutates: a DOM, a native widget
//! tree, a terminal cell buffer. The engine only ever issues four kinds of
//! primitive operation against it:
//!
//! 1. handle creation (element, text, anchor)
//! 2. attribute and listener set/remove
//! 3. text content updates
//! 4. attach/detach/replace of a handle under a parent
//!
//! Handles are opaque [`HandleId`]s allocated by the host. Every mutating
//! operation is fallible: a [`HostError`] means the engine was handed a
//! structurally impossible request and aborts the current pass.
//!
//! [`MemoryHost`] is a complete in-memory implementation used for tests and
//! headless rendering.

mod memory;

pub use memory::{MemoryHost, Mutation};

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::HostError;
use crate::node::Listener;

/// Opaque identifier of a live presentation handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(u64);

impl HandleId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for HandleId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The ordered handles a node owns in the live tree. Almost always one.
pub type Handles = SmallVec<[HandleId; 2]>;

/// The primitive mutation surface of a presentation layer.
pub trait Host {
    /// Allocate a detached element handle.
    fn create_element(&mut self, tag: &str) -> HandleId;

    /// Allocate a detached text handle.
    fn create_text(&mut self, content: &str) -> HandleId;

    /// Allocate an empty positional marker with no visible content.
    fn create_anchor(&mut self) -> HandleId;

    fn set_text(&mut self, handle: HandleId, content: &str) -> Result<(), HostError>;

    fn set_attribute(&mut self, handle: HandleId, name: &str, value: &str)
        -> Result<(), HostError>;

    /// Apply several attributes at once. Hosts with a cheaper bulk path
    /// should override this.
    fn set_attributes(
        &mut self,
        handle: HandleId,
        attributes: &[(&str, &str)],
    ) -> Result<(), HostError> {
        for (name, value) in attributes {
            self.set_attribute(handle, name, value)?;
        }
        Ok(())
    }

    fn remove_attribute(&mut self, handle: HandleId, name: &str) -> Result<(), HostError>;

    fn add_listener(
        &mut self,
        handle: HandleId,
        event: &str,
        listener: Listener,
    ) -> Result<(), HostError>;

    fn remove_listener(&mut self, handle: HandleId, event: &str) -> Result<(), HostError>;

    /// Attach `child` under `parent`, before `before` or at the end when
    /// `before` is `None`. A child that is already attached elsewhere moves.
    fn insert(
        &mut self,
        parent: HandleId,
        child: HandleId,
        before: Option<HandleId>,
    ) -> Result<(), HostError>;

    /// Detach `child` from `parent`. The renderer never reattaches a
    /// removed handle, so a host may release it and its descendants.
    fn remove(&mut self, parent: HandleId, child: HandleId) -> Result<(), HostError>;

    /// Put `new` where `old` currently sits and detach `old`.
    fn replace(&mut self, parent: HandleId, old: HandleId, new: HandleId) -> Result<(), HostError> {
        self.insert(parent, new, Some(old))?;
        self.remove(parent, old)
    }
}
