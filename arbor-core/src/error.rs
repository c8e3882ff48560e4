//! Error Types
//!
//! Three kinds of failure are distinguished, mirroring how far they are
//! allowed to travel:
//!
//! - [`HostError`]: the presentation host refused a primitive mutation.
//!   This means the caller broke a structural precondition (unknown handle,
//!   wrong parent) and it propagates out of the public entry point.
//! - [`ComponentError`]: user code (a render function or a lifecycle hook)
//!   failed. These never cross a node boundary; the engine logs them and
//!   substitutes a placeholder.
//! - [`Error`]: the crate-level error returned by public entry points.

use thiserror::Error;

use crate::host::HandleId;

/// A primitive host operation could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("unknown handle {0}")]
    UnknownHandle(HandleId),

    #[error("handle {child} is not a child of {parent}")]
    NotAChild { parent: HandleId, child: HandleId },

    #[error("handle {0} is not an element")]
    NotAnElement(HandleId),

    #[error("handle {0} is not a text node")]
    NotText(HandleId),

    #[error("inserting {child} into {parent} would create a cycle")]
    Cycle { parent: HandleId, child: HandleId },
}

/// Crate-level error for the public reconciliation entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error("host operation failed: {0}")]
    Host(#[from] HostError),

    /// An old node handed to the differ was never materialized.
    #[error("cannot reconcile against an unmaterialized {0} node")]
    Unmaterialized(&'static str),

    #[error("invalid renderer configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Failure raised by user-supplied component code.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("{0}")]
    Failed(String),

    #[error("panicked: {0}")]
    Panicked(String),

    #[error("component nesting exceeded the depth limit of {0}")]
    DepthExceeded(usize),

    #[error("component is already borrowed by a running hook")]
    Busy,

    /// An engine call made from inside a hook failed.
    #[error(transparent)]
    Engine(#[from] Error),
}

impl ComponentError {
    /// Build a plain failure from any displayable message.
    pub fn msg(message: impl std::fmt::Display) -> Self {
        Self::Failed(message.to_string())
    }
}
