//! Context Propagation
//!
//! A side channel that lets an ancestor publish typed values for any
//! descendant without threading them through props.
//!
//! Values live in immutable, parent-linked [`ContextFrame`]s. A node can
//! carry a frame; the renderer chains it onto the frame of the enclosing
//! position while walking the tree, and every instance captures the frames
//! declared between it and its parent instance. Components can also
//! `provide` values of their own. Lookup from an instance walks:
//!
//! 1. values the instance provided itself
//! 2. the frames captured at its position, nearest first
//! 3. the parent instance, recursively
//!
//! A value provided by an instance therefore shadows the same key set by
//! any frame outside that instance.
//!
//! There is no global registry.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Key under which a context value is published.
///
/// `Named` keys are plain strings. `Type` keys use a Rust type as an opaque,
/// collision-free symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextKey {
    Named(String),
    Type(TypeId),
}

impl ContextKey {
    pub fn named(name: impl Into<String>) -> Self {
        ContextKey::Named(name.into())
    }

    /// A key identified by the type `T`.
    pub fn of<T: Any>() -> Self {
        ContextKey::Type(TypeId::of::<T>())
    }
}

impl From<&str> for ContextKey {
    fn from(name: &str) -> Self {
        ContextKey::named(name)
    }
}

pub(crate) type ContextValues = IndexMap<ContextKey, Rc<dyn Any>>;

#[derive(Clone, Default)]
struct FrameInner {
    values: ContextValues,
    parent: Option<ContextFrame>,
}

/// An immutable map of context values linked to an enclosing frame.
#[derive(Clone, Default)]
pub struct ContextFrame(Rc<FrameInner>);

impl ContextFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style publish.
    pub fn with<T: Any>(mut self, key: impl Into<ContextKey>, value: T) -> Self {
        Rc::make_mut(&mut self.0)
            .values
            .insert(key.into(), Rc::new(value));
        self
    }

    /// A copy of this frame's own values linked under `parent`.
    pub(crate) fn chained(&self, parent: Option<&ContextFrame>) -> ContextFrame {
        ContextFrame(Rc::new(FrameInner {
            values: self.0.values.clone(),
            parent: parent.cloned(),
        }))
    }

    /// Find the nearest value for `key` in this frame or its ancestors.
    pub fn lookup(&self, key: &ContextKey) -> Option<Rc<dyn Any>> {
        let mut frame = Some(self);
        while let Some(current) = frame {
            if let Some(value) = current.0.values.get(key) {
                return Some(value.clone());
            }
            frame = current.0.parent.as_ref();
        }
        None
    }

    /// Typed [`lookup`](Self::lookup).
    pub fn get<T: Any>(&self, key: &ContextKey) -> Option<Rc<T>> {
        self.lookup(key)?.downcast::<T>().ok()
    }

    /// Number of frames in the chain, this one included.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut frame = self.0.parent.as_ref();
        while let Some(current) = frame {
            depth += 1;
            frame = current.0.parent.as_ref();
        }
        depth
    }
}

impl fmt::Debug for ContextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFrame")
            .field("keys", &self.0.values.keys().collect::<Vec<_>>())
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Theme(&'static str);

    #[test]
    fn lookup_walks_parent_chain() {
        let outer = ContextFrame::new().with("locale", "en").with(ContextKey::of::<Theme>(), Theme("dark"));
        let inner = ContextFrame::new().with("locale", "fr").chained(Some(&outer));

        assert_eq!(inner.depth(), 2);
        assert_eq!(
            inner.get::<&str>(&"locale".into()).as_deref(),
            Some(&"fr")
        );
        let theme = inner.get::<Theme>(&ContextKey::of::<Theme>()).unwrap();
        assert_eq!(theme.0, "dark");
    }

    #[test]
    fn missing_or_mistyped_values_are_none() {
        let frame = ContextFrame::new().with("count", 3_i32);
        assert!(frame.get::<i32>(&"absent".into()).is_none());
        assert!(frame.get::<String>(&"count".into()).is_none());
        assert_eq!(frame.get::<i32>(&"count".into()).as_deref(), Some(&3));
    }

    #[test]
    fn chaining_leaves_original_untouched() {
        let base = ContextFrame::new().with("a", 1_i32);
        let parent = ContextFrame::new().with("b", 2_i32);
        let linked = base.chained(Some(&parent));

        assert!(base.get::<i32>(&"b".into()).is_none());
        assert_eq!(linked.get::<i32>(&"b".into()).as_deref(), Some(&2));
    }
}
