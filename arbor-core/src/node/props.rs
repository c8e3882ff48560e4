//! Props, attribute values and listeners.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::host::HandleId;

/// A plain attribute value.
///
/// `Null` and `Bool(false)` mean "absent": applying them removes the
/// attribute. `Bool(true)` is a presence-only attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttrValue {
    /// The string form handed to the host, or `None` when the attribute
    /// should not exist at all.
    pub fn to_host_value(&self) -> Option<Cow<'_, str>> {
        match self {
            AttrValue::Null | AttrValue::Bool(false) => None,
            AttrValue::Bool(true) => Some(Cow::Borrowed("")),
            AttrValue::Int(value) => Some(Cow::Owned(value.to_string())),
            AttrValue::Float(value) => Some(Cow::Owned(value.to_string())),
            AttrValue::Text(value) => Some(Cow::Borrowed(value)),
        }
    }

    /// Truthiness used for marker props such as `detached`.
    pub fn is_truthy(&self) -> bool {
        match self {
            AttrValue::Null | AttrValue::Bool(false) => false,
            AttrValue::Int(value) => *value != 0,
            AttrValue::Float(value) => *value != 0.0,
            AttrValue::Text(value) => !value.is_empty(),
            AttrValue::Bool(true) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        AttrValue::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(value.into())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl<T: Into<AttrValue>> From<Option<T>> for AttrValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(AttrValue::Null, Into::into)
    }
}

/// An event delivered to a [`Listener`].
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub target: HandleId,
    pub detail: AttrValue,
}

impl Event {
    pub fn new(name: impl Into<String>, target: HandleId) -> Self {
        Self {
            name: name.into(),
            target,
            detail: AttrValue::Null,
        }
    }
}

/// A reference-counted event callback.
///
/// Listeners compare by identity: two clones of the same listener are
/// equal, two separately built closures never are, so the differ can skip
/// re-binding handlers that did not change.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Event) + 'static,
    {
        Self(Rc::new(callback))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event);
    }

    /// Whether both values are the same callback.
    pub fn same(&self, other: &Listener) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// A single prop value.
#[derive(Clone)]
pub enum PropValue {
    Attr(AttrValue),
    Listener(Listener),
    /// Arbitrary application data, only meaningful to components.
    Data(Rc<dyn Any>),
}

impl PropValue {
    pub fn data<T: Any>(value: T) -> Self {
        PropValue::Data(Rc::new(value))
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Attr(value) => value.fmt(f),
            PropValue::Listener(listener) => listener.fmt(f),
            PropValue::Data(_) => f.write_str("Data(..)"),
        }
    }
}

macro_rules! attr_prop {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for PropValue {
                fn from(value: $source) -> Self {
                    PropValue::Attr(value.into())
                }
            }
        )*
    };
}

attr_prop!(AttrValue, &str, String, bool, i64, i32, f64);

impl From<Listener> for PropValue {
    fn from(listener: Listener) -> Self {
        PropValue::Listener(listener)
    }
}

/// An ordered, cheaply clonable map of props.
///
/// Props are replaced wholesale on update, never merged, so sharing the
/// map behind an `Rc` is enough.
#[derive(Clone, Default)]
pub struct Props(Rc<IndexMap<String, PropValue>>);

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropValue>) {
        Rc::make_mut(&mut self.0).insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.0.get(name)
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        match self.0.get(name)? {
            PropValue::Attr(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.attr(name)?.as_str()
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        match self.attr(name)? {
            AttrValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.attr(name)? {
            AttrValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn listener(&self, name: &str) -> Option<&Listener> {
        match self.0.get(name)? {
            PropValue::Listener(listener) => Some(listener),
            _ => None,
        }
    }

    /// Downcast a `Data` prop.
    pub fn data<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        match self.0.get(name)? {
            PropValue::Data(data) => data.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether both values share the same underlying map.
    pub fn ptr_eq(&self, other: &Props) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K, V> FromIterator<(K, V)> for Props
where
    K: Into<String>,
    V: Into<PropValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(Rc::new(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        ))
    }
}
