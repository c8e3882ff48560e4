//! Node Model
//!
//! A [`Node`] describes one position of the UI tree for one pass. It is a
//! tagged union over five kinds:
//!
//! - `Element`: a tag, attributes, listeners and ordered children. Owns
//!   exactly one handle once materialized.
//! - `Text`: a string leaf. Owns one text handle.
//! - `Fragment`: ordered children with no wrapping handle. Owns the
//!   concatenation of its children's handles.
//! - `Function`: a pure `props -> Node` mapping. Caches the subtree it
//!   produced last so the next pass can diff against it.
//! - `Stateful`: refers to a component instance, which owns the handles of
//!   its own rendered subtree plus a trailing anchor.
//!
//! Every kind shares the same metadata: a sticky `detached` marker, an
//! optional slot name, an optional ref name and an optional context frame.
//!
//! Nodes carry live state (handles, cached output, instance references)
//! after they have been materialized. Cloning a node only copies the
//! description; the clone is unmaterialized.

mod props;

pub use props::{AttrValue, Event, Listener, PropValue, Props};

use indexmap::IndexMap;
use smallvec::smallvec;
use tracing::debug;

use crate::component::{
    Component, ComponentHandle, ComponentType, ContextFrame, FunctionComponent, RenderResult,
};
use crate::host::{HandleId, Handles};

/// Tag of the element that stands in for an absent render result.
pub const EMPTY_TAG: &str = "empty";

/// Prop name lifted into [`Node::ref_name`].
pub const REF_PROP: &str = "ref";
/// Prop name lifted into [`Node::slot`].
pub const SLOT_PROP: &str = "slot";
/// Prop name lifted into [`Node::is_detached`].
pub const DETACHED_PROP: &str = "detached";

/// Slot name used for children without a `slot` marker.
pub const DEFAULT_SLOT: &str = "default";

/// What [`create_node`] should build.
#[derive(Debug, Clone)]
pub enum NodeType {
    Element(String),
    Text(String),
    Fragment,
    Function(FunctionComponent),
    Stateful(ComponentType),
}

/// Metadata shared by every node kind.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeMeta {
    pub(crate) detached: bool,
    pub(crate) slot: Option<String>,
    pub(crate) ref_name: Option<String>,
    pub(crate) context: Option<ContextFrame>,
}

/// One position of the declarative UI tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) meta: NodeMeta,
}

/// The discriminant and per-kind payload of a [`Node`].
#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(ElementNode),
    Text(TextNode),
    Fragment(FragmentNode),
    Function(FunctionNode),
    Stateful(StatefulNode),
}

#[derive(Debug)]
pub struct ElementNode {
    pub(crate) tag: String,
    pub(crate) attributes: IndexMap<String, AttrValue>,
    pub(crate) listeners: IndexMap<String, Listener>,
    pub(crate) children: Vec<Node>,
    pub(crate) handle: Option<HandleId>,
}

#[derive(Debug)]
pub struct TextNode {
    pub(crate) content: String,
    pub(crate) handle: Option<HandleId>,
}

#[derive(Debug, Clone)]
pub struct FragmentNode {
    pub(crate) children: Vec<Node>,
}

#[derive(Debug)]
pub struct FunctionNode {
    pub(crate) component: FunctionComponent,
    pub(crate) props: Props,
    pub(crate) children: Vec<Node>,
    pub(crate) rendered: Option<Box<Node>>,
}

#[derive(Debug)]
pub struct StatefulNode {
    pub(crate) component: ComponentType,
    pub(crate) props: Props,
    pub(crate) children: Vec<Node>,
    pub(crate) instance: Option<ComponentHandle>,
    /// Placeholder materialized when the instance could not be constructed.
    pub(crate) fallback: Option<Box<Node>>,
}

impl Clone for ElementNode {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag.clone(),
            attributes: self.attributes.clone(),
            listeners: self.listeners.clone(),
            children: self.children.clone(),
            handle: None,
        }
    }
}

impl Clone for TextNode {
    fn clone(&self) -> Self {
        Self {
            content: self.content.clone(),
            handle: None,
        }
    }
}

impl Clone for FunctionNode {
    fn clone(&self) -> Self {
        Self {
            component: self.component.clone(),
            props: self.props.clone(),
            children: self.children.clone(),
            rendered: None,
        }
    }
}

impl Clone for StatefulNode {
    fn clone(&self) -> Self {
        Self {
            component: self.component,
            props: self.props.clone(),
            children: self.children.clone(),
            instance: None,
            fallback: None,
        }
    }
}

/// Build a node. Every other constructor in this crate ends up here.
///
/// The reserved props `ref`, `slot` and `detached` become node metadata.
/// For elements, listener props become listeners and everything else an
/// attribute; component props are kept as given.
pub fn create_node(ty: NodeType, props: Props, children: Vec<Node>) -> Node {
    let mut meta = NodeMeta::default();
    let mut rest = Props::new();
    for (name, value) in props.iter() {
        match (name, value) {
            (REF_PROP, PropValue::Attr(value)) => {
                meta.ref_name = value.to_host_value().map(|name| name.into_owned());
            }
            (SLOT_PROP, PropValue::Attr(value)) => {
                meta.slot = value.to_host_value().map(|name| name.into_owned());
            }
            (DETACHED_PROP, PropValue::Attr(value)) => meta.detached = value.is_truthy(),
            _ => rest.insert(name, value.clone()),
        }
    }

    let kind = match ty {
        NodeType::Element(tag) => {
            let mut attributes = IndexMap::new();
            let mut listeners = IndexMap::new();
            for (name, value) in rest.iter() {
                match value {
                    PropValue::Attr(value) => {
                        attributes.insert(name.to_string(), value.clone());
                    }
                    PropValue::Listener(listener) => {
                        listeners.insert(name.to_string(), listener.clone());
                    }
                    PropValue::Data(_) => {
                        debug!(tag = %tag, prop = name, "dropping data prop on element");
                    }
                }
            }
            NodeKind::Element(ElementNode {
                tag,
                attributes,
                listeners,
                children,
                handle: None,
            })
        }
        NodeType::Text(content) => NodeKind::Text(TextNode {
            content,
            handle: None,
        }),
        NodeType::Fragment => NodeKind::Fragment(FragmentNode { children }),
        NodeType::Function(component) => NodeKind::Function(FunctionNode {
            component,
            props: rest,
            children,
            rendered: None,
        }),
        NodeType::Stateful(component) => NodeKind::Stateful(StatefulNode {
            component,
            props: rest,
            children,
            instance: None,
            fallback: None,
        }),
    };

    Node { kind, meta }
}

/// `Element(tag, props, children)`.
pub fn element(tag: impl Into<String>, props: Props, children: Vec<Node>) -> Node {
    create_node(NodeType::Element(tag.into()), props, children)
}

pub fn text(content: impl Into<String>) -> Node {
    create_node(NodeType::Text(content.into()), Props::new(), Vec::new())
}

pub fn fragment(children: Vec<Node>) -> Node {
    create_node(NodeType::Fragment, Props::new(), children)
}

/// A stateful component node of type `C`.
pub fn component<C: Component>(props: Props, children: Vec<Node>) -> Node {
    create_node(NodeType::Stateful(ComponentType::of::<C>()), props, children)
}

/// A function component node rendered by `render`.
pub fn function<F>(render: F, props: Props, children: Vec<Node>) -> Node
where
    F: Fn(&Props, &[Node]) -> RenderResult + 'static,
{
    create_node(
        NodeType::Function(FunctionComponent::new(render)),
        props,
        children,
    )
}

impl Node {
    /// The normalized form of "nothing": an empty element.
    pub fn empty() -> Node {
        element(EMPTY_TAG, Props::new(), Vec::new())
    }

    /// Replace an absent render result by [`Node::empty`].
    pub fn normalize(node: Option<Node>) -> Node {
        node.unwrap_or_else(Node::empty)
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Short name of the node kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Element(_) => "element",
            NodeKind::Text(_) => "text",
            NodeKind::Fragment(_) => "fragment",
            NodeKind::Function(_) => "function",
            NodeKind::Stateful(_) => "stateful",
        }
    }

    pub fn is_detached(&self) -> bool {
        self.meta.detached
    }

    pub fn slot(&self) -> Option<&str> {
        self.meta.slot.as_deref()
    }

    pub fn ref_name(&self) -> Option<&str> {
        self.meta.ref_name.as_deref()
    }

    pub fn context(&self) -> Option<&ContextFrame> {
        self.meta.context.as_ref()
    }

    /// Element tag, if this is an element.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element(element) => Some(&element.tag),
            _ => None,
        }
    }

    /// Declared children of this node.
    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Element(element) => &element.children,
            NodeKind::Fragment(fragment) => &fragment.children,
            NodeKind::Function(function) => &function.children,
            NodeKind::Stateful(stateful) => &stateful.children,
            NodeKind::Text(_) => &[],
        }
    }

    /// Mark this subtree detached from parent-driven updates.
    pub fn detached(mut self) -> Self {
        self.meta.detached = true;
        self
    }

    /// Attach a context frame visible to every descendant.
    pub fn with_context(mut self, frame: ContextFrame) -> Self {
        self.meta.context = Some(frame);
        self
    }

    pub fn with_ref(mut self, name: impl Into<String>) -> Self {
        self.meta.ref_name = Some(name.into());
        self
    }

    pub fn with_slot(mut self, name: impl Into<String>) -> Self {
        self.meta.slot = Some(name.into());
        self
    }

    /// The instance behind a materialized stateful node.
    pub fn instance(&self) -> Option<&ComponentHandle> {
        match &self.kind {
            NodeKind::Stateful(stateful) => stateful.instance.as_ref(),
            _ => None,
        }
    }

    /// Live handles owned by this node, in tree order.
    pub fn handles(&self) -> Handles {
        match &self.kind {
            NodeKind::Element(ElementNode { handle, .. }) | NodeKind::Text(TextNode { handle, .. }) => {
                handle.iter().copied().collect()
            }
            NodeKind::Fragment(fragment) => {
                fragment.children.iter().flat_map(Node::handles).collect()
            }
            NodeKind::Function(function) => function
                .rendered
                .as_ref()
                .map(|inner| inner.handles())
                .unwrap_or_default(),
            NodeKind::Stateful(stateful) => match (&stateful.instance, &stateful.fallback) {
                (Some(instance), _) => instance.handles(),
                (None, Some(fallback)) => fallback.handles(),
                (None, None) => smallvec![],
            },
        }
    }

    /// First live handle of this node, if it owns any.
    pub fn first_handle(&self) -> Option<HandleId> {
        match &self.kind {
            NodeKind::Element(ElementNode { handle, .. }) | NodeKind::Text(TextNode { handle, .. }) => {
                *handle
            }
            NodeKind::Fragment(fragment) => {
                fragment.children.iter().find_map(Node::first_handle)
            }
            NodeKind::Function(function) => function.rendered.as_deref().and_then(Node::first_handle),
            NodeKind::Stateful(stateful) => match (&stateful.instance, &stateful.fallback) {
                (Some(instance), _) => instance.first_handle(),
                (None, Some(fallback)) => fallback.first_handle(),
                (None, None) => None,
            },
        }
    }
}

impl From<&str> for Node {
    fn from(content: &str) -> Self {
        text(content)
    }
}

impl From<String> for Node {
    fn from(content: String) -> Self {
        text(content)
    }
}

/// Group children by their slot marker. Unmarked children go to
/// [`DEFAULT_SLOT`].
pub(crate) fn extract_slots(children: &[Node]) -> IndexMap<String, Vec<Node>> {
    let mut slots: IndexMap<String, Vec<Node>> = IndexMap::new();
    for child in children {
        let name = child.slot().unwrap_or(DEFAULT_SLOT).to_string();
        slots.entry(name).or_default().push(child.clone());
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_props_become_metadata() {
        let node = element(
            "div",
            Props::new()
                .with("ref", "panel")
                .with("slot", "header")
                .with("detached", true)
                .with("class", "box"),
            vec![],
        );

        assert_eq!(node.ref_name(), Some("panel"));
        assert_eq!(node.slot(), Some("header"));
        assert!(node.is_detached());
        let NodeKind::Element(el) = node.kind() else {
            panic!("expected element");
        };
        assert_eq!(el.attributes.len(), 1);
        assert_eq!(el.attributes.get("class"), Some(&AttrValue::from("box")));
    }

    #[test]
    fn element_props_split_into_listeners() {
        let node = element(
            "button",
            Props::new()
                .with("type", "submit")
                .with("click", Listener::new(|_| {})),
            vec![text("go")],
        );
        let NodeKind::Element(el) = node.kind() else {
            panic!("expected element");
        };
        assert!(el.listeners.contains_key("click"));
        assert!(!el.attributes.contains_key("click"));
        assert_eq!(node.children().len(), 1);
    }

    #[test]
    fn absent_render_normalizes_to_empty_element() {
        let node = Node::normalize(None);
        assert_eq!(node.tag(), Some(EMPTY_TAG));
        assert!(node.children().is_empty());
    }

    #[test]
    fn clone_drops_live_state() {
        let mut node = element("p", Props::new(), vec![text("x")]);
        if let NodeKind::Element(el) = &mut node.kind {
            el.handle = Some(HandleId::from(4));
        }
        assert_eq!(node.handles().as_slice(), &[HandleId::from(4)]);
        assert!(node.clone().handles().is_empty());
    }

    #[test]
    fn fragment_handles_concatenate_children() {
        let mut node = fragment(vec![text("a"), fragment(vec![]), text("b")]);
        if let NodeKind::Fragment(fragment) = &mut node.kind {
            for (index, child) in fragment.children.iter_mut().enumerate() {
                if let NodeKind::Text(text) = &mut child.kind {
                    text.handle = Some(HandleId::from(index as u64 + 10));
                }
            }
        }
        assert_eq!(
            node.handles().as_slice(),
            &[HandleId::from(10), HandleId::from(12)]
        );
        assert_eq!(node.first_handle(), Some(HandleId::from(10)));
    }

    #[test]
    fn slots_group_children_by_marker() {
        let children = vec![
            text("body"),
            element("h1", Props::new().with("slot", "header"), vec![]),
            text("more"),
        ];
        let slots = extract_slots(&children);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[DEFAULT_SLOT].len(), 2);
        assert_eq!(slots["header"][0].tag(), Some("h1"));
    }
}
