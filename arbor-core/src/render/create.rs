//! Creator
//!
//! Walks a node tree that has no live counterpart and materializes it:
//! allocates handles, applies attributes and listeners in one batch,
//! recurses into children and attaches them. The handles of the node
//! itself are returned to the caller, which attaches them to `parent`.
//!
//! Component nodes render first and materialize their output. A stateful
//! node gets a fresh instance whose `mounted` hook is queued on the pass.

use std::borrow::Cow;

use smallvec::smallvec;
use tracing::debug;

use super::{isolate, Pass, Renderer, Scope};
use crate::component::ComponentHandle;
use crate::error::{ComponentError, Error};
use crate::host::{HandleId, Handles};
use crate::node::{ElementNode, FunctionNode, Node, NodeKind, StatefulNode};

impl Pass<'_> {
    /// Materialize `node` for a position under `parent`.
    pub(crate) fn materialize(&mut self, node: &mut Node, parent: HandleId, scope: &Scope) -> Result<Handles, Error> {
        let inner = scope.enter(node);
        let handles = match &mut node.kind {
            NodeKind::Element(element) => smallvec![self.create_element(element, &inner)?],
            NodeKind::Text(text) => {
                let handle = self.host.create_text(&text.content);
                text.handle = Some(handle);
                smallvec![handle]
            }
            NodeKind::Fragment(fragment) => {
                let mut handles = Handles::new();
                for child in &mut fragment.children {
                    handles.extend(self.materialize(child, parent, &inner)?);
                }
                handles
            }
            NodeKind::Function(function) => self.create_function(function, parent, &inner)?,
            NodeKind::Stateful(stateful) => self.create_stateful(stateful, parent, &inner)?,
        };
        scope.refs.register(node);
        Ok(handles)
    }

    fn create_element(&mut self, element: &mut ElementNode, scope: &Scope) -> Result<HandleId, Error> {
        let handle = self.host.create_element(&element.tag);

        let values: Vec<(&str, Cow<'_, str>)> = element
            .attributes
            .iter()
            .filter_map(|(name, value)| Some((name.as_str(), value.to_host_value()?)))
            .collect();
        if !values.is_empty() {
            let batch: Vec<(&str, &str)> = values
                .iter()
                .map(|(name, value)| (*name, value.as_ref()))
                .collect();
            self.host.set_attributes(handle, &batch)?;
        }
        for (event, listener) in &element.listeners {
            self.host.add_listener(handle, event, listener.clone())?;
        }

        for child in &mut element.children {
            for child_handle in self.materialize(child, handle, scope)? {
                self.host.insert(handle, child_handle, None)?;
            }
        }

        element.handle = Some(handle);
        Ok(handle)
    }

    fn create_function(&mut self, function: &mut FunctionNode, parent: HandleId, scope: &Scope) -> Result<Handles, Error> {
        let mut inner = self.render_function(function);
        let handles = self.nested(|pass| pass.materialize(&mut inner, parent, scope));
        function.rendered = Some(Box::new(inner));
        handles
    }

    /// Invoke a function component, substituting a placeholder on failure.
    pub(crate) fn render_function(&mut self, function: &FunctionNode) -> Node {
        let result = self.check_depth().and_then(|()| {
            isolate(|| function.component.call(&function.props, &function.children))
        });
        match result {
            Ok(node) => Node::normalize(node),
            Err(err) => self.renderer.error_node(function.component.name(), &err),
        }
    }

    fn create_stateful(&mut self, stateful: &mut StatefulNode, parent: HandleId, scope: &Scope) -> Result<Handles, Error> {
        let instance = match stateful.instance.clone() {
            Some(instance) => instance,
            None => match construct(self.renderer, stateful, scope) {
                Ok(instance) => {
                    stateful.instance = Some(instance.clone());
                    instance
                }
                Err(err) => {
                    let mut fallback = self.renderer.error_node(stateful.component.name(), &err);
                    let handles = self.materialize(&mut fallback, parent, scope)?;
                    stateful.fallback = Some(Box::new(fallback));
                    return Ok(handles);
                }
            },
        };

        match self.materialize_instance(&instance, parent, None)? {
            Some(mounted) => {
                let mut handles = mounted.inner;
                handles.push(mounted.anchor);
                Ok(handles)
            }
            None => Ok(instance.handles()),
        }
    }
}

/// Build a fresh instance for a stateful node at `scope`.
pub(super) fn construct(renderer: &Renderer, stateful: &StatefulNode, scope: &Scope) -> Result<ComponentHandle, ComponentError> {
    let ty = stateful.component;
    let component = isolate(|| Ok(ty.construct(&stateful.props)))?;
    let handle = ComponentHandle::new(
        renderer.ids().next_id(),
        ty,
        component,
        stateful.props.clone(),
        &stateful.children,
        scope.owner.as_ref(),
        scope.frame.clone(),
    );
    debug!(instance = %handle.id(), component = ty.name(), "constructed instance");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use crate::host::{MemoryHost, Mutation};
    use crate::node::{element, fragment, function, text, AttrValue, Props};
    use crate::render::Renderer;

    #[test]
    fn element_attributes_are_applied_in_one_batch() {
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let renderer = Renderer::default();
        let node = element(
            "input",
            Props::new()
                .with("type", "checkbox")
                .with("checked", true)
                .with("disabled", false)
                .with("title", AttrValue::Null),
            vec![],
        );

        let root = renderer.mount(&mut host, container, node).unwrap();
        let input = root.handles()[0];

        assert_eq!(host.render(container), r#"<root><input type="checkbox" checked=""></input></root>"#);
        assert_eq!(host.attribute(input, "disabled"), None);
        let sets = host
            .mutations()
            .iter()
            .filter(|m| matches!(m, Mutation::SetAttribute { .. }))
            .count();
        assert_eq!(sets, 2);
    }

    #[test]
    fn fragments_have_no_wrapper() {
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let renderer = Renderer::default();
        let node = fragment(vec![text("a"), element("b", Props::new(), vec![]), text("c")]);

        let root = renderer.mount(&mut host, container, node).unwrap();

        assert_eq!(root.handles().len(), 3);
        assert_eq!(host.render(container), "<root>a<b></b>c</root>");
    }

    #[test]
    fn function_component_output_is_cached() {
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let renderer = Renderer::default();
        let node = function(
            |props, _| Ok(Some(element("h1", Props::new(), vec![text(props.get_str("title").unwrap_or(""))]))),
            Props::new().with("title", "Hello"),
            vec![],
        );

        let root = renderer.mount(&mut host, container, node).unwrap();

        assert_eq!(host.render(container), "<root><h1>Hello</h1></root>");
        let crate::node::NodeKind::Function(function) = root.node().unwrap().kind() else {
            panic!("expected function node");
        };
        assert_eq!(function.rendered.as_ref().unwrap().tag(), Some("h1"));
    }

    #[test]
    fn function_returning_nothing_renders_empty_element() {
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let renderer = Renderer::default();

        renderer
            .mount(&mut host, container, function(|_, _| Ok(None), Props::new(), vec![]))
            .unwrap();

        assert_eq!(host.render(container), "<root><empty></empty></root>");
    }

    #[test]
    fn depth_limit_turns_runaway_recursion_into_placeholder() {
        fn recurse(_: &Props, _: &[crate::node::Node]) -> crate::component::RenderResult {
            Ok(Some(function(recurse, Props::new(), vec![])))
        }

        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let renderer = Renderer::new(crate::RendererConfig {
            max_depth: 4,
            ..Default::default()
        });

        renderer
            .mount(&mut host, container, function(recurse, Props::new(), vec![]))
            .unwrap();

        let markup = host.render(container);
        assert!(markup.contains("render-error"));
        assert!(markup.contains("depth limit of 4"));
    }

    #[test]
    fn listeners_are_bound_on_creation() {
        let mut host = MemoryHost::new();
        let container = host.create_container("root");
        let renderer = Renderer::default();
        let node = element(
            "button",
            Props::new().with("click", crate::node::Listener::new(|_| {})),
            vec![],
        );

        let root = renderer.mount(&mut host, container, node).unwrap();

        assert!(host.has_listener(root.handles()[0], "click"));
    }
}
