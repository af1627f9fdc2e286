//! Named components
//!
//! Maps names to component functions so trees can be described as data (see
//! `document`). The built-in registry knows `delay` and `fragment`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{RenderError, Result};
use crate::node::{Component, ComponentFn, Node};
use crate::promise::Promise;
use crate::suspense::use_resource;
use crate::value::{val_to_json, Val};

#[derive(Clone, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, Arc<ComponentFn>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in components
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_sync("delay", delay);
        registry.register_sync("fragment", fragment);
        registry
    }

    /// Register an async component, replacing any previous one with that name
    pub fn register<F, Fut>(&mut self, name: &str, render: F)
    where
        F: Fn(Val) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Node>> + Send + 'static,
    {
        let component = Component::new(name, Val::Null, render);
        self.insert(name, component);
    }

    pub fn register_sync<F>(&mut self, name: &str, render: F)
    where
        F: Fn(Val) -> Result<Node> + Send + Sync + 'static,
    {
        let component = Component::sync(name, Val::Null, render);
        self.insert(name, component);
    }

    fn insert(&mut self, name: &str, component: Component) {
        self.components
            .insert(name.to_string(), component.render_fn());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.components.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Component node for `name` with `props`, if registered
    pub fn node(&self, name: &str, props: impl Into<Val>) -> Option<Node> {
        let render = self.components.get(name)?;
        Some(Node::Component(Component::from_fn(
            name,
            props,
            render.clone(),
        )))
    }
}

/// `{ms, value}`: suspends until a timer of `ms` milliseconds fires, then renders `value`
fn delay(props: Val) -> Result<Node> {
    let ms = match props.get("ms") {
        None | Some(Val::Null) => 0.0,
        Some(v) => v
            .as_num()
            .filter(|ms| ms.is_finite() && *ms >= 0.0)
            .ok_or_else(|| RenderError::component("delay: `ms` must be a non-negative number"))?,
    };
    let value = props.get("value").cloned().unwrap_or(Val::Null);

    // Keyed by props so every pass of this session reuses the same timer.
    let key = format!("delay:{}", val_to_json(&props));
    let resolved = use_resource(&key, move || {
        Promise::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
            Ok(value)
        })
    })?;

    Ok(Node::from(resolved))
}

/// `{children: [...]}`: renders the children without a container
fn fragment(props: Val) -> Result<Node> {
    match props.get("children") {
        None | Some(Val::Null) => Ok(Node::Fragment(Vec::new())),
        Some(Val::List(children)) => Ok(Node::fragment(children.iter().cloned())),
        Some(_) => Err(RenderError::component("fragment: `children` must be a list")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render_to_completion;

    #[test]
    fn test_builtin_names() {
        let registry = ComponentRegistry::builtin();
        assert_eq!(registry.names(), vec!["delay", "fragment"]);
        assert!(registry.contains("delay"));
        assert!(registry.node("missing", Val::Null).is_none());
    }

    #[tokio::test]
    async fn test_registered_component_receives_props() {
        let mut registry = ComponentRegistry::new();
        registry.register("Greeting", |props: Val| async move {
            let name = props.get("name").and_then(Val::as_str).unwrap_or("stranger");
            Ok(Node::text(format!("Hello {name}")))
        });

        let node = registry.node("Greeting", Val::obj([("name", "Ada")])).unwrap();
        let tree = render_to_completion(node, ()).await.unwrap();

        assert_eq!(tree, Val::from("Hello Ada"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_renders_value_after_timer() {
        let registry = ComponentRegistry::builtin();
        let root = Node::list([
            registry.node("delay", Val::obj([("ms", Val::from(30)), ("value", Val::from("slow"))])),
            registry.node("delay", Val::obj([("ms", Val::from(10)), ("value", Val::from("fast"))])),
        ]);

        let tree = render_to_completion(root, ()).await.unwrap();

        assert_eq!(tree, Val::from(vec!["slow", "fast"]));
    }

    #[tokio::test]
    async fn test_delay_rejects_negative_ms() {
        let registry = ComponentRegistry::builtin();
        let node = registry.node("delay", Val::obj([("ms", -5)])).unwrap();

        let err = render_to_completion(node, ()).await.unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[tokio::test]
    async fn test_fragment_splices_children() {
        let registry = ComponentRegistry::builtin();
        let group = registry
            .node("fragment", Val::obj([("children", Val::from(vec!["b", "c"]))]))
            .unwrap();
        let root = Node::list([Node::text("a"), group]);

        let tree = render_to_completion(root, ()).await.unwrap();

        assert_eq!(tree, Val::from(vec!["a", "b", "c"]));
    }
}
