//! Element tree
//!
//! `Node` is the input to a render: a closed tree of terminals, data containers,
//! fragments, and components. Whether something is a component is decided when
//! the tree is built, never by inspecting values during resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture};

use crate::error::Result;
use crate::value::Val;

/* ===================== Components ===================== */

/// Future returned by a component invocation
pub type ComponentFuture = BoxFuture<'static, Result<Node>>;

/// Type-erased component function: props in, subtree out
pub type ComponentFn = dyn Fn(Val) -> ComponentFuture + Send + Sync;

/// A callable paired with the props it will be invoked with
#[derive(Clone)]
pub struct Component {
    name: Arc<str>,
    props: Val,
    render: Arc<ComponentFn>,
}

impl Component {
    /// Component backed by an async function
    pub fn new<F, Fut>(name: &str, props: impl Into<Val>, render: F) -> Self
    where
        F: Fn(Val) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Node>> + Send + 'static,
    {
        let render: Arc<ComponentFn> =
            Arc::new(move |props: Val| -> ComponentFuture { Box::pin(render(props)) });
        Self::from_fn(name, props, render)
    }

    /// Component backed by a synchronous function
    pub fn sync<F>(name: &str, props: impl Into<Val>, render: F) -> Self
    where
        F: Fn(Val) -> Result<Node> + Send + Sync + 'static,
    {
        let render: Arc<ComponentFn> = Arc::new(move |props: Val| -> ComponentFuture {
            Box::pin(future::ready(render(props)))
        });
        Self::from_fn(name, props, render)
    }

    /// Component sharing an already type-erased function
    pub fn from_fn(name: &str, props: impl Into<Val>, render: Arc<ComponentFn>) -> Self {
        Self {
            name: Arc::from(name),
            props: props.into(),
            render,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn props(&self) -> &Val {
        &self.props
    }

    /// The shared function, for building more instances with other props
    pub fn render_fn(&self) -> Arc<ComponentFn> {
        self.render.clone()
    }

    /// Call the component with its props
    pub fn invoke(&self) -> ComponentFuture {
        (self.render)(self.props.clone())
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("props", &self.props)
            .finish()
    }
}

/* ===================== Node ===================== */

/// A node of the element tree
#[derive(Debug, Clone)]
pub enum Node {
    /// Terminal: resolves to `Val::Null`
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    /// Data: children resolved in place, positional order kept
    List(Vec<Node>),
    /// Data: fields resolved in place, emitted in sorted key order
    Obj(BTreeMap<String, Node>),
    /// Siblings with no container, flattened into the parent position
    Fragment(Vec<Node>),
    Component(Component),
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Str(s.into())
    }

    pub fn list<I>(children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        Node::List(children.into_iter().map(Into::into).collect())
    }

    pub fn obj<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Node>,
        I: IntoIterator<Item = (K, V)>,
    {
        Node::Obj(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn fragment<I>(children: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Node>,
    {
        Node::Fragment(children.into_iter().map(Into::into).collect())
    }

    /// Async component node
    pub fn component<F, Fut>(name: &str, props: impl Into<Val>, render: F) -> Self
    where
        F: Fn(Val) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Node>> + Send + 'static,
    {
        Node::Component(Component::new(name, props, render))
    }

    /// Sync component node
    pub fn sync_component<F>(name: &str, props: impl Into<Val>, render: F) -> Self
    where
        F: Fn(Val) -> Result<Node> + Send + Sync + 'static,
    {
        Node::Component(Component::sync(name, props, render))
    }

    /// True for nodes that need no resolution work
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Node::Null | Node::Bool(_) | Node::Num(_) | Node::Str(_)
        )
    }
}

impl From<Val> for Node {
    fn from(val: Val) -> Self {
        match val {
            Val::Null => Node::Null,
            Val::Bool(b) => Node::Bool(b),
            Val::Num(n) => Node::Num(n),
            Val::Str(s) => Node::Str(s),
            Val::List(items) => Node::List(items.into_iter().map(Node::from).collect()),
            Val::Obj(map) => Node::Obj(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

impl From<Component> for Node {
    fn from(component: Component) -> Self {
        Node::Component(component)
    }
}

impl From<Vec<Node>> for Node {
    fn from(children: Vec<Node>) -> Self {
        Node::List(children)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Str(s.to_string())
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Str(s)
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Bool(b)
    }
}

impl From<f64> for Node {
    fn from(n: f64) -> Self {
        Node::Num(n)
    }
}

impl From<i32> for Node {
    fn from(n: i32) -> Self {
        Node::Num(n as f64)
    }
}

impl<T: Into<Node>> From<Option<T>> for Node {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Node::Null)
    }
}
