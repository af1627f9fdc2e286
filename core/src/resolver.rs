//! Tree resolver
//!
//! Turns a `Node` tree into a `Val` by invoking every component and resolving
//! whatever it returns, all the way down.
//!
//! Siblings under one data node are all started before any of them is awaited,
//! and the joined result keeps declaration order no matter which finishes first.
//! Every sibling runs to completion even when another one fails; the first
//! error in positional order is what the parent sees. Errors are never caught
//! here, a `RenderError::Suspended` travels up to the render loop untouched.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use futures::future::join_all;
use tracing::trace;

use crate::error::Result;
use crate::node::{Component, Node};
use crate::value::Val;

/* ===================== Resolved ===================== */

/// Output of resolving one node
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// A single value for the parent slot
    Value(Val),
    /// Values to splice into the parent list (from a fragment)
    Spread(Vec<Val>),
}

impl Resolved {
    /// Collapse into one value. A spread becomes a list.
    pub fn into_val(self) -> Val {
        match self {
            Resolved::Value(v) => v,
            Resolved::Spread(items) => Val::List(items),
        }
    }
}

/* ===================== Resolution ===================== */

/// Recursively resolve a node
///
/// Uses `Box::pin` for async recursion.
pub fn resolve<'a>(node: &'a Node) -> Pin<Box<dyn Future<Output = Result<Resolved>> + Send + 'a>> {
    Box::pin(async move {
        match node {
            Node::Null => Ok(Resolved::Value(Val::Null)),
            Node::Bool(b) => Ok(Resolved::Value(Val::Bool(*b))),
            Node::Num(n) => Ok(Resolved::Value(Val::Num(*n))),
            Node::Str(s) => Ok(Resolved::Value(Val::Str(s.clone()))),
            Node::List(children) => {
                let items = resolve_children(children).await?;
                Ok(Resolved::Value(Val::List(items)))
            }
            Node::Obj(fields) => resolve_fields(fields).await.map(Resolved::Value),
            Node::Fragment(children) => resolve_fragment(children).await,
            Node::Component(component) => resolve_component(component).await,
        }
    })
}

/// Resolve a node into a single value
pub async fn resolve_value(node: &Node) -> Result<Val> {
    resolve(node).await.map(Resolved::into_val)
}

async fn resolve_component(component: &Component) -> Result<Resolved> {
    trace!(component = component.name(), "invoking component");
    let child = component.invoke().await?;
    resolve(&child).await
}

/// Fan out over all children, then join in declaration order
async fn resolve_children(children: &[Node]) -> Result<Vec<Val>> {
    let results = join_all(children.iter().map(resolve)).await;

    let mut items = Vec::with_capacity(results.len());
    for result in results {
        match result? {
            Resolved::Value(v) => items.push(v),
            Resolved::Spread(values) => items.extend(values),
        }
    }
    Ok(items)
}

async fn resolve_fields(fields: &BTreeMap<String, Node>) -> Result<Val> {
    let results = join_all(fields.values().map(resolve)).await;

    let mut map = BTreeMap::new();
    for (key, result) in fields.keys().zip(results) {
        map.insert(key.clone(), result?.into_val());
    }
    Ok(Val::Obj(map))
}

/// Fragments flatten into their parent and drop empty (null) members
async fn resolve_fragment(children: &[Node]) -> Result<Resolved> {
    let items = resolve_children(children).await?;
    Ok(Resolved::Spread(
        items.into_iter().filter(|v| !v.is_null()).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{run_in_context, RenderContext, SessionCapabilities};
    use crate::error::RenderError;
    use crate::promise::Promise;
    use crate::suspense::use_promise;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn delayed(name: &'static str, ms: u64, log: Arc<Mutex<Vec<String>>>) -> Node {
        Node::component(name, Val::Null, move |_| {
            let log = log.clone();
            async move {
                log.lock().push(format!("start {name}"));
                tokio::time::sleep(Duration::from_millis(ms)).await;
                log.lock().push(format!("end {name}"));
                Ok(Node::text(name))
            }
        })
    }

    #[tokio::test]
    async fn test_terminals_resolve_to_themselves() {
        assert_eq!(resolve_value(&Node::Null).await.unwrap(), Val::Null);
        assert_eq!(resolve_value(&Node::from(true)).await.unwrap(), Val::Bool(true));
        assert_eq!(resolve_value(&Node::from(2.5)).await.unwrap(), Val::Num(2.5));
        assert_eq!(resolve_value(&Node::text("hi")).await.unwrap(), Val::from("hi"));
    }

    #[tokio::test]
    async fn test_components_resolve_in_place() {
        let header = Node::sync_component("Header", Val::obj([("title", "Deploys")]), |props| {
            let title = props.get("title").cloned().unwrap_or(Val::Null);
            Ok(Node::obj([
                ("type", Node::text("header")),
                ("text", Node::from(title)),
            ]))
        });
        let tree = Node::obj([
            ("blocks", Node::list([header, Node::obj([("type", "divider")])])),
            ("channel", Node::text("C1")),
        ]);

        let val = resolve_value(&tree).await.unwrap();

        assert_eq!(
            val,
            Val::obj([
                (
                    "blocks",
                    Val::List(vec![
                        Val::obj([("type", "header"), ("text", "Deploys")]),
                        Val::obj([("type", "divider")]),
                    ])
                ),
                ("channel", Val::from("C1")),
            ])
        );
    }

    #[tokio::test]
    async fn test_nested_components() {
        let inner = Node::sync_component("Inner", Val::Null, |_| Ok(Node::text("leaf")));
        let outer = Node::component("Outer", Val::Null, move |_| {
            let inner = inner.clone();
            async move { Ok(Node::list([inner])) }
        });

        assert_eq!(
            resolve_value(&outer).await.unwrap(),
            Val::List(vec![Val::from("leaf")])
        );
    }

    #[tokio::test]
    async fn test_fragments_flatten_into_parent() {
        let group = Node::fragment([Node::text("b"), Node::Null, Node::fragment(["c", "d"])]);
        let returns_fragment =
            Node::sync_component("Pair", Val::Null, |_| Ok(Node::fragment(["e", "f"])));
        let tree = Node::list([Node::text("a"), group, returns_fragment, Node::Null]);

        let val = resolve_value(&tree).await.unwrap();

        assert_eq!(
            val,
            Val::from(vec![
                Val::from("a"),
                Val::from("b"),
                Val::from("c"),
                Val::from("d"),
                Val::from("e"),
                Val::from("f"),
                Val::Null,
            ])
        );
    }

    #[tokio::test]
    async fn test_fragment_at_root_or_field_becomes_list() {
        let root = Node::fragment(["x", "y"]);
        assert_eq!(
            resolve(&root).await.unwrap(),
            Resolved::Spread(vec![Val::from("x"), Val::from("y")])
        );

        let tree = Node::obj([("items", Node::fragment(["x"]))]);
        assert_eq!(
            resolve_value(&tree).await.unwrap(),
            Val::obj([("items", Val::from(vec!["x"]))])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_siblings_start_together_and_keep_declared_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tree = Node::list([delayed("A", 50, log.clone()), delayed("B", 20, log.clone())]);

        let val = resolve_value(&tree).await.unwrap();

        assert_eq!(val, Val::from(vec!["A", "B"]));
        assert_eq!(
            *log.lock(),
            vec!["start A", "start B", "end B", "end A"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_cancel_siblings() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();

        let failing = Node::sync_component("Broken", Val::Null, |_| {
            Err(RenderError::component("missing field: text"))
        });
        let slow = Node::component("Slow", Val::Null, move |_| {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Node::text("slow"))
            }
        });

        let err = resolve_value(&Node::list([failing, slow])).await.unwrap_err();

        assert_eq!(err.to_string(), "missing field: text");
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_error_in_position_wins() {
        let first = Node::sync_component("First", Val::Null, |_| {
            Err(RenderError::component("first"))
        });
        let second = Node::sync_component("Second", Val::Null, |_| {
            Err(RenderError::component("second"))
        });

        let err = resolve_value(&Node::obj([("a", first), ("b", second)]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "first");
    }

    #[tokio::test]
    async fn test_suspension_propagates_unmodified() {
        let (promise, _resolver) = Promise::deferred();
        let waiting = promise.clone();
        let tree = Node::list([
            Node::text("ready"),
            Node::sync_component("Profile", Val::Null, move |_| {
                let user = use_promise(&waiting)?;
                Ok(Node::from(user))
            }),
        ]);

        let ctx = RenderContext::empty().with_capabilities(SessionCapabilities::for_session());
        let result = run_in_context(ctx, resolve_value(&tree)).await.unwrap();

        match result {
            Err(RenderError::Suspended(raised)) => assert_eq!(raised, promise),
            other => panic!("expected suspension, got {other:?}"),
        }
    }
}
