//! JSON documents
//!
//! Describes a tree as plain JSON:
//!
//! ```json
//! {
//!   "channel": "C1",
//!   "blocks": [
//!     {"$component": "delay", "props": {"ms": 20, "value": "hello"}},
//!     {"$fragment": ["a", null, "b"]}
//!   ]
//! }
//! ```
//!
//! Objects with a `"$component"` key become component nodes (props come from
//! `"props"` as data), objects with a `"$fragment"` key become fragments, and
//! everything else is data. Component names are checked while parsing.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::node::Node;
use crate::registry::ComponentRegistry;
use crate::value::{json_to_val, Val};

const COMPONENT_KEY: &str = "$component";
const FRAGMENT_KEY: &str = "$fragment";
const PROPS_KEY: &str = "props";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unknown component `{name}` at {path}")]
    UnknownComponent { name: String, path: String },

    #[error("`$component` must be a string at {path}")]
    InvalidComponentName { path: String },

    #[error("`$fragment` must be an array at {path}")]
    InvalidFragment { path: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build a tree from a JSON document
pub fn parse_document(
    json: &JsonValue,
    registry: &ComponentRegistry,
) -> Result<Node, DocumentError> {
    parse_at(json, registry, "$")
}

pub fn parse_document_str(
    text: &str,
    registry: &ComponentRegistry,
) -> Result<Node, DocumentError> {
    let json: JsonValue = serde_json::from_str(text)?;
    parse_document(&json, registry)
}

fn parse_at(
    json: &JsonValue,
    registry: &ComponentRegistry,
    path: &str,
) -> Result<Node, DocumentError> {
    match json {
        JsonValue::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| parse_at(item, registry, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Node::List),

        JsonValue::Object(fields) => {
            if let Some(name) = fields.get(COMPONENT_KEY) {
                let name = name
                    .as_str()
                    .ok_or_else(|| DocumentError::InvalidComponentName {
                        path: path.to_string(),
                    })?;
                let props = fields.get(PROPS_KEY).map(json_to_val).unwrap_or(Val::Null);
                return registry
                    .node(name, props)
                    .ok_or_else(|| DocumentError::UnknownComponent {
                        name: name.to_string(),
                        path: path.to_string(),
                    });
            }

            if let Some(children) = fields.get(FRAGMENT_KEY) {
                let JsonValue::Array(items) = children else {
                    return Err(DocumentError::InvalidFragment {
                        path: path.to_string(),
                    });
                };
                let children = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        parse_at(item, registry, &format!("{path}.{FRAGMENT_KEY}[{i}]"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Node::Fragment(children));
            }

            fields
                .iter()
                .map(|(key, value)| {
                    let node = parse_at(value, registry, &format!("{path}.{key}"))?;
                    Ok((key.clone(), node))
                })
                .collect::<Result<BTreeMap<_, _>, DocumentError>>()
                .map(Node::Obj)
        }

        scalar => Ok(Node::from(json_to_val(scalar))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::render_to_completion;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_document_renders() {
        let doc = json!({
            "channel": "C1",
            "blocks": [
                {"$component": "delay", "props": {"ms": 20, "value": {"type": "section"}}},
                {"$fragment": ["a", null, {"$component": "delay", "props": {"value": "b"}}]},
                {"type": "divider"}
            ]
        });

        let node = parse_document(&doc, &ComponentRegistry::builtin()).unwrap();
        let tree = render_to_completion(node, ()).await.unwrap();

        assert_eq!(
            tree,
            Val::obj([
                ("channel", Val::from("C1")),
                (
                    "blocks",
                    Val::from(vec![
                        Val::obj([("type", "section")]),
                        Val::from("a"),
                        Val::from("b"),
                        Val::obj([("type", "divider")]),
                    ])
                ),
            ])
        );
    }

    #[test]
    fn test_unknown_component_reports_path() {
        let doc = json!({"blocks": [{"text": "hi"}, {"$component": "Chart"}]});

        let err = parse_document(&doc, &ComponentRegistry::builtin()).unwrap_err();

        match err {
            DocumentError::UnknownComponent { name, path } => {
                assert_eq!(name, "Chart");
                assert_eq!(path, "$.blocks[1]");
            }
            other => panic!("expected unknown component, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_markers() {
        let registry = ComponentRegistry::builtin();

        assert!(matches!(
            parse_document(&json!({"$component": 3}), &registry),
            Err(DocumentError::InvalidComponentName { .. })
        ));
        assert!(matches!(
            parse_document(&json!({"$fragment": "x"}), &registry),
            Err(DocumentError::InvalidFragment { .. })
        ));
        assert!(matches!(
            parse_document_str("{not json", &registry),
            Err(DocumentError::Json(_))
        ));
    }

    #[test]
    fn test_plain_data_is_kept() {
        let doc = json!([1, "two", true, null]);
        let node = parse_document(&doc, &ComponentRegistry::new()).unwrap();
        let Node::List(items) = node else {
            unreachable!("expected list node");
        };
        assert_eq!(items.len(), 4);
        assert!(items.iter().all(Node::is_terminal));
    }
}
