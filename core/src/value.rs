//! Resolved value type
//!
//! `Val` is what a render pass produces: plain, content-agnostic data with no
//! components left in it. It converts losslessly to and from `serde_json::Value`
//! so a schema layer can project it into a wire format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::BTreeMap;

/* ===================== Val ===================== */

/// Runtime value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Val {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Val>),
    /// Keys are kept sorted, so objects serialize in key order rather than insertion order
    Obj(BTreeMap<String, Val>),
}

impl Val {
    /// Build an object value from key/value pairs
    pub fn obj<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Val>,
        I: IntoIterator<Item = (K, V)>,
    {
        Val::Obj(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Val::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Val::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Val::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Look up a field on an object value
    pub fn get(&self, key: &str) -> Option<&Val> {
        match self {
            Val::Obj(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<f64> for Val {
    fn from(n: f64) -> Self {
        Val::Num(n)
    }
}

impl From<i64> for Val {
    fn from(n: i64) -> Self {
        Val::Num(n as f64)
    }
}

impl From<i32> for Val {
    fn from(n: i32) -> Self {
        Val::Num(n as f64)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(s)
    }
}

impl<T: Into<Val>> From<Vec<T>> for Val {
    fn from(items: Vec<T>) -> Self {
        Val::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Val>> From<Option<T>> for Val {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Val::Null)
    }
}

/* ===================== JSON Conversion ===================== */

/// Convert a JSON value into a `Val`
pub fn json_to_val(json: &JsonValue) -> Val {
    match json {
        JsonValue::Null => Val::Null,
        JsonValue::Bool(b) => Val::Bool(*b),
        JsonValue::Number(n) => Val::Num(n.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(s) => Val::Str(s.clone()),
        JsonValue::Array(items) => Val::List(items.iter().map(json_to_val).collect()),
        JsonValue::Object(map) => Val::Obj(
            map.iter()
                .map(|(k, v)| (k.clone(), json_to_val(v)))
                .collect(),
        ),
    }
}

/// Convert a `Val` into a JSON value
///
/// Integral numbers are written as JSON integers so `3` does not come back as `3.0`.
/// Non-finite numbers have no JSON representation and become `null`.
pub fn val_to_json(val: &Val) -> JsonValue {
    match val {
        Val::Null => JsonValue::Null,
        Val::Bool(b) => JsonValue::Bool(*b),
        Val::Num(n) => num_to_json(*n),
        Val::Str(s) => JsonValue::String(s.clone()),
        Val::List(items) => JsonValue::Array(items.iter().map(val_to_json).collect()),
        Val::Obj(map) => {
            let obj: Map<String, JsonValue> = map
                .iter()
                .map(|(k, v)| (k.clone(), val_to_json(v)))
                .collect();
            JsonValue::Object(obj)
        }
    }
}

fn num_to_json(n: f64) -> JsonValue {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        JsonValue::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

impl From<JsonValue> for Val {
    fn from(json: JsonValue) -> Self {
        json_to_val(&json)
    }
}

impl From<&Val> for JsonValue {
    fn from(val: &Val) -> Self {
        val_to_json(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_integers_stay_integers() {
        let val = json_to_val(&json!({"count": 3, "ratio": 0.5}));
        assert_eq!(val.get("count"), Some(&Val::Num(3.0)));

        let back = val_to_json(&val);
        assert_eq!(back, json!({"count": 3, "ratio": 0.5}));
    }

    #[test]
    fn test_nan_becomes_null() {
        assert_eq!(val_to_json(&Val::Num(f64::NAN)), JsonValue::Null);
    }

    #[test]
    fn test_obj_builder() {
        let val = Val::obj([("type", Val::from("section")), ("n", Val::from(2))]);
        assert_eq!(val.get("type").and_then(Val::as_str), Some("section"));
        assert_eq!(val.get("n").and_then(Val::as_num), Some(2.0));
        assert!(val.get("missing").is_none());
    }

    #[test]
    fn test_untagged_deserialize() {
        let val: Val = serde_json::from_str(r#"[null, true, "x", {"k": 1}]"#).unwrap();
        assert_eq!(
            val,
            Val::List(vec![
                Val::Null,
                Val::Bool(true),
                Val::Str("x".to_string()),
                Val::obj([("k", 1)]),
            ])
        );
    }

    #[test]
    fn test_object_keys_serialize_sorted() {
        let val = Val::obj([("b", 1), ("a", 2)]);
        let text = serde_json::to_string(&val_to_json(&val)).unwrap();
        assert_eq!(text, r#"{"a":2,"b":1}"#);
    }
}
