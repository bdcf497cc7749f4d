#![forbid(unsafe_code)]

//! Template data model.
//!
//! Template data is a closed tagged union: text, number, boolean, or an
//! ordered list of nested mappings. Anything else (nulls, nested objects,
//! lists of scalars) is rejected when converting from JSON, so rendering
//! never has to guess at a shape.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use thiserror::Error;

/// A JSON value that has no [`Value`] counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported template value at `{path}`: {found}")]
pub struct ShapeError {
    /// Dotted path to the offending value (`items[2].title`).
    pub path: String,
    /// What was found there.
    pub found: &'static str,
}

/// One template value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
    Bool(bool),
    List(Vec<TemplateData>),
}

impl Value {
    /// Truthiness used by `{{#if}}`: non-empty text, non-zero number,
    /// non-empty list, or `true`.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Text(text) => !text.is_empty(),
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Bool(b) => *b,
            Self::List(items) => !items.is_empty(),
        }
    }

    /// Append the interpolated form. Lists interpolate as nothing.
    pub fn write_text(&self, out: &mut String) {
        match self {
            Self::Text(text) => out.push_str(text),
            Self::Number(n) => write_number(*n, out),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::List(_) => {}
        }
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out);
        out
    }

    fn kind_name(json: &serde_json::Value) -> &'static str {
        match json {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        }
    }

    fn from_json(path: &str, json: &serde_json::Value) -> Result<Self, ShapeError> {
        match json {
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number).ok_or_else(|| ShapeError {
                path: path.to_owned(),
                found: "non-finite number",
            }),
            serde_json::Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let item_path = format!("{path}[{i}]");
                    match item {
                        serde_json::Value::Object(_) => TemplateData::from_json(&item_path, item),
                        other => Err(ShapeError {
                            path: item_path,
                            found: Self::kind_name(other),
                        }),
                    }
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::List),
            other => Err(ShapeError {
                path: path.to_owned(),
                found: Self::kind_name(other),
            }),
        }
    }
}

fn write_number(n: f64, out: &mut String) {
    // Whole numbers print without a fractional part, as a browser would.
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        let _ = write!(out, "{}", n as i64);
    } else {
        let _ = write!(out, "{n}");
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<TemplateData>> for Value {
    fn from(value: Vec<TemplateData>) -> Self {
        Self::List(value)
    }
}

/// A name-to-value mapping rendered by a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateData {
    fields: BTreeMap<String, Value>,
}

impl TemplateData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn from_json(path: &str, json: &serde_json::Value) -> Result<Self, ShapeError> {
        let serde_json::Value::Object(map) = json else {
            return Err(ShapeError {
                path: if path.is_empty() { "$".to_owned() } else { path.to_owned() },
                found: Value::kind_name(json),
            });
        };
        let mut data = Self::new();
        for (key, value) in map {
            let field_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            data.insert(key.clone(), Value::from_json(&field_path, value)?);
        }
        Ok(data)
    }
}

impl TryFrom<&serde_json::Value> for TemplateData {
    type Error = ShapeError;

    fn try_from(json: &serde_json::Value) -> Result<Self, Self::Error> {
        Self::from_json("", json)
    }
}

impl TryFrom<serde_json::Value> for TemplateData {
    type Error = ShapeError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        Self::from_json("", &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_follows_value_kind() {
        assert!(Value::from("x").is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from(-1).is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::from(false).is_truthy());
        assert!(!Value::List(Vec::new()).is_truthy());
        assert!(Value::List(vec![TemplateData::new()]).is_truthy());
    }

    #[test]
    fn numbers_print_like_a_browser() {
        assert_eq!(Value::from(3).to_text(), "3");
        assert_eq!(Value::from(2.5).to_text(), "2.5");
        assert_eq!(Value::from(-0.0).to_text(), "0");
        assert_eq!(Value::List(vec![TemplateData::new()]).to_text(), "");
    }

    #[test]
    fn json_objects_convert() {
        let data = TemplateData::try_from(&json!({
            "topic": "Markets",
            "count": 2,
            "featured": true,
            "items": [{"title": "A"}, {"title": "B", "rank": 1}]
        }))
        .expect("valid shape");
        assert_eq!(data.get("topic"), Some(&Value::from("Markets")));
        let Some(Value::List(items)) = data.get("items") else {
            panic!("items should be a list");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].get("rank"), Some(&Value::from(1)));
    }

    #[test]
    fn json_shapes_outside_the_union_are_rejected() {
        let err = TemplateData::try_from(&json!({"a": null})).expect_err("null");
        assert_eq!(err, ShapeError { path: "a".into(), found: "null" });

        let err = TemplateData::try_from(&json!({"a": {"b": 1}})).expect_err("object");
        assert_eq!(err.found, "object");

        let err = TemplateData::try_from(&json!({"xs": [{"ok": 1}, 2]})).expect_err("scalar item");
        assert_eq!(err.path, "xs[1]");
        assert_eq!(err.found, "number");

        let err = TemplateData::try_from(&json!({"xs": [{"deep": [{"bad": null}]}]})).expect_err("nested");
        assert_eq!(err.path, "xs[0].deep[0].bad");

        let err = TemplateData::try_from(&json!([1])).expect_err("top-level array");
        assert_eq!(err.path, "$");
    }
}
