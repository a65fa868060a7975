//! Lookup helpers shared by the evidence aggregator and the template renderer.

use serde_json::Value;

/// Ordered key sequence addressing a value inside a JSON tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataPath(Vec<String>);

impl DataPath {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    /// Builds a path from a template argument. Anything other than an array of
    /// strings yields an empty path, which never resolves.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Array(items) => {
                let keys: Option<Vec<String>> = items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect();
                Self(keys.unwrap_or_default())
            }
            _ => Self::default(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Walks `path` through `tree`.
///
/// Returns `None` when the tree is not a mapping, the path is empty, the first key is
/// absent, or any later key is missing. Callers substitute their own default.
pub fn resolve<'a, K>(tree: &'a Value, path: &[K]) -> Option<&'a Value>
where
    K: AsRef<str>,
{
    let first = path.first()?;
    let mut current = tree.as_object()?.get(first.as_ref())?;

    for key in &path[1..] {
        current = current.as_object()?.get(key.as_ref())?;
    }

    Some(current)
}

/// `resolve` falling back to an empty slice when the target is not a sequence.
pub(crate) fn resolve_items<'a>(tree: &'a Value, key: &str) -> &'a [Value] {
    resolve(tree, &[key])
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// True when the record carries a string `affiliation` equal to `affiliation`.
pub fn owns(record: &Value, affiliation: &str) -> bool {
    matches!(
        record.get("affiliation"),
        Some(Value::String(recorded)) if recorded == affiliation
    )
}

/// Truthiness of a JSON value: null, false, zero, and empty strings or containers
/// are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map_or(true, |n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

pub(crate) fn is_numeric_zero(value: &Value) -> bool {
    matches!(value, Value::Number(number) if number.as_f64() == Some(0.0))
}
