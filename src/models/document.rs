//! Document value model held by the document store.
//!
//! Documents are JSON-like trees. Dates and binary payloads arrive as
//! extended-JSON wrappers (`{"$date": ...}`, `{"$binary": ...}`) and are kept as
//! dedicated variants so the flattener can render them canonically.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A node of a stored document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocValue {
    Null,
    Bool(bool),
    Int(i64),
    /// Integer above `i64::MAX`
    UInt(u64),
    Float(f64),
    String(String),
    DateTime(DateTime<Utc>),
    /// Undecoded binary payload
    Binary(Vec<u8>),
    Array(Vec<DocValue>),
    /// Object with keys in insertion order
    Object(Vec<(String, DocValue)>),
}

impl DocValue {
    /// An empty object, the root of every new document.
    pub fn empty_object() -> Self {
        Self::Object(Vec::new())
    }

    /// Human-readable name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::UInt(_) | Self::Float(_) => "number",
            Self::String(_) => "string",
            Self::DateTime(_) => "date",
            Self::Binary(_) => "binary",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    /// Look up a direct child of an object.
    pub fn get(&self, key: &str) -> Option<&DocValue> {
        match self {
            Self::Object(fields) => fields.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Resolve a dotted path (numeric segments index into arrays).
    pub fn get_path(&self, path: &str) -> Option<&DocValue> {
        path.split('.').try_fold(self, |node, segment| match node {
            Self::Object(_) => node.get(segment),
            Self::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Set the value at a dotted path, creating intermediate objects.
    ///
    /// Numeric segments address existing array elements; they never grow an array.
    /// Fails when the path is empty, has an empty segment, or walks through a scalar.
    pub fn set_path(&mut self, path: &str, value: DocValue) -> Result<(), String> {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(format!("empty segment in path '{}'", path));
        }

        let segments: Vec<&str> = path.split('.').collect();
        let mut node = self;
        for (depth, segment) in segments.iter().enumerate() {
            let last = depth + 1 == segments.len();
            node = match node {
                Self::Object(fields) => {
                    let pos = match fields.iter().position(|(k, _)| k == segment) {
                        Some(pos) => pos,
                        None => {
                            fields.push((segment.to_string(), Self::empty_object()));
                            fields.len() - 1
                        }
                    };
                    &mut fields[pos].1
                }
                Self::Array(items) => {
                    let len = items.len();
                    let idx = segment
                        .parse::<usize>()
                        .ok()
                        .filter(|i| *i < len)
                        .ok_or_else(|| {
                            format!(
                                "array index '{}' out of bounds (len {}) in path '{}'",
                                segment, len, path
                            )
                        })?;
                    &mut items[idx]
                }
                other => {
                    return Err(format!(
                        "cannot set '{}' inside {} at path '{}'",
                        segment,
                        other.kind(),
                        segments[..depth].join(".")
                    ))
                }
            };
            if last {
                *node = value;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Convert back to plain JSON, re-wrapping dates and binaries.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::UInt(u) => Value::from(*u),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::String(s) => Value::String(s.clone()),
            Self::DateTime(dt) => serde_json::json!({
                "$date": dt.to_rfc3339_opts(SecondsFormat::Millis, true)
            }),
            Self::Binary(bytes) => serde_json::json!({
                "$binary": String::from_utf8_lossy(bytes)
            }),
            Self::Array(items) => Value::Array(items.iter().map(DocValue::to_json).collect()),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }

    /// Interpret a single-key extended-JSON wrapper, if this object is one.
    fn from_extended(map: &Map<String, Value>) -> Option<DocValue> {
        if map.len() != 1 {
            return None;
        }
        let (key, inner) = map.iter().next()?;
        match (key.as_str(), inner) {
            ("$date", Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| DocValue::DateTime(dt.with_timezone(&Utc))),
            ("$date", Value::Number(n)) => n.as_i64().and_then(millis_to_datetime),
            ("$date", Value::Object(long)) => long
                .get("$numberLong")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(millis_to_datetime),
            ("$oid", Value::String(s)) => Some(DocValue::String(s.clone())),
            ("$binary", Value::String(s)) => Some(DocValue::Binary(s.as_bytes().to_vec())),
            ("$binary", Value::Object(b)) => b
                .get("base64")
                .and_then(Value::as_str)
                .map(|s| DocValue::Binary(s.as_bytes().to_vec())),
            _ => None,
        }
    }
}

fn millis_to_datetime(ms: i64) -> Option<DocValue> {
    Utc.timestamp_millis_opt(ms).single().map(DocValue::DateTime)
}

impl From<Value> for DocValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => DocValue::Null,
            Value::Bool(b) => DocValue::Bool(b),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => DocValue::Int(i),
                (None, Some(u)) => DocValue::UInt(u),
                (None, None) => DocValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => DocValue::String(s),
            Value::Array(items) => DocValue::Array(items.into_iter().map(DocValue::from).collect()),
            Value::Object(map) => match DocValue::from_extended(&map) {
                Some(special) => special,
                None => DocValue::Object(
                    map.into_iter()
                        .map(|(k, v)| (k, DocValue::from(v)))
                        .collect(),
                ),
            },
        }
    }
}

impl Serialize for DocValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DocValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(DocValue::from)
    }
}
