//! Document flattening.
//!
//! Turns a nested document into an ordered list of `(path, value)` leaf pairs.
//! Object keys and array indices are joined with [`PATH_SEPARATOR`]; every scalar
//! leaf yields exactly one pair with a canonical text rendering.

use crate::error::{FlattenError, FlattenResult};
use crate::models::{DocValue, FlatPair};
use chrono::SecondsFormat;

/// Separator between path segments (`profile.emails.0`).
pub const PATH_SEPARATOR: char = '.';

/// Flatten a document into its leaf pairs, in document order.
///
/// Empty objects and arrays contribute no pairs. `null` leaves render as an
/// empty string. Binary leaves and non-finite numbers make the whole document
/// malformed.
pub fn flatten(document: &DocValue) -> FlattenResult<Vec<FlatPair>> {
    let mut pairs = Vec::new();
    let mut path = String::new();
    flatten_into(document, &mut path, &mut pairs)?;
    Ok(pairs)
}

fn flatten_into(node: &DocValue, path: &mut String, out: &mut Vec<FlatPair>) -> FlattenResult<()> {
    match node {
        DocValue::Object(fields) => {
            for (key, child) in fields {
                descend(path, key, |path| flatten_into(child, path, out))?;
            }
            Ok(())
        }
        DocValue::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                descend(path, &idx.to_string(), |path| flatten_into(child, path, out))?;
            }
            Ok(())
        }
        leaf => {
            out.push(FlatPair::new(path.clone(), render_scalar(leaf, path)?));
            Ok(())
        }
    }
}

/// Push a segment onto the shared path buffer for the duration of `f`.
fn descend<F>(path: &mut String, segment: &str, f: F) -> FlattenResult<()>
where
    F: FnOnce(&mut String) -> FlattenResult<()>,
{
    let restore = path.len();
    if !path.is_empty() {
        path.push(PATH_SEPARATOR);
    }
    path.push_str(segment);
    let result = f(path);
    path.truncate(restore);
    result
}

/// Canonical text form of a scalar leaf.
pub fn render_scalar(value: &DocValue, path: &str) -> FlattenResult<String> {
    match value {
        DocValue::Null => Ok(String::new()),
        DocValue::Bool(b) => Ok(b.to_string()),
        DocValue::Int(i) => Ok(i.to_string()),
        DocValue::UInt(u) => Ok(u.to_string()),
        DocValue::Float(f) if f.is_finite() => Ok(f.to_string()),
        DocValue::Float(_) => Err(FlattenError::NonFiniteNumber {
            path: path.to_string(),
        }),
        DocValue::String(s) => Ok(s.clone()),
        DocValue::DateTime(dt) => Ok(dt.to_rfc3339_opts(SecondsFormat::Millis, true)),
        other => Err(FlattenError::UnsupportedLeaf {
            path: path.to_string(),
            kind: other.kind(),
        }),
    }
}
