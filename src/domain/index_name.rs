//! IndexName value object.

use super::errors::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Lowercase, no path or wildcard characters, cannot start with `-`, `_` or `+`.
static INDEX_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[a-z0-9][^A-Z\\/*?"<>| ,#:]*$"#).expect("Failed to compile index name regex")
});

const MAX_INDEX_NAME_BYTES: usize = 255;

/// A search-engine index name that satisfies Elasticsearch naming rules.
///
/// ```
/// use flat_index_sync::domain::IndexName;
///
/// assert!(IndexName::new("customers-v1").is_ok());
/// assert!(IndexName::new("Customers").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexName(String);

impl IndexName {
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.is_empty()
            || name.len() > MAX_INDEX_NAME_BYTES
            || name == "."
            || name == ".."
            || !INDEX_NAME_RE.is_match(&name)
        {
            return Err(ValidationError::InvalidIndexName(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for IndexName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for IndexName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        IndexName::new(s).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
