//! Update endpoint payloads consumed from the CRUD collaborator.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Set-field upsert: each key is a dotted path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub update_dict: BTreeMap<String, Value>,
    /// Trigger indexing right away instead of waiting for the next pass
    #[serde(default)]
    pub update_index: bool,
}

/// Result of a committed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReceipt {
    pub doc_id: String,
    pub update_at: i64,
    pub update_version: i64,
}
