//! Administrative index definitions.

use super::indexed_document::SourceRef;
use serde::{Deserialize, Serialize};

/// A named index and the sources whose queues it drains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
    pub name: String,
    /// Name of the index in the search engine
    pub target_index: String,
    pub sources: Vec<SourceRef>,
}

impl IndexDefinition {
    pub fn new(
        name: impl Into<String>,
        target_index: impl Into<String>,
        sources: Vec<SourceRef>,
    ) -> Self {
        Self {
            name: name.into(),
            target_index: target_index.into(),
            sources,
        }
    }

    pub fn monitors(&self, db: &str, coll: &str) -> bool {
        self.sources
            .iter()
            .any(|s| s.db_name == db && s.coll_name == coll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitors() {
        let def = IndexDefinition::new(
            "people",
            "people-v1",
            vec![SourceRef::new("crm", "contacts"), SourceRef::new("crm", "leads")],
        );
        assert!(def.monitors("crm", "leads"));
        assert!(!def.monitors("crm", "deals"));
        assert!(!def.monitors("other", "contacts"));
    }
}
