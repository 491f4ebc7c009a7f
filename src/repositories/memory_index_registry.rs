use crate::domain::IndexName;
use crate::error::{RegistryError, RegistryResult};
use crate::models::IndexDefinition;
use crate::repositories::traits::IndexRegistry;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

/// Index registry held in memory.
///
/// A source may be monitored by at most one definition, because the queue
/// ledger tracks a single `indexVersion` per document.
#[derive(Debug, Default)]
pub struct MemoryIndexRegistry {
    definitions: RwLock<BTreeMap<String, IndexDefinition>>,
}

impl MemoryIndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn validate(definition: &IndexDefinition) -> RegistryResult<()> {
        IndexName::new(definition.name.as_str())?;
        IndexName::new(definition.target_index.as_str())?;

        if definition.sources.is_empty() {
            return Err(RegistryError::Invalid(
                "at least one source is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for source in &definition.sources {
            if source.db_name.trim().is_empty() || source.coll_name.trim().is_empty() {
                return Err(RegistryError::Invalid(
                    "source database and collection names cannot be empty".to_string(),
                ));
            }
            if !seen.insert(source) {
                return Err(RegistryError::Invalid(format!(
                    "duplicate source {}.{}",
                    source.db_name, source.coll_name
                )));
            }
        }
        Ok(())
    }

    fn check_sources_free(
        definitions: &BTreeMap<String, IndexDefinition>,
        candidate: &IndexDefinition,
    ) -> RegistryResult<()> {
        for other in definitions.values().filter(|d| d.name != candidate.name) {
            if let Some(taken) = candidate
                .sources
                .iter()
                .find(|s| other.monitors(&s.db_name, &s.coll_name))
            {
                return Err(RegistryError::SourceAlreadyMonitored {
                    db: taken.db_name.clone(),
                    coll: taken.coll_name.clone(),
                    owner: other.name.clone(),
                });
            }
        }
        Ok(())
    }
}

fn poisoned() -> RegistryError {
    RegistryError::Unavailable("registry lock poisoned".to_string())
}

#[async_trait]
impl IndexRegistry for MemoryIndexRegistry {
    async fn create(&self, definition: IndexDefinition) -> RegistryResult<IndexDefinition> {
        Self::validate(&definition)?;
        let mut definitions = self.definitions.write().map_err(|_| poisoned())?;
        if definitions.contains_key(&definition.name) {
            return Err(RegistryError::AlreadyExists(definition.name));
        }
        Self::check_sources_free(&definitions, &definition)?;
        definitions.insert(definition.name.clone(), definition.clone());
        Ok(definition)
    }

    async fn update(&self, definition: IndexDefinition) -> RegistryResult<IndexDefinition> {
        Self::validate(&definition)?;
        let mut definitions = self.definitions.write().map_err(|_| poisoned())?;
        if !definitions.contains_key(&definition.name) {
            return Err(RegistryError::NotFound(definition.name));
        }
        Self::check_sources_free(&definitions, &definition)?;
        definitions.insert(definition.name.clone(), definition.clone());
        Ok(definition)
    }

    async fn delete(&self, name: &str) -> RegistryResult<IndexDefinition> {
        let mut definitions = self.definitions.write().map_err(|_| poisoned())?;
        definitions
            .remove(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    async fn get(&self, name: &str) -> RegistryResult<IndexDefinition> {
        let definitions = self.definitions.read().map_err(|_| poisoned())?;
        definitions
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    async fn list(&self) -> RegistryResult<Vec<IndexDefinition>> {
        let definitions = self.definitions.read().map_err(|_| poisoned())?;
        Ok(definitions.values().cloned().collect())
    }

    async fn find_by_source(
        &self,
        db: &str,
        coll: &str,
    ) -> RegistryResult<Option<IndexDefinition>> {
        let definitions = self.definitions.read().map_err(|_| poisoned())?;
        Ok(definitions.values().find(|d| d.monitors(db, coll)).cloned())
    }
}
