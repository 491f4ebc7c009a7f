//! Document write service.
//!
//! The write path: validate, commit the document together with its queue bump,
//! and optionally nudge the reconciler. Indexing never happens inline.

use crate::domain::{DocId, ValidationError};
use crate::error::{ServiceError, ServiceResult};
use crate::flatten::PATH_SEPARATOR;
use crate::models::{DocValue, QueueEntry, UpdateReceipt, UpdateRequest};
use crate::reconciler::ReconcileNotifier;
use crate::repositories::DocumentStore;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Document service trait for write operations.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Set-field upsert of `request.update_dict` into one document.
    async fn update_document(
        &self,
        db: &str,
        coll: &str,
        doc_id: &str,
        request: UpdateRequest,
    ) -> ServiceResult<UpdateReceipt>;

    /// Delete a document, leaving a tombstone for the reconciler.
    async fn delete_document(
        &self,
        db: &str,
        coll: &str,
        doc_id: &str,
        update_index: bool,
    ) -> ServiceResult<UpdateReceipt>;
}

/// Default implementation of DocumentService.
pub struct DocumentServiceImpl {
    store: Arc<dyn DocumentStore>,
    notifier: Option<ReconcileNotifier>,
}

/// Validation helper functions.
impl DocumentServiceImpl {
    fn validate_namespace(db: &str, coll: &str) -> ServiceResult<()> {
        if db.trim().is_empty() || coll.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "database and collection names cannot be empty".to_string(),
            ));
        }
        if db.contains(PATH_SEPARATOR) {
            return Err(ServiceError::InvalidRequest(format!(
                "database name cannot contain '{}'",
                PATH_SEPARATOR
            )));
        }
        Ok(())
    }

    /// Dotted paths: no empty segments, no operator-style `$` prefixes.
    fn validate_path(path: &str) -> Result<(), ValidationError> {
        let bad_segment = path
            .split(PATH_SEPARATOR)
            .any(|segment| segment.is_empty() || segment.starts_with('$'));
        if bad_segment {
            return Err(ValidationError::InvalidPath(path.to_string()));
        }
        Ok(())
    }

    fn receipt(doc_id: DocId, entry: &QueueEntry) -> UpdateReceipt {
        UpdateReceipt {
            doc_id: doc_id.into_inner(),
            update_at: entry.update_at,
            update_version: entry.update_version,
        }
    }
}

impl DocumentServiceImpl {
    /// `notifier` is `None` when no background reconciler is running.
    pub fn new(store: Arc<dyn DocumentStore>, notifier: Option<ReconcileNotifier>) -> Self {
        Self { store, notifier }
    }

    fn notify(&self, db: &str, entry: &QueueEntry) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(entry.key(db));
        }
    }
}

#[async_trait]
impl DocumentService for DocumentServiceImpl {
    async fn update_document(
        &self,
        db: &str,
        coll: &str,
        doc_id: &str,
        request: UpdateRequest,
    ) -> ServiceResult<UpdateReceipt> {
        Self::validate_namespace(db, coll)?;
        let doc_id = DocId::new(doc_id)?;
        if request.update_dict.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "updateDict cannot be empty".to_string(),
            ));
        }

        let mut updates = BTreeMap::new();
        for (path, value) in request.update_dict {
            Self::validate_path(&path)?;
            updates.insert(path, DocValue::from(value));
        }

        let entry = self
            .store
            .update_document(db, coll, doc_id.as_str(), &updates)
            .await?;
        tracing::debug!(
            db = %db,
            coll = %coll,
            doc_id = %doc_id,
            update_version = entry.update_version,
            "Document updated"
        );

        if request.update_index {
            self.notify(db, &entry);
        }
        Ok(Self::receipt(doc_id, &entry))
    }

    async fn delete_document(
        &self,
        db: &str,
        coll: &str,
        doc_id: &str,
        update_index: bool,
    ) -> ServiceResult<UpdateReceipt> {
        Self::validate_namespace(db, coll)?;
        let doc_id = DocId::new(doc_id)?;

        let entry = self
            .store
            .delete_document(db, coll, doc_id.as_str())
            .await?;
        tracing::debug!(
            db = %db,
            coll = %coll,
            doc_id = %doc_id,
            update_version = entry.update_version,
            "Document deleted"
        );

        if update_index {
            self.notify(db, &entry);
        }
        Ok(Self::receipt(doc_id, &entry))
    }
}
