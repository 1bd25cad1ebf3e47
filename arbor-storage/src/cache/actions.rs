//! Per-request staging of cache mutations.
//!
//! The tree engine records what it did to each document while a store
//! transaction is open. Once the transaction reaches a final state the
//! caller either [`commit`](ActionBuffer::commit)s the buffer into the
//! [`TtlCache`] or [`rollback`](ActionBuffer::rollback)s it, so the cache
//! never reflects a write that did not commit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use arbor_core::{ArborError, ArborResult, DocumentField, DocumentId, FieldChanges, StorageError};
use tokio::task::JoinSet;

use super::ttl::TtlCache;

/// One collapsed cache mutation for a single document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    /// Merged field changes, applied only if the document is cached.
    Update(FieldChanges),
    /// Unlink the document from the cache.
    Delete,
}

/// Buffer of pending cache actions keyed by document id.
///
/// A delete for an id discards every update buffered before it, and
/// updates recorded after a delete are ignored.
#[derive(Debug, Default)]
pub struct ActionBuffer {
    pending: Mutex<HashMap<DocumentId, CacheAction>>,
}

impl ActionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a set of field changes for `id`.
    pub fn record_update(&self, id: DocumentId, changes: FieldChanges) -> ArborResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        let mut pending = self.lock()?;
        match pending.get_mut(&id) {
            Some(CacheAction::Delete) => {}
            Some(CacheAction::Update(merged)) => merged.merge(changes),
            None => {
                pending.insert(id, CacheAction::Update(changes));
            }
        }
        Ok(())
    }

    /// Record a single field change for `id`.
    pub fn record_field(&self, id: DocumentId, field: DocumentField) -> ArborResult<()> {
        self.record_update(id, FieldChanges::single(field))
    }

    pub fn record_delete(&self, id: DocumentId) -> ArborResult<()> {
        self.lock()?.insert(id, CacheAction::Delete);
        Ok(())
    }

    /// The collapsed action currently buffered for `id`.
    pub fn pending(&self, id: DocumentId) -> ArborResult<Option<CacheAction>> {
        Ok(self.lock()?.get(&id).cloned())
    }

    pub fn len(&self) -> ArborResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> ArborResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Apply every buffered action to `cache`, one task per document, and
    /// wait for all of them. Returns the number of documents touched.
    ///
    /// Call only after the paired store transaction committed.
    pub async fn commit(self, cache: &Arc<TtlCache>) -> usize {
        let pending = self
            .pending
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let applied = pending.len();

        let mut tasks = JoinSet::new();
        for (id, action) in pending {
            let cache = Arc::clone(cache);
            tasks.spawn(async move {
                match action {
                    CacheAction::Update(changes) => {
                        cache.update(id, &changes).await;
                    }
                    CacheAction::Delete => {
                        cache.delete(id).await;
                    }
                }
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                tracing::warn!(error = %err, "cache action task failed");
            }
        }

        tracing::debug!(applied, "action buffer committed");
        applied
    }

    /// Discard every buffered action. Returns the number discarded.
    pub fn rollback(self) -> usize {
        let discarded = self
            .pending
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        tracing::debug!(discarded, "action buffer rolled back");
        discarded
    }

    fn lock(&self) -> ArborResult<std::sync::MutexGuard<'_, HashMap<DocumentId, CacheAction>>> {
        self.pending
            .lock()
            .map_err(|_| ArborError::Storage(StorageError::LockPoisoned))
    }
}
