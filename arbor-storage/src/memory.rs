//! In-memory document store.
//!
//! Committed rows live in a `BTreeMap` behind an `RwLock`, each tagged with
//! a version that every committed write bumps. A transaction stages its
//! writes in a private overlay and remembers the version of every committed
//! row it looked at. Commit takes the write lock, rejects the transaction if
//! any of those rows changed since, and otherwise applies the overlay.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use arbor_core::{
    ArborError, ArborResult, ConfigError, Document, DocumentId, FieldChanges, FieldKind,
    NewDocument, StorageError, StoreSettings, ValidationError,
};
use async_trait::async_trait;

use crate::store::{DocumentStore, StoreTransaction};

/// Connection target understood by [`MemoryStore::from_settings`].
pub const MEMORY_TARGET: &str = "memory://";

/// Version of a committed row; starts at 1 on insert.
pub type RowVersion = u64;

#[derive(Debug, Clone)]
struct Row {
    version: RowVersion,
    doc: Document,
}

type Rows = BTreeMap<DocumentId, Row>;

#[derive(Debug)]
struct MemoryInner {
    collection: String,
    rows: RwLock<Rows>,
    next_id: AtomicI64,
    fail_next_commit: AtomicBool,
    commits: AtomicU64,
}

impl MemoryInner {
    fn read_rows(&self) -> ArborResult<std::sync::RwLockReadGuard<'_, Rows>> {
        self.rows
            .read()
            .map_err(|_| ArborError::Storage(StorageError::LockPoisoned))
    }
}

/// In-memory store with serial id assignment and optimistic transactions.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    /// Create an empty store for the named collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                collection: collection.into(),
                rows: RwLock::new(BTreeMap::new()),
                next_id: AtomicI64::new(1),
                fail_next_commit: AtomicBool::new(false),
                commits: AtomicU64::new(0),
            }),
        }
    }

    /// Open the store described by `settings`. Only `memory://` targets are
    /// served by this implementation.
    pub fn from_settings(settings: &StoreSettings) -> ArborResult<Self> {
        if settings.target != MEMORY_TARGET {
            return Err(ConfigError::InvalidValue {
                field: "store.target".to_string(),
                value: settings.target.clone(),
                reason: format!("only {} is supported", MEMORY_TARGET),
            }
            .into());
        }
        Ok(Self::new(settings.collection.clone()))
    }

    pub fn collection(&self) -> &str {
        &self.inner.collection
    }

    /// Number of committed rows.
    pub fn len(&self) -> ArborResult<usize> {
        Ok(self.inner.read_rows()?.len())
    }

    pub fn is_empty(&self) -> ArborResult<bool> {
        Ok(self.inner.read_rows()?.is_empty())
    }

    /// Whether a committed row exists for `id`.
    pub fn contains(&self, id: DocumentId) -> ArborResult<bool> {
        Ok(self.inner.read_rows()?.contains_key(&id))
    }

    /// Committed version of `id`, if the row exists.
    pub fn version(&self, id: DocumentId) -> ArborResult<Option<RowVersion>> {
        Ok(self.inner.read_rows()?.get(&id).map(|row| row.version))
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Make the next commit fail with `TransactionFailed`.
    pub fn fail_next_commit(&self) {
        self.inner.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("documents")
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> ArborResult<MemoryTransaction> {
        Ok(MemoryTransaction {
            store: Arc::clone(&self.inner),
            state: Mutex::new(TxState::default()),
        })
    }

    async fn get(&self, id: DocumentId) -> ArborResult<Option<Document>> {
        Ok(self.inner.read_rows()?.get(&id).map(|row| row.doc.clone()))
    }

    async fn list(&self) -> ArborResult<Vec<Document>> {
        Ok(self
            .inner
            .read_rows()?
            .values()
            .map(|row| row.doc.clone())
            .collect())
    }

    async fn list_roots(&self) -> ArborResult<Vec<Document>> {
        Ok(self
            .inner
            .read_rows()?
            .values()
            .filter(|row| row.doc.is_root())
            .map(|row| row.doc.clone())
            .collect())
    }
}

#[derive(Debug, Clone)]
enum Staged {
    Put(Document),
    Deleted,
}

#[derive(Debug, Default)]
struct TxState {
    staged: BTreeMap<DocumentId, Staged>,
    // First committed version observed per row; `None` means it was absent.
    observed: HashMap<DocumentId, Option<RowVersion>>,
}

/// Transaction over a [`MemoryStore`].
#[derive(Debug)]
pub struct MemoryTransaction {
    store: Arc<MemoryInner>,
    state: Mutex<TxState>,
}

impl MemoryTransaction {
    fn lock_state(&self) -> ArborResult<std::sync::MutexGuard<'_, TxState>> {
        self.state
            .lock()
            .map_err(|_| ArborError::Storage(StorageError::LockPoisoned))
    }

    /// Committed row for `id`, recorded in the read set.
    fn committed(&self, state: &mut TxState, id: DocumentId) -> ArborResult<Option<Document>> {
        let row = self.store.read_rows()?.get(&id).cloned();
        state
            .observed
            .entry(id)
            .or_insert_with(|| row.as_ref().map(|row| row.version));
        Ok(row.map(|row| row.doc))
    }

    fn visible(&self, state: &mut TxState, id: DocumentId) -> ArborResult<Option<Document>> {
        match state.staged.get(&id) {
            Some(Staged::Put(doc)) => Ok(Some(doc.clone())),
            Some(Staged::Deleted) => Ok(None),
            None => self.committed(state, id),
        }
    }
}

fn numeric_value(doc: &Document, field: FieldKind) -> Option<i64> {
    match field {
        FieldKind::ParentId => Some(doc.parent_id),
        FieldKind::Depth => Some(i64::from(doc.depth)),
        FieldKind::Sort => Some(doc.sort),
        FieldKind::Body | FieldKind::ChildList => None,
    }
}

/// First row in `observed` whose committed version no longer matches.
fn first_conflict(
    rows: &Rows,
    observed: &HashMap<DocumentId, Option<RowVersion>>,
) -> Option<DocumentId> {
    observed
        .iter()
        .find(|(id, seen)| rows.get(*id).map(|row| row.version) != **seen)
        .map(|(id, _)| *id)
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert(&self, draft: NewDocument) -> ArborResult<Document> {
        let id = self
            .store
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
            .map_err(|last| StorageError::InsertFailed {
                reason: format!("id sequence exhausted after {}", last),
            })?;
        let row = draft.into_row(id);
        let mut state = self.lock_state()?;
        state.observed.insert(id, None);
        state.staged.insert(id, Staged::Put(row.clone()));
        Ok(row)
    }

    async fn get(&self, id: DocumentId) -> ArborResult<Option<Document>> {
        let mut state = self.lock_state()?;
        self.visible(&mut state, id)
    }

    async fn set_fields(&self, id: DocumentId, changes: &FieldChanges) -> ArborResult<()> {
        let mut state = self.lock_state()?;
        let mut doc = self
            .visible(&mut state, id)?
            .ok_or(StorageError::UpdateFailed {
                id,
                reason: "row does not exist".to_string(),
            })?;
        changes.apply_to(&mut doc);
        state.staged.insert(id, Staged::Put(doc));
        Ok(())
    }

    async fn delete(&self, id: DocumentId) -> ArborResult<()> {
        let mut state = self.lock_state()?;
        self.visible(&mut state, id)?;
        state.staged.insert(id, Staged::Deleted);
        Ok(())
    }

    async fn aggregate_max(
        &self,
        field: FieldKind,
        ids: &[DocumentId],
    ) -> ArborResult<Option<i64>> {
        if matches!(field, FieldKind::Body | FieldKind::ChildList) {
            return Err(ValidationError::InvalidValue {
                field: field.to_string(),
                reason: "aggregate requires a numeric field".to_string(),
            }
            .into());
        }
        let mut state = self.lock_state()?;
        let mut max = None;
        for id in ids {
            if let Some(value) = self
                .visible(&mut state, *id)?
                .and_then(|doc| numeric_value(&doc, field))
            {
                max = Some(max.map_or(value, |current: i64| current.max(value)));
            }
        }
        Ok(max)
    }

    async fn commit(self) -> ArborResult<()> {
        if self.store.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(ArborError::transaction_failed(format!(
                "commit rejected by {}",
                self.store.collection
            )));
        }
        let TxState { staged, observed } = self
            .state
            .into_inner()
            .map_err(|_| ArborError::Storage(StorageError::LockPoisoned))?;
        let mut rows = self
            .store
            .rows
            .write()
            .map_err(|_| ArborError::Storage(StorageError::LockPoisoned))?;

        if let Some(id) = first_conflict(&rows, &observed) {
            tracing::debug!(collection = %self.store.collection, id, "write conflict");
            return Err(ArborError::transaction_failed(format!(
                "document {} was changed by a concurrent transaction",
                id
            )));
        }

        let writes = staged.len();
        for (id, change) in staged {
            match change {
                Staged::Put(doc) => {
                    let version = rows.get(&id).map_or(1, |row| row.version + 1);
                    rows.insert(id, Row { version, doc });
                }
                Staged::Deleted => {
                    rows.remove(&id);
                }
            }
        }
        self.store.commits.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(collection = %self.store.collection, writes, "transaction committed");
        Ok(())
    }

    async fn rollback(self) -> ArborResult<()> {
        let discarded = self.lock_state()?.staged.len();
        tracing::debug!(collection = %self.store.collection, discarded, "transaction rolled back");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::DocumentField;

    #[tokio::test]
    async fn test_insert_assigns_serial_ids() -> ArborResult<()> {
        let store = MemoryStore::default();
        let tx = store.begin().await?;
        let a = tx.insert(NewDocument::new("a")).await?;
        let b = tx.insert(NewDocument::new("b")).await?;
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        tx.commit().await?;
        assert_eq!(store.len()?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_writes_invisible_until_commit() -> ArborResult<()> {
        let store = MemoryStore::default();
        let tx = store.begin().await?;
        let doc = tx.insert(NewDocument::new("a")).await?;
        assert!(store.get(doc.id).await?.is_none());
        assert_eq!(tx.get(doc.id).await?, Some(doc.clone()));
        tx.commit().await?;
        assert_eq!(store.get(doc.id).await?, Some(doc));
        Ok(())
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() -> ArborResult<()> {
        let store = MemoryStore::default();
        let seed = store.begin().await?;
        let doc = seed.insert(NewDocument::new("a")).await?;
        seed.commit().await?;

        let tx = store.begin().await?;
        tx.set_fields(doc.id, &FieldChanges::single(DocumentField::Body("b".into())))
            .await?;
        tx.delete(doc.id).await?;
        assert!(tx.get(doc.id).await?.is_none());
        tx.rollback().await?;

        assert_eq!(store.get(doc.id).await?.map(|d| d.body), Some("a".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_set_fields_on_missing_row_fails() -> ArborResult<()> {
        let store = MemoryStore::default();
        let tx = store.begin().await?;
        let result = tx
            .set_fields(42, &FieldChanges::single(DocumentField::Depth(1)))
            .await;
        assert!(matches!(
            result,
            Err(ArborError::Storage(StorageError::UpdateFailed { id: 42, .. }))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_aggregate_max_sees_staged_values() -> ArborResult<()> {
        let store = MemoryStore::default();
        let tx = store.begin().await?;
        let a = tx.insert(NewDocument::new("a")).await?;
        let b = tx.insert(NewDocument::new("b")).await?;
        tx.set_fields(b.id, &FieldChanges::single(DocumentField::Depth(4)))
            .await?;

        assert_eq!(tx.aggregate_max(FieldKind::Depth, &[a.id, b.id]).await?, Some(4));
        assert_eq!(tx.aggregate_max(FieldKind::Depth, &[]).await?, None);
        assert_eq!(tx.aggregate_max(FieldKind::Depth, &[99]).await?, None);
        assert!(tx.aggregate_max(FieldKind::Body, &[a.id]).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_injected_commit_failure() -> ArborResult<()> {
        let store = MemoryStore::default();
        store.fail_next_commit();
        let tx = store.begin().await?;
        tx.insert(NewDocument::new("a")).await?;
        let err = tx.commit().await.err();
        assert_eq!(
            err.map(|e| e.kind()),
            Some(arbor_core::ErrorKind::TransactionFailed)
        );
        assert!(store.is_empty()?);
        assert_eq!(store.commit_count(), 0);

        let tx = store.begin().await?;
        tx.insert(NewDocument::new("b")).await?;
        tx.commit().await?;
        assert_eq!(store.len()?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_roots_filters_children() -> ArborResult<()> {
        let store = MemoryStore::default();
        let tx = store.begin().await?;
        let parent = tx.insert(NewDocument::new("p")).await?;
        let child = tx.insert(NewDocument::new("c")).await?;
        tx.set_fields(child.id, &FieldChanges::single(DocumentField::ParentId(parent.id)))
            .await?;
        tx.commit().await?;

        let roots = store.list_roots().await?;
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, parent.id);
        assert_eq!(store.list().await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_fails_when_ids_run_out() -> ArborResult<()> {
        let store = MemoryStore::default();
        store.inner.next_id.store(i64::MAX, Ordering::SeqCst);
        let tx = store.begin().await?;
        let result = tx.insert(NewDocument::new("late")).await;
        assert!(matches!(
            result,
            Err(ArborError::Storage(StorageError::InsertFailed { .. }))
        ));
        Ok(())
    }

    async fn seed(store: &MemoryStore, body: &str) -> ArborResult<Document> {
        let tx = store.begin().await?;
        let doc = tx.insert(NewDocument::new(body)).await?;
        tx.commit().await?;
        Ok(doc)
    }

    #[tokio::test]
    async fn test_commit_bumps_row_version() -> ArborResult<()> {
        let store = MemoryStore::default();
        let doc = seed(&store, "a").await?;
        assert_eq!(store.version(doc.id)?, Some(1));

        let tx = store.begin().await?;
        tx.set_fields(doc.id, &FieldChanges::single(DocumentField::Sort(2)))
            .await?;
        tx.commit().await?;
        assert_eq!(store.version(doc.id)?, Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_update_of_same_row_conflicts() -> ArborResult<()> {
        let store = MemoryStore::default();
        let doc = seed(&store, "a").await?;

        let first = store.begin().await?;
        let second = store.begin().await?;
        first
            .set_fields(doc.id, &FieldChanges::single(DocumentField::ParentId(7)))
            .await?;
        second
            .set_fields(doc.id, &FieldChanges::single(DocumentField::ParentId(8)))
            .await?;
        first.commit().await?;

        let err = second.commit().await.err();
        assert_eq!(
            err.map(|e| e.kind()),
            Some(arbor_core::ErrorKind::TransactionFailed)
        );
        assert_eq!(store.get(doc.id).await?.map(|d| d.parent_id), Some(7));
        assert_eq!(store.commit_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_write_cannot_resurrect_deleted_row() -> ArborResult<()> {
        let store = MemoryStore::default();
        let doc = seed(&store, "a").await?;

        let writer = store.begin().await?;
        let deleter = store.begin().await?;
        writer
            .set_fields(doc.id, &FieldChanges::single(DocumentField::Body("b".into())))
            .await?;
        deleter.delete(doc.id).await?;
        deleter.commit().await?;

        assert!(writer.commit().await.is_err());
        assert!(!store.contains(doc.id)?);
        Ok(())
    }

    #[tokio::test]
    async fn test_read_only_rows_are_checked_at_commit() -> ArborResult<()> {
        let store = MemoryStore::default();
        let watched = seed(&store, "watched").await?;
        let other = seed(&store, "other").await?;

        let tx = store.begin().await?;
        assert!(tx.get(watched.id).await?.is_some());
        tx.set_fields(other.id, &FieldChanges::single(DocumentField::Sort(1)))
            .await?;

        let concurrent = store.begin().await?;
        concurrent.delete(watched.id).await?;
        concurrent.commit().await?;

        assert!(tx.commit().await.is_err());
        assert_eq!(store.get(other.id).await?.map(|d| d.sort), Some(0));
        Ok(())
    }

    #[tokio::test]
    async fn test_disjoint_transactions_both_commit() -> ArborResult<()> {
        let store = MemoryStore::default();
        let a = seed(&store, "a").await?;
        let b = seed(&store, "b").await?;

        let first = store.begin().await?;
        let second = store.begin().await?;
        first
            .set_fields(a.id, &FieldChanges::single(DocumentField::Sort(1)))
            .await?;
        second
            .set_fields(b.id, &FieldChanges::single(DocumentField::Sort(2)))
            .await?;
        second.insert(NewDocument::new("c")).await?;
        first.commit().await?;
        second.commit().await?;
        assert_eq!(store.len()?, 3);
        Ok(())
    }

    #[test]
    fn test_from_settings_rejects_unknown_target() {
        let settings = StoreSettings {
            target: "cproto://127.0.0.1:6534/testdb".to_string(),
            collection: "documents".to_string(),
        };
        assert!(MemoryStore::from_settings(&settings).is_err());
        assert!(MemoryStore::from_settings(&StoreSettings::default()).is_ok());
    }
}
