//! Store adapter boundary.
//!
//! The tree engine consumes the backing document store only through these
//! two traits: point reads and listings on the store itself, and every write
//! through a [`StoreTransaction`] that is committed or rolled back as a unit.

use arbor_core::{ArborResult, Document, DocumentId, FieldChanges, FieldKind, NewDocument};
use async_trait::async_trait;

/// Document collection keyed by an integer id.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Transaction type produced by [`DocumentStore::begin`].
    type Transaction: StoreTransaction;

    /// Open a transaction.
    async fn begin(&self) -> ArborResult<Self::Transaction>;

    /// Point lookup of a committed document.
    async fn get(&self, id: DocumentId) -> ArborResult<Option<Document>>;

    /// Every committed document, in id order.
    async fn list(&self) -> ArborResult<Vec<Document>>;

    /// Every committed document with no parent, in id order.
    async fn list_roots(&self) -> ArborResult<Vec<Document>>;
}

/// An open store transaction.
///
/// Reads through the transaction observe its own uncommitted writes.
/// Nothing becomes visible to [`DocumentStore`] reads until `commit`
/// succeeds.
#[async_trait]
pub trait StoreTransaction: Send + Sync {
    /// Insert a new row; the store assigns the id.
    async fn insert(&self, draft: NewDocument) -> ArborResult<Document>;

    /// Point lookup.
    async fn get(&self, id: DocumentId) -> ArborResult<Option<Document>>;

    /// Point update of the given fields.
    async fn set_fields(&self, id: DocumentId, changes: &FieldChanges) -> ArborResult<()>;

    /// Delete a row. Deleting an absent row is a no-op.
    async fn delete(&self, id: DocumentId) -> ArborResult<()>;

    /// Maximum of a numeric field over a key set.
    ///
    /// Returns `None` when none of the keys exist.
    async fn aggregate_max(&self, field: FieldKind, ids: &[DocumentId])
        -> ArborResult<Option<i64>>;

    /// Make every staged write visible atomically.
    async fn commit(self) -> ArborResult<()>
    where
        Self: Sized;

    /// Discard every staged write.
    async fn rollback(self) -> ArborResult<()>
    where
        Self: Sized;
}
