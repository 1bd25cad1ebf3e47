//! Document service: the operations exposed to callers.
//!
//! Reads go cache-first and fall back to the store, populating the cache on
//! a miss. Each mutating operation runs in its own store transaction paired
//! with an [`ActionBuffer`]; the buffer reaches the cache only after the
//! transaction commits.

use std::sync::Arc;

use arbor_core::{
    ArborConfig, ArborError, ArborResult, BigDocument, Depth, Document, DocumentId,
    DocumentUpdate, ErrorKind, NewDocument, ValidationError, is_root_parent,
};
use arbor_storage::{ActionBuffer, DocumentStore, StoreTransaction, TtlCache};
use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use tokio::task::JoinHandle;

use crate::engine::TreeMutation;

/// Position of a document within its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Edges from the document up to its root.
    pub height: Depth,
    /// Root of the tree containing the document.
    pub root: DocumentId,
}

/// Tree engine over a document store and a TTL cache.
pub struct DocumentService<S: DocumentStore> {
    store: Arc<S>,
    cache: Arc<TtlCache>,
    config: ArborConfig,
}

impl<S: DocumentStore> DocumentService<S> {
    /// Build a service with a fresh cache sized from `config`.
    pub fn new(store: S, config: ArborConfig) -> ArborResult<Self> {
        config.validate()?;
        let cache = Arc::new(TtlCache::from_settings(&config.cache));
        Ok(Self::with_cache(Arc::new(store), cache, config))
    }

    pub fn with_cache(store: Arc<S>, cache: Arc<TtlCache>, config: ArborConfig) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    pub fn config(&self) -> &ArborConfig {
        &self.config
    }

    /// Start the periodic cache sweep configured in `cache.sweep_interval_secs`.
    pub fn spawn_sweeper(&self) -> Option<JoinHandle<()>> {
        self.cache.spawn_sweeper(self.config.cache.sweep_interval())
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Cache-first lookup.
    pub async fn find_document(&self, id: DocumentId) -> ArborResult<Option<Document>> {
        if let Some(doc) = self.cache.get(id).await {
            return Ok(Some(doc));
        }
        let Some(doc) = self.store.get(id).await? else {
            return Ok(None);
        };
        self.cache.add(doc.clone()).await;
        Ok(Some(doc))
    }

    pub async fn get_document(&self, id: DocumentId) -> ArborResult<Document> {
        self.find_document(id)
            .await?
            .ok_or_else(|| ArborError::not_found(id))
    }

    /// Every stored document in id order.
    pub async fn list_documents(&self) -> ArborResult<Vec<Document>> {
        self.store.list().await
    }

    /// Edges from `id` up to its root; 0 for the root sentinel.
    pub async fn height(&self, id: DocumentId) -> ArborResult<Depth> {
        if is_root_parent(id) {
            return Ok(0);
        }
        let doc = self.get_document(id).await?;
        Ok(self.locate(&doc).await?.height)
    }

    /// Walk the parent chain of `doc` to its root.
    pub async fn locate(&self, doc: &Document) -> ArborResult<Placement> {
        let mut placement = Placement {
            height: 0,
            root: doc.id,
        };
        let mut parent_id = doc.parent_id;
        while !is_root_parent(parent_id) {
            let parent = self.get_document(parent_id).await?;
            placement.height += 1;
            placement.root = parent.id;
            parent_id = parent.parent_id;
        }
        Ok(placement)
    }

    /// Recursive expansion of `id` and its descendants.
    pub async fn get_expanded_tree(&self, id: DocumentId) -> ArborResult<BigDocument> {
        let doc = self.get_document(id).await?;
        self.expand(doc).await
    }

    /// Expansion of every root document.
    pub async fn list_expanded_roots(&self) -> ArborResult<Vec<BigDocument>> {
        let roots = self.store.list_roots().await?;
        try_join_all(roots.into_iter().map(|doc| self.expand(doc))).await
    }

    fn expand(&self, doc: Document) -> BoxFuture<'_, ArborResult<BigDocument>> {
        async move {
            let mut big = BigDocument::leaf(&doc);
            for child in &doc.child_list {
                match self.find_document(*child).await? {
                    Some(child_doc) => big.child_list.push(self.expand(child_doc).await?),
                    None => tracing::warn!(id = doc.id, child = *child, "dangling child reference"),
                }
            }
            Ok(big)
        }
        .boxed()
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Insert a document and attach the children it lists.
    pub async fn create_document(&self, draft: NewDocument) -> ArborResult<Document> {
        let tx = self.store.begin().await?;
        let actions = ActionBuffer::new();
        let outcome = TreeMutation::new(self, &tx, &actions)
            .create_document(draft)
            .await;
        let id = self.finish(tx, actions, outcome).await?;
        tracing::debug!(id, "document created");
        self.get_document(id).await
    }

    /// Apply an external update. A supplied child list replaces the current
    /// one, deleting the subtrees of children it no longer names.
    pub async fn update_document(
        &self,
        id: DocumentId,
        update: DocumentUpdate,
    ) -> ArborResult<Document> {
        require_id(id)?;
        let current = self.get_document(id).await?;
        if update.is_empty() {
            return Ok(current);
        }

        let tx = self.store.begin().await?;
        let actions = ActionBuffer::new();
        let outcome = TreeMutation::new(self, &tx, &actions)
            .update_document(id, update)
            .await;
        self.finish(tx, actions, outcome).await?;
        tracing::debug!(id, "document updated");
        self.get_document(id).await
    }

    /// Delete `id` and its whole subtree, unlinking it from its parent.
    pub async fn delete_document(&self, id: DocumentId) -> ArborResult<()> {
        require_id(id)?;
        self.get_document(id).await?;
        let tx = self.store.begin().await?;
        let actions = ActionBuffer::new();
        let outcome = TreeMutation::new(self, &tx, &actions)
            .delete_document(id)
            .await;
        self.finish(tx, actions, outcome).await?;
        tracing::debug!(id, "document deleted");
        Ok(())
    }

    /// Settle a transaction and its action buffer together.
    async fn finish<T>(
        &self,
        tx: S::Transaction,
        actions: ActionBuffer,
        outcome: ArborResult<T>,
    ) -> ArborResult<T> {
        match outcome {
            Ok(value) => match tx.commit().await {
                Ok(()) => {
                    actions.commit(&self.cache).await;
                    Ok(value)
                }
                Err(err) => {
                    actions.rollback();
                    tracing::warn!(error = %err, "commit failed");
                    if err.kind() == ErrorKind::TransactionFailed {
                        Err(err)
                    } else {
                        Err(ArborError::transaction_failed(err.to_string()))
                    }
                }
            },
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                actions.rollback();
                Err(err)
            }
        }
    }
}

/// Mutations address an existing document; the root sentinel names none.
fn require_id(id: DocumentId) -> ArborResult<()> {
    if is_root_parent(id) {
        return Err(ValidationError::RequiredFieldMissing {
            field: "Id".to_string(),
        }
        .into());
    }
    Ok(())
}
