//! Structural mutations inside one store transaction.
//!
//! A [`TreeMutation`] pairs an open store transaction with the request's
//! [`ActionBuffer`]. Every write goes through the transaction and records
//! the matching cache action, and every read goes through the transaction
//! so later steps observe earlier ones.

use arbor_core::{
    is_root_parent, ArborError, ArborResult, Depth, Document, DocumentField, DocumentId,
    DocumentUpdate, FieldChanges, FieldKind, NewDocument, StorageError, TreeError,
    ValidationError,
};
use arbor_storage::{ActionBuffer, DocumentStore, StoreTransaction};
use futures_util::future::{join_all, try_join, try_join_all, BoxFuture, FutureExt};

use crate::diff::{child_diff, find_duplicate, ChildDiff};
use crate::service::{DocumentService, Placement};

pub struct TreeMutation<'a, S: DocumentStore> {
    service: &'a DocumentService<S>,
    tx: &'a S::Transaction,
    actions: &'a ActionBuffer,
}

impl<'a, S: DocumentStore> TreeMutation<'a, S> {
    pub(crate) fn new(
        service: &'a DocumentService<S>,
        tx: &'a S::Transaction,
        actions: &'a ActionBuffer,
    ) -> Self {
        Self {
            service,
            tx,
            actions,
        }
    }

    /// Write `changes` to `id` and stage the same changes for the cache.
    pub async fn set_fields(&self, id: DocumentId, changes: FieldChanges) -> ArborResult<()> {
        if changes.is_empty() {
            return Ok(());
        }
        self.tx.set_fields(id, &changes).await?;
        self.actions.record_update(id, changes)
    }

    async fn load(&self, id: DocumentId) -> ArborResult<Document> {
        self.tx
            .get(id)
            .await?
            .ok_or_else(|| ArborError::not_found(id))
    }

    /// Walk the parent chain of `doc` to its root as seen by the transaction.
    pub async fn locate(&self, doc: &Document) -> ArborResult<Placement> {
        let mut placement = Placement {
            height: 0,
            root: doc.id,
        };
        let mut parent_id = doc.parent_id;
        while !is_root_parent(parent_id) {
            let parent = self.load(parent_id).await?;
            placement.height += 1;
            placement.root = parent.id;
            parent_id = parent.parent_id;
        }
        Ok(placement)
    }

    /// Check that every candidate can become a child of a node at
    /// `target_height`.
    ///
    /// Candidates are read through the transaction, so a concurrent commit
    /// touching any of them fails this transaction's commit. All checks
    /// finish; the error of the first failing candidate in list order is
    /// returned.
    pub async fn validate_attachment(
        &self,
        target_height: Depth,
        candidates: &[DocumentId],
    ) -> ArborResult<()> {
        let checks = candidates
            .iter()
            .map(|id| self.check_candidate(target_height, *id));
        join_all(checks).await.into_iter().collect()
    }

    async fn check_candidate(&self, target_height: Depth, id: DocumentId) -> ArborResult<()> {
        let candidate = self
            .tx
            .get(id)
            .await?
            .ok_or(TreeError::DocumentNotFound { id })?;
        if !candidate.is_root() {
            return Err(TreeError::AlreadyHasParent {
                id,
                parent_id: candidate.parent_id,
            }
            .into());
        }
        let limit = self.service.config().nesting_level;
        let required = candidate.depth.saturating_add(target_height).saturating_add(1);
        if required > limit {
            return Err(TreeError::NestingLevelExceeded {
                id,
                required,
                limit,
            }
            .into());
        }
        Ok(())
    }

    /// Validate replacing `parent`'s children with `desired` and return
    /// the resulting diff. Performs no writes.
    pub async fn plan_children(
        &self,
        parent: &Document,
        desired: &[DocumentId],
    ) -> ArborResult<ChildDiff> {
        if let Some(id) = find_duplicate(desired) {
            return Err(ValidationError::DuplicateChild { id }.into());
        }
        let diff = child_diff(&parent.child_list, desired);
        if diff.attach.is_empty() {
            return Ok(diff);
        }

        let placement = self.locate(parent).await?;
        if let Some(id) = diff
            .attach
            .iter()
            .copied()
            .find(|id| *id == parent.id || *id == placement.root)
        {
            return Err(TreeError::SelfNested { id }.into());
        }
        self.validate_attachment(placement.height, &diff.attach)
            .await?;
        Ok(diff)
    }

    /// Insert `draft` as a root, then attach the children it lists.
    pub async fn create_document(&self, draft: NewDocument) -> ArborResult<DocumentId> {
        let children = draft.child_list.clone();
        let row = self.tx.insert(draft).await?;
        if !children.is_empty() {
            self.reconcile_children(&row, children).await?;
        }
        Ok(row.id)
    }

    /// Reconcile the child list if one is given, then write scalar fields.
    pub async fn update_document(&self, id: DocumentId, update: DocumentUpdate) -> ArborResult<()> {
        let current = self.load(id).await?;
        let scalar = update.scalar_changes();
        if let Some(children) = update.child_list {
            self.reconcile_children(&current, children).await?;
        }
        self.set_fields(id, scalar).await
    }

    /// Replace `parent`'s child list with `desired`.
    ///
    /// Children missing from `desired` are deleted together with their
    /// subtrees. New children are validated before anything is written.
    pub async fn reconcile_children(
        &self,
        parent: &Document,
        desired: Vec<DocumentId>,
    ) -> ArborResult<()> {
        let diff = self.plan_children(parent, &desired).await?;
        if diff.is_empty() {
            if parent.child_list != desired {
                self.set_fields(parent.id, FieldChanges::single(DocumentField::ChildList(desired)))
                    .await?;
            }
            return Ok(());
        }

        try_join_all(diff.detach.iter().map(|id| self.cascade_delete(*id))).await?;

        let current = self.load(parent.id).await?;
        try_join(
            self.propagate_depth(current, desired.clone()),
            self.attach(parent.id, &diff.attach),
        )
        .await?;

        self.set_fields(parent.id, FieldChanges::single(DocumentField::ChildList(desired)))
            .await
    }

    async fn attach(&self, parent_id: DocumentId, children: &[DocumentId]) -> ArborResult<()> {
        try_join_all(children.iter().map(|id| {
            self.set_fields(*id, FieldChanges::single(DocumentField::ParentId(parent_id)))
        }))
        .await?;
        Ok(())
    }

    /// Deepest `Depth` among `ids`, or `None` when there are none.
    async fn max_depth(&self, ids: &[DocumentId]) -> ArborResult<Option<Depth>> {
        if ids.is_empty() {
            return Ok(None);
        }
        match self.tx.aggregate_max(FieldKind::Depth, ids).await? {
            Some(max) => Depth::try_from(max).map(Some).map_err(|_| {
                ArborError::Storage(StorageError::UpdateFailed {
                    id: ids[0],
                    reason: format!("stored depth {} out of range", max),
                })
            }),
            None => Ok(None),
        }
    }

    /// Recompute `Depth` from `node` upward, given `node`'s child set.
    ///
    /// Stops at the first node whose depth is already correct, since no
    /// ancestor above it can change either.
    pub async fn propagate_depth(
        &self,
        node: Document,
        child_ids: Vec<DocumentId>,
    ) -> ArborResult<()> {
        let mut node = node;
        let mut deepest_child = self.max_depth(&child_ids).await?;

        loop {
            let depth = deepest_child.map_or(0, |d| d + 1);
            if node.depth == depth {
                break;
            }
            self.set_fields(node.id, FieldChanges::single(DocumentField::Depth(depth)))
                .await?;
            if node.is_root() {
                break;
            }

            let Some(parent) = self.tx.get(node.parent_id).await? else {
                tracing::warn!(id = node.id, parent_id = node.parent_id, "parent missing during depth update");
                break;
            };
            let siblings = parent.children_without(node.id);
            let deepest_sibling = self.max_depth(&siblings).await?;
            deepest_child = Some(deepest_sibling.map_or(depth, |d| d.max(depth)));
            node = parent;
        }
        Ok(())
    }

    /// Delete `id` and every descendant, children first.
    pub fn cascade_delete(&self, id: DocumentId) -> BoxFuture<'_, ArborResult<()>> {
        async move {
            let Some(doc) = self.tx.get(id).await? else {
                tracing::warn!(id, "skipping missing document in cascade delete");
                return Ok(());
            };
            if !doc.is_leaf() {
                try_join_all(doc.child_list.iter().map(|child| self.cascade_delete(*child)))
                    .await?;
            }
            self.tx.delete(id).await?;
            self.actions.record_delete(id)
        }
        .boxed()
    }

    /// Delete `id` with its subtree and unlink it from its parent.
    pub async fn delete_document(&self, id: DocumentId) -> ArborResult<()> {
        let doc = self.load(id).await?;
        try_join(self.cascade_delete(id), self.detach_from_parent(&doc)).await?;
        Ok(())
    }

    async fn detach_from_parent(&self, doc: &Document) -> ArborResult<()> {
        if doc.is_root() {
            return Ok(());
        }
        let Some(parent) = self.tx.get(doc.parent_id).await? else {
            tracing::warn!(id = doc.id, parent_id = doc.parent_id, "parent already gone");
            return Ok(());
        };
        let remaining = parent.children_without(doc.id);
        self.set_fields(
            parent.id,
            FieldChanges::single(DocumentField::ChildList(remaining.clone())),
        )
        .await?;
        self.propagate_depth(parent, remaining).await
    }
}
