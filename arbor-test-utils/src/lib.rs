//! Arbor Test Utilities
//!
//! Shared test infrastructure for the Arbor workspace:
//! - Proptest generators for documents and tree-building scripts
//! - A service fixture over a fresh in-memory store
//! - Assertions for the tree and cache invariants

pub use arbor_core::{
    ArborConfig, ArborError, ArborResult, BigDocument, Depth, Document, DocumentId,
    DocumentUpdate, ErrorKind, NewDocument,
};
pub use arbor_storage::MemoryStore;
pub use arbor_tree::DocumentService;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for documents and tree operations.

    use super::*;
    use proptest::prelude::*;

    /// Generate a short document body.
    pub fn arb_body() -> impl Strategy<Value = String> {
        "[a-z]{0,12}"
    }

    pub fn arb_sort() -> impl Strategy<Value = i64> {
        -100i64..100
    }

    /// Generate a childless creation payload.
    pub fn arb_new_document() -> impl Strategy<Value = NewDocument> {
        (arb_body(), arb_sort()).prop_map(|(body, sort)| NewDocument::new(body).with_sort(sort))
    }

    /// One step of a tree-building script.
    ///
    /// Targets and children are indices into the list of live documents at
    /// the time the step runs, taken modulo its length.
    #[derive(Debug, Clone)]
    pub enum TreeOp {
        Create { body: String, children: Vec<usize> },
        SetChildren { target: usize, children: Vec<usize> },
        SetBody { target: usize, body: String },
        Delete { target: usize },
    }

    pub fn arb_tree_op() -> impl Strategy<Value = TreeOp> {
        let index = 0usize..64;
        let children = proptest::collection::vec(0usize..64, 0..3);
        prop_oneof![
            3 => (arb_body(), children.clone())
                .prop_map(|(body, children)| TreeOp::Create { body, children }),
            3 => (index.clone(), children)
                .prop_map(|(target, children)| TreeOp::SetChildren { target, children }),
            1 => (index.clone(), arb_body()).prop_map(|(target, body)| TreeOp::SetBody { target, body }),
            1 => index.prop_map(|target| TreeOp::Delete { target }),
        ]
    }

    /// Generate a script of up to `max_len` tree operations.
    pub fn arb_tree_script(max_len: usize) -> impl Strategy<Value = Vec<TreeOp>> {
        proptest::collection::vec(arb_tree_op(), 1..=max_len)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built services and trees for common testing scenarios.

    use super::generators::TreeOp;
    use super::*;

    /// Nesting level used when a test does not care about the bound.
    pub const TEST_NESTING_LEVEL: Depth = 5;

    /// Default config with the given nesting level.
    pub fn test_config(nesting_level: Depth) -> ArborConfig {
        ArborConfig::default().with_nesting_level(nesting_level)
    }

    /// A document service over a fresh in-memory store.
    pub struct ServiceFixture {
        pub service: DocumentService<MemoryStore>,
    }

    impl ServiceFixture {
        pub fn new() -> Self {
            Self::with_nesting_level(TEST_NESTING_LEVEL)
        }

        pub fn with_nesting_level(nesting_level: Depth) -> Self {
            let service = DocumentService::new(MemoryStore::default(), test_config(nesting_level))
                .unwrap_or_else(|err| panic!("invalid test config: {}", err));
            Self { service }
        }

        pub fn store(&self) -> &MemoryStore {
            self.service.store()
        }

        pub async fn create(&self, body: &str) -> ArborResult<Document> {
            self.service.create_document(NewDocument::new(body)).await
        }

        pub async fn create_with_children(
            &self,
            body: &str,
            children: Vec<DocumentId>,
        ) -> ArborResult<Document> {
            self.service
                .create_document(NewDocument::new(body).with_children(children))
                .await
        }

        /// Replace the child list of `id`.
        pub async fn set_children(
            &self,
            id: DocumentId,
            children: Vec<DocumentId>,
        ) -> ArborResult<Document> {
            self.service
                .update_document(id, DocumentUpdate::default().with_children(children))
                .await
        }

        /// Ids of every stored document.
        pub async fn ids(&self) -> ArborResult<Vec<DocumentId>> {
            Ok(self
                .service
                .list_documents()
                .await?
                .into_iter()
                .map(|doc| doc.id)
                .collect())
        }

        /// Run one script step against the current documents.
        pub async fn apply(&self, op: &TreeOp) -> ArborResult<()> {
            let ids = self.ids().await?;
            let pick = |index: usize| ids[index % ids.len()];
            let picks = |indices: &[usize]| -> Vec<DocumentId> {
                if ids.is_empty() {
                    Vec::new()
                } else {
                    indices.iter().map(|i| pick(*i)).collect()
                }
            };

            match op {
                TreeOp::Create { body, children } => {
                    self.create_with_children(body, picks(children.as_slice())).await?;
                }
                TreeOp::SetChildren { target, children } if !ids.is_empty() => {
                    self.set_children(pick(*target), picks(children.as_slice())).await?;
                }
                TreeOp::SetBody { target, body } if !ids.is_empty() => {
                    self.service
                        .update_document(pick(*target), DocumentUpdate::default().with_body(body.clone()))
                        .await?;
                }
                TreeOp::Delete { target } if !ids.is_empty() => {
                    self.service.delete_document(pick(*target)).await?;
                }
                _ => {}
            }
            Ok(())
        }
    }

    impl Default for ServiceFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Build a single path of `len` documents and return it root first.
    ///
    /// The leaf is created first and each new document adopts the previous
    /// one, so the root ends with `Depth == len - 1`.
    pub async fn build_chain(fixture: &ServiceFixture, len: usize) -> ArborResult<Vec<Document>> {
        let mut created: Vec<DocumentId> = Vec::with_capacity(len);
        for level in 0..len {
            let body = format!("level-{}", len - level - 1);
            let doc = match created.last() {
                Some(child) => fixture.create_with_children(&body, vec![*child]).await?,
                None => fixture.create(&body).await?,
            };
            created.push(doc.id);
        }

        let mut chain = Vec::with_capacity(len);
        for id in created.into_iter().rev() {
            chain.push(fixture.service.get_document(id).await?);
        }
        Ok(chain)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Arbor-specific invariants.

    use std::collections::{HashMap, HashSet};

    use super::*;
    use arbor_storage::DocumentStore;

    /// Assert that an ArborResult failed with the given kind.
    #[track_caller]
    pub fn assert_error_kind<T: std::fmt::Debug>(result: &ArborResult<T>, kind: ErrorKind) {
        match result {
            Err(err) => assert_eq!(err.kind(), kind, "Wrong error kind for {:?}", err),
            Ok(value) => panic!("Expected {} error, got Ok({:?})", kind, value),
        }
    }

    /// Assert every structural invariant over the committed documents:
    /// - each child exists, is listed once and points back at its parent
    /// - each non-root document is listed by its parent
    /// - `Depth` is 0 for leaves and one more than the deepest child otherwise
    /// - `height + Depth` never exceeds the nesting level
    pub async fn assert_tree_invariants<S: DocumentStore>(
        service: &DocumentService<S>,
    ) -> ArborResult<()> {
        let docs: HashMap<DocumentId, Document> = service
            .store()
            .list()
            .await?
            .into_iter()
            .map(|doc| (doc.id, doc))
            .collect();
        let limit = service.config().nesting_level;

        for doc in docs.values() {
            let mut seen = HashSet::new();
            let mut deepest: Option<Depth> = None;
            for child_id in &doc.child_list {
                assert!(seen.insert(*child_id), "{} lists {} twice", doc.id, child_id);
                let child = docs
                    .get(child_id)
                    .unwrap_or_else(|| panic!("{} lists missing child {}", doc.id, child_id));
                assert_eq!(
                    child.parent_id, doc.id,
                    "child {} of {} has parent {}",
                    child.id, doc.id, child.parent_id
                );
                deepest = Some(deepest.map_or(child.depth, |d| d.max(child.depth)));
            }
            let expected = match deepest {
                Some(d) if !doc.is_leaf() => d + 1,
                _ => 0,
            };
            assert_eq!(doc.depth, expected, "wrong depth on {}", doc.id);

            let mut height: Depth = 0;
            let mut cursor = doc;
            while !cursor.is_root() {
                let parent = docs
                    .get(&cursor.parent_id)
                    .unwrap_or_else(|| panic!("{} has missing parent {}", cursor.id, cursor.parent_id));
                assert!(
                    parent.child_list.contains(&cursor.id),
                    "{} is not listed by its parent {}",
                    cursor.id,
                    parent.id
                );
                height += 1;
                assert!(height <= limit, "parent chain of {} exceeds the nesting level", doc.id);
                cursor = parent;
            }
            assert!(
                height + doc.depth <= limit,
                "{} at height {} with depth {} exceeds nesting level {}",
                doc.id,
                height,
                doc.depth,
                limit
            );
        }
        Ok(())
    }

    /// Assert that every cached entry equals the committed row and that
    /// none of `removed` is cached.
    pub async fn assert_cache_consistent<S: DocumentStore>(
        service: &DocumentService<S>,
        removed: &[DocumentId],
    ) -> ArborResult<()> {
        for id in removed {
            assert!(!service.cache().contains(*id), "deleted document {} still cached", id);
        }
        for doc in service.store().list().await? {
            if service.cache().contains(doc.id) {
                if let Some(cached) = service.cache().get(doc.id).await {
                    assert_eq!(cached, doc, "cache diverged from store for {}", doc.id);
                }
            }
        }
        Ok(())
    }
}
