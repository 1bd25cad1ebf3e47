//! Property tests: random tree scripts never break the tree invariants.

use arbor_core::{ArborError, ArborResult, Document};
use arbor_test_utils::assertions::{assert_cache_consistent, assert_tree_invariants};
use arbor_test_utils::fixtures::{build_chain, ServiceFixture};
use arbor_test_utils::generators::{arb_new_document, arb_tree_script};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
}

async fn snapshot(fx: &ServiceFixture) -> ArborResult<Vec<Document>> {
    fx.service.list_documents().await
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_scripts_preserve_invariants(
        nesting_level in 1u32..5,
        script in arb_tree_script(24),
    ) {
        runtime().block_on(async {
            let fx = ServiceFixture::with_nesting_level(nesting_level);
            for op in &script {
                let before = snapshot(&fx).await?;
                if let Err(err) = fx.apply(op).await {
                    // Rejected requests leave no trace in the store.
                    assert_eq!(snapshot(&fx).await?, before, "{:?} failed with {} but changed the store", op, err);
                }
                assert_tree_invariants(&fx.service).await?;
            }
            assert_cache_consistent(&fx.service, &[]).await?;
            Ok::<_, ArborError>(())
        }).expect("store error");
    }

    #[test]
    fn prop_removed_child_subtree_is_gone(len in 2usize..6) {
        runtime().block_on(async {
            let fx = ServiceFixture::new();
            let chain = build_chain(&fx, len).await?;
            fx.set_children(chain[0].id, vec![]).await?;

            for doc in &chain[1..] {
                assert!(!fx.store().contains(doc.id)?);
            }
            assert_eq!(fx.service.get_document(chain[0].id).await?.depth, 0);
            Ok::<_, ArborError>(())
        }).expect("store error");
    }

    #[test]
    fn prop_created_documents_start_as_leaf_roots(draft in arb_new_document()) {
        runtime().block_on(async {
            let fx = ServiceFixture::new();
            let doc = fx.service.create_document(draft.clone()).await?;
            assert!(doc.is_root());
            assert!(doc.is_leaf());
            assert_eq!(doc.depth, 0);
            assert_eq!(doc.body, draft.body);
            assert_eq!(doc.sort, draft.sort);
            assert_eq!(fx.service.list_documents().await?, vec![doc]);
            Ok::<_, ArborError>(())
        }).expect("store error");
    }

    #[test]
    fn prop_chain_depths_count_down(len in 1usize..6) {
        runtime().block_on(async {
            let fx = ServiceFixture::new();
            let chain = build_chain(&fx, len).await?;
            for (height, doc) in chain.iter().enumerate() {
                assert_eq!(doc.depth as usize, len - 1 - height);
                assert_eq!(fx.service.height(doc.id).await? as usize, height);
            }
            Ok::<_, ArborError>(())
        }).expect("store error");
    }
}
