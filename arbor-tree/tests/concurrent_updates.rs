//! Concurrent requests racing for the same documents on a multi-threaded
//! runtime.

use std::sync::Arc;

use arbor_core::{ArborError, ArborResult, DocumentId, DocumentUpdate, ErrorKind, NewDocument};
use arbor_storage::MemoryStore;
use arbor_test_utils::assertions::{assert_cache_consistent, assert_tree_invariants};
use arbor_test_utils::fixtures::{test_config, TEST_NESTING_LEVEL};
use arbor_tree::DocumentService;
use tokio::sync::Barrier;

type SharedService = Arc<DocumentService<MemoryStore>>;

const ROUNDS: usize = 64;

fn shared_service() -> ArborResult<SharedService> {
    let service = DocumentService::new(MemoryStore::default(), test_config(TEST_NESTING_LEVEL))?;
    Ok(Arc::new(service))
}

/// Run `update` against every target at once, released together.
async fn race(
    service: &SharedService,
    targets: &[DocumentId],
    update: DocumentUpdate,
) -> Vec<ArborResult<()>> {
    let barrier = Arc::new(Barrier::new(targets.len()));
    let handles: Vec<_> = targets
        .iter()
        .map(|target| {
            let service = Arc::clone(service);
            let barrier = Arc::clone(&barrier);
            let update = update.clone();
            let target = *target;
            tokio::spawn(async move {
                barrier.wait().await;
                service.update_document(target, update).await.map(|_| ())
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(
            handle
                .await
                .unwrap_or_else(|err| Err(ArborError::transaction_failed(err.to_string()))),
        );
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_attach_of_same_root_has_one_winner() -> ArborResult<()> {
    let service = shared_service()?;

    for _ in 0..ROUNDS {
        let a = service.create_document(NewDocument::new("a")).await?;
        let b = service.create_document(NewDocument::new("b")).await?;
        let c = service.create_document(NewDocument::new("c")).await?;

        let results = race(
            &service,
            &[a.id, b.id],
            DocumentUpdate::default().with_children(vec![c.id]),
        )
        .await;

        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1, "expected exactly one attach to win: {:?}", results);
        for result in &results {
            if let Err(err) = result {
                assert!(
                    matches!(err.kind(), ErrorKind::TransactionFailed | ErrorKind::AlreadyHasParent),
                    "unexpected loser error: {}",
                    err
                );
            }
        }

        let c = service.get_document(c.id).await?;
        assert!(c.parent_id == a.id || c.parent_id == b.id);
        let parents = service
            .list_documents()
            .await?
            .into_iter()
            .filter(|doc| doc.child_list.contains(&c.id))
            .count();
        assert_eq!(parents, 1);
    }

    assert_tree_invariants(service.as_ref()).await?;
    assert_cache_consistent(service.as_ref(), &[]).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_delete_and_update_leave_no_orphans() -> ArborResult<()> {
    let service = shared_service()?;

    for _ in 0..ROUNDS {
        let leaf = service.create_document(NewDocument::new("leaf")).await?;
        let root = service
            .create_document(NewDocument::new("root").with_children(vec![leaf.id]))
            .await?;

        let deleting = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.delete_document(root.id).await })
        };
        let updating = {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .update_document(leaf.id, DocumentUpdate::default().with_body("late".to_string()))
                    .await
                    .map(|_| ())
            })
        };

        let deleted = deleting
            .await
            .unwrap_or_else(|err| Err(ArborError::transaction_failed(err.to_string())));
        let updated = updating
            .await
            .unwrap_or_else(|err| Err(ArborError::transaction_failed(err.to_string())));

        if deleted.is_ok() {
            assert!(!service.store().contains(leaf.id)?, "deleted leaf came back");
            assert_cache_consistent(service.as_ref(), &[root.id, leaf.id]).await?;
        } else {
            assert!(updated.is_ok(), "both requests failed: {:?}", deleted);
        }
    }

    assert_tree_invariants(service.as_ref()).await?;
    assert_cache_consistent(service.as_ref(), &[]).await
}
