use std::{sync::Arc, time::Duration};

use super::*;
use crate::{
    autosave::AutosaveSettings,
    fakes::{RecordingBackend, RecordingNotifier, RecordingReporter},
};

struct Harness {
    lifecycle: Arc<BlockLifecycle>,
    backend: Arc<RecordingBackend>,
    notifier: Arc<RecordingNotifier>,
    reporter: Arc<RecordingReporter>,
    status: SaveStatusCell,
}

fn block(id: &str, ordering: i64) -> Block {
    let mut block = Block::new(BlockId::from(id), BlockType::Text);
    block.ordering = Some(ordering);
    block
}

fn harness_with(backend: Arc<RecordingBackend>, is_owner: bool) -> Harness {
    let notifier = Arc::new(RecordingNotifier::default());
    let reporter = Arc::new(RecordingReporter::default());
    let status = AutosaveSettings::default().status_cell();
    let lifecycle = BlockLifecycle::new(
        PageId::from("page-1"),
        PageHandle::parse("alice").unwrap(),
        is_owner,
        vec![block("a", 0), block("b", 1), block("c", 2)],
        Collaborators {
            backend: backend.clone(),
            notifier: notifier.clone(),
            reporter: reporter.clone(),
        },
        status.clone(),
    );
    Harness {
        lifecycle: Arc::new(lifecycle),
        backend,
        notifier,
        reporter,
        status,
    }
}

fn harness() -> Harness {
    harness_with(RecordingBackend::new(), true)
}

fn ids(blocks: &[Block]) -> Vec<&str> {
    blocks.iter().map(|block| block.id.as_str()).collect()
}

fn last_kind(notifier: &RecordingNotifier) -> Option<NotificationKind> {
    notifier.added.lock().unwrap().last().map(|n| n.kind)
}

#[tokio::test(start_paused = true)]
async fn committed_placeholder_becomes_server_block() {
    let h = harness();
    let mut transitions = h.status.transitions();

    let temp = h.lifecycle.create_placeholder(BlockType::Text).await.unwrap();
    assert!(temp.as_str().starts_with(PLACEHOLDER_PREFIX));
    assert_eq!(h.status.get(), SaveStatus::Dirty);

    let data = BlockContent {
        content: Some("hello".into()),
        ..BlockContent::default()
    };
    let created = h.lifecycle.commit_placeholder(&temp, data).await.unwrap();

    assert!(h.lifecycle.placeholders().await.is_empty());
    let blocks = h.lifecycle.blocks().await;
    assert_eq!(blocks.last().unwrap().id, created.id);
    assert_eq!(created.content.content.as_deref(), Some("hello"));
    let request = h.backend.creates.lock().unwrap()[0].clone();
    assert_eq!(request.handle.as_str(), "alice");
    assert_eq!(request.block_type, BlockType::Text);

    tokio::time::sleep(Duration::from_millis(3_100)).await;
    let mut seen = Vec::new();
    while let Ok(status) = transitions.try_recv() {
        seen.push(status);
    }
    assert_eq!(
        seen,
        [
            SaveStatus::Dirty,
            SaveStatus::Saving,
            SaveStatus::Saved,
            SaveStatus::Idle
        ]
    );
    assert_eq!(last_kind(&h.notifier), Some(NotificationKind::Success));
}

#[tokio::test]
async fn failed_create_restores_placeholder() {
    let h = harness();
    h.backend.fail_on("create_block");
    let first = h.lifecycle.create_placeholder(BlockType::Link).await.unwrap();
    let second = h.lifecycle.create_placeholder(BlockType::Image).await.unwrap();

    let err = h
        .lifecycle
        .commit_placeholder(&first, BlockContent::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::Persistence(_)));

    let placeholders = h.lifecycle.placeholders().await;
    assert_eq!(placeholders.len(), 2);
    assert_eq!(placeholders[0].id, first);
    assert_eq!(placeholders[1].id, second);
    assert_eq!(h.lifecycle.blocks().await.len(), 3);
    assert_eq!(h.status.get(), SaveStatus::Error);
    assert_eq!(last_kind(&h.notifier), Some(NotificationKind::Error));
    assert_eq!(h.reporter.captured.lock().unwrap()[0].0, "create_block");
}

#[tokio::test]
async fn cancelled_placeholder_sends_nothing() {
    let h = harness();
    let temp = h.lifecycle.create_placeholder(BlockType::Map).await.unwrap();
    h.lifecycle.cancel_placeholder(&temp).await.unwrap();

    assert!(h.lifecycle.placeholders().await.is_empty());
    assert_eq!(h.status.get(), SaveStatus::Idle);
    assert!(h.backend.creates.lock().unwrap().is_empty());
    assert!(matches!(
        h.lifecycle.cancel_placeholder(&temp).await,
        Err(EditorError::NotFound(_))
    ));
}

#[tokio::test]
async fn items_list_placeholders_after_persisted_blocks() {
    let h = harness();
    let temp = h.lifecycle.create_placeholder(BlockType::Section).await.unwrap();
    let items = h.lifecycle.items().await;
    assert_eq!(items.len(), 4);
    assert!(items[..3].iter().all(BlockItem::is_persisted));
    assert_eq!(items[3].id(), &temp);
    assert_eq!(
        h.lifecycle.persisted_ids().await,
        [BlockId::from("a"), BlockId::from("b"), BlockId::from("c")]
    );
}

#[tokio::test]
async fn deleted_block_leaves_the_list() {
    let h = harness();
    assert!(h.lifecycle.delete_block(&BlockId::from("b")).await.unwrap());
    assert_eq!(ids(&h.lifecycle.blocks().await), ["a", "c"]);
    assert_eq!(h.status.get(), SaveStatus::Saved);
}

#[tokio::test]
async fn failed_delete_only_clears_pending_flag() {
    let h = harness();
    h.backend.fail_on("delete_block");
    let id = BlockId::from("b");

    let err = h.lifecycle.delete_block(&id).await.unwrap_err();
    assert!(matches!(err, EditorError::Persistence(_)));
    assert!(!h.lifecycle.is_pending_delete(&id).await);
    assert_eq!(ids(&h.lifecycle.blocks().await), ["a", "b", "c"]);
    assert_eq!(last_kind(&h.notifier), Some(NotificationKind::Error));
}

#[tokio::test]
async fn second_delete_while_pending_is_a_no_op() {
    let (backend, gate) = RecordingBackend::gated();
    let h = harness_with(backend, true);
    let id = BlockId::from("a");

    let lifecycle = Arc::clone(&h.lifecycle);
    let first = tokio::spawn({
        let id = id.clone();
        async move { lifecycle.delete_block(&id).await }
    });
    while !h.lifecycle.is_pending_delete(&id).await {
        tokio::task::yield_now().await;
    }

    assert!(!h.lifecycle.delete_block(&id).await.unwrap());
    gate.add_permits(1);
    assert!(first.await.unwrap().unwrap());
    assert_eq!(h.backend.deletes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn reorder_moves_and_renumbers() {
    let h = harness();
    let orderings = h
        .lifecycle
        .reorder_blocks(&BlockId::from("c"), &BlockId::from("a"))
        .await
        .unwrap();

    assert_eq!(ids(&h.lifecycle.blocks().await), ["c", "a", "b"]);
    assert_eq!(
        orderings,
        [
            BlockOrdering {
                id: BlockId::from("c"),
                ordering: 0
            },
            BlockOrdering {
                id: BlockId::from("a"),
                ordering: 1
            },
            BlockOrdering {
                id: BlockId::from("b"),
                ordering: 2
            },
        ]
    );
    assert_eq!(h.backend.reorders.lock().unwrap()[0].blocks, orderings);
}

#[tokio::test]
async fn failed_reorder_keeps_optimistic_order() {
    let h = harness();
    h.backend.fail_on("reorder_blocks");

    let err = h
        .lifecycle
        .reorder_blocks(&BlockId::from("a"), &BlockId::from("c"))
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::Persistence(_)));
    assert_eq!(ids(&h.lifecycle.blocks().await), ["b", "c", "a"]);
    assert_eq!(last_kind(&h.notifier), Some(NotificationKind::Error));
}

#[tokio::test]
async fn reorder_is_not_reentrant() {
    let (backend, gate) = RecordingBackend::gated();
    let h = harness_with(backend, true);

    let lifecycle = Arc::clone(&h.lifecycle);
    let first = tokio::spawn(async move {
        lifecycle
            .reorder_blocks(&BlockId::from("a"), &BlockId::from("b"))
            .await
    });
    while h.backend.reorders.lock().unwrap().is_empty() {
        tokio::task::yield_now().await;
    }

    let err = h
        .lifecycle
        .reorder_blocks(&BlockId::from("b"), &BlockId::from("c"))
        .await
        .unwrap_err();
    assert_eq!(err, EditorError::Busy("reorder"));

    gate.add_permits(1);
    first.await.unwrap().unwrap();
    assert_eq!(h.backend.reorders.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn visitors_are_refused_without_a_request() {
    let h = harness_with(RecordingBackend::new(), false);

    let err = h.lifecycle.create_placeholder(BlockType::Text).await.unwrap_err();
    assert!(matches!(err, EditorError::Authorization(_)));
    let err = h.lifecycle.delete_block(&BlockId::from("a")).await.unwrap_err();
    assert!(matches!(err, EditorError::Authorization(_)));
    let err = h
        .lifecycle
        .reorder_blocks(&BlockId::from("a"), &BlockId::from("b"))
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::Authorization(_)));

    assert!(h.backend.deletes.lock().unwrap().is_empty());
    assert!(h.backend.reorders.lock().unwrap().is_empty());
    assert_eq!(h.status.get(), SaveStatus::Idle);
}
