use std::{sync::Arc, time::Duration};

use editor_core::{
    normalizer::normalize_payload, AutosaveSettings, Collaborators, EditorError, EditorSession,
    PageBackend, PageContext, SaveStatus,
};
use shared::{
    domain::{BlockContent, BlockId, BlockType, PageSummary, StoragePlacement, UserId},
    error::ErrorCode,
    handle::PageHandle,
    protocol::{DeleteBlockRequest, SaveLayoutRequest},
};
use storage::{Storage, StorageBackend};

fn fast_settings() -> AutosaveSettings {
    AutosaveSettings {
        settle_delay: Duration::from_millis(20),
        saved_reset: Duration::from_secs(2),
        error_reset: Duration::from_secs(2),
    }
}

async fn seeded() -> (Storage, PageSummary) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let page = storage
        .create_page(
            &PageHandle::parse("studio").expect("handle"),
            &UserId::from("owner"),
            None,
        )
        .await
        .expect("page");
    (storage, page)
}

async fn open_session(storage: &Storage, page: &PageSummary, user: &str) -> EditorSession {
    let blocks = normalize_payload(
        &storage
            .load_layout_payload(&page.page_id)
            .await
            .expect("payload"),
    );
    let user_id = UserId::from(user);
    EditorSession::open(
        PageContext {
            page_id: page.page_id.clone(),
            handle: PageHandle::parse(&page.handle).expect("handle"),
            is_owner: user_id == page.owner_id,
        },
        blocks,
        Collaborators::new(Arc::new(StorageBackend::new(storage.clone(), Some(user_id)))),
        fast_settings(),
    )
}

#[tokio::test]
async fn owner_edits_are_persisted_and_reloaded() {
    let (storage, page) = seeded().await;
    let session = open_session(&storage, &page, "owner").await;

    let temp = session
        .create_placeholder(BlockType::Text)
        .await
        .expect("placeholder");
    let created = session
        .commit_placeholder(
            &temp,
            BlockContent {
                content: Some("hello".into()),
                ..BlockContent::default()
            },
        )
        .await
        .expect("create");

    session.move_block(&created.id, 1, 6).await.expect("move");
    session.flush().await;
    assert_eq!(session.status().get(), SaveStatus::Saved);
    session.close().await;

    let reopened = open_session(&storage, &page, "owner").await;
    let item = reopened.layout_lookup().await[&created.id].clone();
    assert_eq!((item.x, item.y, item.w, item.h), (1, 6, 2, 1));
    let blocks = storage.list_blocks(&page.page_id).await.expect("list");
    assert_eq!(blocks[0].content.content.as_deref(), Some("hello"));
}

#[tokio::test]
async fn reorder_and_delete_reach_the_database() {
    let (storage, page) = seeded().await;
    let a = storage
        .insert_block(&page.page_id, BlockType::Link, &BlockContent::default())
        .await
        .expect("a");
    let b = storage
        .insert_block(&page.page_id, BlockType::Image, &BlockContent::default())
        .await
        .expect("b");
    let session = open_session(&storage, &page, "owner").await;

    session.reorder_blocks(&b.id, &a.id).await.expect("reorder");
    let listed = storage.list_blocks(&page.page_id).await.expect("list");
    assert_eq!(listed[0].id, b.id);

    assert!(session.delete_block(&a.id).await.expect("delete"));
    let listed = storage.list_blocks(&page.page_id).await.expect("list");
    assert_eq!(listed.len(), 1);
    assert!(!session.layout_lookup().await.contains_key(&a.id));
}

#[tokio::test]
async fn visitors_cannot_mutate_through_the_backend() {
    let (storage, page) = seeded().await;
    let block = storage
        .insert_block(&page.page_id, BlockType::Link, &BlockContent::default())
        .await
        .expect("block");
    let visitor = StorageBackend::new(storage.clone(), Some(UserId::from("visitor")));

    let err = visitor
        .delete_block(DeleteBlockRequest {
            block_id: block.id.clone(),
            handle: PageHandle::parse("studio").expect("handle"),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let anonymous = StorageBackend::new(storage.clone(), None);
    let err = anonymous
        .save_layout(SaveLayoutRequest {
            page_id: page.page_id.clone(),
            placements: Vec::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let session = open_session(&storage, &page, "visitor").await;
    assert!(matches!(
        session.delete_block(&block.id).await,
        Err(EditorError::Authorization(_))
    ));
    assert_eq!(storage.list_blocks(&page.page_id).await.expect("list").len(), 1);
}

#[tokio::test]
async fn unknown_block_delete_is_not_found() {
    let (storage, _page) = seeded().await;
    let backend = StorageBackend::new(storage, Some(UserId::from("owner")));
    let err = backend
        .delete_block(DeleteBlockRequest {
            block_id: BlockId::from("missing"),
            handle: PageHandle::parse("studio").expect("handle"),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn layout_for_foreign_blocks_is_ignored() {
    let (storage, page) = seeded().await;
    let backend = StorageBackend::new(storage.clone(), Some(UserId::from("owner")));
    backend
        .save_layout(SaveLayoutRequest {
            page_id: page.page_id.clone(),
            placements: vec![shared::domain::ResponsiveBlockLayout {
                id: BlockId::from("ghost"),
                desktop: StoragePlacement::DEFAULT,
                mobile: StoragePlacement::DEFAULT,
            }],
        })
        .await
        .expect("save");
    assert!(storage.list_blocks(&page.page_id).await.expect("list").is_empty());
}
