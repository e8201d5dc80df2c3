use super::*;
use editor_core::normalizer::normalize_payload;
use shared::domain::{StoragePlacement, StoredPosition};

async fn storage_with_page() -> (Storage, PageSummary) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let page = storage
        .create_page(
            &PageHandle::parse("alice").expect("handle"),
            &UserId::from("user-1"),
            Some("Alice"),
        )
        .await
        .expect("page");
    (storage, page)
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("pages.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn pages_are_found_by_handle_and_id() {
    let (storage, page) = storage_with_page().await;
    let by_handle = storage.page_by_handle("alice").await.expect("query");
    assert_eq!(by_handle, Some(page.clone()));
    let by_id = storage.page_by_id(&page.page_id).await.expect("query");
    assert_eq!(by_id.and_then(|p| p.title), Some("Alice".to_string()));
    assert_eq!(storage.page_by_handle("bob").await.expect("query"), None);
}

#[tokio::test]
async fn duplicate_handle_is_rejected() {
    let (storage, _) = storage_with_page().await;
    let again = storage
        .create_page(
            &PageHandle::parse("alice").expect("handle"),
            &UserId::from("user-2"),
            None,
        )
        .await;
    assert!(again.is_err());
}

#[tokio::test]
async fn inserted_blocks_append_with_preset_sizes() {
    let (storage, page) = storage_with_page().await;
    let link = storage
        .insert_block(&page.page_id, BlockType::Link, &BlockContent::default())
        .await
        .expect("link");
    let section = storage
        .insert_block(&page.page_id, BlockType::Section, &BlockContent::default())
        .await
        .expect("section");

    assert_eq!(link.ordering, Some(0));
    assert_eq!(section.ordering, Some(1));
    assert_eq!(section.style.desktop.as_deref(), Some("8x2"));

    let listed = storage.list_blocks(&page.page_id).await.expect("list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, link.id);
    assert_eq!(listed[1].block_type, BlockType::Section);
}

#[tokio::test]
async fn orderings_rewrite_list_order() {
    let (storage, page) = storage_with_page().await;
    let first = storage
        .insert_block(&page.page_id, BlockType::Text, &BlockContent::default())
        .await
        .expect("first");
    let second = storage
        .insert_block(&page.page_id, BlockType::Text, &BlockContent::default())
        .await
        .expect("second");

    storage
        .apply_orderings(
            &page.page_id,
            &[
                BlockOrdering {
                    id: second.id.clone(),
                    ordering: 0,
                },
                BlockOrdering {
                    id: first.id.clone(),
                    ordering: 1,
                },
            ],
        )
        .await
        .expect("reorder");

    let listed = storage.list_blocks(&page.page_id).await.expect("list");
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
}

#[tokio::test]
async fn saved_layout_round_trips_through_payload() {
    let (storage, page) = storage_with_page().await;
    let block = storage
        .insert_block(&page.page_id, BlockType::Image, &BlockContent::default())
        .await
        .expect("block");

    let updated = storage
        .save_layout(
            &page.page_id,
            &[
                ResponsiveBlockLayout {
                    id: block.id.clone(),
                    desktop: StoragePlacement { x: 3, y: 1, w: 2, h: 2 },
                    mobile: StoragePlacement { x: 5, y: 0, w: 2, h: 1 },
                },
                ResponsiveBlockLayout {
                    id: BlockId::from("elsewhere"),
                    desktop: StoragePlacement::DEFAULT,
                    mobile: StoragePlacement::DEFAULT,
                },
            ],
        )
        .await
        .expect("save");
    assert_eq!(updated, 1);

    let payload = storage
        .load_layout_payload(&page.page_id)
        .await
        .expect("payload");
    let blocks = normalize_payload(&payload);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].style.desktop.as_deref(), Some("4x4"));
    assert_eq!(blocks[0].style.mobile.as_deref(), Some("4x2"));
    assert_eq!(
        blocks[0].position.desktop,
        Some(StoredPosition {
            x: Some(3),
            y: Some(1)
        })
    );
}

#[tokio::test]
async fn deleting_a_block_reports_whether_it_existed() {
    let (storage, page) = storage_with_page().await;
    let block = storage
        .insert_block(&page.page_id, BlockType::Map, &BlockContent::default())
        .await
        .expect("block");

    assert_eq!(
        storage.block_page(&block.id).await.expect("owner"),
        Some(page.page_id.clone())
    );
    assert!(storage.delete_block(&block.id).await.expect("delete"));
    assert!(!storage.delete_block(&block.id).await.expect("delete"));
    assert!(storage.list_blocks(&page.page_id).await.expect("list").is_empty());
}
