use async_trait::async_trait;
use editor_core::PageBackend;
use shared::{
    domain::{Block, PageId, PageSummary, UserId},
    error::{ApiError, ErrorCode},
    handle::PageHandle,
    protocol::{CreateBlockRequest, DeleteBlockRequest, ReorderBlocksRequest, SaveLayoutRequest},
};
use tracing::{debug, warn};

use crate::Storage;

/// [`PageBackend`] over SQLite, acting for one signed-in user.
#[derive(Clone)]
pub struct StorageBackend {
    storage: Storage,
    user_id: Option<UserId>,
}

impl StorageBackend {
    pub fn new(storage: Storage, user_id: Option<UserId>) -> Self {
        Self { storage, user_id }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    async fn owned_page_by_id(&self, page_id: &PageId) -> Result<PageSummary, ApiError> {
        let page = self
            .storage
            .page_by_id(page_id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApiError::new(ErrorCode::NotFound, format!("page {page_id} not found")))?;
        self.authorize(&page)?;
        Ok(page)
    }

    async fn owned_page_by_handle(&self, handle: &PageHandle) -> Result<PageSummary, ApiError> {
        let page = self
            .storage
            .page_by_handle(handle.as_str())
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApiError::new(ErrorCode::NotFound, format!("page '{handle}' not found")))?;
        self.authorize(&page)?;
        Ok(page)
    }

    fn authorize(&self, page: &PageSummary) -> Result<(), ApiError> {
        match &self.user_id {
            None => Err(ApiError::new(ErrorCode::Unauthorized, "sign in required")),
            Some(user_id) if *user_id != page.owner_id => {
                warn!(page_id = %page.page_id, user_id = %user_id, "mutation by non-owner refused");
                Err(ApiError::new(
                    ErrorCode::Unauthorized,
                    "only the page owner can edit blocks",
                ))
            }
            Some(_) => Ok(()),
        }
    }
}

fn ensure_handle(page: &PageSummary, handle: &PageHandle) -> Result<(), ApiError> {
    if page.handle == handle.as_str() {
        Ok(())
    } else {
        Err(ApiError::new(
            ErrorCode::Validation,
            format!("handle '{handle}' does not belong to page {}", page.page_id),
        ))
    }
}

fn persistence(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Persistence, format!("{err:#}"))
}

#[async_trait]
impl PageBackend for StorageBackend {
    async fn save_layout(&self, request: SaveLayoutRequest) -> Result<(), ApiError> {
        let page = self.owned_page_by_id(&request.page_id).await?;
        let updated = self
            .storage
            .save_layout(&page.page_id, &request.placements)
            .await
            .map_err(persistence)?;
        debug!(page_id = %page.page_id, updated, requested = request.placements.len(), "layout stored");
        Ok(())
    }

    async fn create_block(&self, request: CreateBlockRequest) -> Result<Block, ApiError> {
        let page = self.owned_page_by_id(&request.page_id).await?;
        ensure_handle(&page, &request.handle)?;
        self.storage
            .insert_block(&page.page_id, request.block_type, &request.data)
            .await
            .map_err(persistence)
    }

    async fn delete_block(&self, request: DeleteBlockRequest) -> Result<(), ApiError> {
        let page = self.owned_page_by_handle(&request.handle).await?;
        let owner = self
            .storage
            .block_page(&request.block_id)
            .await
            .map_err(persistence)?;
        if owner.as_ref() != Some(&page.page_id) {
            return Err(ApiError::new(
                ErrorCode::NotFound,
                format!("block {} not found on '{}'", request.block_id, request.handle),
            ));
        }
        self.storage
            .delete_block(&request.block_id)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn reorder_blocks(&self, request: ReorderBlocksRequest) -> Result<(), ApiError> {
        let page = self.owned_page_by_id(&request.page_id).await?;
        ensure_handle(&page, &request.handle)?;
        self.storage
            .apply_orderings(&page.page_id, &request.blocks)
            .await
            .map_err(persistence)
    }
}
