//! Create, delete and reorder of blocks on one page.

use std::collections::HashSet;

use shared::{
    domain::{Block, BlockContent, BlockId, BlockItem, BlockType, PageId, PlaceholderBlock},
    handle::PageHandle,
    protocol::{
        BlockOrdering, CreateBlockRequest, DeleteBlockRequest, Notification, NotificationKind,
        ReorderBlocksRequest,
    },
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    backend::{Collaborators, NotificationId},
    error::EditorError,
    normalizer::resequence,
    status::{SaveStatus, SaveStatusCell},
};

const PLACEHOLDER_PREFIX: &str = "temp-";

pub struct BlockLifecycle {
    page_id: PageId,
    handle: PageHandle,
    is_owner: bool,
    collaborators: Collaborators,
    status: SaveStatusCell,
    state: Mutex<BlockSet>,
}

#[derive(Default)]
struct BlockSet {
    blocks: Vec<Block>,
    placeholders: Vec<PlaceholderBlock>,
    pending_delete: HashSet<BlockId>,
    reorder_in_flight: bool,
}

impl BlockLifecycle {
    pub fn new(
        page_id: PageId,
        handle: PageHandle,
        is_owner: bool,
        blocks: Vec<Block>,
        collaborators: Collaborators,
        status: SaveStatusCell,
    ) -> Self {
        Self {
            page_id,
            handle,
            is_owner,
            collaborators,
            status,
            state: Mutex::new(BlockSet {
                blocks: resequence(blocks),
                ..BlockSet::default()
            }),
        }
    }

    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    pub async fn blocks(&self) -> Vec<Block> {
        self.state.lock().await.blocks.clone()
    }

    pub async fn placeholders(&self) -> Vec<PlaceholderBlock> {
        self.state.lock().await.placeholders.clone()
    }

    /// Persisted blocks in ordering, then placeholders in creation order.
    pub async fn items(&self) -> Vec<BlockItem> {
        let state = self.state.lock().await;
        state
            .blocks
            .iter()
            .cloned()
            .map(BlockItem::Persisted)
            .chain(
                state
                    .placeholders
                    .iter()
                    .cloned()
                    .map(BlockItem::Placeholder),
            )
            .collect()
    }

    pub async fn persisted_ids(&self) -> Vec<BlockId> {
        let state = self.state.lock().await;
        state.blocks.iter().map(|block| block.id.clone()).collect()
    }

    pub async fn is_pending_delete(&self, id: &BlockId) -> bool {
        self.state.lock().await.pending_delete.contains(id)
    }

    pub async fn pending_deletes(&self) -> HashSet<BlockId> {
        self.state.lock().await.pending_delete.clone()
    }

    pub async fn create_placeholder(&self, block_type: BlockType) -> Result<BlockId, EditorError> {
        self.ensure_owner("create_placeholder")?;
        let id = BlockId::new(format!("{PLACEHOLDER_PREFIX}{}", BlockId::generate()));
        self.state.lock().await.placeholders.push(PlaceholderBlock {
            id: id.clone(),
            block_type,
        });
        debug!(page_id = %self.page_id, block_id = %id, %block_type, "placeholder added");
        self.status.set(SaveStatus::Dirty);
        Ok(id)
    }

    pub async fn cancel_placeholder(&self, id: &BlockId) -> Result<(), EditorError> {
        self.ensure_owner("cancel_placeholder")?;
        let mut state = self.state.lock().await;
        let before = state.placeholders.len();
        state.placeholders.retain(|placeholder| &placeholder.id != id);
        if state.placeholders.len() == before {
            return Err(EditorError::NotFound(format!("placeholder {id}")));
        }
        self.status.set(SaveStatus::Idle);
        Ok(())
    }

    /// Creates the block on the backend. On failure the placeholder is put back.
    pub async fn commit_placeholder(
        &self,
        id: &BlockId,
        data: BlockContent,
    ) -> Result<Block, EditorError> {
        self.ensure_owner("commit_placeholder")?;
        let (index, placeholder) = {
            let mut state = self.state.lock().await;
            let index = state
                .placeholders
                .iter()
                .position(|placeholder| &placeholder.id == id)
                .ok_or_else(|| EditorError::NotFound(format!("placeholder {id}")))?;
            (index, state.placeholders.remove(index))
        };

        self.status.set(SaveStatus::Saving);
        let toast = self.loading("Adding block");
        let result = self
            .collaborators
            .backend
            .create_block(CreateBlockRequest {
                page_id: self.page_id.clone(),
                handle: self.handle.clone(),
                block_type: placeholder.block_type,
                data,
            })
            .await
            .map_err(EditorError::from);

        let mut state = self.state.lock().await;
        match result {
            Ok(block) => {
                info!(page_id = %self.page_id, block_id = %block.id, "block created");
                state.blocks.push(block.clone());
                self.status.set(SaveStatus::Saved);
                self.settle(toast, "Block added");
                Ok(block)
            }
            Err(err) => {
                let index = index.min(state.placeholders.len());
                state.placeholders.insert(index, placeholder);
                Err(self.fail(toast, "create_block", "Failed to add block", err))
            }
        }
    }

    /// Deletes a persisted block. Returns `false` when a delete for the same
    /// id is already pending and nothing was sent.
    pub async fn delete_block(&self, id: &BlockId) -> Result<bool, EditorError> {
        self.ensure_owner("delete_block")?;
        {
            let mut state = self.state.lock().await;
            if state.pending_delete.contains(id) {
                debug!(block_id = %id, "delete already pending");
                return Ok(false);
            }
            if !state.blocks.iter().any(|block| &block.id == id) {
                return Err(EditorError::NotFound(format!("block {id}")));
            }
            state.pending_delete.insert(id.clone());
        }

        self.status.set(SaveStatus::Saving);
        let toast = self.loading("Deleting block");
        let result = self
            .collaborators
            .backend
            .delete_block(DeleteBlockRequest {
                block_id: id.clone(),
                handle: self.handle.clone(),
            })
            .await
            .map_err(EditorError::from);

        let mut state = self.state.lock().await;
        state.pending_delete.remove(id);
        match result {
            Ok(()) => {
                info!(page_id = %self.page_id, block_id = %id, "block deleted");
                state.blocks.retain(|block| &block.id != id);
                self.status.set(SaveStatus::Saved);
                self.settle(toast, "Block deleted");
                Ok(true)
            }
            Err(err) => Err(self.fail(toast, "delete_block", "Failed to delete block", err)),
        }
    }

    /// Moves `active_id` to the slot of `over_id` and renumbers every block.
    /// The new order is applied before the request and kept if it fails.
    pub async fn reorder_blocks(
        &self,
        active_id: &BlockId,
        over_id: &BlockId,
    ) -> Result<Vec<BlockOrdering>, EditorError> {
        self.ensure_owner("reorder_blocks")?;
        let orderings = {
            let mut state = self.state.lock().await;
            if state.reorder_in_flight {
                return Err(EditorError::Busy("reorder"));
            }
            let position = |id: &BlockId| {
                state
                    .blocks
                    .iter()
                    .position(|block| &block.id == id)
                    .ok_or_else(|| EditorError::NotFound(format!("block {id}")))
            };
            let from = position(active_id)?;
            let to = position(over_id)?;
            if from == to {
                return Ok(Vec::new());
            }

            let moved = state.blocks.remove(from);
            state.blocks.insert(to, moved);
            let orderings: Vec<BlockOrdering> = state
                .blocks
                .iter_mut()
                .enumerate()
                .map(|(index, block)| {
                    block.ordering = Some(index as i64);
                    BlockOrdering {
                        id: block.id.clone(),
                        ordering: index as i64,
                    }
                })
                .collect();
            state.reorder_in_flight = true;
            orderings
        };

        self.status.set(SaveStatus::Saving);
        let toast = self.loading("Reordering blocks");
        let result = self
            .collaborators
            .backend
            .reorder_blocks(ReorderBlocksRequest {
                page_id: self.page_id.clone(),
                handle: self.handle.clone(),
                blocks: orderings.clone(),
            })
            .await
            .map_err(EditorError::from);

        self.state.lock().await.reorder_in_flight = false;
        match result {
            Ok(()) => {
                self.status.set(SaveStatus::Saved);
                self.settle(toast, "Blocks reordered");
                Ok(orderings)
            }
            Err(err) => {
                warn!(page_id = %self.page_id, "reorder failed; local order kept");
                Err(self.fail(toast, "reorder_blocks", "Failed to reorder blocks", err))
            }
        }
    }

    fn ensure_owner(&self, operation: &'static str) -> Result<(), EditorError> {
        if self.is_owner {
            return Ok(());
        }
        let err = EditorError::owner_only();
        self.collaborators.reporter.capture(operation, &err);
        self.collaborators.notifier.add(
            Notification::new(NotificationKind::Error, "Not allowed")
                .with_description(err.reason()),
        );
        Err(err)
    }

    fn loading(&self, title: &str) -> NotificationId {
        self.collaborators
            .notifier
            .add(Notification::new(NotificationKind::Loading, title))
    }

    fn settle(&self, toast: NotificationId, title: &str) {
        self.collaborators
            .notifier
            .update(toast, Notification::new(NotificationKind::Success, title));
    }

    fn fail(
        &self,
        toast: NotificationId,
        operation: &'static str,
        title: &str,
        err: EditorError,
    ) -> EditorError {
        self.status.set(SaveStatus::Error);
        self.collaborators.reporter.capture(operation, &err);
        self.collaborators.notifier.update(
            toast,
            Notification::new(NotificationKind::Error, title).with_description(err.reason()),
        );
        err
    }
}

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod tests;
