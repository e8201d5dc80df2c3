//! One open page: controller, autosave and block lifecycle wired together.

use std::{collections::HashMap, sync::Arc};

use shared::{
    domain::{
        Block, BlockContent, BlockId, BlockItem, BlockType, Breakpoint, PageId,
        ResponsiveBlockLayout,
    },
    handle::PageHandle,
    protocol::BlockOrdering,
};
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tracing::info;

use crate::{
    autosave::{AutosaveCoordinator, AutosaveRequest, AutosaveSettings},
    backend::Collaborators,
    controller::{GridLayoutController, LayoutChange},
    error::EditorError,
    layout::{layout_inputs, GridItem, ResponsiveLayouts},
    lifecycle::BlockLifecycle,
    normalizer::resequence,
    status::SaveStatusCell,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub page_id: PageId,
    pub handle: PageHandle,
    pub is_owner: bool,
}

pub struct EditorSession {
    page: PageContext,
    controller: Mutex<GridLayoutController>,
    lifecycle: BlockLifecycle,
    autosave: Arc<AutosaveCoordinator>,
    commits: mpsc::UnboundedSender<AutosaveRequest>,
    intake: JoinHandle<()>,
    status: SaveStatusCell,
}

impl EditorSession {
    /// Must be called inside a tokio runtime; the autosave intake runs as a task.
    pub fn open(
        page: PageContext,
        blocks: Vec<Block>,
        collaborators: Collaborators,
        settings: AutosaveSettings,
    ) -> Self {
        let status = settings.status_cell();
        let blocks = resequence(blocks);
        let items: Vec<BlockItem> = blocks.iter().cloned().map(BlockItem::Persisted).collect();
        let lifecycle = BlockLifecycle::new(
            page.page_id.clone(),
            page.handle.clone(),
            page.is_owner,
            blocks,
            collaborators.clone(),
            status.clone(),
        );
        let autosave = AutosaveCoordinator::new(
            page.page_id.clone(),
            collaborators.backend,
            collaborators.notifier,
            collaborators.reporter,
            status.clone(),
            settings,
        );

        let (commits, requests) = mpsc::unbounded_channel();
        let intake = autosave.attach(requests);
        let persisted_ids = items.iter().map(|item| item.id().clone()).collect();
        let controller = GridLayoutController::new(
            layout_inputs(&items),
            persisted_ids,
            page.is_owner,
            Breakpoint::CANONICAL,
        )
        .with_commit_channel(commits.clone());

        info!(page_id = %page.page_id, handle = %page.handle, editable = page.is_owner, blocks = items.len(), "editor session opened");
        Self {
            page,
            controller: Mutex::new(controller),
            lifecycle,
            autosave,
            commits,
            intake,
            status,
        }
    }

    pub fn page(&self) -> &PageContext {
        &self.page
    }

    pub fn status(&self) -> &SaveStatusCell {
        &self.status
    }

    pub fn lifecycle(&self) -> &BlockLifecycle {
        &self.lifecycle
    }

    pub async fn items(&self) -> Vec<BlockItem> {
        self.lifecycle.items().await
    }

    pub async fn layouts(&self) -> ResponsiveLayouts {
        self.controller.lock().await.layouts().clone()
    }

    pub async fn active_breakpoint(&self) -> Breakpoint {
        self.controller.lock().await.active_breakpoint()
    }

    /// Grid items of the active breakpoint. Blocks with a delete in flight
    /// cannot be dragged.
    pub async fn layout_lookup(&self) -> HashMap<BlockId, GridItem> {
        let pending = self.lifecycle.pending_deletes().await;
        let mut lookup = self.controller.lock().await.layout_lookup();
        for id in &pending {
            if let Some(item) = lookup.get_mut(id) {
                item.draggable = false;
            }
        }
        lookup
    }

    pub async fn reading_order(&self) -> Vec<BlockId> {
        self.controller.lock().await.reading_order()
    }

    pub async fn handle_layout_change(&self, current: Vec<GridItem>) -> LayoutChange {
        self.controller.lock().await.handle_layout_change(current)
    }

    pub async fn handle_breakpoint_change(&self, breakpoint: Breakpoint) {
        self.controller
            .lock()
            .await
            .handle_breakpoint_change(breakpoint);
    }

    pub async fn handle_commit(
        &self,
        current: Option<Vec<GridItem>>,
    ) -> Result<Vec<ResponsiveBlockLayout>, EditorError> {
        self.controller.lock().await.handle_commit(current)
    }

    pub async fn resize(
        &self,
        id: &BlockId,
        w: i64,
        h: i64,
    ) -> Result<Vec<ResponsiveBlockLayout>, EditorError> {
        self.ensure_not_deleting(id).await?;
        self.controller.lock().await.handle_resize(id, w, h)
    }

    pub async fn resize_label(
        &self,
        id: &BlockId,
        label: &str,
    ) -> Result<Vec<ResponsiveBlockLayout>, EditorError> {
        self.ensure_not_deleting(id).await?;
        self.controller.lock().await.handle_resize_label(id, label)
    }

    pub async fn move_block(
        &self,
        id: &BlockId,
        x: i64,
        y: i64,
    ) -> Result<Vec<ResponsiveBlockLayout>, EditorError> {
        self.ensure_not_deleting(id).await?;
        self.controller.lock().await.handle_move(id, x, y)
    }

    pub async fn create_placeholder(&self, block_type: BlockType) -> Result<BlockId, EditorError> {
        let result = self.lifecycle.create_placeholder(block_type).await;
        self.resync().await;
        result
    }

    pub async fn cancel_placeholder(&self, id: &BlockId) -> Result<(), EditorError> {
        let result = self.lifecycle.cancel_placeholder(id).await;
        self.resync().await;
        result
    }

    pub async fn commit_placeholder(
        &self,
        id: &BlockId,
        data: BlockContent,
    ) -> Result<Block, EditorError> {
        let result = self.lifecycle.commit_placeholder(id, data).await;
        self.resync().await;
        result
    }

    pub async fn delete_block(&self, id: &BlockId) -> Result<bool, EditorError> {
        let result = self.lifecycle.delete_block(id).await;
        self.resync().await;
        result
    }

    pub async fn reorder_blocks(
        &self,
        active_id: &BlockId,
        over_id: &BlockId,
    ) -> Result<Vec<BlockOrdering>, EditorError> {
        let result = self.lifecycle.reorder_blocks(active_id, over_id).await;
        self.resync().await;
        result
    }

    /// Waits until every commit made so far has been saved or has failed.
    pub async fn flush(&self) {
        let (done, flushed) = oneshot::channel();
        if self.commits.send(AutosaveRequest::Flush(done)).is_err() || flushed.await.is_err() {
            self.autosave.flush().await;
        }
    }

    pub async fn last_saved(&self) -> Option<Vec<ResponsiveBlockLayout>> {
        self.autosave.last_saved().await
    }

    pub async fn close(self) {
        self.flush().await;
        info!(page_id = %self.page.page_id, status = ?self.status.get(), "editor session closed");
    }

    async fn ensure_not_deleting(&self, id: &BlockId) -> Result<(), EditorError> {
        if self.lifecycle.is_pending_delete(id).await {
            return Err(EditorError::Busy("delete"));
        }
        Ok(())
    }

    async fn resync(&self) {
        let items = self.lifecycle.items().await;
        let persisted_ids = items
            .iter()
            .filter(|item| item.is_persisted())
            .map(|item| item.id().clone())
            .collect();
        self.controller
            .lock()
            .await
            .sync_inputs(layout_inputs(&items), persisted_ids);
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        self.intake.abort();
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
