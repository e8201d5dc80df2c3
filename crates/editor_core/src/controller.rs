//! Owner of the per-breakpoint layout snapshot and its grid events.

use std::collections::HashMap;

use shared::domain::{BlockId, Breakpoint, PerBreakpoint, ResponsiveBlockLayout};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    autosave::AutosaveRequest,
    error::{EditorError, ValidationError},
    layout::{
        build_responsive_layouts, extract_payload, grid_size_for_label, layout_lookup,
        project_layouts_to_inputs, reading_order, GridItem, ResponsiveLayoutInputs,
        ResponsiveLayouts,
    },
};

/// How a layout-change event was treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutChange {
    /// Re-flow generated by a breakpoint switch; canonical inputs untouched.
    Reflow,
    Edit,
}

pub struct GridLayoutController {
    inputs: ResponsiveLayoutInputs,
    layouts: ResponsiveLayouts,
    active: Breakpoint,
    transitioning: bool,
    editable: bool,
    persisted_ids: Vec<BlockId>,
    commits: Option<mpsc::UnboundedSender<AutosaveRequest>>,
}

impl GridLayoutController {
    pub fn new(
        inputs: ResponsiveLayoutInputs,
        persisted_ids: Vec<BlockId>,
        editable: bool,
        active: Breakpoint,
    ) -> Self {
        let layouts = build_responsive_layouts(&inputs, None, editable);
        Self {
            inputs,
            layouts,
            active,
            transitioning: false,
            editable,
            persisted_ids,
            commits: None,
        }
    }

    /// Commits are published on `commits` instead of being saved inline.
    pub fn with_commit_channel(mut self, commits: mpsc::UnboundedSender<AutosaveRequest>) -> Self {
        self.commits = Some(commits);
        self
    }

    pub fn active_breakpoint(&self) -> Breakpoint {
        self.active
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn layouts(&self) -> &ResponsiveLayouts {
        &self.layouts
    }

    pub fn inputs(&self) -> &ResponsiveLayoutInputs {
        &self.inputs
    }

    pub fn persisted_ids(&self) -> &[BlockId] {
        &self.persisted_ids
    }

    pub fn layout_lookup(&self) -> HashMap<BlockId, GridItem> {
        layout_lookup(&self.layouts, self.active)
    }

    pub fn reading_order(&self) -> Vec<BlockId> {
        reading_order(self.layouts.get(self.active))
    }

    /// Intermediate grid mutation. Only the active breakpoint is touched.
    pub fn handle_layout_change(&mut self, current: Vec<GridItem>) -> LayoutChange {
        self.merge_active(current);
        if self.transitioning {
            self.transitioning = false;
            debug!(breakpoint = %self.active, "breakpoint re-flow absorbed");
            LayoutChange::Reflow
        } else {
            LayoutChange::Edit
        }
    }

    pub fn handle_breakpoint_change(&mut self, breakpoint: Breakpoint) {
        debug!(from = %self.active, to = %breakpoint, "breakpoint change");
        self.active = breakpoint;
        self.transitioning = true;
    }

    /// End of a drag or resize. Projects both breakpoints back to storage,
    /// rebuilds the snapshot from them and publishes the persisted subset.
    pub fn handle_commit(
        &mut self,
        current: Option<Vec<GridItem>>,
    ) -> Result<Vec<ResponsiveBlockLayout>, EditorError> {
        if !self.editable {
            return Err(EditorError::owner_only());
        }
        if let Some(current) = current {
            self.merge_active(current);
        }

        let inputs = PerBreakpoint::from_fn(|breakpoint| {
            Some(project_layouts_to_inputs(&self.layouts, breakpoint))
        });
        self.layouts = build_responsive_layouts(&inputs, None, self.editable);
        self.inputs = inputs;

        let payload = extract_payload(&self.layouts, &self.persisted_ids);
        if !payload.is_empty() {
            self.publish(payload.clone());
        }
        Ok(payload)
    }

    /// Sets one block's size on the active breakpoint, then commits.
    pub fn handle_resize(
        &mut self,
        id: &BlockId,
        w: i64,
        h: i64,
    ) -> Result<Vec<ResponsiveBlockLayout>, EditorError> {
        if !self.editable {
            return Err(EditorError::owner_only());
        }
        let item = self
            .layouts
            .get_mut(self.active)
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| ValidationError::UnknownBlock(id.to_string()))?;
        item.w = w;
        item.h = h;
        self.handle_commit(None)
    }

    /// Resize by a stored-scale label such as `"4x2"`.
    pub fn handle_resize_label(
        &mut self,
        id: &BlockId,
        label: &str,
    ) -> Result<Vec<ResponsiveBlockLayout>, EditorError> {
        let (w, h) = grid_size_for_label(label)?;
        self.handle_resize(id, w, h)
    }

    /// Drag of one block to canvas cell `(x, y)`: a layout change followed by a commit.
    pub fn handle_move(
        &mut self,
        id: &BlockId,
        x: i64,
        y: i64,
    ) -> Result<Vec<ResponsiveBlockLayout>, EditorError> {
        if !self.editable {
            return Err(EditorError::owner_only());
        }
        let mut current = self.layouts.get(self.active).clone();
        let item = current
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| ValidationError::UnknownBlock(id.to_string()))?;
        item.x = x;
        item.y = y;
        self.handle_layout_change(current);
        self.handle_commit(None)
    }

    /// External input change. Existing geometry is kept for known ids and
    /// any pending transition flag is dropped.
    pub fn sync_inputs(&mut self, inputs: ResponsiveLayoutInputs, persisted_ids: Vec<BlockId>) {
        self.layouts = build_responsive_layouts(&inputs, Some(&self.layouts), self.editable);
        self.inputs = inputs;
        self.persisted_ids = persisted_ids;
        self.transitioning = false;
    }

    /// Rebuilds the snapshot from the canonical inputs with `current` taking
    /// precedence on the active breakpoint. Ids missing from `current` fall
    /// back to their canonical placement; unknown ids are dropped.
    fn merge_active(&mut self, current: Vec<GridItem>) {
        let mut merged = self.layouts.clone();
        *merged.get_mut(self.active) = current;
        self.layouts = build_responsive_layouts(&self.inputs, Some(&merged), self.editable);
    }

    fn publish(&self, payload: Vec<ResponsiveBlockLayout>) {
        let Some(commits) = &self.commits else {
            return;
        };
        if commits.send(AutosaveRequest::Save(payload)).is_err() {
            warn!("autosave intake closed; layout commit dropped");
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
