//! Per-breakpoint grid layouts built from canonical placement inputs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shared::domain::{
    BlockId, BlockItem, Breakpoint, PerBreakpoint, ResponsiveBlockLayout, StoragePlacement,
    StoredSize,
};

use crate::coords::{clamp_canvas, to_canvas_for, to_storage_for, CanvasPlacement};

/// Canonical placement of one block, in storage convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInput {
    pub id: BlockId,
    pub placement: StoragePlacement,
}

/// Canonical inputs per breakpoint; a missing breakpoint borrows the canonical one.
pub type ResponsiveLayoutInputs = PerBreakpoint<Option<Vec<LayoutInput>>>;

/// One entry of the rendering grid, in canvas convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridItem {
    #[serde(rename = "i")]
    pub id: BlockId,
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
    #[serde(rename = "isDraggable")]
    pub draggable: bool,
    #[serde(rename = "isResizable")]
    pub resizable: bool,
    #[serde(rename = "static")]
    pub is_static: bool,
}

impl GridItem {
    pub fn new(id: BlockId, placement: CanvasPlacement, editable: bool) -> Self {
        Self {
            id,
            x: placement.x,
            y: placement.y,
            w: placement.w,
            h: placement.h,
            draggable: editable,
            resizable: false,
            is_static: !editable,
        }
    }

    pub fn placement(&self) -> CanvasPlacement {
        CanvasPlacement {
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
        }
    }
}

pub type ResponsiveLayouts = PerBreakpoint<Vec<GridItem>>;

/// Builds both breakpoint layouts.
///
/// An id already present in `previous` keeps its previous geometry, so an
/// unrelated rebuild does not yank a block out from under an interaction.
pub fn build_responsive_layouts(
    inputs: &ResponsiveLayoutInputs,
    previous: Option<&ResponsiveLayouts>,
    editable: bool,
) -> ResponsiveLayouts {
    PerBreakpoint::from_fn(|breakpoint| {
        let existing: HashMap<&BlockId, &GridItem> = previous
            .map(|layouts| {
                layouts
                    .get(breakpoint)
                    .iter()
                    .map(|item| (&item.id, item))
                    .collect()
            })
            .unwrap_or_default();
        let source = inputs
            .get(breakpoint)
            .as_deref()
            .or(inputs.get(Breakpoint::CANONICAL).as_deref())
            .unwrap_or_default();

        source
            .iter()
            .map(|input| {
                let placement = match existing.get(&input.id) {
                    Some(item) => clamp_canvas(item.placement(), breakpoint.columns()),
                    None => to_canvas_for(input.placement, breakpoint),
                };
                GridItem::new(input.id.clone(), placement, editable)
            })
            .collect()
    })
}

/// Projects one breakpoint's grid back into canonical storage inputs.
pub fn project_layouts_to_inputs(
    layouts: &ResponsiveLayouts,
    breakpoint: Breakpoint,
) -> Vec<LayoutInput> {
    layouts
        .get(breakpoint)
        .iter()
        .map(|item| LayoutInput {
            id: item.id.clone(),
            placement: to_storage_for(item.placement(), breakpoint),
        })
        .collect()
}

/// Save payload for the persisted ids, in the given id order.
///
/// A persisted id with no desktop entry saves the 1x1 origin; a missing
/// mobile entry mirrors desktop.
pub fn extract_payload(
    layouts: &ResponsiveLayouts,
    persisted_ids: &[BlockId],
) -> Vec<ResponsiveBlockLayout> {
    let project = |breakpoint: Breakpoint| -> HashMap<&BlockId, StoragePlacement> {
        layouts
            .get(breakpoint)
            .iter()
            .filter(|item| persisted_ids.contains(&item.id))
            .map(|item| (&item.id, to_storage_for(item.placement(), breakpoint)))
            .collect()
    };
    let desktop = project(Breakpoint::Desktop);
    let mobile = project(Breakpoint::Mobile);

    persisted_ids
        .iter()
        .map(|id| {
            let desktop = desktop
                .get(id)
                .copied()
                .unwrap_or(StoragePlacement::DEFAULT);
            ResponsiveBlockLayout {
                id: id.clone(),
                desktop,
                mobile: mobile.get(id).copied().unwrap_or(desktop),
            }
        })
        .collect()
}

/// Canonical inputs for the editor's mixed block list.
///
/// Missing positions fall back to the item's index as the row and column 0.
/// Sizes below a block type's preset are raised to the preset.
pub fn layout_inputs(items: &[BlockItem]) -> ResponsiveLayoutInputs {
    let inputs = PerBreakpoint::from_fn(|breakpoint| {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let index = index as i64;
                let placement = match item {
                    BlockItem::Persisted(block) => {
                        let preset = block.block_type.default_stored_size();
                        let (w, h) = block
                            .style
                            .size(breakpoint)
                            .unwrap_or(preset)
                            .max(preset)
                            .to_grid();
                        let position = block.position.resolve(breakpoint).unwrap_or_default();
                        StoragePlacement {
                            x: position.x.unwrap_or(index),
                            y: position.y.unwrap_or(0),
                            w,
                            h,
                        }
                    }
                    BlockItem::Placeholder(placeholder) => {
                        let (w, h) = placeholder.block_type.default_stored_size().to_grid();
                        StoragePlacement { x: index, y: 0, w, h }
                    }
                };
                LayoutInput {
                    id: item.id().clone(),
                    placement,
                }
            })
            .collect()
    });
    PerBreakpoint::new(Some(inputs.desktop), Some(inputs.mobile))
}

pub fn layout_lookup(layouts: &ResponsiveLayouts, breakpoint: Breakpoint) -> HashMap<BlockId, GridItem> {
    layouts
        .get(breakpoint)
        .iter()
        .map(|item| (item.id.clone(), item.clone()))
        .collect()
}

/// Ids in reading order: row, then column, then id.
pub fn reading_order(items: &[GridItem]) -> Vec<BlockId> {
    let mut sorted: Vec<&GridItem> = items.iter().collect();
    sorted.sort_by(|a, b| {
        a.y.cmp(&b.y)
            .then_with(|| a.x.cmp(&b.x))
            .then_with(|| a.id.cmp(&b.id))
    });
    sorted.into_iter().map(|item| item.id.clone()).collect()
}

/// Grid size for a stored-scale size label such as `"4x2"`.
pub fn grid_size_for_label(label: &str) -> Result<(i64, i64), shared::domain::SizeParseError> {
    Ok(label.trim().parse::<StoredSize>()?.to_grid())
}

#[cfg(test)]
#[path = "tests/layout_tests.rs"]
mod tests;
