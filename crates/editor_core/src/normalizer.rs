//! Tolerant reader for persisted layout payloads.
//!
//! Accepted shapes, tried in this order (first array wins):
//!
//! ```text
//!   [ {..}, {..} ]                  bare array
//!   { "layout": { "blocks": [..] } } nested
//!   { "layout": [..] }               nested bare
//!   { "blocks": [..] }               flat
//! ```
//!
//! Anything else reads as an empty page.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use shared::{
    domain::{
        Block, BlockContent, BlockId, BlockPosition, BlockStyle, BlockType, ResponsiveBlockLayout,
        StoredPosition, StoredSize,
    },
    protocol::BlockOrdering,
};
use tracing::debug;

use crate::coords::coerce_coordinate;

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutPayload<'a> {
    Bare(&'a [Value]),
    Nested(&'a [Value]),
    NestedBare(&'a [Value]),
    Flat(&'a [Value]),
    Empty,
}

impl<'a> LayoutPayload<'a> {
    pub fn classify(payload: &'a Value) -> Self {
        if let Value::Array(items) = payload {
            return LayoutPayload::Bare(items);
        }
        let Value::Object(record) = payload else {
            return LayoutPayload::Empty;
        };
        match record.get("layout") {
            Some(Value::Object(layout)) => {
                if let Some(Value::Array(items)) = layout.get("blocks") {
                    return LayoutPayload::Nested(items);
                }
            }
            Some(Value::Array(items)) => return LayoutPayload::NestedBare(items),
            _ => {}
        }
        if let Some(Value::Array(items)) = record.get("blocks") {
            return LayoutPayload::Flat(items);
        }
        LayoutPayload::Empty
    }

    pub fn descriptors(&self) -> &'a [Value] {
        match self {
            LayoutPayload::Bare(items)
            | LayoutPayload::Nested(items)
            | LayoutPayload::NestedBare(items)
            | LayoutPayload::Flat(items) => items,
            LayoutPayload::Empty => &[],
        }
    }
}

/// Parses any accepted payload shape into a resequenced block list.
pub fn normalize_payload(payload: &Value) -> Vec<Block> {
    let blocks = LayoutPayload::classify(payload)
        .descriptors()
        .iter()
        .filter_map(parse_descriptor)
        .collect();
    resequence(blocks)
}

fn parse_descriptor(value: &Value) -> Option<Block> {
    let record = value.as_object()?;
    let id = match record.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            debug!("skipping layout descriptor without id");
            return None;
        }
    };
    let block_type = match record.get("type").and_then(Value::as_str)?.parse::<BlockType>() {
        Ok(kind) => kind,
        Err(err) => {
            debug!(block_id = %id, "skipping layout descriptor: {err}");
            return None;
        }
    };

    Some(Block {
        id: BlockId(id),
        block_type,
        content: record
            .get("data")
            .and_then(Value::as_object)
            .map(content_from_data)
            .unwrap_or_default(),
        ordering: record.get("ordering").and_then(as_integer),
        created_at: record
            .get("created_at")
            .and_then(Value::as_str)
            .and_then(parse_timestamp),
        style: record.get("style").map(parse_style).unwrap_or_default(),
        position: record.get("position").map(parse_position).unwrap_or_default(),
    })
}

fn as_integer(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|v| v.is_finite()).map(|v| v.floor() as i64))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn parse_style(value: &Value) -> BlockStyle {
    let size = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
    BlockStyle {
        desktop: size("desktop"),
        mobile: size("mobile"),
    }
}

fn parse_position(value: &Value) -> BlockPosition {
    let slot = |key: &str| {
        let slot = value.get(key)?.as_object()?;
        let axis = |axis: &str| slot.get(axis).and_then(Value::as_f64).map(coerce_coordinate);
        Some(StoredPosition {
            x: axis("x"),
            y: axis("y"),
        })
    };
    BlockPosition {
        desktop: slot("desktop"),
        mobile: slot("mobile"),
    }
}

/// Maps a free-form data bag to typed content fields by key name.
pub fn content_from_data(data: &Map<String, Value>) -> BlockContent {
    let text = |key: &str| data.get(key).and_then(Value::as_str).map(str::to_string);
    let number = |key: &str| data.get(key).and_then(Value::as_f64);
    BlockContent {
        content: text("content"),
        // legacy payloads wrote `href`
        url: text("url").or_else(|| text("href")),
        title: text("title"),
        description: text("description"),
        image_url: text("image_url"),
        icon_url: text("icon_url"),
        link_url: text("link_url"),
        aspect_ratio: number("aspect_ratio"),
        thumbnail: text("thumbnail"),
        lat: number("lat"),
        lng: number("lng"),
        zoom: number("zoom"),
    }
}

/// Sorts by ordering (missing last), then creation time, and renumbers from 0.
pub fn resequence(mut blocks: Vec<Block>) -> Vec<Block> {
    blocks.sort_by(|a, b| {
        let order = |block: &Block| block.ordering.unwrap_or(i64::MAX);
        order(a)
            .cmp(&order(b))
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    for (index, block) in blocks.iter_mut().enumerate() {
        block.ordering = Some(index as i64);
    }
    blocks
}

pub fn apply_ordering_patch(blocks: Vec<Block>, patch: &[BlockOrdering]) -> Vec<Block> {
    let patched = blocks
        .into_iter()
        .map(|mut block| {
            if let Some(entry) = patch.iter().find(|entry| entry.id == block.id) {
                block.ordering = Some(entry.ordering);
            }
            block
        })
        .collect();
    resequence(patched)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPatch {
    Text {
        block_id: BlockId,
        content: String,
    },
    Link {
        block_id: BlockId,
        url: String,
        title: String,
    },
}

pub fn apply_content_patch(blocks: Vec<Block>, patch: &ContentPatch) -> Vec<Block> {
    blocks
        .into_iter()
        .map(|mut block| {
            match patch {
                ContentPatch::Text { block_id, content } if *block_id == block.id => {
                    block.content.content = Some(content.clone());
                }
                ContentPatch::Link {
                    block_id,
                    url,
                    title,
                } if *block_id == block.id => {
                    block.content.url = Some(url.clone());
                    block.content.title = Some(title.clone());
                }
                _ => {}
            }
            block
        })
        .collect()
}

/// Writes a saved placement back into a block's style strings and positions.
pub fn apply_metrics(mut block: Block, layout: &ResponsiveBlockLayout) -> Block {
    block.style = BlockStyle {
        desktop: Some(StoredSize::from_grid(layout.desktop.w, layout.desktop.h).to_string()),
        mobile: Some(StoredSize::from_grid(layout.mobile.w, layout.mobile.h).to_string()),
    };
    block.position = BlockPosition {
        desktop: Some(StoredPosition {
            x: Some(layout.desktop.x),
            y: Some(layout.desktop.y),
        }),
        mobile: Some(StoredPosition {
            x: Some(layout.mobile.x),
            y: Some(layout.mobile.y),
        }),
    };
    block
}

#[derive(Serialize)]
struct LayoutBlockRecord<'a> {
    id: &'a BlockId,
    #[serde(rename = "type")]
    block_type: BlockType,
    data: &'a BlockContent,
    style: &'a BlockStyle,
    position: &'a BlockPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    ordering: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created_at: Option<String>,
}

/// Canonical `{layout:{blocks:[..]}}` payload for a block list.
pub fn to_layout_payload(blocks: &[Block]) -> Result<Value, serde_json::Error> {
    let records = blocks
        .iter()
        .map(|block| {
            serde_json::to_value(LayoutBlockRecord {
                id: &block.id,
                block_type: block.block_type,
                data: &block.content,
                style: &block.style,
                position: &block.position,
                ordering: block.ordering,
                created_at: block.created_at.map(|ts| ts.to_rfc3339()),
            })
        })
        .collect::<Result<Vec<Value>, _>>()?;
    Ok(json!({ "layout": { "blocks": records } }))
}

#[cfg(test)]
#[path = "tests/normalizer_tests.rs"]
mod tests;
