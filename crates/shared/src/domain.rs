use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Persisted style strings store sizes at twice the grid resolution.
pub const LAYOUT_SIZE_SCALE: i64 = 2;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(PageId);
id_newtype!(BlockId);
id_newtype!(UserId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Link,
    Text,
    Image,
    Video,
    Map,
    Section,
}

impl BlockType {
    pub const ALL: [BlockType; 6] = [
        BlockType::Link,
        BlockType::Text,
        BlockType::Image,
        BlockType::Video,
        BlockType::Map,
        BlockType::Section,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockType::Link => "link",
            BlockType::Text => "text",
            BlockType::Image => "image",
            BlockType::Video => "video",
            BlockType::Map => "map",
            BlockType::Section => "section",
        }
    }

    /// Preset stored size (layout-scale units) for a freshly placed block.
    pub fn default_stored_size(self) -> StoredSize {
        match self {
            BlockType::Link => StoredSize { w: 2, h: 2 },
            BlockType::Text => StoredSize { w: 4, h: 2 },
            BlockType::Image | BlockType::Map => StoredSize { w: 4, h: 4 },
            BlockType::Section => StoredSize { w: 8, h: 2 },
            BlockType::Video => StoredSize { w: 1, h: 1 },
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown block type '{0}'")]
pub struct UnknownBlockType(pub String);

impl FromStr for BlockType {
    type Err = UnknownBlockType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownBlockType(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Breakpoint {
    Desktop,
    Mobile,
}

impl Breakpoint {
    pub const ALL: [Breakpoint; 2] = [Breakpoint::Desktop, Breakpoint::Mobile];
    pub const CANONICAL: Breakpoint = Breakpoint::Desktop;

    pub fn columns(self) -> i64 {
        match self {
            Breakpoint::Desktop => 4,
            Breakpoint::Mobile => 2,
        }
    }

    /// Minimum viewport width in pixels at which this breakpoint applies.
    pub fn min_width(self) -> u32 {
        match self {
            Breakpoint::Desktop => 700,
            Breakpoint::Mobile => 0,
        }
    }

    /// Rendering-grid key for this breakpoint.
    pub fn grid_key(self) -> &'static str {
        match self {
            Breakpoint::Desktop => "lg",
            Breakpoint::Mobile => "xxs",
        }
    }

    pub fn from_grid_key(key: &str) -> Option<Self> {
        Breakpoint::ALL.into_iter().find(|bp| bp.grid_key() == key)
    }

    pub fn for_width(width: u32) -> Self {
        if width >= Breakpoint::Desktop.min_width() {
            Breakpoint::Desktop
        } else {
            Breakpoint::Mobile
        }
    }

    pub fn other(self) -> Self {
        match self {
            Breakpoint::Desktop => Breakpoint::Mobile,
            Breakpoint::Mobile => Breakpoint::Desktop,
        }
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Breakpoint::Desktop => f.write_str("desktop"),
            Breakpoint::Mobile => f.write_str("mobile"),
        }
    }
}

/// A value held once per breakpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerBreakpoint<T> {
    pub desktop: T,
    pub mobile: T,
}

impl<T> PerBreakpoint<T> {
    pub fn new(desktop: T, mobile: T) -> Self {
        Self { desktop, mobile }
    }

    pub fn from_fn(mut f: impl FnMut(Breakpoint) -> T) -> Self {
        Self {
            desktop: f(Breakpoint::Desktop),
            mobile: f(Breakpoint::Mobile),
        }
    }

    pub fn get(&self, breakpoint: Breakpoint) -> &T {
        match breakpoint {
            Breakpoint::Desktop => &self.desktop,
            Breakpoint::Mobile => &self.mobile,
        }
    }

    pub fn get_mut(&mut self, breakpoint: Breakpoint) -> &mut T {
        match breakpoint {
            Breakpoint::Desktop => &mut self.desktop,
            Breakpoint::Mobile => &mut self.mobile,
        }
    }
}

/// Placement in the persistence convention: `x` is the row, `y` the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoragePlacement {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl StoragePlacement {
    pub const DEFAULT: StoragePlacement = StoragePlacement {
        x: 0,
        y: 0,
        w: 1,
        h: 1,
    };
}

/// Both breakpoint placements of one persisted block, as sent to the save call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsiveBlockLayout {
    pub id: BlockId,
    pub desktop: StoragePlacement,
    pub mobile: StoragePlacement,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizeParseError {
    #[error("size '{0}' does not match WxH")]
    Malformed(String),
    #[error("size '{0}' must be at least 1x1")]
    Empty(String),
}

/// Size as written in a style string (`"WxH"`), in layout-scale units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoredSize {
    pub w: i64,
    pub h: i64,
}

impl StoredSize {
    /// Converts grid units to the stored scale, never below 1.
    pub fn from_grid(w: i64, h: i64) -> Self {
        Self {
            w: w.saturating_mul(LAYOUT_SIZE_SCALE).max(1),
            h: h.saturating_mul(LAYOUT_SIZE_SCALE).max(1),
        }
    }

    /// Grid units, rounding up and never below 1.
    pub fn to_grid(self) -> (i64, i64) {
        let scale = |v: i64| (v.saturating_add(LAYOUT_SIZE_SCALE - 1) / LAYOUT_SIZE_SCALE).max(1);
        (scale(self.w), scale(self.h))
    }

    pub fn max(self, other: StoredSize) -> Self {
        Self {
            w: self.w.max(other.w),
            h: self.h.max(other.h),
        }
    }
}

impl fmt::Display for StoredSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

impl FromStr for StoredSize {
    type Err = SizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SizeParseError::Malformed(s.to_string());
        let (w, h) = s.split_once('x').ok_or_else(malformed)?;
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(w) || !digits(h) {
            return Err(malformed());
        }
        let w: i64 = w.parse().map_err(|_| malformed())?;
        let h: i64 = h.parse().map_err(|_| malformed())?;
        if w < 1 || h < 1 {
            return Err(SizeParseError::Empty(s.to_string()));
        }
        Ok(Self { w, h })
    }
}

/// Per-breakpoint style strings of a persisted block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
}

impl BlockStyle {
    pub fn size(&self, breakpoint: Breakpoint) -> Option<StoredSize> {
        let raw = match breakpoint {
            Breakpoint::Desktop => self.desktop.as_deref().or(self.mobile.as_deref()),
            Breakpoint::Mobile => self.mobile.as_deref().or(self.desktop.as_deref()),
        }?;
        raw.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPosition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPosition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desktop: Option<StoredPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<StoredPosition>,
}

impl BlockPosition {
    /// Own breakpoint first, then the other one.
    pub fn resolve(&self, breakpoint: Breakpoint) -> Option<StoredPosition> {
        match breakpoint {
            Breakpoint::Desktop => self.desktop.or(self.mobile),
            Breakpoint::Mobile => self.mobile.or(self.desktop),
        }
    }
}

/// Typed content fields of a block; which ones are meaningful depends on the block type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub content: BlockContent,
    #[serde(default)]
    pub ordering: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub style: BlockStyle,
    #[serde(default)]
    pub position: BlockPosition,
}

impl Block {
    pub fn new(id: BlockId, block_type: BlockType) -> Self {
        Self {
            id,
            block_type,
            content: BlockContent::default(),
            ordering: None,
            created_at: None,
            style: BlockStyle::default(),
            position: BlockPosition::default(),
        }
    }
}

/// Client-only block awaiting its first create call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderBlock {
    pub id: BlockId,
    #[serde(rename = "type")]
    pub block_type: BlockType,
}

/// One entry of the editor's mixed block list.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockItem {
    Persisted(Block),
    Placeholder(PlaceholderBlock),
}

impl BlockItem {
    pub fn id(&self) -> &BlockId {
        match self {
            BlockItem::Persisted(block) => &block.id,
            BlockItem::Placeholder(placeholder) => &placeholder.id,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, BlockItem::Persisted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub page_id: PageId,
    pub handle: String,
    pub owner_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_size_parses_literal_pattern_only() {
        assert_eq!("4x2".parse::<StoredSize>(), Ok(StoredSize { w: 4, h: 2 }));
        assert!(matches!(
            "4 x 2".parse::<StoredSize>(),
            Err(SizeParseError::Malformed(_))
        ));
        assert!(matches!(
            "-1x2".parse::<StoredSize>(),
            Err(SizeParseError::Malformed(_))
        ));
        assert!(matches!(
            "0x2".parse::<StoredSize>(),
            Err(SizeParseError::Empty(_))
        ));
    }

    #[test]
    fn stored_size_scales_to_grid_rounding_up() {
        assert_eq!(StoredSize { w: 3, h: 1 }.to_grid(), (2, 1));
        assert_eq!(StoredSize::from_grid(2, 1), StoredSize { w: 4, h: 2 });
    }

    #[test]
    fn stored_size_conversions_saturate_on_huge_values() {
        let huge: StoredSize = "9223372036854775807x2".parse().expect("digits parse");
        assert_eq!(huge.to_grid(), (i64::MAX / LAYOUT_SIZE_SCALE, 1));
        assert_eq!(StoredSize::from_grid(i64::MAX, 1).w, i64::MAX);
    }

    #[test]
    fn style_falls_back_to_other_breakpoint() {
        let style = BlockStyle {
            desktop: Some("4x4".into()),
            mobile: None,
        };
        assert_eq!(style.size(Breakpoint::Mobile), Some(StoredSize { w: 4, h: 4 }));
    }

    #[test]
    fn breakpoint_resolves_by_width() {
        assert_eq!(Breakpoint::for_width(1024), Breakpoint::Desktop);
        assert_eq!(Breakpoint::for_width(699), Breakpoint::Mobile);
        assert_eq!(Breakpoint::from_grid_key("xxs"), Some(Breakpoint::Mobile));
    }
}
