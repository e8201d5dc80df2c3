//! Conversion between the persistence convention (`x` = row, `y` = column)
//! and the rendering grid's convention (`x` = column, `y` = row).
//!
//! Every conversion clamps into the grid; none of them can fail.

use serde::{Deserialize, Serialize};
use shared::domain::{Breakpoint, StoragePlacement};

pub const GRID_ROWS: i64 = 175;
pub const GRID_ROW_HEIGHT: u32 = 175;
pub const GRID_MARGIN: [u32; 2] = [26, 26];
pub const MIN_SIZE: i64 = 1;
pub const MAX_SIZE: i64 = 4;

/// Placement in the rendering grid's convention: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanvasPlacement {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

fn clamp_span(value: i64, max: i64) -> i64 {
    value.max(MIN_SIZE).min(max.max(MIN_SIZE))
}

fn clamp_coordinate(value: i64, max: i64) -> i64 {
    value.max(0).min(max.max(0))
}

fn max_width(columns: i64) -> i64 {
    columns.min(MAX_SIZE)
}

/// Rounds a raw span; non-finite values become the minimum size.
pub fn coerce_span(value: f64) -> i64 {
    if value.is_finite() {
        (value.round() as i64).max(MIN_SIZE)
    } else {
        MIN_SIZE
    }
}

/// Floors a raw coordinate; non-finite values become 0.
pub fn coerce_coordinate(value: f64) -> i64 {
    if value.is_finite() {
        (value.floor() as i64).max(0)
    } else {
        0
    }
}

pub fn to_canvas(placement: StoragePlacement, columns: i64) -> CanvasPlacement {
    let w = clamp_span(placement.w, max_width(columns));
    let h = clamp_span(placement.h, MAX_SIZE);
    CanvasPlacement {
        x: clamp_coordinate(placement.y, columns - w),
        y: clamp_coordinate(placement.x, GRID_ROWS - h),
        w,
        h,
    }
}

pub fn to_storage(placement: CanvasPlacement, columns: i64) -> StoragePlacement {
    let w = clamp_span(placement.w, max_width(columns));
    let h = clamp_span(placement.h, MAX_SIZE);
    StoragePlacement {
        x: clamp_coordinate(placement.y, GRID_ROWS - h),
        y: clamp_coordinate(placement.x, columns - w),
        w,
        h,
    }
}

/// Clamps a placement that is already in canvas convention.
pub fn clamp_canvas(placement: CanvasPlacement, columns: i64) -> CanvasPlacement {
    let w = clamp_span(placement.w, max_width(columns));
    let h = clamp_span(placement.h, MAX_SIZE);
    CanvasPlacement {
        x: clamp_coordinate(placement.x, columns - w),
        y: clamp_coordinate(placement.y, GRID_ROWS - h),
        w,
        h,
    }
}

pub fn to_canvas_for(placement: StoragePlacement, breakpoint: Breakpoint) -> CanvasPlacement {
    to_canvas(placement, breakpoint.columns())
}

pub fn to_storage_for(placement: CanvasPlacement, breakpoint: Breakpoint) -> StoragePlacement {
    to_storage(placement, breakpoint.columns())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(x: i64, y: i64, w: i64, h: i64) -> StoragePlacement {
        StoragePlacement { x, y, w, h }
    }

    #[test]
    fn swaps_axes() {
        let canvas = to_canvas(storage(7, 1, 2, 3), 4);
        assert_eq!(
            canvas,
            CanvasPlacement {
                x: 1,
                y: 7,
                w: 2,
                h: 3
            }
        );
    }

    #[test]
    fn clamps_width_to_columns() {
        let canvas = to_canvas(storage(0, 0, 5, 1), 4);
        assert_eq!(canvas.w, 4);
        let mobile = to_canvas(storage(0, 3, 4, 1), 2);
        assert_eq!((mobile.x, mobile.w), (0, 2));
    }

    #[test]
    fn clamps_out_of_range_values() {
        let canvas = to_canvas(storage(-3, 9, 0, 40), 4);
        assert_eq!(
            canvas,
            CanvasPlacement {
                x: 3,
                y: 0,
                w: 1,
                h: 4
            }
        );
        let bottom = to_canvas(storage(500, 0, 1, 2), 4);
        assert_eq!(bottom.y, GRID_ROWS - 2);
    }

    #[test]
    fn round_trips_in_bound_placements() {
        for columns in [2, 4] {
            for x in [0, 3, GRID_ROWS - 4] {
                for y in 0..columns {
                    for w in 1..=(columns - y) {
                        for h in 1..=MAX_SIZE {
                            let placement = storage(x, y, w, h);
                            let back = to_storage(to_canvas(placement, columns), columns);
                            assert_eq!(back, placement);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn coerces_non_finite_input() {
        assert_eq!(coerce_span(f64::NAN), MIN_SIZE);
        assert_eq!(coerce_span(2.6), 3);
        assert_eq!(coerce_coordinate(f64::INFINITY), 0);
        assert_eq!(coerce_coordinate(3.9), 3);
        assert_eq!(coerce_coordinate(-2.0), 0);
    }
}
