//! Selection-to-crop coordinate mapping.
//!
//! Overlay surfaces report selections in the logical (DPI-scaled) pixels of
//! the display they cover. The encoder grabs the whole virtual desktop in
//! physical pixels, so a selection has to be scaled, shifted to absolute
//! desktop coordinates, and re-based on the virtual bounds origin.

use serde::{Deserialize, Serialize};

use spancap_platform_core::{Display, VirtualBounds};

/// A rectangle in logical pixels, relative to one overlay surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SelectionRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Normalize a pointer drag into a rectangle.
    ///
    /// The drag may run in any direction; the result starts at the top-left
    /// corner and is rounded to whole logical pixels.
    pub fn from_drag(start: (f64, f64), end: (f64, f64)) -> Self {
        Self {
            x: start.0.min(end.0).round(),
            y: start.1.min(end.1).round(),
            width: (end.0 - start.0).abs().round(),
            height: (end.1 - start.1).abs().round(),
        }
    }
}

/// Absolute crop relative to the virtual bounds origin, in physical pixels.
///
/// Width and height are even: yuv420p subsamples chroma on 2x2 blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CropBox {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether the crop survives trimming `margin` pixels from every edge.
    pub fn fits_margin(&self, margin: u32) -> bool {
        let trim = margin.saturating_mul(2);
        self.width > trim && self.height > trim
    }
}

/// Map a selection on `display` into a crop of the virtual desktop.
///
/// Pure coordinate transform: no clamping, no validation. A zero-sized
/// selection maps to a zero-sized crop.
pub fn map_to_crop(rect: SelectionRect, display: &Display, bounds: &VirtualBounds) -> CropBox {
    let scale = display.scale_factor;
    // Float-to-int casts saturate; everything after stays in i64/u64.
    let phys_x = (rect.x * scale).round() as i64;
    let phys_y = (rect.y * scale).round() as i64;
    let phys_w = (rect.width * scale).round().max(0.0) as u64;
    let phys_h = (rect.height * scale).round().max(0.0) as u64;

    let abs_x = (display.x as i64).saturating_add(phys_x);
    let abs_y = (display.y as i64).saturating_add(phys_y);

    CropBox {
        x: saturate_i32(abs_x.saturating_sub(bounds.x as i64)),
        y: saturate_i32(abs_y.saturating_sub(bounds.y as i64)),
        width: saturate_u32(even_up(phys_w)),
        height: saturate_u32(even_up(phys_h)),
    }
}

/// Intersect a crop with the virtual desktop.
///
/// Returns the clamped crop and whether anything changed. Clamped
/// dimensions round down so they stay even and inside the bounds.
pub fn clamp_to_bounds(crop: CropBox, bounds: &VirtualBounds) -> (CropBox, bool) {
    let left = (crop.x as i64).max(0);
    let top = (crop.y as i64).max(0);
    let right = (crop.x as i64 + crop.width as i64).min(bounds.width as i64);
    let bottom = (crop.y as i64 + crop.height as i64).min(bounds.height as i64);

    let clamped = CropBox {
        x: saturate_i32(left.min(bounds.width as i64)),
        y: saturate_i32(top.min(bounds.height as i64)),
        width: even_down((right - left).max(0) as u32),
        height: even_down((bottom - top).max(0) as u32),
    };
    (clamped, clamped != crop)
}

fn even_up(value: u64) -> u64 {
    value.saturating_add(value & 1)
}

fn even_down(value: u32) -> u32 {
    value & !1
}

fn saturate_i32(value: i64) -> i32 {
    i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// Saturates to the largest even `u32` so the crop stays even.
fn saturate_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX & !1)
}
