//! Popup geometry. Pure functions of sizes and the pointer position.

use crate::page::{Point, Rect, Size};

/// Size of the status indicator box.
pub const LOADER_SIZE: f64 = 36.0;
/// Gap between the pointer and the indicator.
const LOADER_OFFSET: f64 = 13.0;
/// Margin kept visible around media larger than the viewport in full zoom.
const FOLLOW_MARGIN: f64 = 40.0;
/// Scale change per wheel notch in full zoom.
pub const ZOOM_STEP: f64 = 1.25;

/// Where and how the media box is shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub rect: Rect,
    /// Full-zoom frames cover the page and ignore the hovered element.
    pub full_zoom: bool,
}

/// Places a popup next to the pointer.
///
/// The media is scaled down to the larger of two areas: beside the pointer
/// (the wider horizontal side, full viewport height) or above/below it (the
/// taller vertical side, full viewport width). `min_distance` keeps the box
/// off the pointer.
pub fn popup_frame(natural: Size, pointer: Point, viewport: Size, min_distance: f64) -> Rect {
    if natural.is_empty() {
        return loader_frame(pointer, viewport);
    }
    let (x, y) = (pointer.x, pointer.y);
    let r_side = viewport.width - x;
    let b_side = viewport.height - y;
    let side_w = if x < r_side { r_side } else { x };
    let side_h = if y < b_side { b_side } else { y };
    let ratio = natural.width / natural.height;

    let mut v_w = natural.width.min(side_w - min_distance);
    let mut v_h = natural.height.min(viewport.height);
    if v_w / ratio > v_h {
        v_w = v_h * ratio;
    } else {
        v_h = v_w / ratio;
    }

    let mut h_w = natural.width.min(viewport.width);
    let mut h_h = natural.height.min(side_h - min_distance);
    if h_h * ratio > h_w {
        h_h = h_w / ratio;
    } else {
        h_w = h_h * ratio;
    }

    let (w, h) = if h_w > v_w { (h_w.round(), h_h.round()) } else { (v_w.round(), v_h.round()) };
    let (w, h) = (w.max(0.0), h.max(0.0));

    let mut left = x - if x < r_side { (w - r_side).max(0.0) } else { w };
    let mut top = y - if y < b_side { (h - b_side).max(0.0) } else { h };
    if min_distance > 0.0 {
        if side_w < w + min_distance || viewport.height < h {
            top += if y < b_side { min_distance } else { -min_distance };
        } else {
            left += if x < r_side { min_distance } else { -min_distance };
        }
    }
    let left = left.clamp(0.0, (viewport.width - w).max(0.0));
    let top = top.clamp(0.0, (viewport.height - h).max(0.0));
    Rect::new(left, top, w, h)
}

/// Places the status indicator diagonally off the pointer, towards the
/// larger free area.
pub fn loader_frame(pointer: Point, viewport: Size) -> Rect {
    let (x, y) = (pointer.x, pointer.y);
    let left = if x < viewport.width - x { x + LOADER_OFFSET } else { x - LOADER_SIZE - LOADER_OFFSET };
    let top = if y < viewport.height - y { y + LOADER_OFFSET } else { y - LOADER_SIZE - LOADER_OFFSET };
    Rect::new(left, top, LOADER_SIZE, LOADER_SIZE)
}

/// Scales the media down to fit the viewport and centres it.
pub fn fit_frame(natural: Size, viewport: Size) -> Rect {
    if natural.is_empty() {
        return Rect::new(viewport.width / 2.0, viewport.height / 2.0, 0.0, 0.0);
    }
    let scale = (viewport.width / natural.width).min(viewport.height / natural.height).min(1.0);
    let (w, h) = ((natural.width * scale).round(), (natural.height * scale).round());
    Rect::new((viewport.width - w) / 2.0, (viewport.height - h) / 2.0, w, h)
}

/// Top-left corner of a full-zoom box of `size` for the pointer position.
///
/// A box smaller than the viewport is centred on that axis. A larger one
/// slides so that moving the pointer across the viewport reveals all of it.
pub fn follow_position(size: Size, pointer: Point, viewport: Size) -> Point {
    let axis = |len: f64, p: f64, view: f64| {
        if len > view {
            -(p * (len - view + 2.0 * FOLLOW_MARGIN) / view) + FOLLOW_MARGIN
        } else {
            (view - len) / 2.0
        }
    };
    Point::new(axis(size.width, pointer.x, viewport.width), axis(size.height, pointer.y, viewport.height))
}

/// Scales `rect` by `factor`, keeping `around` (or the centre) in place.
pub fn zoom(rect: Rect, factor: f64, around: Option<Point>) -> Rect {
    let anchor = around.unwrap_or(Point::new(rect.left + rect.width / 2.0, rect.top + rect.height / 2.0));
    Rect::new(
        anchor.x - (anchor.x - rect.left) * factor,
        anchor.y - (anchor.y - rect.top) * factor,
        rect.width * factor,
        rect.height * factor,
    )
}
