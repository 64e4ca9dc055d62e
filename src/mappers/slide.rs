use crate::geometry::Viewport;
use crate::progress::chapters::ChapterPosition;

use super::{Axis, ItemVisualState};

/// Offset of an incoming item: fully off-screen at 0, in place at 1.
pub fn slide_offset(incoming: f32, extent: f32) -> f32 {
    let incoming = if incoming.is_nan() {
        0.0
    } else {
        incoming.clamp(0.0, 1.0)
    };
    extent * (1.0 - incoming)
}

/// Slide state for item `idx`. The first item is the static backdrop.
pub fn slide_state(
    position: &ChapterPosition,
    idx: usize,
    axis: Axis,
    viewport: &Viewport,
) -> ItemVisualState {
    let px = if idx == 0 {
        0.0
    } else {
        let extent = match axis {
            Axis::Horizontal => viewport.width,
            Axis::Vertical => viewport.height,
        };
        slide_offset(position.incoming(idx), extent)
    };
    ItemVisualState::Offset { axis, px }
}
