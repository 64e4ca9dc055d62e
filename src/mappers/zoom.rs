use serde::Deserialize;

use crate::geometry::{Rect, Viewport};

use super::ItemVisualState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZoomDirection {
    /// Scale 1 at the viewport centre, `max_scale` towards the edges.
    #[default]
    GrowTowardEdges,
    /// `max_scale` at the viewport centre, 1 towards the edges.
    GrowTowardCenter,
}

/// Normalised distance of the element centre from the viewport centre.
///
/// 0 when centred, 1 once the element has fully left the viewport.
pub fn center_distance_ratio(rect: &Rect, viewport: &Viewport) -> f32 {
    let viewport_center = viewport.center_y();
    let max_distance = viewport_center + rect.height / 2.0;
    if max_distance.is_nan() || max_distance <= 0.0 {
        return 0.0;
    }
    let ratio = (rect.center_y() - viewport_center).abs() / max_distance;
    if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) }
}

pub fn zoom_scale(ratio: f32, max_scale: f32, direction: ZoomDirection) -> f32 {
    let max_scale = if max_scale.is_finite() {
        max_scale.max(1.0)
    } else {
        1.0
    };
    let ratio = match direction {
        ZoomDirection::GrowTowardEdges => ratio,
        ZoomDirection::GrowTowardCenter => 1.0 - ratio,
    };
    1.0 + ratio * (max_scale - 1.0)
}

pub fn zoom_state(
    rect: &Rect,
    viewport: &Viewport,
    max_scale: f32,
    direction: ZoomDirection,
) -> ItemVisualState {
    ItemVisualState::Scale {
        factor: zoom_scale(center_distance_ratio(rect, viewport), max_scale, direction),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centred_element_is_unscaled() {
        let vp = Viewport::new(1000.0, 800.0);
        let rect = Rect::band(200.0, 400.0, &vp);
        assert_eq!(center_distance_ratio(&rect, &vp), 0.0);
        assert_eq!(zoom_scale(0.0, 1.5, ZoomDirection::GrowTowardEdges), 1.0);
        assert_eq!(zoom_scale(0.0, 1.5, ZoomDirection::GrowTowardCenter), 1.5);
    }

    #[test]
    fn element_leaving_reaches_max_scale() {
        let vp = Viewport::new(1000.0, 800.0);
        // Centre at 1000: distance 600, max distance 400 + 200.
        let rect = Rect::band(800.0, 400.0, &vp);
        assert_eq!(center_distance_ratio(&rect, &vp), 1.0);
        assert_eq!(
            zoom_state(&rect, &vp, 2.0, ZoomDirection::GrowTowardEdges),
            ItemVisualState::Scale { factor: 2.0 }
        );
    }

    #[test]
    fn scale_below_one_is_clamped() {
        assert_eq!(zoom_scale(1.0, 0.5, ZoomDirection::GrowTowardEdges), 1.0);
    }
}
