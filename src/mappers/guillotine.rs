//! Diagonal "guillotine" reveal: each incoming item is uncovered from the right
//! edge by a skewed blade, with a separator line drawn along the seam.

use serde::Serialize;

use crate::geometry::Viewport;

use super::{ClipPath, ClipPoint, ItemVisualState};

const HIDDEN: ClipPath = ClipPath::Polygon([
    ClipPoint::new(100.0, 0.0),
    ClipPoint::new(100.0, 0.0),
    ClipPoint::new(100.0, 100.0),
    ClipPoint::new(100.0, 100.0),
]);

const FULL: ClipPath = ClipPath::Polygon([
    ClipPoint::new(0.0, 0.0),
    ClipPoint::new(100.0, 0.0),
    ClipPoint::new(100.0, 100.0),
    ClipPoint::new(0.0, 100.0),
]);

/// Line drawn along the diagonal seam while a reveal is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Separator {
    pub x_px: f32,
    pub rotation_deg: f32,
    pub length_px: f32,
    pub width_px: f32,
}

/// Seam geometry that only depends on the viewport; recomputed on resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeamGeometry {
    diagonal_angle: f32,
    viewport_width: f32,
    angle_deg: f32,
    length_px: f32,
}

impl SeamGeometry {
    pub fn new(diagonal_angle: f32, viewport: &Viewport) -> Self {
        let diagonal_angle = if diagonal_angle.is_finite() {
            diagonal_angle
        } else {
            0.0
        };
        let horizontal = diagonal_angle / 100.0 * viewport.width;
        let angle_deg = if viewport.height > 0.0 {
            (horizontal / viewport.height).atan().to_degrees()
        } else {
            0.0
        };
        Self {
            diagonal_angle,
            viewport_width: viewport.width,
            angle_deg,
            length_px: viewport.height.max(0.0).hypot(horizontal),
        }
    }

    pub fn diagonal_angle(&self) -> f32 {
        self.diagonal_angle
    }

    /// Inclination of the seam away from vertical, in degrees.
    pub fn angle_deg(&self) -> f32 {
        self.angle_deg
    }

    pub fn length_px(&self) -> f32 {
        self.length_px
    }
}

/// Top and bottom edge positions (percent of width) at transition progress `p`.
pub fn blade_edges(p: f32, diagonal_angle: f32) -> (f32, f32) {
    let top = 100.0 - p * (100.0 + diagonal_angle);
    (top, top + diagonal_angle)
}

/// Clip region of an incoming item. Hidden before, fully open after.
pub fn guillotine_clip(p: f32, diagonal_angle: f32) -> ClipPath {
    if p.is_nan() || p <= 0.0 {
        return HIDDEN;
    }
    if p >= 1.0 {
        return FULL;
    }
    let (top, bottom) = blade_edges(p, diagonal_angle);
    ClipPath::Polygon([
        ClipPoint::new(top, 0.0),
        ClipPoint::new(100.0, 0.0),
        ClipPoint::new(100.0, 100.0),
        ClipPoint::new(bottom, 100.0),
    ])
}

/// Separator for progress `p`, present only strictly inside (0, 1).
pub fn separator(p: f32, seam: &SeamGeometry, width_px: f32) -> Option<Separator> {
    if p.is_nan() || p <= 0.0 || p >= 1.0 || width_px <= 0.0 {
        return None;
    }
    let (top, _) = blade_edges(p, seam.diagonal_angle);
    Some(Separator {
        x_px: top / 100.0 * seam.viewport_width,
        rotation_deg: -seam.angle_deg,
        length_px: seam.length_px,
        width_px,
    })
}

/// Full guillotine state for item `idx` given its incoming progress.
pub fn guillotine_state(
    incoming: f32,
    idx: usize,
    seam: &SeamGeometry,
    separator_width: f32,
) -> ItemVisualState {
    if idx == 0 {
        return ItemVisualState::Clip {
            clip: ClipPath::Unclipped,
            separator: None,
        };
    }
    ItemVisualState::Clip {
        clip: guillotine_clip(incoming, seam.diagonal_angle),
        separator: separator(incoming, seam, separator_width),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_way_blade_positions() {
        assert_eq!(blade_edges(0.5, 25.0), (37.5, 62.5));
        assert_eq!(
            guillotine_clip(0.5, 25.0).to_string(),
            "polygon(37.5% 0%, 100% 0%, 100% 100%, 62.5% 100%)"
        );
    }

    #[test]
    fn ends_are_hidden_and_full() {
        assert_eq!(guillotine_clip(0.0, 25.0), HIDDEN);
        assert_eq!(guillotine_clip(1.0, 25.0), FULL);
    }

    #[test]
    fn seam_angle_follows_viewport_aspect() {
        let seam = SeamGeometry::new(25.0, &Viewport::new(1600.0, 400.0));
        // 25% of 1600 = 400 horizontal over 400 vertical.
        assert!((seam.angle_deg() - 45.0).abs() < 1e-4);
        assert!((seam.length_px() - 400.0 * 2f32.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn separator_tracks_top_edge() {
        let seam = SeamGeometry::new(25.0, &Viewport::new(1000.0, 800.0));
        let sep = separator(0.5, &seam, 4.0).unwrap();
        assert_eq!(sep.x_px, 375.0);
        assert_eq!(sep.width_px, 4.0);
        assert!(sep.rotation_deg < 0.0);
        assert!(separator(0.5, &seam, 0.0).is_none());
    }
}
