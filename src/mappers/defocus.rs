use super::ItemVisualState;

/// Largest `f32` below 1. Off-centre items never reach full opacity.
const BELOW_ONE: f32 = 1.0 - f32::EPSILON / 2.0;

/// Items under this opacity are flagged hidden.
pub const VISIBILITY_CUTOFF: f32 = 0.001;

/// Opacity for an item at signed distance `relative` from the visual position.
pub fn defocus_opacity(relative: f32) -> f32 {
    if relative == 0.0 {
        return 1.0;
    }
    if relative.is_nan() {
        return 0.0;
    }
    (1.0 - relative.abs()).clamp(0.0, BELOW_ONE)
}

pub fn defocus_blur(relative: f32, max_blur: f32) -> f32 {
    let max_blur = max_blur.max(0.0);
    if relative.is_nan() {
        return max_blur;
    }
    (relative.abs() * max_blur).min(max_blur)
}

/// Cross-fade state: sharp and opaque at the centre, blurred and transparent
/// one item away in either direction.
pub fn defocus_state(relative: f32, max_blur: f32) -> ItemVisualState {
    let opacity = defocus_opacity(relative);
    ItemVisualState::Focus {
        opacity,
        blur_px: defocus_blur(relative, max_blur),
        visible: opacity > VISIBILITY_CUTOFF,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fades_symmetrically() {
        assert_eq!(defocus_opacity(0.25), defocus_opacity(-0.25));
        assert_eq!(defocus_opacity(0.25), 0.75);
        assert_eq!(defocus_blur(-0.5, 60.0), 30.0);
        assert_eq!(defocus_blur(4.0, 60.0), 60.0);
    }

    #[test]
    fn tiny_offsets_stay_below_full_opacity() {
        assert!(defocus_opacity(1e-12) < 1.0);
        assert!(defocus_opacity(-1e-12) < 1.0);
    }

    #[test]
    fn far_items_are_hidden() {
        assert_eq!(
            defocus_state(1.5, 40.0),
            ItemVisualState::Focus {
                opacity: 0.0,
                blur_px: 40.0,
                visible: false
            }
        );
    }
}
