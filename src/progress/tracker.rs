//! Scroll progress for one tracked section.
//!
//! A section reserves `duration_in_vh * viewport.height` pixels of virtual
//! scroll distance. Progress is the fraction of that distance consumed, measured
//! from an anchor line on the viewport. Everything here is a pure function of
//! the current geometry except the propagation filter, which only decides
//! whether a freshly computed value is worth forwarding.

use crate::geometry::{Rect, Viewport};

/// Where on the viewport the section's top edge has to be for progress to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressAnchor {
    /// Progress starts when the section top reaches the viewport top (sticky galleries).
    #[default]
    Pinned,
    /// Progress starts when the section top enters at the viewport bottom.
    Entering,
}

impl ProgressAnchor {
    fn start_line(self, viewport: &Viewport) -> f32 {
        match self {
            Self::Pinned => 0.0,
            Self::Entering => viewport.height,
        }
    }
}

/// Saturating progress between an anchor line and `distance` pixels past it.
///
/// With no distance to travel the result snaps: 1 once the top has passed the
/// line, 0 otherwise.
pub fn progress_between(top: f32, start_line: f32, distance: f32) -> f32 {
    let travelled = start_line - top;
    if distance > 0.0 && distance.is_finite() {
        let progress = travelled / distance;
        if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 1.0)
        }
    } else if travelled > 0.0 {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct ScrollProgressTracker {
    duration_in_vh: f32,
    anchor: ProgressAnchor,
    epsilon: f32,
    viewport: Viewport,
    scroll_space: f32,
    container_height: f32,
    last_emitted: Option<f32>,
}

impl ScrollProgressTracker {
    pub fn new(duration_in_vh: f32, anchor: ProgressAnchor, viewport: Viewport) -> Self {
        let mut tracker = Self {
            duration_in_vh: sanitize_duration(duration_in_vh),
            anchor,
            epsilon: 0.0,
            viewport,
            scroll_space: 0.0,
            container_height: 0.0,
            last_emitted: None,
        };
        tracker.recompute_lengths();
        tracker
    }

    /// Suppress propagation of changes smaller than `epsilon`.
    pub fn with_epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = if epsilon.is_finite() {
            epsilon.max(0.0)
        } else {
            0.0
        };
        self
    }

    pub fn duration_in_vh(&self) -> f32 {
        self.duration_in_vh
    }

    pub fn anchor(&self) -> ProgressAnchor {
        self.anchor
    }

    /// Virtual scroll distance in pixels.
    pub fn scroll_space(&self) -> f32 {
        self.scroll_space
    }

    /// Height the placeholder element must occupy to reserve the scroll distance.
    pub fn container_height(&self) -> f32 {
        self.container_height
    }

    /// Re-derive cached lengths after a viewport change.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.recompute_lengths();
    }

    /// Change the reserved duration (e.g. after a velocity multiplier flips).
    pub fn set_duration_in_vh(&mut self, duration_in_vh: f32) {
        self.duration_in_vh = sanitize_duration(duration_in_vh);
        self.recompute_lengths();
    }

    /// Progress for a section whose top edge is at `top`.
    ///
    /// Unmounted sections (`None`) report 0.
    pub fn progress(&self, bounds: Option<&Rect>) -> f32 {
        match bounds {
            Some(rect) => progress_between(
                rect.top,
                self.anchor.start_line(&self.viewport),
                self.scroll_space,
            ),
            None => 0.0,
        }
    }

    /// Compute progress and decide whether it should be propagated.
    ///
    /// Returns `None` when the value moved less than the configured epsilon since
    /// the last propagated value. Reaching either end is always propagated so a
    /// section can settle exactly on 0 or 1.
    pub fn sample(&mut self, bounds: Option<&Rect>) -> Option<f32> {
        let progress = self.progress(bounds);
        let emit = match self.last_emitted {
            None => true,
            Some(last) if last == progress => false,
            Some(_) if progress == 0.0 || progress == 1.0 => true,
            Some(last) => (progress - last).abs() >= self.epsilon,
        };
        if emit {
            self.last_emitted = Some(progress);
            Some(progress)
        } else {
            None
        }
    }

    /// Forget the propagation history so the next sample is always emitted.
    pub fn invalidate(&mut self) {
        self.last_emitted = None;
    }

    fn recompute_lengths(&mut self) {
        let vh = if self.viewport.height.is_finite() {
            self.viewport.height.max(0.0)
        } else {
            0.0
        };
        self.scroll_space = self.duration_in_vh * vh;
        self.container_height = self.scroll_space + vh;
    }
}

fn sanitize_duration(duration_in_vh: f32) -> f32 {
    if duration_in_vh.is_finite() {
        duration_in_vh.max(0.0)
    } else {
        0.0
    }
}
