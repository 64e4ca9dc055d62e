//! Single-threshold reveal for content blocks.
//!
//! `Continuous` ties opacity and lift directly to the entry position and
//! reverses when scrolling back. `Once` latches the first time the block crosses
//! its visibility threshold and then hands the animation to a timed transition.

use std::time::Duration;

use crate::config::{RevealOptions, RevealPolicy};
use crate::geometry::{Rect, Viewport, intersects, visible_fraction};
use crate::mappers::ItemVisualState;
use crate::progress::tracker::progress_between;

/// Entry line and travel distance, derived from the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RevealMetrics {
    pub start: f32,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct RevealController {
    options: RevealOptions,
    metrics: RevealMetrics,
    revealed: bool,
    forced: bool,
}

impl RevealController {
    pub fn new(options: RevealOptions, viewport: Viewport) -> Self {
        let metrics = Self::metrics_for(&options, &viewport);
        Self {
            options,
            metrics,
            revealed: false,
            forced: false,
        }
    }

    pub fn metrics(&self) -> RevealMetrics {
        self.metrics
    }

    /// Maximum downward lift applied while hidden.
    pub fn max_translate(&self) -> f32 {
        let intensity = if self.options.intensity.is_finite() {
            self.options.intensity.clamp(0.0, 1.0)
        } else {
            1.0
        };
        50.0 + 200.0 * intensity
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.metrics = Self::metrics_for(&self.options, &viewport);
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed || self.forced
    }

    /// Jump straight to the revealed state (e.g. an anchor link targeted the block).
    pub fn force_reveal(&mut self) {
        self.forced = true;
        if self.options.policy == RevealPolicy::Once {
            self.revealed = true;
        }
    }

    /// Raw entry progress for a block whose top edge is at `top`.
    pub fn entry_progress(&self, top: f32) -> f32 {
        progress_between(top, self.metrics.start, self.metrics.distance)
    }

    pub fn evaluate(&mut self, bounds: Option<&Rect>, viewport: &Viewport) -> ItemVisualState {
        match self.options.policy {
            RevealPolicy::Continuous => {
                let progress = if self.forced {
                    1.0
                } else {
                    bounds.map_or(0.0, |rect| self.entry_progress(rect.top))
                };
                self.lifted(progress, None)
            }
            RevealPolicy::Once => {
                if !self.revealed {
                    if let Some(rect) = bounds {
                        self.revealed = self.crossed_threshold(rect, viewport);
                    }
                }
                let transition = Some(duration_ms(self.options.transition));
                if self.revealed {
                    self.lifted(1.0, transition)
                } else {
                    self.lifted(0.0, transition)
                }
            }
        }
    }

    fn crossed_threshold(&self, rect: &Rect, viewport: &Viewport) -> bool {
        if self.options.threshold <= 0.0 {
            intersects(rect, viewport, 0.0)
        } else {
            visible_fraction(rect, viewport) >= self.options.threshold
        }
    }

    fn lifted(&self, progress: f32, transition_ms: Option<u64>) -> ItemVisualState {
        ItemVisualState::Reveal {
            opacity: progress,
            translate_y_px: self.max_translate() * (1.0 - progress),
            transition_ms,
        }
    }

    fn metrics_for(options: &RevealOptions, viewport: &Viewport) -> RevealMetrics {
        RevealMetrics {
            start: viewport.height * options.start_ratio,
            distance: viewport.height * options.distance_ratio,
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}
