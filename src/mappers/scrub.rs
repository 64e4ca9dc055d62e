//! Scroll-driven scrubbing through image sequences and continuous media.

use std::time::Duration;

use super::ItemVisualState;

/// Frame to show at `progress` for a sequence of `frame_count` frames.
pub fn frame_index(progress: f32, frame_count: usize) -> Option<usize> {
    if frame_count == 0 {
        return None;
    }
    let progress = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    };
    let last = frame_count - 1;
    let index = (progress * last as f32).floor() as usize;
    Some(index.min(last))
}

/// Seek target for continuous media of the given duration.
pub fn media_time(progress: f32, duration: Duration) -> f32 {
    let progress = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    };
    progress * duration.as_secs_f32()
}

/// Lets a value through only when it differs from the last one let through.
///
/// Keeps the renderer from decoding or seeking to the frame it already shows.
#[derive(Debug, Clone, Default)]
pub struct ChangeGate<T> {
    last: Option<T>,
}

impl<T: Copy + PartialEq> ChangeGate<T> {
    pub fn new() -> Self {
        Self { last: None }
    }

    pub fn admit(&mut self, value: T) -> Option<T> {
        if self.last == Some(value) {
            return None;
        }
        self.last = Some(value);
        Some(value)
    }

    pub fn last(&self) -> Option<T> {
        self.last
    }

    /// Force the next value through (e.g. the surface was resized and cleared).
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameScrubber {
    gate: ChangeGate<usize>,
}

impl FrameScrubber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame to draw for `progress`, or `None` when it is already on screen.
    pub fn advance(&mut self, progress: f32, frame_count: usize) -> Option<ItemVisualState> {
        let index = frame_index(progress, frame_count)?;
        self.gate
            .admit(index)
            .map(|index| ItemVisualState::Frame { index })
    }

    pub fn current(&self) -> Option<usize> {
        self.gate.last()
    }

    pub fn force_redraw(&mut self) {
        self.gate.reset();
    }
}

#[derive(Debug, Clone, Default)]
pub struct MediaScrubber {
    gate: ChangeGate<f32>,
}

impl MediaScrubber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, progress: f32, duration: Duration) -> Option<ItemVisualState> {
        self.gate
            .admit(media_time(progress, duration))
            .map(|seconds| ItemVisualState::MediaTime { seconds })
    }

    pub fn force_redraw(&mut self) {
        self.gate.reset();
    }
}
