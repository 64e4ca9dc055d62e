//! Frame-granular scheduling primitives.
//!
//! Scroll handling is coalesced to at most one recomputation per frame through
//! a single pending token: every new request cancels the previous token and
//! issues a fresh one, so only the most recent request can ever run. Resize
//! handling goes through a trailing debounce.

use std::time::{Duration, Instant};

/// Handle for one scheduled frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(u64);

#[derive(Debug, Default)]
pub struct FrameScheduler {
    next_id: u64,
    pending: Option<FrameToken>,
    requests_since_frame: u32,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending frame and schedule a new one.
    pub fn request(&mut self) -> FrameToken {
        self.next_id = self.next_id.wrapping_add(1);
        let token = FrameToken(self.next_id);
        self.pending = Some(token);
        self.requests_since_frame = self.requests_since_frame.saturating_add(1);
        token
    }

    pub fn pending(&self) -> Option<FrameToken> {
        self.pending
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of requests folded into the pending frame.
    pub fn coalesced(&self) -> u32 {
        self.requests_since_frame
    }

    pub fn cancel(&mut self) {
        self.pending = None;
        self.requests_since_frame = 0;
    }

    /// Claim `token` for execution. Stale or cancelled tokens are refused.
    pub fn begin(&mut self, token: FrameToken) -> bool {
        if self.pending == Some(token) {
            self.pending = None;
            self.requests_since_frame = 0;
            true
        } else {
            false
        }
    }

    /// Claim whatever frame is pending, if any.
    pub fn take(&mut self) -> Option<FrameToken> {
        let token = self.pending?;
        self.begin(token).then_some(token)
    }
}

/// Trailing-edge debounce: fires once `delay` after the last trigger.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Returns `true` exactly once when the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_requests_collapse_to_latest_token() {
        let mut frames = FrameScheduler::new();
        let first = frames.request();
        let second = frames.request();
        let third = frames.request();
        assert_eq!(frames.coalesced(), 3);
        assert!(!frames.begin(first));
        assert!(!frames.begin(second));
        assert!(frames.begin(third));
        assert!(!frames.begin(third));
        assert!(!frames.is_pending());
    }

    #[test]
    fn cancel_discards_pending_frame() {
        let mut frames = FrameScheduler::new();
        let token = frames.request();
        frames.cancel();
        assert!(!frames.begin(token));
        assert_eq!(frames.take(), None);
    }

    #[test]
    fn debounce_fires_after_last_trigger() {
        let t0 = Instant::now();
        let mut debounce = Debouncer::new(Duration::from_millis(100));
        debounce.trigger(t0);
        debounce.trigger(t0 + Duration::from_millis(60));
        assert!(!debounce.poll(t0 + Duration::from_millis(120)));
        assert!(debounce.poll(t0 + Duration::from_millis(160)));
        assert!(!debounce.poll(t0 + Duration::from_millis(500)));
    }
}
