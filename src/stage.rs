//! Registry of mounted sections and the per-frame read/compute/write pass.
//!
//! Only sections the host reports as visible are touched on scroll, so the
//! cost of a frame is bounded by the number of active sections rather than by
//! everything ever mounted. A section that just left the viewport gets one
//! final evaluation so it settles at its saturated state instead of freezing
//! mid-transition.

use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, trace};

use crate::config::SectionConfig;
use crate::events::{AssetSettled, SectionId, StageEvent};
use crate::gallery::{Evaluation, Gallery, GalleryContext};
use crate::geometry::{Rect, Viewport, ViewportProvider};
use crate::mappers::ItemVisualState;
use crate::schedule::{Debouncer, FrameScheduler, FrameToken};

/// Reads the current bounds of a section's element.
pub trait SectionProbe: Send {
    /// Bounds relative to the viewport, `None` while the element is detached.
    fn bounds(&self) -> Option<Rect>;
}

/// Applies computed styles to a section's visual elements.
pub trait StyleSink: Send {
    fn apply(&mut self, item: usize, state: &ItemVisualState);

    fn progress(&mut self, _progress: f32) {}

    /// Loading indicator, in percent of assets settled.
    fn loading(&mut self, _percent: f32) {}

    /// Height the section's placeholder must reserve.
    fn container_height(&mut self, _px: f32) {}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageSettings {
    pub desktop_breakpoint_px: f32,
    pub desktop_velocity_multiplier: f32,
    pub progress_epsilon: f32,
    pub resize_debounce: Duration,
}

impl StageSettings {
    /// Velocity multiplier for chaptered galleries at the given viewport.
    pub fn velocity_multiplier(&self, viewport: &Viewport) -> f32 {
        if viewport.width >= self.desktop_breakpoint_px {
            self.desktop_velocity_multiplier
        } else {
            1.0
        }
    }
}

impl Default for StageSettings {
    fn default() -> Self {
        crate::config::Configuration::default().stage_settings()
    }
}

/// Counters for inspecting how much work frames did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    pub frames: u64,
    pub geometry_reads: u64,
    pub style_writes: u64,
}

struct Mounted {
    gallery: Gallery,
    probe: Box<dyn SectionProbe>,
    sink: Box<dyn StyleSink>,
}

pub struct Stage<V> {
    settings: StageSettings,
    viewport_source: V,
    viewport: Viewport,
    sections: HashMap<SectionId, Mounted>,
    active: BTreeSet<SectionId>,
    retiring: BTreeSet<SectionId>,
    frames: FrameScheduler,
    resize: Debouncer,
    next_id: u64,
    stats: StageStats,
}

impl<V: ViewportProvider> Stage<V> {
    pub fn new(settings: StageSettings, viewport_source: V) -> Self {
        let viewport = viewport_source.current();
        Self {
            settings,
            viewport_source,
            viewport,
            sections: HashMap::new(),
            active: BTreeSet::new(),
            retiring: BTreeSet::new(),
            frames: FrameScheduler::new(),
            resize: Debouncer::new(settings.resize_debounce),
            next_id: 0,
            stats: StageStats::default(),
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn subscribe_viewport(&self) -> watch::Receiver<Viewport> {
        self.viewport_source.subscribe()
    }

    pub fn stats(&self) -> StageStats {
        self.stats
    }

    pub fn is_active(&self, id: SectionId) -> bool {
        self.active.contains(&id)
    }

    pub fn pending_frame(&self) -> Option<FrameToken> {
        self.frames.pending()
    }

    fn context(&self) -> GalleryContext {
        GalleryContext {
            viewport: self.viewport,
            velocity_multiplier: self.settings.velocity_multiplier(&self.viewport),
            progress_epsilon: self.settings.progress_epsilon,
        }
    }

    /// Attach a section. It stays idle until the host reports it visible.
    pub fn mount(
        &mut self,
        section: &SectionConfig,
        probe: impl SectionProbe + 'static,
        mut sink: impl StyleSink + 'static,
    ) -> SectionId {
        self.next_id += 1;
        let id = SectionId(self.next_id);
        let gallery = Gallery::new(section, &self.context());
        sink.container_height(gallery.container_height());
        debug!(
            section = %section.name,
            id = id.0,
            container_height = gallery.container_height(),
            "section mounted"
        );
        self.sections.insert(
            id,
            Mounted {
                gallery,
                probe: Box::new(probe),
                sink: Box::new(sink),
            },
        );
        id
    }

    /// Detach a section, dropping its probe and sink immediately.
    pub fn unmount(&mut self, id: SectionId) -> bool {
        let Some(mounted) = self.sections.remove(&id) else {
            return false;
        };
        self.active.remove(&id);
        self.retiring.remove(&id);
        if !self.has_work() {
            self.frames.cancel();
        }
        debug!(section = %mounted.gallery.name(), id = id.0, "section unmounted");
        true
    }

    pub fn unmount_all(&mut self) {
        let ids: Vec<_> = self.sections.keys().copied().collect();
        for id in ids {
            self.unmount(id);
        }
        self.resize.cancel();
    }

    /// Host intersection signal for `id`.
    pub fn on_visibility(&mut self, id: SectionId, visible: bool) -> Option<FrameToken> {
        let mounted = self.sections.get_mut(&id)?;
        if visible {
            if !self.active.insert(id) {
                return None;
            }
            self.retiring.remove(&id);
            mounted.gallery.invalidate();
            trace!(section = %mounted.gallery.name(), "section activated");
        } else {
            if !self.active.remove(&id) {
                return None;
            }
            self.retiring.insert(id);
            trace!(section = %mounted.gallery.name(), "section deactivated");
        }
        Some(self.frames.request())
    }

    /// Scroll position changed; coalesced into the next frame.
    pub fn on_scroll(&mut self) -> Option<FrameToken> {
        self.has_work().then(|| self.frames.request())
    }

    pub fn on_resize(&mut self, now: Instant) {
        self.resize.trigger(now);
    }

    /// Apply a pending resize once the debounce window has passed.
    pub fn poll_resize(&mut self, now: Instant) -> bool {
        if !self.resize.poll(now) {
            return false;
        }
        self.viewport = self.viewport_source.current();
        let ctx = self.context();
        for mounted in self.sections.values_mut() {
            mounted.gallery.resize(&ctx);
            mounted.sink.container_height(mounted.gallery.container_height());
        }
        debug!(
            width = self.viewport.width,
            height = self.viewport.height,
            velocity_multiplier = ctx.velocity_multiplier,
            "viewport resized"
        );
        if self.has_work() {
            self.frames.request();
        }
        true
    }

    pub fn on_asset_settled(&mut self, settled: AssetSettled) -> Option<FrameToken> {
        let mounted = self.sections.get_mut(&settled.section)?;
        if !mounted.gallery.settle_asset(settled.index, settled.ready) {
            return None;
        }
        self.active
            .contains(&settled.section)
            .then(|| self.frames.request())
    }

    pub fn on_media_ready(&mut self, id: SectionId, duration: Duration) -> Option<FrameToken> {
        let mounted = self.sections.get_mut(&id)?;
        if !mounted.gallery.set_media_duration(duration) {
            return None;
        }
        self.active.contains(&id).then(|| self.frames.request())
    }

    /// Reveal a section immediately, as when navigation targets it directly.
    pub fn force_reveal(&mut self, id: SectionId) -> Option<FrameToken> {
        let mounted = self.sections.get_mut(&id)?;
        if !mounted.gallery.force_reveal() {
            return None;
        }
        self.active.insert(id);
        self.retiring.remove(&id);
        Some(self.frames.request())
    }

    /// Treat every asset of `id` as already available.
    pub fn assume_assets_ready(&mut self, id: SectionId) -> bool {
        let Some(mounted) = self.sections.get_mut(&id) else {
            return false;
        };
        mounted.gallery.assume_assets_ready();
        true
    }

    pub fn handle(&mut self, event: StageEvent, now: Instant) {
        match event {
            StageEvent::Scrolled => {
                self.on_scroll();
            }
            StageEvent::Visibility { section, visible } => {
                self.on_visibility(section, visible);
            }
            StageEvent::AssetSettled(settled) => {
                self.on_asset_settled(settled);
            }
            StageEvent::MediaReady { section, duration } => {
                self.on_media_ready(section, duration);
            }
            StageEvent::ForceReveal(section) => {
                self.force_reveal(section);
            }
            StageEvent::Unmount(section) => {
                self.unmount(section);
            }
            StageEvent::Flush(reply) => {
                self.poll_resize(now);
                self.run_pending();
                // The requester may have given up waiting.
                let _ = reply.send(self.stats);
                return;
            }
        }
        // Resize notifications arrive separately; polling here keeps a
        // busy event stream from starving the debouncer.
        self.poll_resize(now);
    }

    /// Run the pending frame if `token` is still current.
    ///
    /// Geometry for every active section is read before any style is written.
    /// Returns the number of sections that produced output.
    pub fn run_frame(&mut self, token: FrameToken) -> usize {
        if !self.frames.begin(token) {
            trace!(?token, "stale frame skipped");
            return 0;
        }
        self.stats.frames += 1;

        let targets: Vec<SectionId> = self.active.union(&self.retiring).copied().collect();
        self.retiring.clear();

        let reads: Vec<(SectionId, Option<Rect>)> = targets
            .into_iter()
            .filter_map(|id| {
                self.sections
                    .get(&id)
                    .map(|mounted| (id, mounted.probe.bounds()))
            })
            .collect();
        self.stats.geometry_reads += reads.len() as u64;

        let evaluations: Vec<(SectionId, Evaluation)> = reads
            .into_iter()
            .filter_map(|(id, bounds)| {
                let mounted = self.sections.get_mut(&id)?;
                let evaluation = mounted.gallery.evaluate(bounds.as_ref());
                (!evaluation.is_empty()).then_some((id, evaluation))
            })
            .collect();

        for (id, evaluation) in &evaluations {
            let Some(mounted) = self.sections.get_mut(id) else {
                continue;
            };
            if let Some(percent) = evaluation.loading {
                mounted.sink.loading(percent);
            }
            if let Some(progress) = evaluation.progress {
                mounted.sink.progress(progress);
            }
            for (item, state) in &evaluation.items {
                mounted.sink.apply(*item, state);
            }
            self.stats.style_writes += evaluation.items.len() as u64;
        }
        evaluations.len()
    }

    /// Run whatever frame is pending.
    pub fn run_pending(&mut self) -> usize {
        match self.frames.pending() {
            Some(token) => self.run_frame(token),
            None => 0,
        }
    }

    fn has_work(&self) -> bool {
        !self.active.is_empty() || !self.retiring.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::geometry::SharedViewport;

    #[derive(Clone, Default)]
    struct Probe(Arc<Mutex<Option<Rect>>>);

    impl SectionProbe for Probe {
        fn bounds(&self) -> Option<Rect> {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<(usize, ItemVisualState)>>>);

    impl StyleSink for Recorder {
        fn apply(&mut self, item: usize, state: &ItemVisualState) {
            self.0.lock().unwrap().push((item, state.clone()));
        }
    }

    fn slide() -> SectionConfig {
        serde_yaml::from_str("name: s\neffect:\n  kind: slide\n  images: [a, b]\n").unwrap()
    }

    #[test]
    fn scroll_without_active_sections_schedules_nothing() {
        let mut stage = Stage::new(
            StageSettings::default(),
            SharedViewport::new(Viewport::new(500.0, 800.0)),
        );
        stage.mount(&slide(), Probe::default(), Recorder::default());
        assert_eq!(stage.on_scroll(), None);
        assert_eq!(stage.pending_frame(), None);
    }

    #[test]
    fn stale_token_is_ignored() {
        let mut stage = Stage::new(
            StageSettings::default(),
            SharedViewport::new(Viewport::new(500.0, 800.0)),
        );
        let sink = Recorder::default();
        let id = stage.mount(&slide(), Probe::default(), sink.clone());
        let first = stage.on_visibility(id, true).unwrap();
        let second = stage.on_scroll().unwrap();
        assert_eq!(stage.run_frame(first), 0);
        assert_eq!(stage.run_frame(second), 1);
        assert_eq!(sink.0.lock().unwrap().len(), 2);
        assert_eq!(stage.stats().frames, 1);
    }

    #[test]
    fn leaving_section_gets_one_final_frame() {
        let mut stage = Stage::new(
            StageSettings::default(),
            SharedViewport::new(Viewport::new(500.0, 800.0)),
        );
        let probe = Probe::default();
        let id = stage.mount(&slide(), probe.clone(), Recorder::default());
        stage.on_visibility(id, true);
        stage.run_pending();
        *probe.0.lock().unwrap() = Some(Rect::band(-5000.0, 1600.0, &stage.viewport()));
        stage.on_visibility(id, false);
        assert_eq!(stage.run_pending(), 1);
        let reads = stage.stats().geometry_reads;
        assert_eq!(stage.on_scroll(), None);
        assert_eq!(stage.run_pending(), 0);
        assert_eq!(stage.stats().geometry_reads, reads);
    }
}
