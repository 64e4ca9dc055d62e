//! One mounted section: progress tracking, chapter layout, the configured
//! visual mapper and asset readiness, evaluated together once per frame.

use std::time::Duration;

use tracing::debug;

use crate::config::{ChapterParams, EffectOptions, SectionConfig};
use crate::geometry::{Rect, Viewport};
use crate::mappers::guillotine::{SeamGeometry, guillotine_state};
use crate::mappers::scrub::{FrameScrubber, MediaScrubber, frame_index};
use crate::mappers::zoom::{ZoomDirection, zoom_state};
use crate::mappers::{Axis, ItemVisualState, defocus::defocus_state, slide::slide_state};
use crate::progress::chapters::ChapterSegmenter;
use crate::progress::tracker::{ProgressAnchor, ScrollProgressTracker};
use crate::reveal::RevealController;

/// Inputs shared by every gallery on a stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GalleryContext {
    pub viewport: Viewport,
    pub velocity_multiplier: f32,
    pub progress_epsilon: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Pending,
    Ready,
    Failed,
}

/// Readiness of every asset a section draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSet {
    states: Vec<AssetState>,
}

impl AssetSet {
    pub fn new(count: usize) -> Self {
        Self {
            states: vec![AssetState::Pending; count],
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Record the outcome for `index`. Returns `false` for unknown or already
    /// settled indices.
    pub fn settle(&mut self, index: usize, ready: bool) -> bool {
        match self.states.get_mut(index) {
            Some(state @ AssetState::Pending) => {
                *state = if ready {
                    AssetState::Ready
                } else {
                    AssetState::Failed
                };
                true
            }
            _ => false,
        }
    }

    pub fn mark_all_ready(&mut self) {
        self.states.fill(AssetState::Ready);
    }

    pub fn is_ready(&self, index: usize) -> bool {
        self.states.get(index) == Some(&AssetState::Ready)
    }

    /// Assets that finished loading, failures included.
    pub fn settled(&self) -> usize {
        self.states
            .iter()
            .filter(|state| **state != AssetState::Pending)
            .count()
    }

    pub fn all_settled(&self) -> bool {
        self.settled() == self.states.len()
    }

    pub fn percent(&self) -> f32 {
        if self.states.is_empty() {
            100.0
        } else {
            self.settled() as f32 / self.states.len() as f32 * 100.0
        }
    }
}

/// Output of one evaluation. Empty when nothing changed since the last one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    pub progress: Option<f32>,
    pub loading: Option<f32>,
    pub items: Vec<(usize, ItemVisualState)>,
}

impl Evaluation {
    pub fn is_empty(&self) -> bool {
        self.progress.is_none() && self.loading.is_none() && self.items.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Surface {
    Slide {
        axis: Axis,
    },
    Defocus {
        max_blur: f32,
    },
    Guillotine {
        seam: SeamGeometry,
        separator_width: f32,
    },
    Zoom {
        max_scale: f32,
        direction: ZoomDirection,
        last: Option<ItemVisualState>,
    },
    Sequence {
        scrubber: FrameScrubber,
        frame_count: usize,
    },
    Video {
        scrubber: MediaScrubber,
        duration: Option<Duration>,
    },
    Reveal {
        controller: RevealController,
        last: Option<ItemVisualState>,
    },
}

#[derive(Debug, Clone)]
pub struct Gallery {
    name: String,
    height_px: Option<f32>,
    viewport: Viewport,
    chapters: Option<ChapterParams>,
    item_count: usize,
    segmenter: Option<ChapterSegmenter>,
    tracker: Option<ScrollProgressTracker>,
    surface: Surface,
    assets: AssetSet,
    requires_assets: bool,
    last_loading: Option<f32>,
}

impl Gallery {
    pub fn new(section: &SectionConfig, ctx: &GalleryContext) -> Self {
        let effect = &section.effect;
        let chapters = effect.chapters();
        let segmenter = chapters.map(|params| segmenter_for(params, ctx.velocity_multiplier));
        let duration_in_vh = match (effect, segmenter.as_ref()) {
            (_, Some(segmenter)) => Some(segmenter.total_duration_vh()),
            (EffectOptions::Sequence(o), _) => Some(o.duration_in_vh),
            (EffectOptions::Video(o), _) => Some(o.duration_in_vh),
            _ => None,
        };
        let tracker = duration_in_vh.map(|duration| {
            ScrollProgressTracker::new(duration, ProgressAnchor::Pinned, ctx.viewport)
                .with_epsilon(ctx.progress_epsilon)
        });
        let surface = match effect {
            EffectOptions::Slide(o) => Surface::Slide { axis: o.axis },
            EffectOptions::Defocus(o) => Surface::Defocus {
                max_blur: o.max_blur,
            },
            EffectOptions::Guillotine(o) => Surface::Guillotine {
                seam: SeamGeometry::new(o.diagonal_angle, &ctx.viewport),
                separator_width: o.separator_width,
            },
            EffectOptions::Zoom(o) => Surface::Zoom {
                max_scale: o.max_scale,
                direction: o.direction,
                last: None,
            },
            EffectOptions::Sequence(o) => Surface::Sequence {
                scrubber: FrameScrubber::new(),
                frame_count: o.frame_count.unwrap_or(0),
            },
            EffectOptions::Video(_) => Surface::Video {
                scrubber: MediaScrubber::new(),
                duration: None,
            },
            EffectOptions::Reveal(o) => Surface::Reveal {
                controller: RevealController::new(o.clone(), ctx.viewport),
                last: None,
            },
        };
        debug!(
            section = %section.name,
            effect = %effect.kind(),
            duration_in_vh = ?duration_in_vh,
            "gallery created"
        );
        Self {
            name: section.name.clone(),
            height_px: section.height_px,
            viewport: ctx.viewport,
            chapters,
            item_count: chapters.map_or(0, |params| params.item_count),
            segmenter,
            tracker,
            surface,
            assets: AssetSet::new(effect.asset_count()),
            requires_assets: effect.requires_assets(),
            last_loading: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tracker(&self) -> Option<&ScrollProgressTracker> {
        self.tracker.as_ref()
    }

    /// Layout height of the section's placeholder.
    pub fn container_height(&self) -> f32 {
        match &self.tracker {
            Some(tracker) => tracker.container_height(),
            None => self.height_px.unwrap_or(self.viewport.height),
        }
    }

    /// Whether the section may draw.
    pub fn is_ready(&self) -> bool {
        !self.requires_assets || self.assets.all_settled()
    }

    /// Recompute every viewport-derived length.
    pub fn resize(&mut self, ctx: &GalleryContext) {
        self.viewport = ctx.viewport;
        if let Some(params) = self.chapters {
            let segmenter = segmenter_for(params, ctx.velocity_multiplier);
            if let Some(tracker) = self.tracker.as_mut() {
                tracker.set_duration_in_vh(segmenter.total_duration_vh());
            }
            self.segmenter = Some(segmenter);
        }
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.resize(ctx.viewport);
            tracker.invalidate();
        }
        match &mut self.surface {
            Surface::Guillotine { seam, .. } => {
                *seam = SeamGeometry::new(seam.diagonal_angle(), &ctx.viewport);
            }
            Surface::Sequence { scrubber, .. } => scrubber.force_redraw(),
            Surface::Video { scrubber, .. } => scrubber.force_redraw(),
            Surface::Reveal { controller, last } => {
                controller.resize(ctx.viewport);
                *last = None;
            }
            Surface::Zoom { last, .. } => *last = None,
            Surface::Slide { .. } | Surface::Defocus { .. } => {}
        }
    }

    /// Record an asset outcome. Returns `true` if anything changed.
    pub fn settle_asset(&mut self, index: usize, ready: bool) -> bool {
        let changed = self.assets.settle(index, ready);
        if changed {
            self.invalidate();
        }
        changed
    }

    /// Treat every asset as available (the host manages loading itself).
    pub fn assume_assets_ready(&mut self) {
        self.assets.mark_all_ready();
        self.invalidate();
    }

    pub fn set_media_duration(&mut self, media_duration: Duration) -> bool {
        let Surface::Video { duration, .. } = &mut self.surface else {
            return false;
        };
        *duration = Some(media_duration);
        self.assets.settle(0, true);
        self.invalidate();
        true
    }

    pub fn force_reveal(&mut self) -> bool {
        let Surface::Reveal { controller, .. } = &mut self.surface else {
            return false;
        };
        controller.force_reveal();
        true
    }

    /// Forget what was last propagated so the next evaluation emits in full.
    pub fn invalidate(&mut self) {
        if let Some(tracker) = self.tracker.as_mut() {
            tracker.invalidate();
        }
        match &mut self.surface {
            Surface::Zoom { last, .. } | Surface::Reveal { last, .. } => *last = None,
            _ => {}
        }
    }

    /// Evaluate the section at the given bounds.
    pub fn evaluate(&mut self, bounds: Option<&Rect>) -> Evaluation {
        let mut out = Evaluation::default();
        let viewport = self.viewport;
        match &mut self.surface {
            Surface::Zoom {
                max_scale,
                direction,
                last,
            } => {
                if let Some(rect) = bounds {
                    let state = zoom_state(rect, &viewport, *max_scale, *direction);
                    push_changed(&mut out, last, state);
                }
                return out;
            }
            Surface::Reveal { controller, last } => {
                let state = controller.evaluate(bounds, &viewport);
                push_changed(&mut out, last, state);
                return out;
            }
            _ => {}
        }

        if self.requires_assets {
            let percent = self.assets.percent();
            if self.last_loading != Some(percent) {
                self.last_loading = Some(percent);
                out.loading = Some(percent);
            }
        }
        let Some(tracker) = self.tracker.as_mut() else {
            return out;
        };
        out.progress = tracker.sample(bounds);
        let Some(progress) = out.progress else {
            return out;
        };
        if !self.is_ready() {
            return out;
        }

        match &mut self.surface {
            Surface::Slide { axis } => {
                if let Some(segmenter) = &self.segmenter {
                    let position = segmenter.locate(progress);
                    out.items = (0..self.item_count)
                        .map(|idx| (idx, slide_state(&position, idx, *axis, &viewport)))
                        .collect();
                }
            }
            Surface::Defocus { max_blur } => {
                if let Some(segmenter) = &self.segmenter {
                    let position = segmenter.locate(progress);
                    out.items = (0..self.item_count)
                        .map(|idx| (idx, defocus_state(position.relative(idx), *max_blur)))
                        .collect();
                }
            }
            Surface::Guillotine {
                seam,
                separator_width,
            } => {
                if let Some(segmenter) = &self.segmenter {
                    let position = segmenter.locate(progress);
                    out.items = (0..self.item_count)
                        .map(|idx| {
                            let state =
                                guillotine_state(position.incoming(idx), idx, seam, *separator_width);
                            (idx, state)
                        })
                        .collect();
                }
            }
            Surface::Sequence {
                scrubber,
                frame_count,
            } => {
                if let Some(index) = frame_index(progress, *frame_count) {
                    // A frame that failed to load is skipped; the last drawn one stays.
                    if self.assets.is_ready(index) {
                        if let Some(state) = scrubber.advance(progress, *frame_count) {
                            out.items.push((0, state));
                        }
                    }
                }
            }
            Surface::Video { scrubber, duration } => {
                if let Some(duration) = duration {
                    if let Some(state) = scrubber.advance(progress, *duration) {
                        out.items.push((0, state));
                    }
                }
            }
            Surface::Zoom { .. } | Surface::Reveal { .. } => {}
        }
        out
    }
}

fn segmenter_for(params: ChapterParams, velocity_multiplier: f32) -> ChapterSegmenter {
    ChapterSegmenter::new(
        params.item_count,
        params.scroll_velocity * velocity_multiplier,
        params.hold_ratio,
    )
}

fn push_changed(out: &mut Evaluation, last: &mut Option<ItemVisualState>, state: ItemVisualState) {
    if last.as_ref() != Some(&state) {
        *last = Some(state.clone());
        out.items.push((0, state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(yaml: &str) -> SectionConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn ctx(width: f32, height: f32) -> GalleryContext {
        GalleryContext {
            viewport: Viewport::new(width, height),
            velocity_multiplier: 1.0,
            progress_epsilon: 0.0,
        }
    }

    #[test]
    fn asset_percentage_counts_failures() {
        let mut assets = AssetSet::new(4);
        assert_eq!(assets.percent(), 0.0);
        assert!(assets.settle(0, true));
        assert!(assets.settle(1, false));
        assert!(!assets.settle(1, true));
        assert!(!assets.settle(9, true));
        assert_eq!(assets.percent(), 50.0);
        assert!(assets.is_ready(0));
        assert!(!assets.is_ready(1));
        assert_eq!(AssetSet::new(0).percent(), 100.0);
    }

    #[test]
    fn defocus_container_includes_trailing_hold() {
        let section = section(
            "name: fade\neffect:\n  kind: defocus\n  images: [a, b, c]\n  hold-ratio: 0.5\n",
        );
        let gallery = Gallery::new(&section, &ctx(1000.0, 800.0));
        // Two chapters of 1.5vh plus a 0.5vh trailing hold.
        assert_eq!(gallery.tracker().map(|t| t.duration_in_vh()), Some(3.5));
        assert_eq!(gallery.container_height(), 3.5 * 800.0 + 800.0);
    }

    #[test]
    fn velocity_multiplier_shortens_the_section() {
        let section = section("name: s\neffect:\n  kind: slide\n  images: [a, b, c]\n");
        let mut gallery = Gallery::new(&section, &ctx(400.0, 800.0));
        assert_eq!(gallery.tracker().map(|t| t.duration_in_vh()), Some(2.0));
        gallery.resize(&GalleryContext {
            velocity_multiplier: 2.0,
            ..ctx(1200.0, 800.0)
        });
        assert_eq!(gallery.tracker().map(|t| t.duration_in_vh()), Some(1.0));
    }

    #[test]
    fn sequence_waits_for_assets_then_draws() {
        let section = section(
            "name: seq\neffect:\n  kind: sequence\n  folder: frames\n  frame-count: 3\n  duration-in-vh: 1\n",
        );
        let mut gallery = Gallery::new(&section, &ctx(1000.0, 1000.0));
        let rect = Rect::band(-500.0, 2000.0, &Viewport::new(1000.0, 1000.0));

        let first = gallery.evaluate(Some(&rect));
        assert_eq!(first.loading, Some(0.0));
        assert!(first.items.is_empty());

        gallery.settle_asset(0, true);
        gallery.settle_asset(1, true);
        let partial = gallery.evaluate(Some(&rect));
        assert!((partial.loading.unwrap_or_default() - 66.666_67).abs() < 1e-3);
        assert!(partial.items.is_empty());

        gallery.settle_asset(2, true);
        let ready = gallery.evaluate(Some(&rect));
        assert_eq!(ready.loading, Some(100.0));
        assert_eq!(ready.items, vec![(0, ItemVisualState::Frame { index: 1 })]);

        // Same geometry: nothing to do.
        assert!(gallery.evaluate(Some(&rect)).is_empty());
    }

    #[test]
    fn failed_frame_is_skipped() {
        let section = section(
            "name: seq\neffect:\n  kind: sequence\n  folder: frames\n  frame-count: 3\n  duration-in-vh: 1\n",
        );
        let mut gallery = Gallery::new(&section, &ctx(1000.0, 1000.0));
        gallery.settle_asset(0, true);
        gallery.settle_asset(1, false);
        gallery.settle_asset(2, true);
        let rect = Rect::band(-500.0, 2000.0, &Viewport::new(1000.0, 1000.0));
        let eval = gallery.evaluate(Some(&rect));
        assert_eq!(eval.progress, Some(0.5));
        assert!(eval.items.is_empty());
    }

    #[test]
    fn resize_redraws_current_frame() {
        let section = section(
            "name: seq\neffect:\n  kind: sequence\n  folder: frames\n  frame-count: 2\n  duration-in-vh: 1\n",
        );
        let mut gallery = Gallery::new(&section, &ctx(1000.0, 1000.0));
        gallery.assume_assets_ready();
        let rect = Rect::band(0.0, 2000.0, &Viewport::new(1000.0, 1000.0));
        assert_eq!(gallery.evaluate(Some(&rect)).items.len(), 1);
        gallery.resize(&ctx(800.0, 1000.0));
        assert_eq!(
            gallery.evaluate(Some(&rect)).items,
            vec![(0, ItemVisualState::Frame { index: 0 })]
        );
    }

    #[test]
    fn video_needs_duration() {
        let section = section("name: clip\neffect:\n  kind: video\n  src: clip.mp4\n");
        let mut gallery = Gallery::new(&section, &ctx(1000.0, 1000.0));
        let rect = Rect::band(-1000.0, 3000.0, &Viewport::new(1000.0, 1000.0));
        assert!(gallery.evaluate(Some(&rect)).items.is_empty());
        assert!(gallery.set_media_duration(Duration::from_secs(10)));
        assert_eq!(
            gallery.evaluate(Some(&rect)).items,
            vec![(0, ItemVisualState::MediaTime { seconds: 5.0 })]
        );
    }

    #[test]
    fn unmounted_geometry_reports_static_start() {
        let section = section("name: s\neffect:\n  kind: slide\n  images: [a, b]\n");
        let mut gallery = Gallery::new(&section, &ctx(1000.0, 800.0));
        let eval = gallery.evaluate(None);
        assert_eq!(eval.progress, Some(0.0));
        assert_eq!(
            eval.items,
            vec![
                (0, ItemVisualState::Offset { axis: Axis::Horizontal, px: 0.0 }),
                (1, ItemVisualState::Offset { axis: Axis::Horizontal, px: 1000.0 }),
            ]
        );
    }

    #[test]
    fn zero_image_gallery_is_static() {
        let section = section("name: empty\neffect:\n  kind: guillotine\n");
        let mut gallery = Gallery::new(&section, &ctx(1000.0, 800.0));
        assert_eq!(gallery.container_height(), 800.0);
        let eval = gallery.evaluate(Some(&Rect::band(-100.0, 800.0, &Viewport::new(1000.0, 800.0))));
        assert_eq!(eval.progress, Some(1.0));
        assert!(eval.items.is_empty());
    }
}
