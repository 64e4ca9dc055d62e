//! Deterministic stand-in for a browser page.
//!
//! Sections are stacked top to bottom using the container heights the stage
//! asks for. Probes read bounds from the shared scroll position and sinks
//! record every write, so a whole scroll sweep can be replayed and inspected
//! without a rendering target.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tokio::sync::{mpsc::Sender, oneshot};
use tracing::{debug, info, warn};

use crate::config::{Configuration, EffectOptions, SectionConfig};
use crate::events::{LoadFrames, SectionId, StageEvent};
use crate::geometry::{Rect, Viewport, ViewportProvider, intersects};
use crate::mappers::ItemVisualState;
use crate::stage::{SectionProbe, Stage, StageStats, StyleSink};

/// Everything a sink was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum PageRecord {
    Style {
        section: String,
        item: usize,
        state: ItemVisualState,
    },
    Progress {
        section: String,
        progress: f32,
    },
    Loading {
        section: String,
        percent: f32,
    },
}

#[derive(Debug, Default)]
struct PageState {
    viewport: Viewport,
    scroll_y: f32,
    heights: Vec<f32>,
    records: Vec<PageRecord>,
}

impl PageState {
    fn doc_top(&self, slot: usize) -> f32 {
        self.heights.iter().take(slot).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct VirtualPage {
    inner: Arc<Mutex<PageState>>,
}

impl VirtualPage {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PageState {
                viewport,
                ..PageState::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve a slot at the bottom of the page.
    pub fn add_slot(&self) -> usize {
        let mut state = self.state();
        state.heights.push(0.0);
        state.heights.len() - 1
    }

    pub fn set_height(&self, slot: usize, height: f32) {
        if let Some(h) = self.state().heights.get_mut(slot) {
            *h = height.max(0.0);
        }
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.state().viewport = viewport;
    }

    pub fn viewport(&self) -> Viewport {
        self.state().viewport
    }

    pub fn scroll_to(&self, y: f32) {
        let mut state = self.state();
        let max = (state.heights.iter().sum::<f32>() - state.viewport.height).max(0.0);
        state.scroll_y = y.clamp(0.0, max);
    }

    pub fn scroll_y(&self) -> f32 {
        self.state().scroll_y
    }

    pub fn total_height(&self) -> f32 {
        self.state().heights.iter().sum()
    }

    /// Largest reachable scroll offset.
    pub fn max_scroll(&self) -> f32 {
        let state = self.state();
        (state.heights.iter().sum::<f32>() - state.viewport.height).max(0.0)
    }

    /// Document offset of the slot's top edge.
    pub fn doc_top(&self, slot: usize) -> f32 {
        self.state().doc_top(slot)
    }

    /// Bounds of `slot` relative to the viewport.
    pub fn bounds(&self, slot: usize) -> Option<Rect> {
        let state = self.state();
        let height = *state.heights.get(slot)?;
        Some(Rect::new(
            state.doc_top(slot) - state.scroll_y,
            0.0,
            state.viewport.width,
            height,
        ))
    }

    pub fn is_visible(&self, slot: usize, margin_px: f32) -> bool {
        let viewport = self.viewport();
        self.bounds(slot)
            .is_some_and(|rect| intersects(&rect, &viewport, margin_px))
    }

    fn record(&self, record: PageRecord) {
        self.state().records.push(record);
    }

    /// Take every record written since the last drain.
    pub fn drain_records(&self) -> Vec<PageRecord> {
        std::mem::take(&mut self.state().records)
    }

    pub fn probe(&self, slot: usize) -> PageProbe {
        PageProbe {
            page: self.clone(),
            slot,
        }
    }

    pub fn sink(&self, slot: usize, section: &str) -> PageSink {
        PageSink {
            page: self.clone(),
            slot,
            section: section.to_string(),
        }
    }
}

pub struct PageProbe {
    page: VirtualPage,
    slot: usize,
}

impl SectionProbe for PageProbe {
    fn bounds(&self) -> Option<Rect> {
        self.page.bounds(self.slot)
    }
}

pub struct PageSink {
    page: VirtualPage,
    slot: usize,
    section: String,
}

impl StyleSink for PageSink {
    fn apply(&mut self, item: usize, state: &ItemVisualState) {
        self.page.record(PageRecord::Style {
            section: self.section.clone(),
            item,
            state: state.clone(),
        });
    }

    fn progress(&mut self, progress: f32) {
        self.page.record(PageRecord::Progress {
            section: self.section.clone(),
            progress,
        });
    }

    fn loading(&mut self, percent: f32) {
        self.page.record(PageRecord::Loading {
            section: self.section.clone(),
            percent,
        });
    }

    fn container_height(&mut self, px: f32) {
        self.page.set_height(self.slot, px);
    }
}

/// A section placed on the virtual page.
#[derive(Debug, Clone)]
pub struct PlacedSection {
    pub name: String,
    pub id: SectionId,
    pub slot: usize,
    /// Frames to preload, for image sequences.
    pub frames: Option<Vec<PathBuf>>,
}

impl PlacedSection {
    pub fn load_request(&self) -> Option<LoadFrames> {
        self.frames.as_ref().map(|paths| LoadFrames {
            section: self.id,
            paths: paths.clone(),
        })
    }
}

/// Resolve sequence frames so the section knows its frame count up front.
fn resolve_section(section: &SectionConfig) -> Result<(SectionConfig, Option<Vec<PathBuf>>)> {
    let mut resolved = section.clone();
    let frames = match &mut resolved.effect {
        EffectOptions::Sequence(options) => {
            let paths = options.frame_paths()?;
            options.frame_count = Some(paths.len());
            Some(paths)
        }
        _ => None,
    };
    Ok((resolved, frames))
}

/// Mount the configured sections (optionally only `only`) onto `page`.
pub fn mount_sections<V: ViewportProvider>(
    stage: &mut Stage<V>,
    config: &Configuration,
    page: &VirtualPage,
    only: Option<&str>,
) -> Result<Vec<PlacedSection>> {
    if let Some(name) = only {
        config
            .section(name)
            .ok_or_else(|| anyhow!("no section named {name:?}"))?;
    }
    let mut placed = Vec::new();
    for section in &config.sections {
        if only.is_some_and(|name| name != section.name) {
            continue;
        }
        let (resolved, frames) = resolve_section(section)
            .with_context(|| format!("failed to resolve section {:?}", section.name))?;
        let slot = page.add_slot();
        let id = stage.mount(&resolved, page.probe(slot), page.sink(slot, &section.name));
        if let Some(frames) = &frames {
            info!(section = %section.name, frames = frames.len(), "sequence resolved");
        }
        placed.push(PlacedSection {
            name: section.name.clone(),
            id,
            slot,
            frames,
        });
    }
    Ok(placed)
}

/// Report the configured length of every placed video to the stage.
///
/// Sends wait for channel capacity, so the driver must already be consuming
/// `events`. Returns how many durations were sent.
pub async fn announce_media(
    events: &Sender<StageEvent>,
    config: &Configuration,
    placed: &[PlacedSection],
) -> Result<usize> {
    let mut sent = 0;
    for placed in placed {
        let Some(EffectOptions::Video(video)) = config.section(&placed.name).map(|s| &s.effect)
        else {
            continue;
        };
        match video.media_duration {
            Some(duration) => {
                events
                    .send(StageEvent::MediaReady {
                        section: placed.id,
                        duration,
                    })
                    .await
                    .map_err(|_| anyhow!("stage driver is gone"))?;
                sent += 1;
            }
            None => warn!(
                section = %placed.name,
                "video has no media-duration; it stays in its loading state"
            ),
        }
    }
    Ok(sent)
}

/// Host side of a simulated page: scrolls, tracks visibility and reports
/// both to the stage driver.
pub struct VirtualHost {
    page: VirtualPage,
    events: Sender<StageEvent>,
    sections: Vec<PlacedSection>,
    visible: HashMap<SectionId, bool>,
    margin_px: f32,
}

impl VirtualHost {
    pub fn new(
        page: VirtualPage,
        events: Sender<StageEvent>,
        sections: Vec<PlacedSection>,
        margin_px: f32,
    ) -> Self {
        Self {
            page,
            events,
            sections,
            visible: HashMap::new(),
            margin_px,
        }
    }

    async fn send(&self, event: StageEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| anyhow!("stage driver is gone"))
    }

    /// Scroll to `y`, report visibility changes and the scroll, then wait for
    /// the resulting frame.
    pub async fn scroll_to(&mut self, y: f32) -> Result<StageStats> {
        self.page.scroll_to(y);
        let mut changes = Vec::new();
        for section in &self.sections {
            let visible = self.page.is_visible(section.slot, self.margin_px);
            let previous = self.visible.insert(section.id, visible);
            if previous != Some(visible) {
                changes.push((section.id, visible));
            }
        }
        for (section, visible) in changes {
            debug!(section = section.0, visible, "visibility changed");
            self.send(StageEvent::Visibility { section, visible }).await?;
        }
        self.send(StageEvent::Scrolled).await?;
        self.flush().await
    }

    /// Scroll so the named section's top meets the viewport top, revealing it
    /// immediately if it is a reveal block.
    pub async fn jump_to(&mut self, name: &str) -> Result<StageStats> {
        let section = self
            .sections
            .iter()
            .find(|section| section.name == name)
            .ok_or_else(|| anyhow!("no section named {name:?}"))?;
        let (id, top) = (section.id, self.page.doc_top(section.slot));
        self.send(StageEvent::ForceReveal(id)).await?;
        self.scroll_to(top).await
    }

    /// Run whatever frame is pending and return the stage counters.
    pub async fn flush(&self) -> Result<StageStats> {
        let (tx, rx) = oneshot::channel();
        self.send(StageEvent::Flush(tx)).await?;
        rx.await.context("stage driver dropped the flush request")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_stack_in_order() {
        let page = VirtualPage::new(Viewport::new(1000.0, 800.0));
        let a = page.add_slot();
        let b = page.add_slot();
        page.set_height(a, 2400.0);
        page.set_height(b, 800.0);
        assert_eq!(page.total_height(), 3200.0);
        assert_eq!(page.max_scroll(), 2400.0);
        page.scroll_to(1000.0);
        assert_eq!(page.bounds(a).map(|r| r.top), Some(-1000.0));
        assert_eq!(page.bounds(b).map(|r| r.top), Some(1400.0));
        assert!(page.is_visible(a, 0.0));
        assert!(!page.is_visible(b, 0.0));
        assert!(page.is_visible(b, 600.0));
        page.scroll_to(99_999.0);
        assert_eq!(page.scroll_y(), 2400.0);
        assert_eq!(page.bounds(7), None);
    }

    #[test]
    fn sink_records_in_order() {
        let page = VirtualPage::new(Viewport::new(1000.0, 800.0));
        let slot = page.add_slot();
        let mut sink = page.sink(slot, "cover");
        sink.container_height(1600.0);
        sink.progress(0.5);
        sink.apply(0, &ItemVisualState::Scale { factor: 1.25 });
        assert_eq!(page.total_height(), 1600.0);
        assert_eq!(
            page.drain_records(),
            vec![
                PageRecord::Progress {
                    section: "cover".into(),
                    progress: 0.5
                },
                PageRecord::Style {
                    section: "cover".into(),
                    item: 0,
                    state: ItemVisualState::Scale { factor: 1.25 }
                },
            ]
        );
        assert!(page.drain_records().is_empty());
    }
}
