use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use scroll_stage::config::SectionConfig;
use scroll_stage::events::AssetSettled;
use scroll_stage::geometry::{Rect, SharedViewport, Viewport};
use scroll_stage::mappers::ItemVisualState;
use scroll_stage::stage::{SectionProbe, Stage, StageSettings, StyleSink};

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

fn section(yaml: &str) -> SectionConfig {
    serde_yaml::from_str(yaml).unwrap()
}

fn slide(images: usize) -> SectionConfig {
    let images: Vec<String> = (0..images).map(|i| format!("img{i}.jpg")).collect();
    section(&format!(
        "name: slides\neffect:\n  kind: slide\n  images: [{}]\n",
        images.join(", ")
    ))
}

#[derive(Clone, Default)]
struct Probe {
    rect: Arc<Mutex<Option<Rect>>>,
    reads: Arc<AtomicUsize>,
    log: Option<Arc<Mutex<Vec<&'static str>>>>,
}

impl Probe {
    fn at(&self, rect: Rect) {
        *self.rect.lock().unwrap() = Some(rect);
    }
}

impl SectionProbe for Probe {
    fn bounds(&self) -> Option<Rect> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.log {
            log.lock().unwrap().push("read");
        }
        *self.rect.lock().unwrap()
    }
}

#[derive(Clone, Default)]
struct Sink {
    applied: Arc<Mutex<Vec<(usize, ItemVisualState)>>>,
    heights: Arc<Mutex<Vec<f32>>>,
    loading: Arc<Mutex<Vec<f32>>>,
    log: Option<Arc<Mutex<Vec<&'static str>>>>,
}

impl StyleSink for Sink {
    fn apply(&mut self, item: usize, state: &ItemVisualState) {
        if let Some(log) = &self.log {
            log.lock().unwrap().push("write");
        }
        self.applied.lock().unwrap().push((item, state.clone()));
    }

    fn loading(&mut self, percent: f32) {
        self.loading.lock().unwrap().push(percent);
    }

    fn container_height(&mut self, px: f32) {
        self.heights.lock().unwrap().push(px);
    }
}

fn stage(width: f32, height: f32) -> Stage<SharedViewport> {
    Stage::new(
        StageSettings::default(),
        SharedViewport::new(Viewport::new(width, height)),
    )
}

#[test]
fn scroll_cost_is_bounded_by_active_sections() {
    let mut stage = stage(600.0, 800.0);
    let mut probes = Vec::new();
    let mut ids = Vec::new();
    for _ in 0..50 {
        let probe = Probe::default();
        ids.push(stage.mount(&slide(3), probe.clone(), Sink::default()));
        probes.push(probe);
    }
    stage.on_visibility(ids[10], true);
    stage.on_visibility(ids[11], true);
    for _ in 0..25 {
        stage.on_scroll();
    }
    assert_eq!(stage.run_pending(), 2);
    assert_eq!(stage.run_pending(), 0);

    let reads: usize = probes.iter().map(|p| p.reads.load(Ordering::SeqCst)).sum();
    assert_eq!(reads, 2);
    assert_eq!(probes[10].reads.load(Ordering::SeqCst), 1);
    assert_eq!(stage.stats().frames, 1);
    assert_eq!(stage.stats().geometry_reads, 2);
}

#[test]
fn geometry_is_read_before_any_style_is_written() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut stage = stage(600.0, 800.0);
    for _ in 0..3 {
        let probe = Probe {
            log: Some(log.clone()),
            ..Probe::default()
        };
        let sink = Sink {
            log: Some(log.clone()),
            ..Sink::default()
        };
        let id = stage.mount(&slide(2), probe, sink);
        stage.on_visibility(id, true);
    }
    assert_eq!(stage.run_pending(), 3);

    let log = log.lock().unwrap();
    let last_read = log.iter().rposition(|e| *e == "read").unwrap();
    let first_write = log.iter().position(|e| *e == "write").unwrap();
    assert_eq!(last_read, 2);
    assert!(first_write > last_read);
}

#[test]
fn unmount_detaches_immediately() {
    let mut stage = stage(600.0, 800.0);
    let sink = Sink::default();
    let id = stage.mount(&slide(2), Probe::default(), sink.clone());
    stage.on_visibility(id, true);
    let token = stage.on_scroll().unwrap();
    assert_eq!(Arc::strong_count(&sink.applied), 2);

    assert!(stage.unmount(id));
    assert_eq!(Arc::strong_count(&sink.applied), 1);
    assert_eq!(stage.pending_frame(), None);
    assert_eq!(stage.run_frame(token), 0);
    assert!(sink.applied.lock().unwrap().is_empty());
    assert!(!stage.unmount(id));
    assert_eq!(stage.on_visibility(id, true), None);
}

#[test]
fn scrolled_gallery_reports_current_items() {
    let mut stage = stage(600.0, 800.0);
    let probe = Probe::default();
    let sink = Sink::default();
    let id = stage.mount(&slide(4), probe.clone(), sink.clone());
    // Three chapters of one viewport height each.
    assert_eq!(sink.heights.lock().unwrap().as_slice(), &[3200.0]);

    stage.on_visibility(id, true);
    probe.at(Rect::new(-1200.0, 0.0, 600.0, 3200.0));
    stage.run_pending();
    let applied = sink.applied.lock().unwrap().clone();
    let offsets: Vec<f32> = applied
        .iter()
        .map(|(_, state)| match state {
            ItemVisualState::Offset { px, .. } => *px,
            other => panic!("unexpected state {other:?}"),
        })
        .collect();
    assert_eq!(offsets, vec![0.0, 0.0, 300.0, 600.0]);
}

#[test]
fn visibility_alone_decides_which_sections_are_active() {
    let mut stage = stage(600.0, 800.0);
    let probe = Probe::default();
    let sink = Sink::default();
    let blades =
        section("name: blades\neffect:\n  kind: guillotine\n  images: [a.jpg, b.jpg, c.jpg]\n");
    let id = stage.mount(&blades, probe.clone(), sink.clone());
    assert!(!stage.is_active(id));

    stage.on_visibility(id, true);
    probe.at(Rect::new(0.0, 0.0, 600.0, 2400.0));
    assert_eq!(stage.run_pending(), 1);
    assert!(stage.is_active(id));
    assert!(!sink.applied.lock().unwrap().is_empty());

    stage.on_visibility(id, false);
    assert!(!stage.is_active(id));
    stage.run_pending();
    // Nothing left to track once the final frame has run.
    assert_eq!(stage.on_scroll(), None);
    assert!(!stage.is_active(id));
}

#[test]
fn resize_is_debounced_and_applies_desktop_velocity() {
    let viewport = SharedViewport::new(Viewport::new(600.0, 800.0));
    let mut stage = Stage::new(StageSettings::default(), viewport.clone());
    let sink = Sink::default();
    let id = stage.mount(&slide(4), Probe::default(), sink.clone());
    stage.on_visibility(id, true);
    stage.run_pending();

    viewport.set(Viewport::new(1200.0, 800.0));
    let t0 = Instant::now();
    stage.on_resize(t0);
    stage.on_resize(t0 + Duration::from_millis(60));
    assert!(!stage.poll_resize(t0 + Duration::from_millis(120)));
    assert!(stage.poll_resize(t0 + Duration::from_millis(170)));
    assert!(!stage.poll_resize(t0 + Duration::from_millis(400)));

    assert_eq!(stage.viewport(), Viewport::new(1200.0, 800.0));
    let heights = sink.heights.lock().unwrap().clone();
    assert_eq!(heights.len(), 2);
    // Desktop widths triple the velocity: one viewport of travel in total.
    assert!(close(heights[1], 1600.0));
    assert!(stage.pending_frame().is_some());
}

#[test]
fn sequence_shows_loading_until_every_frame_settles() {
    let mut stage = stage(600.0, 800.0);
    let sink = Sink::default();
    let probe = Probe::default();
    let id = stage.mount(
        &section(
            "name: spin\neffect:\n  kind: sequence\n  folder: frames\n  frame-count: 4\n  duration-in-vh: 1\n",
        ),
        probe.clone(),
        sink.clone(),
    );
    probe.at(Rect::new(-800.0, 0.0, 600.0, 1600.0));
    // Inactive sections do not schedule frames for asset progress.
    assert_eq!(
        stage.on_asset_settled(AssetSettled {
            section: id,
            index: 0,
            ready: true
        }),
        None
    );
    stage.on_visibility(id, true);
    stage.run_pending();
    assert!(sink.applied.lock().unwrap().is_empty());

    for index in 1..4 {
        let token = stage.on_asset_settled(AssetSettled {
            section: id,
            index,
            ready: true,
        });
        assert!(token.is_some());
        stage.run_pending();
    }
    assert_eq!(
        sink.loading.lock().unwrap().as_slice(),
        &[25.0, 50.0, 75.0, 100.0]
    );
    assert_eq!(
        sink.applied.lock().unwrap().as_slice(),
        &[(0, ItemVisualState::Frame { index: 3 })]
    );
}

#[test]
fn forced_reveal_activates_the_section() {
    let mut stage = stage(600.0, 800.0);
    let sink = Sink::default();
    let id = stage.mount(
        &section("name: about\nheight-px: 400\neffect:\n  kind: reveal\n"),
        Probe::default(),
        sink.clone(),
    );
    assert_eq!(sink.heights.lock().unwrap().as_slice(), &[400.0]);
    assert!(!stage.is_active(id));
    assert!(stage.force_reveal(id).is_some());
    assert!(stage.is_active(id));
    stage.run_pending();
    assert_eq!(
        sink.applied.lock().unwrap().as_slice(),
        &[(
            0,
            ItemVisualState::Reveal {
                opacity: 1.0,
                translate_y_px: 0.0,
                transition_ms: None
            }
        )]
    );
}

#[test]
fn force_reveal_ignores_other_effects() {
    let mut stage = stage(600.0, 800.0);
    let id = stage.mount(&slide(2), Probe::default(), Sink::default());
    assert_eq!(stage.force_reveal(id), None);
    assert!(!stage.is_active(id));
}
