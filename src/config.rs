use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use walkdir::WalkDir;

use crate::geometry::Viewport;
use crate::mappers::Axis;
use crate::mappers::zoom::ZoomDirection;
use crate::stage::StageSettings;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Initial viewport for the simulated host.
    pub viewport: Viewport,
    /// Viewport width at or above which the desktop velocity multiplier applies.
    pub desktop_breakpoint_px: f32,
    /// Multiplier applied to chaptered galleries' scroll velocity on desktop widths.
    pub desktop_velocity_multiplier: f32,
    /// Progress changes smaller than this are not propagated.
    pub progress_epsilon: f32,
    /// Extra margin around the viewport for section activation.
    pub activation_margin_px: f32,
    /// Quiet period before a resize recomputes derived lengths.
    #[serde(with = "humantime_serde")]
    pub resize_debounce: Duration,
    /// Animation frame period used by the driver.
    #[serde(with = "humantime_serde")]
    pub frame_interval: Duration,
    /// Maximum number of concurrent frame decodes in the loader.
    pub loader_max_concurrent_decodes: usize,
    /// Sections in page order.
    pub sections: Vec<SectionConfig>,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.viewport.is_degenerate(),
            "viewport must have positive, finite width and height"
        );
        ensure!(
            self.desktop_breakpoint_px.is_finite() && self.desktop_breakpoint_px >= 0.0,
            "desktop-breakpoint-px must be a non-negative number"
        );
        ensure!(
            self.desktop_velocity_multiplier.is_finite() && self.desktop_velocity_multiplier > 0.0,
            "desktop-velocity-multiplier must be positive"
        );
        ensure!(
            self.progress_epsilon.is_finite() && (0.0..1.0).contains(&self.progress_epsilon),
            "progress-epsilon must be in [0, 1)"
        );
        ensure!(
            self.activation_margin_px.is_finite() && self.activation_margin_px >= 0.0,
            "activation-margin-px must be a non-negative number"
        );
        ensure!(
            !self.frame_interval.is_zero(),
            "frame-interval must be greater than zero"
        );
        ensure!(
            self.loader_max_concurrent_decodes > 0,
            "loader-max-concurrent-decodes must be greater than zero"
        );
        let mut names = HashSet::new();
        for section in &self.sections {
            ensure!(
                !section.name.trim().is_empty(),
                "section names must not be empty"
            );
            ensure!(
                names.insert(section.name.as_str()),
                "duplicate section name {:?}",
                section.name
            );
            section
                .validate()
                .with_context(|| format!("invalid section {:?}", section.name))?;
        }
        Ok(self)
    }

    /// Stage-wide knobs, detached from the section list.
    pub fn stage_settings(&self) -> StageSettings {
        StageSettings {
            desktop_breakpoint_px: self.desktop_breakpoint_px,
            desktop_velocity_multiplier: self.desktop_velocity_multiplier,
            progress_epsilon: self.progress_epsilon,
            resize_debounce: self.resize_debounce,
        }
    }

    pub fn section(&self, name: &str) -> Option<&SectionConfig> {
        self.sections.iter().find(|section| section.name == name)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            desktop_breakpoint_px: 768.0,
            desktop_velocity_multiplier: 3.0,
            progress_epsilon: 0.001,
            activation_margin_px: 0.0,
            resize_debounce: Duration::from_millis(100),
            frame_interval: Duration::from_millis(16),
            loader_max_concurrent_decodes: 4,
            sections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SectionConfig {
    pub name: String,
    /// Layout height for sections that do not reserve scroll distance (zoom, reveal).
    #[serde(default)]
    pub height_px: Option<f32>,
    pub effect: EffectOptions,
}

impl SectionConfig {
    fn validate(&self) -> Result<()> {
        if let Some(height) = self.height_px {
            ensure!(
                height.is_finite() && height >= 0.0,
                "height-px must be a non-negative number"
            );
        }
        self.effect.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EffectKind {
    Slide,
    Defocus,
    Guillotine,
    Zoom,
    Sequence,
    Video,
    Reveal,
}

impl EffectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slide => "slide",
            Self::Defocus => "defocus",
            Self::Guillotine => "guillotine",
            Self::Zoom => "zoom",
            Self::Sequence => "sequence",
            Self::Video => "video",
            Self::Reveal => "reveal",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EffectOptions {
    Slide(SlideOptions),
    Defocus(DefocusOptions),
    Guillotine(GuillotineOptions),
    Zoom(ZoomOptions),
    Sequence(SequenceOptions),
    Video(VideoOptions),
    Reveal(RevealOptions),
}

/// Chapter parameters shared by the multi-item galleries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChapterParams {
    pub item_count: usize,
    pub scroll_velocity: f32,
    pub hold_ratio: f32,
}

impl EffectOptions {
    pub fn kind(&self) -> EffectKind {
        match self {
            Self::Slide(_) => EffectKind::Slide,
            Self::Defocus(_) => EffectKind::Defocus,
            Self::Guillotine(_) => EffectKind::Guillotine,
            Self::Zoom(_) => EffectKind::Zoom,
            Self::Sequence(_) => EffectKind::Sequence,
            Self::Video(_) => EffectKind::Video,
            Self::Reveal(_) => EffectKind::Reveal,
        }
    }

    /// Chapter layout for chaptered galleries, `None` for single-surface effects.
    pub fn chapters(&self) -> Option<ChapterParams> {
        let (images, scroll_velocity, hold_ratio) = match self {
            Self::Slide(o) => (&o.images, o.scroll_velocity, o.hold_ratio),
            Self::Defocus(o) => (&o.images, o.scroll_velocity, o.hold_ratio),
            Self::Guillotine(o) => (&o.images, o.scroll_velocity, o.hold_ratio),
            _ => return None,
        };
        Some(ChapterParams {
            item_count: images.len(),
            scroll_velocity,
            hold_ratio,
        })
    }

    /// Number of assets the section waits for before it can draw. Zero for
    /// effects the host draws as their images arrive.
    pub fn asset_count(&self) -> usize {
        match self {
            Self::Sequence(o) => o.frame_count.unwrap_or(0),
            Self::Video(_) => 1,
            _ => 0,
        }
    }

    /// Whether drawing must wait until the host reports every asset ready.
    ///
    /// Plain image galleries are drawn by the host as images arrive; scrubbed
    /// media cannot be positioned until it is decoded.
    pub fn requires_assets(&self) -> bool {
        matches!(self, Self::Sequence(_) | Self::Video(_))
    }

    fn validate(&self) -> Result<()> {
        if let Some(params) = self.chapters() {
            ensure!(
                params.scroll_velocity.is_finite() && params.scroll_velocity > 0.0,
                "{} scroll-velocity must be positive",
                self.kind()
            );
            ensure!(
                params.hold_ratio.is_finite() && (0.0..=1.0).contains(&params.hold_ratio),
                "{} hold-ratio must be in [0, 1]",
                self.kind()
            );
        }
        match self {
            Self::Defocus(o) => ensure!(
                o.max_blur.is_finite() && o.max_blur >= 0.0,
                "defocus max-blur must be a non-negative number"
            ),
            Self::Guillotine(o) => {
                ensure!(
                    o.diagonal_angle.is_finite() && o.diagonal_angle >= 0.0,
                    "guillotine diagonal-angle must be a non-negative number"
                );
                ensure!(
                    o.separator_width.is_finite() && o.separator_width >= 0.0,
                    "guillotine separator-width must be a non-negative number"
                );
            }
            Self::Zoom(o) => ensure!(
                o.max_scale.is_finite() && o.max_scale >= 1.0,
                "zoom max-scale must be >= 1"
            ),
            Self::Sequence(o) => {
                ensure!(o.frame_step > 0, "sequence frame-step must be > 0");
                ensure_duration(o.duration_in_vh, self.kind())?;
            }
            Self::Video(o) => ensure_duration(o.duration_in_vh, self.kind())?,
            Self::Reveal(o) => {
                ensure!(
                    o.distance_ratio.is_finite() && o.distance_ratio >= 0.0,
                    "reveal distance-ratio must be a non-negative number"
                );
                ensure!(
                    o.start_ratio.is_finite(),
                    "reveal start-ratio must be finite"
                );
                ensure!(
                    o.threshold.is_finite() && (0.0..=1.0).contains(&o.threshold),
                    "reveal threshold must be in [0, 1]"
                );
            }
            Self::Slide(_) => {}
        }
        Ok(())
    }
}

fn ensure_duration(duration_in_vh: f32, kind: EffectKind) -> Result<()> {
    ensure!(
        duration_in_vh.is_finite() && duration_in_vh >= 0.0,
        "{kind} duration-in-vh must be a non-negative number"
    );
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SlideOptions {
    pub images: Vec<String>,
    pub axis: Axis,
    pub scroll_velocity: f32,
    pub hold_ratio: f32,
}

impl Default for SlideOptions {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            axis: Axis::Horizontal,
            scroll_velocity: 1.0,
            hold_ratio: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct DefocusOptions {
    pub images: Vec<String>,
    pub scroll_velocity: f32,
    /// Pause length as a fraction of the transition length.
    pub hold_ratio: f32,
    /// Blur radius, in pixels, one item away from the focused one.
    pub max_blur: f32,
}

impl Default for DefocusOptions {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            scroll_velocity: 1.0,
            hold_ratio: 0.7,
            max_blur: 60.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct GuillotineOptions {
    pub images: Vec<String>,
    pub scroll_velocity: f32,
    pub hold_ratio: f32,
    /// Horizontal skew between the blade's top and bottom, in percent of width.
    pub diagonal_angle: f32,
    pub separator_width: f32,
}

impl Default for GuillotineOptions {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            scroll_velocity: 1.5,
            hold_ratio: 0.0,
            diagonal_angle: 25.0,
            separator_width: 4.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ZoomOptions {
    pub src: String,
    pub max_scale: f32,
    pub direction: ZoomDirection,
}

impl Default for ZoomOptions {
    fn default() -> Self {
        Self {
            src: String::new(),
            max_scale: 1.5,
            direction: ZoomDirection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SequenceOptions {
    pub folder: PathBuf,
    pub file_prefix: String,
    pub start_frame: u32,
    /// Number of frames; the folder is scanned when absent.
    pub frame_count: Option<usize>,
    pub frame_step: u32,
    pub extension: String,
    pub pad_width: usize,
    pub duration_in_vh: f32,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        Self {
            folder: PathBuf::new(),
            file_prefix: String::new(),
            start_frame: 1,
            frame_count: None,
            frame_step: 1,
            extension: "webp".to_string(),
            pad_width: 4,
            duration_in_vh: 2.0,
        }
    }
}

impl SequenceOptions {
    /// Paths of every frame in playback order.
    pub fn frame_paths(&self) -> Result<Vec<PathBuf>> {
        match self.frame_count {
            Some(count) => Ok((0..count)
                .map(|i| {
                    let number = u64::from(self.start_frame) + i as u64 * u64::from(self.frame_step);
                    self.folder.join(format!(
                        "{}{:0width$}.{}",
                        self.file_prefix,
                        number,
                        self.extension,
                        width = self.pad_width
                    ))
                })
                .collect()),
            None => self.scan_frames(),
        }
    }

    fn scan_frames(&self) -> Result<Vec<PathBuf>> {
        let mut frames = Vec::new();
        for entry in WalkDir::new(&self.folder).min_depth(1).max_depth(1) {
            let entry = entry
                .with_context(|| format!("failed to scan {}", self.folder.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let matches_prefix = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(&self.file_prefix));
            let matches_extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension));
            if matches_prefix && matches_extension {
                frames.push(path.to_path_buf());
            }
        }
        frames.sort();
        Ok(frames)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct VideoOptions {
    pub src: String,
    pub duration_in_vh: f32,
    /// Known media length. Hosts that cannot probe the media report this as loaded.
    #[serde(with = "humantime_serde")]
    pub media_duration: Option<Duration>,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            src: String::new(),
            duration_in_vh: 2.0,
            media_duration: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevealPolicy {
    /// Opacity and lift follow the scroll position both ways.
    #[default]
    Continuous,
    /// Reveal once when the threshold is first crossed, then stay revealed.
    Once,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct RevealOptions {
    pub policy: RevealPolicy,
    /// 0..=1, scales the initial lift between 50px and 250px.
    pub intensity: f32,
    /// Entry line as a fraction of viewport height from the top.
    pub start_ratio: f32,
    /// Travel distance as a fraction of viewport height.
    pub distance_ratio: f32,
    /// Visible fraction needed to trigger a one-shot reveal.
    pub threshold: f32,
    #[serde(with = "humantime_serde")]
    pub transition: Duration,
}

impl Default for RevealOptions {
    fn default() -> Self {
        Self {
            policy: RevealPolicy::Continuous,
            intensity: 1.0,
            start_ratio: 1.0,
            distance_ratio: 0.6,
            threshold: 0.0,
            transition: Duration::from_millis(600),
        }
    }
}
