//! Chapter segmentation for galleries of N items.
//!
//! N items produce N-1 chapters. Each chapter starts with a hold phase (the
//! current item is fully settled) followed by a transition phase towards the
//! next item. After the last chapter one more hold share is reserved so the
//! final item rests before the section scrolls away.

/// Static chapter layout derived from the gallery configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChapterSegmenter {
    animation_count: usize,
    transition_share: f32,
    hold_share: f32,
    chapter_share: f32,
}

/// Where a given scroll progress falls inside the chapter layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChapterPosition {
    /// Active chapter, `None` when there is nothing to animate.
    pub chapter: Option<usize>,
    /// Fraction of the active chapter consumed, hold phase included.
    pub within: f32,
    /// Progress of the active chapter's transition phase, in [0, 1].
    pub transition_progress: f32,
    /// `chapter + transition_progress`, spanning [0, animation_count].
    pub visual_progress: f32,
}

impl ChapterPosition {
    const STATIC: Self = Self {
        chapter: None,
        within: 0.0,
        transition_progress: 0.0,
        visual_progress: 0.0,
    };

    /// Signed distance of item `idx` from the visual position.
    ///
    /// Zero exactly when the item is the settled one; used by mappers that fade
    /// symmetrically through neighbours.
    pub fn relative(&self, idx: usize) -> f32 {
        self.visual_progress - idx as f32
    }

    /// How far item `idx` has moved in, in [0, 1].
    ///
    /// Item `idx` enters during chapter `idx - 1`; the first item is the static
    /// backdrop and always reports 1.
    pub fn incoming(&self, idx: usize) -> f32 {
        if idx == 0 {
            return 1.0;
        }
        (self.visual_progress - (idx - 1) as f32).clamp(0.0, 1.0)
    }

    pub fn is_holding(&self) -> bool {
        self.chapter.is_some() && self.transition_progress == 0.0
    }
}

impl ChapterSegmenter {
    pub fn new(item_count: usize, scroll_velocity: f32, hold_ratio: f32) -> Self {
        let velocity = if scroll_velocity.is_finite() && scroll_velocity > 0.0 {
            scroll_velocity
        } else {
            1.0
        };
        let hold_ratio = if hold_ratio.is_finite() {
            hold_ratio.max(0.0)
        } else {
            0.0
        };
        let transition_share = 1.0 / velocity;
        let hold_share = transition_share * hold_ratio;
        Self {
            animation_count: item_count.saturating_sub(1),
            transition_share,
            hold_share,
            chapter_share: transition_share + hold_share,
        }
    }

    pub fn animation_count(&self) -> usize {
        self.animation_count
    }

    pub fn transition_share(&self) -> f32 {
        self.transition_share
    }

    pub fn hold_share(&self) -> f32 {
        self.hold_share
    }

    pub fn chapter_share(&self) -> f32 {
        self.chapter_share
    }

    pub fn hold_ratio_in_chapter(&self) -> f32 {
        if self.chapter_share > 0.0 {
            self.hold_share / self.chapter_share
        } else {
            0.0
        }
    }

    pub fn transition_ratio_in_chapter(&self) -> f32 {
        if self.chapter_share > 0.0 {
            self.transition_share / self.chapter_share
        } else {
            0.0
        }
    }

    /// Virtual scroll length (in viewport heights) consumed by the transitions.
    pub fn animation_duration_vh(&self) -> f32 {
        self.animation_count as f32 * self.chapter_share
    }

    /// Virtual scroll length to reserve, trailing hold included.
    pub fn total_duration_vh(&self) -> f32 {
        if self.animation_count == 0 {
            0.0
        } else {
            self.animation_duration_vh() + self.hold_share
        }
    }

    /// Locate `scroll_progress` (the tracker output) inside the chapters.
    pub fn locate(&self, scroll_progress: f32) -> ChapterPosition {
        let animation_vh = self.animation_duration_vh();
        if self.animation_count == 0 || animation_vh <= 0.0 {
            return ChapterPosition::STATIC;
        }

        let scroll_progress = if scroll_progress.is_nan() {
            0.0
        } else {
            scroll_progress.clamp(0.0, 1.0)
        };
        let animation_progress =
            (scroll_progress * self.total_duration_vh() / animation_vh).min(1.0);

        let count = self.animation_count;
        let overall = animation_progress * count as f32;
        let chapter = (overall.floor() as usize).min(count - 1);
        let within = overall - chapter as f32;

        let hold_ratio = self.hold_ratio_in_chapter();
        let transition_ratio = self.transition_ratio_in_chapter();
        let transition_progress = if within <= hold_ratio || transition_ratio <= 0.0 {
            0.0
        } else {
            ((within - hold_ratio) / transition_ratio).clamp(0.0, 1.0)
        };

        ChapterPosition {
            chapter: Some(chapter),
            within,
            transition_progress,
            visual_progress: chapter as f32 + transition_progress,
        }
    }
}
