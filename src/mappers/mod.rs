//! Pure mappings from progress values to per-item visual parameters.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

pub mod defocus;
pub mod guillotine;
pub mod scrub;
pub mod slide;
pub mod zoom;

/// Translation axis for sliding galleries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Axis {
    #[default]
    Horizontal,
    Vertical,
}

/// Style parameters for one item, recomputed on every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ItemVisualState {
    Offset {
        axis: Axis,
        px: f32,
    },
    Focus {
        opacity: f32,
        blur_px: f32,
        visible: bool,
    },
    Clip {
        clip: ClipPath,
        separator: Option<guillotine::Separator>,
    },
    Scale {
        factor: f32,
    },
    Frame {
        index: usize,
    },
    MediaTime {
        seconds: f32,
    },
    Reveal {
        opacity: f32,
        translate_y_px: f32,
        transition_ms: Option<u64>,
    },
}

/// A point of a clip polygon, in percent of the element box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPoint {
    pub x_pct: f32,
    pub y_pct: f32,
}

impl ClipPoint {
    pub const fn new(x_pct: f32, y_pct: f32) -> Self {
        Self { x_pct, y_pct }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClipPath {
    Unclipped,
    Polygon([ClipPoint; 4]),
}

impl fmt::Display for ClipPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclipped => f.write_str("none"),
            Self::Polygon(points) => {
                f.write_str("polygon(")?;
                for (i, point) in points.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}% {}%", point.x_pct, point.y_pct)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl Serialize for ClipPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
