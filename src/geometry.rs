use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Visible area of the scrolling surface, in CSS-like pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Vertical centre line, measured from the top edge.
    pub fn center_y(&self) -> f32 {
        self.height / 2.0
    }

    /// True when either dimension is unusable for normalisation.
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite()) || self.width <= 0.0 || self.height <= 0.0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 800.0)
    }
}

/// Element bounds relative to the viewport's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(top: f32, left: f32, width: f32, height: f32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    /// Full-width band starting at `top`.
    pub fn band(top: f32, height: f32, viewport: &Viewport) -> Self {
        Self::new(top, 0.0, viewport.width, height)
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn center_y(&self) -> f32 {
        self.top + self.height / 2.0
    }
}

/// Intersection test used by hosts without a native visibility observer.
///
/// The margin grows the viewport on both vertical edges so sections become
/// active slightly before they scroll into view.
pub fn intersects(rect: &Rect, viewport: &Viewport, margin_px: f32) -> bool {
    let margin = margin_px.max(0.0);
    rect.bottom() >= -margin && rect.top <= viewport.height + margin
}

/// Fraction of the element's height currently inside the viewport.
pub fn visible_fraction(rect: &Rect, viewport: &Viewport) -> f32 {
    if rect.height <= 0.0 {
        return if intersects(rect, viewport, 0.0) { 1.0 } else { 0.0 };
    }
    let overlap = rect.bottom().min(viewport.height) - rect.top.max(0.0);
    (overlap / rect.height).clamp(0.0, 1.0)
}

/// Source of truth for viewport dimensions.
///
/// Queried on demand; hosts push changes through the subscription so
/// interested parties never have to poll a global.
pub trait ViewportProvider: Send + Sync {
    fn current(&self) -> Viewport;
    fn subscribe(&self) -> watch::Receiver<Viewport>;
}

/// `ViewportProvider` backed by a watch channel.
#[derive(Debug, Clone)]
pub struct SharedViewport {
    tx: watch::Sender<Viewport>,
}

impl SharedViewport {
    pub fn new(initial: Viewport) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publish new dimensions. Returns `true` if subscribers were notified.
    pub fn set(&self, viewport: Viewport) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == viewport {
                false
            } else {
                *current = viewport;
                true
            }
        })
    }
}

impl ViewportProvider for SharedViewport {
    fn current(&self) -> Viewport {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<Viewport> {
        self.tx.subscribe()
    }
}
