use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::stage::StageStats;

/// Handle of a mounted section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SectionId(pub u64);

/// Input to the stage driver.
#[derive(Debug)]
pub enum StageEvent {
    /// The scroll position changed.
    Scrolled,
    /// The host's visibility observer reported a change.
    Visibility { section: SectionId, visible: bool },
    /// An asset finished loading, successfully or not.
    AssetSettled(AssetSettled),
    /// Continuous media reported its duration.
    MediaReady {
        section: SectionId,
        duration: Duration,
    },
    /// Jump a reveal section to its final state (anchor navigation).
    ForceReveal(SectionId),
    Unmount(SectionId),
    /// Run any pending frame now and report the stage counters.
    Flush(oneshot::Sender<StageStats>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetSettled {
    pub section: SectionId,
    pub index: usize,
    pub ready: bool,
}

/// Frames the loader should decode for one section, in playback order.
#[derive(Debug, Clone)]
pub struct LoadFrames {
    pub section: SectionId,
    pub paths: Vec<PathBuf>,
}
