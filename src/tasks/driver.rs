use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::StageEvent;
use crate::geometry::ViewportProvider;
use crate::stage::Stage;

/// Own `stage` and feed it host events until cancelled.
///
/// Scroll and visibility events only schedule work; the pending frame runs on
/// the next tick of `frame_interval`, so any number of scroll events between
/// two ticks costs a single pass. Viewport changes arm the resize debouncer.
/// On cancellation every section is unmounted before returning.
pub async fn run<V: ViewportProvider>(
    mut stage: Stage<V>,
    mut events: Receiver<StageEvent>,
    cancel: CancellationToken,
    frame_interval: Duration,
) -> Result<()> {
    let mut viewport_rx = stage.subscribe_viewport();
    let mut viewport_open = true;
    let mut events_open = true;
    let mut ticker = time::interval(frame_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        select! {
            _ = cancel.cancelled() => break,

            maybe = events.recv(), if events_open => match maybe {
                Some(event) => stage.handle(event, Instant::now()),
                None => {
                    debug!("stage event channel closed");
                    events_open = false;
                }
            },

            changed = viewport_rx.changed(), if viewport_open => match changed {
                Ok(()) => {
                    let viewport = *viewport_rx.borrow_and_update();
                    debug!(width = viewport.width, height = viewport.height, "viewport changed");
                    stage.on_resize(Instant::now());
                }
                Err(_) => viewport_open = false,
            },

            _ = ticker.tick() => {
                stage.poll_resize(Instant::now());
                stage.run_pending();
            }
        }
    }

    let stats = stage.stats();
    stage.unmount_all();
    info!(
        frames = stats.frames,
        geometry_reads = stats.geometry_reads,
        style_writes = stats.style_writes,
        "stage driver stopped"
    );
    Ok(())
}
