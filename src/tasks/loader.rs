use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AssetError;
use crate::events::{AssetSettled, LoadFrames, StageEvent};

/// Decode one frame fully so a later draw never blocks on it.
fn decode_frame(path: &Path) -> Result<(u32, u32), AssetError> {
    let io = |source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    };
    let img = image::ImageReader::open(path)
        .map_err(io)?
        .with_guessed_format()
        .map_err(io)?
        .decode()
        .map_err(|source| AssetError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    Ok((img.width(), img.height()))
}

type Outcome = Result<(u32, u32), AssetError>;

async fn decode_task(path: PathBuf) -> Outcome {
    let p = path.clone();
    match tokio::task::spawn_blocking(move || decode_frame(&p)).await {
        Ok(outcome) => outcome,
        Err(source) => Err(AssetError::Join { path, source }),
    }
}

type Pending = std::iter::Enumerate<std::vec::IntoIter<PathBuf>>;

/// Frames currently decoding, keyed by task so a task that panicked or was
/// aborted can still be traced back to its frame.
type InFlight = HashMap<Id, (usize, PathBuf)>;

fn fill(
    tasks: &mut JoinSet<Outcome>,
    in_flight: &mut InFlight,
    queue: &mut Pending,
    max_in_flight: usize,
) {
    while tasks.len() < max_in_flight {
        match queue.next() {
            Some((index, path)) => {
                let handle = tasks.spawn(decode_task(path.clone()));
                in_flight.insert(handle.id(), (index, path));
            }
            None => break,
        }
    }
}

/// Map a joined task back to its frame index.
fn settle(
    in_flight: &mut InFlight,
    joined: Result<(Id, Outcome), JoinError>,
) -> Option<(usize, Outcome)> {
    match joined {
        Ok((id, outcome)) => {
            let (index, _) = in_flight.remove(&id)?;
            Some((index, outcome))
        }
        Err(source) => {
            let (index, path) = in_flight.remove(&source.id())?;
            Some((index, Err(AssetError::Join { path, source })))
        }
    }
}

/// Preload a section's frames with at most `max_in_flight` decodes running.
///
/// Every frame produces exactly one `AssetSettled` event; frames that fail to
/// read or decode are reported as settled but not ready.
pub async fn run(
    request: LoadFrames,
    events: Sender<StageEvent>,
    cancel: CancellationToken,
    max_in_flight: usize,
) -> Result<()> {
    let LoadFrames { section, paths } = request;
    let total = paths.len();
    let max_in_flight = max_in_flight.max(1);
    let mut queue = paths.into_iter().enumerate();
    let mut tasks = JoinSet::new();
    let mut in_flight = InFlight::new();
    let mut settled = 0usize;
    let mut failed = 0usize;

    fill(&mut tasks, &mut in_flight, &mut queue, max_in_flight);
    loop {
        select! {
            biased;

            _ = cancel.cancelled() => {
                tasks.abort_all();
                debug!(section = section.0, settled, total, "frame loading cancelled");
                return Ok(());
            }

            joined = tasks.join_next_with_id() => {
                let Some(joined) = joined else {
                    break;
                };
                let Some((index, outcome)) = settle(&mut in_flight, joined) else {
                    warn!(section = section.0, "finished decode task was not tracked");
                    continue;
                };
                settled += 1;
                let ready = match outcome {
                    Ok((width, height)) => {
                        debug!(section = section.0, index, width, height, "frame decoded");
                        true
                    }
                    Err(err) => {
                        warn!(section = section.0, index, "{err}");
                        failed += 1;
                        false
                    }
                };
                let percent = settled as f32 / total as f32 * 100.0;
                debug!(section = section.0, percent, "frame loading progress");
                let event = StageEvent::AssetSettled(AssetSettled { section, index, ready });
                select! {
                    _ = cancel.cancelled() => {
                        tasks.abort_all();
                        return Ok(());
                    }
                    sent = events.send(event) => if sent.is_err() {
                        debug!(section = section.0, "stage closed; stopping frame loader");
                        return Ok(());
                    }
                }
                fill(&mut tasks, &mut in_flight, &mut queue, max_in_flight);
            }
        }
    }
    info!(section = section.0, total, failed, "frames loaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = decode_frame(&dir.path().join("absent.png")).unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_0001.png");
        std::fs::write(&path, b"not an image").unwrap();
        let err = decode_frame(&path).unwrap_err();
        assert!(matches!(err, AssetError::Decode { .. }));
        assert_eq!(err.path(), &path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn panicked_decode_still_settles_its_frame() {
        let mut tasks: JoinSet<Outcome> = JoinSet::new();
        let mut in_flight = InFlight::new();
        let path = PathBuf::from("frames/frame_0003.png");
        let handle = tasks.spawn(async { panic!("decoder crashed") });
        in_flight.insert(handle.id(), (2, path.clone()));

        let joined = tasks.join_next_with_id().await.unwrap();
        let (index, outcome) = settle(&mut in_flight, joined).unwrap();
        assert_eq!(index, 2);
        let err = outcome.unwrap_err();
        assert!(matches!(err, AssetError::Join { .. }));
        assert_eq!(err.path(), &path);
        assert!(in_flight.is_empty());
    }

    #[test]
    fn decodes_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_0001.png");
        image::RgbaImage::new(3, 2).save(&path).unwrap();
        assert_eq!(decode_frame(&path).unwrap(), (3, 2));
    }
}
