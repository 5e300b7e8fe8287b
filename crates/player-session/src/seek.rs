//! Seek data source.
//!
//! Progress is recomputed on progress-affecting events and on a fixed tick. Nothing is
//! published while the engine's duration is still unknown.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use player_session_types::SeekData;

use crate::engine::{EngineProgress, PlaybackEngine};
use crate::projection::Projections;
use crate::worker::Worker;

/// Convert raw engine progress into a publishable triple.
///
/// Returns `None` while the duration is undetermined.
pub fn seek_data_from(progress: &EngineProgress) -> Option<SeekData> {
    let duration = progress.duration?;
    Some(SeekData {
        position: progress.position.min(duration),
        buffered: progress.buffered.min(duration),
        duration,
    })
}

pub(crate) struct SeekDataSource<E> {
    engine: Arc<Mutex<E>>,
    projections: Arc<Projections>,
}

impl<E> Clone for SeekDataSource<E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            projections: self.projections.clone(),
        }
    }
}

impl<E: PlaybackEngine> SeekDataSource<E> {
    pub(crate) fn new(engine: Arc<Mutex<E>>, projections: Arc<Projections>) -> Self {
        Self {
            engine,
            projections,
        }
    }

    /// Read the engine and publish. Publishing happens under the engine lock so that a
    /// tick and an event-driven refresh cannot publish out of order.
    pub(crate) fn refresh(&self) -> Option<SeekData> {
        let engine = self.engine.lock().unwrap_or_else(|err| err.into_inner());
        self.publish_locked(&engine)
    }

    /// Publish from an engine the caller already holds locked.
    pub(crate) fn publish_locked(&self, engine: &E) -> Option<SeekData> {
        let data = seek_data_from(&engine.progress())?;
        self.projections.publish_seek(data);
        Some(data)
    }

    /// Start the periodic refresh. The returned worker is joined at teardown.
    pub(crate) fn spawn_ticker(&self, interval: Duration) -> Worker {
        let source = self.clone();
        Worker::spawn("seek-ticker", move |stop_rx| {
            let ticker = crossbeam_channel::tick(interval);
            loop {
                crossbeam_channel::select! {
                    recv(stop_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        source.refresh();
                    }
                }
            }
            tracing::trace!("seek ticker stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undetermined_duration_is_skipped() {
        let progress = EngineProgress {
            position: Duration::from_secs(1),
            buffered: Duration::from_secs(2),
            duration: None,
        };
        assert_eq!(seek_data_from(&progress), None);
    }

    #[test]
    fn values_are_clamped_to_duration() {
        let progress = EngineProgress {
            position: Duration::from_secs(12),
            buffered: Duration::from_secs(15),
            duration: Some(Duration::from_secs(10)),
        };
        let data = seek_data_from(&progress).expect("determinate duration");
        assert_eq!(data.position, Duration::from_secs(10));
        assert_eq!(data.buffered, Duration::from_secs(10));
        assert_eq!(data.duration, Duration::from_secs(10));
    }

    #[test]
    fn determinate_progress_passes_through() {
        let progress = EngineProgress {
            position: Duration::from_millis(1200),
            buffered: Duration::from_millis(5000),
            duration: Some(Duration::from_secs(90)),
        };
        let data = seek_data_from(&progress).expect("determinate duration");
        assert_eq!(data.position, Duration::from_millis(1200));
        assert_eq!(data.buffered, Duration::from_millis(5000));
    }
}
