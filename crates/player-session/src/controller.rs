//! Per-session controller.
//!
//! A controller owns at most one live engine. While live, an event pump thread drains the
//! normalized event channel in order and folds every event into the projections, and a
//! seek ticker refreshes progress. Teardown stops both before the engine is released.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::Receiver;
use player_session_types::{
    EngineState, PlayerEvent, PlayerState, SeekData, TrackInfo, TrackSelectionAction, TracksState,
    UiState,
};
use tokio::sync::{broadcast, mpsc, watch};

use crate::config::SessionConfig;
use crate::engine::{EngineBackend, PlaybackEngine};
use crate::error::{Result, SessionError};
use crate::normalizer::EventSubscription;
use crate::projection::Projections;
use crate::reconcile::{self, drop_pending_for_renderers, merge_manual, renderers_of};
use crate::saved_state::SavedSessionState;
use crate::seek::SeekDataSource;
use crate::worker::Worker;

/// Opaque token for one live engine of one session.
///
/// A new token (with a higher generation) is issued every time the engine is recreated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EngineHandle {
    session_id: String,
    generation: u64,
}

impl EngineHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Lifecycle signals forwarded by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The view is visible again. Recreates an engine torn down by [`Background`](Self::Background).
    Foreground,
    /// The app left the foreground; the engine is torn down and its state saved.
    Background,
    /// Picture-in-picture was entered (`true`) or left (`false`).
    PictureInPicture(bool),
    /// The owning view is gone for good.
    Dispose,
}

struct LiveSession<E> {
    handle: EngineHandle,
    engine: Arc<Mutex<E>>,
    subscription: EventSubscription,
    seek: SeekDataSource<E>,
    pending: Arc<Mutex<Vec<TrackInfo>>>,
    pump: Worker,
    ticker: Worker,
}

struct Slot<E> {
    live: Option<LiveSession<E>>,
    closed: bool,
    backgrounded: bool,
}

pub struct SessionController<B: EngineBackend> {
    id: String,
    backend: Arc<B>,
    saved: SavedSessionState,
    config: SessionConfig,
    projections: Arc<Projections>,
    slot: Mutex<Slot<B::Engine>>,
    generation: AtomicU64,
}

impl<B: EngineBackend> SessionController<B> {
    pub fn new(
        id: impl Into<String>,
        backend: Arc<B>,
        saved: SavedSessionState,
        config: SessionConfig,
    ) -> Self {
        let projections = Arc::new(Projections::new(config.event_buffer));
        Self {
            id: id.into(),
            backend,
            saved,
            config,
            projections,
            slot: Mutex::new(Slot {
                live: None,
                closed: false,
                backgrounded: false,
            }),
            generation: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Return the live engine's handle, creating the engine on first use.
    ///
    /// Creation seeds the engine from saved state, attaches the event subscription and
    /// starts the seek ticker. Repeated calls while live have no side effects.
    pub fn get_player(&self) -> Result<EngineHandle> {
        let mut slot = self.lock_slot();
        if slot.closed {
            return Err(SessionError::Closed(self.id.clone()));
        }
        if let Some(live) = slot.live.as_ref() {
            return Ok(live.handle.clone());
        }

        let saved = self.saved.read();
        let initial = saved.player_state.unwrap_or(PlayerState::INITIAL);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = EngineHandle {
            session_id: self.id.clone(),
            generation,
        };

        let mut engine = self.backend.create(initial);
        self.projections.set_loading(true);
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let subscription = EventSubscription::attach(&mut engine, self.backend.normalizer(), events_tx);

        let engine = Arc::new(Mutex::new(engine));
        let pending = Arc::new(Mutex::new(saved.manual_tracks));
        let seek = SeekDataSource::new(engine.clone(), self.projections.clone());
        let pump = EventPump {
            session_id: self.id.clone(),
            engine: engine.clone(),
            projections: self.projections.clone(),
            saved: self.saved.clone(),
            pending: pending.clone(),
            seek: seek.clone(),
        }
        .spawn(events_rx);
        let ticker = seek.spawn_ticker(self.config.seek_tick_interval);

        tracing::info!(
            session_id = %self.id,
            generation,
            position_ms = initial.position_ms,
            is_playing = initial.is_playing,
            "engine created"
        );
        slot.backgrounded = false;
        slot.live = Some(LiveSession {
            handle: handle.clone(),
            engine,
            subscription,
            seek,
            pending,
            pump,
            ticker,
        });
        Ok(handle)
    }

    pub fn is_active(&self) -> bool {
        self.lock_slot().live.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.lock_slot().closed
    }

    pub fn is_picture_in_picture(&self) -> bool {
        self.projections.is_picture_in_picture()
    }

    pub fn play(&self) -> Result<()> {
        self.with_live(|engine, _| engine.play())
    }

    pub fn pause(&self) -> Result<()> {
        self.with_live(|engine, _| engine.pause())
    }

    pub fn seek_to(&self, position: Duration) -> Result<()> {
        self.with_live(|engine, live| {
            engine.seek_to(position);
            live.seek.publish_locked(engine);
        })
    }

    /// Seek by `delta_ms` from the current position, clamped to the media bounds.
    pub fn seek_relative(&self, delta_ms: i64) -> Result<()> {
        self.with_live(|engine, live| {
            let progress = engine.progress();
            let current = i128::try_from(progress.position.as_millis()).unwrap_or(i128::MAX);
            let mut target_ms = (current + i128::from(delta_ms)).max(0);
            if let Some(duration) = progress.duration {
                let duration_ms = i128::try_from(duration.as_millis()).unwrap_or(i128::MAX);
                target_ms = target_ms.min(duration_ms);
            }
            let target = Duration::from_millis(u64::try_from(target_ms).unwrap_or(u64::MAX));
            engine.seek_to(target);
            live.seek.publish_locked(engine);
        })
    }

    /// Override the selection for the renderers `tracks` belong to.
    ///
    /// Saved selections still waiting for those renderers are discarded.
    pub fn set_track_infos(&self, tracks: Vec<TrackInfo>) -> Result<()> {
        let renderers = renderers_of(&tracks);
        self.with_live(|engine, live| {
            self.discard_pending(live, &renderers);
            engine.handle_track_action(&TrackSelectionAction::Set { tracks });
        })
    }

    /// Revert one renderer to automatic selection.
    pub fn clear_track_infos(&self, renderer_index: u32) -> Result<()> {
        self.with_live(|engine, live| {
            self.discard_pending(live, &[renderer_index]);
            engine.handle_track_action(&TrackSelectionAction::Clear { renderer_index });
        })
    }

    /// Lend the live engine to `f`, e.g. to bind a render surface.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut B::Engine) -> R) -> Result<R> {
        self.with_live(|engine, _| f(engine))
    }

    /// Tear down because the app went to the background. Returns `false` with no live engine.
    pub fn on_app_backgrounded(&self) -> bool {
        let mut slot = self.lock_slot();
        let Some(live) = slot.live.take() else {
            return false;
        };
        self.shut_down(live, None);
        slot.backgrounded = true;
        true
    }

    /// Save state, stop listening and release the engine.
    ///
    /// `is_playing_override` replaces the engine's own play state in the saved snapshot.
    /// Returns `false` (and does nothing) with no live engine.
    pub fn tear_down(&self, is_playing_override: Option<bool>) -> bool {
        let mut slot = self.lock_slot();
        let Some(live) = slot.live.take() else {
            return false;
        };
        self.shut_down(live, is_playing_override);
        true
    }

    /// Tear down, forget saved state and refuse further use.
    pub fn close(&self) {
        let mut slot = self.lock_slot();
        if slot.closed {
            return;
        }
        if let Some(live) = slot.live.take() {
            self.shut_down(live, None);
        }
        self.saved.clear();
        slot.closed = true;
        slot.backgrounded = false;
        tracing::info!(session_id = %self.id, "session closed");
    }

    pub fn on_lifecycle(&self, event: LifecycleEvent) -> Result<()> {
        tracing::debug!(session_id = %self.id, ?event, "lifecycle event");
        match event {
            LifecycleEvent::Foreground => {
                let resume = {
                    let slot = self.lock_slot();
                    slot.backgrounded && !slot.closed
                };
                if resume {
                    self.get_player()?;
                }
            }
            LifecycleEvent::Background => {
                self.on_app_backgrounded();
            }
            LifecycleEvent::PictureInPicture(enabled) => {
                self.projections.set_picture_in_picture(enabled);
            }
            LifecycleEvent::Dispose => self.close(),
        }
        Ok(())
    }

    /// Raw normalized events in the order the engine raised them. Only events raised after
    /// subscribing are delivered; a slow subscriber buffers rather than losing events.
    pub fn player_events(&self) -> mpsc::UnboundedReceiver<PlayerEvent> {
        self.projections.subscribe_events()
    }

    pub fn ui_states(&self) -> watch::Receiver<UiState> {
        self.projections.subscribe_ui()
    }

    pub fn tracks_states(&self) -> watch::Receiver<TracksState> {
        self.projections.subscribe_tracks()
    }

    /// Engine error messages.
    pub fn errors(&self) -> broadcast::Receiver<String> {
        self.projections.subscribe_errors()
    }

    pub fn seek_data(&self) -> watch::Receiver<SeekData> {
        self.projections.subscribe_seek()
    }

    pub fn latest_seek_data(&self) -> SeekData {
        self.projections.latest_seek()
    }

    pub fn ui_state(&self) -> UiState {
        self.projections.ui_state()
    }

    pub fn tracks_state(&self) -> TracksState {
        self.projections.tracks_state()
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Slot<B::Engine>> {
        self.slot.lock().unwrap_or_else(|err| err.into_inner())
    }

    // Lock order is slot, then engine. The pump never takes the slot lock.
    fn with_live<R>(
        &self,
        f: impl FnOnce(&mut B::Engine, &LiveSession<B::Engine>) -> R,
    ) -> Result<R> {
        let slot = self.lock_slot();
        let Some(live) = slot.live.as_ref() else {
            return Err(SessionError::no_engine(&self.id));
        };
        let mut engine = live.engine.lock().unwrap_or_else(|err| err.into_inner());
        Ok(f(&mut *engine, live))
    }

    fn discard_pending(&self, live: &LiveSession<B::Engine>, renderers: &[u32]) {
        let mut pending = live.pending.lock().unwrap_or_else(|err| err.into_inner());
        let kept = drop_pending_for_renderers(&pending, renderers);
        if kept.len() != pending.len() {
            tracing::debug!(
                session_id = %self.id,
                dropped = pending.len() - kept.len(),
                "discarding pending track selections"
            );
            self.saved.save_manual_tracks(&kept);
            *pending = kept;
        }
    }

    fn shut_down(&self, live: LiveSession<B::Engine>, is_playing_override: Option<bool>) {
        let LiveSession {
            handle,
            engine,
            subscription,
            seek: _,
            pending,
            pump,
            ticker,
        } = live;

        {
            let mut engine = engine.lock().unwrap_or_else(|err| err.into_inner());
            subscription.detach(&mut *engine);
        }
        ticker.stop_and_join();
        pump.stop_and_join();

        let mut engine = engine.lock().unwrap_or_else(|err| err.into_inner());
        let mut state = engine.player_state();
        if let Some(is_playing) = is_playing_override {
            state.is_playing = is_playing;
        }
        let pending = pending.lock().unwrap_or_else(|err| err.into_inner()).clone();
        let manual = merge_manual(&engine.current_tracks(), &pending);
        self.saved.save(state, &manual);
        engine.release();
        drop(engine);

        self.projections.reset();
        tracing::info!(
            session_id = %self.id,
            generation = handle.generation,
            position_ms = state.position_ms,
            is_playing = state.is_playing,
            manual_tracks = manual.len(),
            "engine torn down"
        );
    }
}

impl<B: EngineBackend> Drop for SessionController<B> {
    fn drop(&mut self) {
        self.tear_down(None);
    }
}

/// Folds the normalized event stream of one live engine into the projections.
struct EventPump<E> {
    session_id: String,
    engine: Arc<Mutex<E>>,
    projections: Arc<Projections>,
    saved: SavedSessionState,
    pending: Arc<Mutex<Vec<TrackInfo>>>,
    seek: SeekDataSource<E>,
}

impl<E: PlaybackEngine> EventPump<E> {
    fn spawn(self, events_rx: Receiver<PlayerEvent>) -> Worker {
        Worker::spawn("player-session-events", move |stop_rx| {
            loop {
                crossbeam_channel::select! {
                    recv(stop_rx) -> _ => break,
                    recv(events_rx) -> msg => match msg {
                        Ok(event) => self.fold(event),
                        Err(_) => break,
                    },
                }
            }
            tracing::trace!(session_id = %self.session_id, "event pump stopped");
        })
    }

    fn fold(&self, event: PlayerEvent) {
        self.projections.publish_event(&event);
        let refresh = event.affects_progress();
        match event {
            PlayerEvent::Initial => {}
            PlayerEvent::PlayerPrepared { .. } => {
                self.projections.set_ready(true);
                self.projections.set_loading(false);
            }
            PlayerEvent::IsLoadingChanged { is_loading } => {
                self.projections.set_loading(is_loading);
            }
            PlayerEvent::PlaybackStateChanged { state } => match state {
                EngineState::Ready => {
                    self.projections.set_ready(true);
                    self.projections.set_loading(false);
                }
                EngineState::Buffering => self.projections.set_loading(true),
                EngineState::Idle | EngineState::Ended => self.projections.set_loading(false),
            },
            PlayerEvent::TracksChanged { tracks } => self.tracks_changed(&tracks),
            PlayerEvent::PlayerError { error } => {
                tracing::warn!(session_id = %self.session_id, "playback error: {error}");
                self.projections.set_loading(false);
                self.projections.publish_error(error.to_string());
            }
            PlayerEvent::PlayWhenReadyChanged { .. }
            | PlayerEvent::VideoSizeChanged { .. }
            | PlayerEvent::IsPlayingChanged { .. } => {}
        }
        if refresh {
            self.seek.refresh();
        }
    }

    fn tracks_changed(&self, tracks: &[TrackInfo]) {
        let settable = {
            let mut pending = self.pending.lock().unwrap_or_else(|err| err.into_inner());
            let Some(result) = reconcile::reconcile(&pending, tracks) else {
                return;
            };
            if result.changes_pending(&pending) {
                self.saved.save_manual_tracks(&result.unsettable);
                *pending = result.unsettable;
            }
            result.settable
        };

        if !settable.is_empty() {
            tracing::debug!(
                session_id = %self.session_id,
                restored = settable.len(),
                "restoring saved track selections"
            );
            let mut engine = self.engine.lock().unwrap_or_else(|err| err.into_inner());
            engine.handle_track_action(&TrackSelectionAction::Set { tracks: settable });
        }
        self.projections.publish_tracks(TracksState::from_tracks(tracks));
    }
}
