//! Simulated playback backend.
//!
//! [`SimEngine`] walks through buffering, first frame, track discovery and playback on a
//! worker thread, raising listener-style callbacks like a real engine. With no tick
//! interval it runs in scripted mode: nothing happens until the caller steps it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use player_session_types::{
    EngineState, PlaybackException, PlayerState, TrackIndices, TrackInfo, TrackSelectionAction,
    TrackType, VideoSize,
};

use crate::engine::{EngineBackend, EngineProgress, ListenerId, ListenerSet, NativeListener, PlaybackEngine};
use crate::normalizer::{ExoCallback, ExoNormalizer};
use crate::worker::Worker;

const BUFFER_AHEAD: Duration = Duration::from_secs(5);

/// Description of the media a simulated engine plays.
#[derive(Clone, Debug)]
pub struct SimMedia {
    pub duration: Duration,
    /// Tracks reported once the media is ready.
    pub tracks: Vec<TrackInfo>,
    /// Tracks discovered later (e.g. side-loaded subtitles).
    pub late_tracks: Vec<TrackInfo>,
    /// Steps after readiness before `late_tracks` are reported.
    pub late_after_steps: u32,
    /// Step interval. `None` selects scripted mode.
    pub tick: Option<Duration>,
    pub video_size: VideoSize,
}

impl Default for SimMedia {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30),
            tracks: vec![
                TrackInfo::new(TrackType::Video, TrackIndices::new(0, 0, 0)).with_size(1280, 720),
                TrackInfo::new(TrackType::Audio, TrackIndices::new(0, 0, 1)).with_name("English"),
                TrackInfo::new(TrackType::Audio, TrackIndices::new(0, 1, 1)).with_name("Deutsch"),
            ],
            late_tracks: vec![
                TrackInfo::new(TrackType::Text, TrackIndices::new(0, 0, 2)).with_name("English CC"),
            ],
            late_after_steps: 4,
            tick: Some(Duration::from_millis(250)),
            video_size: VideoSize {
                width: 1280,
                height: 720,
            },
        }
    }
}

impl SimMedia {
    /// Same media, stepped only by the caller.
    pub fn scripted(mut self) -> Self {
        self.tick = None;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct SimBackend {
    media: SimMedia,
}

impl SimBackend {
    pub fn new(media: SimMedia) -> Self {
        Self { media }
    }

    pub fn media(&self) -> &SimMedia {
        &self.media
    }
}

impl EngineBackend for SimBackend {
    type Engine = SimEngine;
    type Normalizer = ExoNormalizer;

    fn create(&self, initial: PlayerState) -> SimEngine {
        SimEngine::new(self.media.clone(), initial)
    }

    fn normalizer(&self) -> ExoNormalizer {
        ExoNormalizer::new()
    }
}

#[derive(Debug)]
struct SimState {
    media: SimMedia,
    state: EngineState,
    position: Duration,
    play_when_ready: bool,
    steps_since_ready: Option<u32>,
    tracks: Vec<TrackInfo>,
    track_actions: Vec<TrackSelectionAction>,
    released: bool,
}

impl SimState {
    fn is_playing(&self) -> bool {
        self.play_when_ready && self.state == EngineState::Ready
    }

    fn step(&mut self, elapsed: Duration, out: &mut Vec<ExoCallback>) {
        if self.released {
            return;
        }
        match self.state {
            EngineState::Idle => {
                self.state = EngineState::Buffering;
                out.push(ExoCallback::IsLoadingChanged(true));
                out.push(ExoCallback::PlaybackStateChanged(EngineState::Buffering));
            }
            EngineState::Buffering => {
                self.state = EngineState::Ready;
                self.steps_since_ready = Some(0);
                self.tracks = auto_select(self.media.tracks.clone());
                out.push(ExoCallback::IsLoadingChanged(false));
                out.push(ExoCallback::PlaybackStateChanged(EngineState::Ready));
                out.push(ExoCallback::PlayWhenReadyChanged(self.play_when_ready));
                out.push(ExoCallback::VideoSizeChanged(self.media.video_size));
                out.push(ExoCallback::RenderedFirstFrame);
                out.push(ExoCallback::TracksChanged(self.tracks.clone()));
                out.push(ExoCallback::IsPlayingChanged(self.is_playing()));
            }
            EngineState::Ready => {
                if self.play_when_ready {
                    self.position = (self.position + elapsed).min(self.media.duration);
                    if self.position >= self.media.duration {
                        self.state = EngineState::Ended;
                        out.push(ExoCallback::PlaybackStateChanged(EngineState::Ended));
                        out.push(ExoCallback::IsPlayingChanged(false));
                    }
                }
                if let Some(steps) = self.steps_since_ready.as_mut() {
                    *steps += 1;
                    if *steps == self.media.late_after_steps && !self.media.late_tracks.is_empty() {
                        let late = self.media.late_tracks.clone();
                        self.tracks.extend(auto_select(late));
                        out.push(ExoCallback::TracksChanged(self.tracks.clone()));
                    }
                }
            }
            EngineState::Ended => {}
        }
    }

    fn apply_track_action(&mut self, action: &TrackSelectionAction) {
        match action {
            TrackSelectionAction::Set { tracks } => {
                for requested in tracks {
                    let renderer = requested.indices.renderer_index;
                    for track in self
                        .tracks
                        .iter_mut()
                        .filter(|track| track.indices.renderer_index == renderer)
                    {
                        let chosen = track.same_slot(requested);
                        track.is_selected = chosen;
                        track.is_manually_set = chosen;
                        track.is_auto_selected = false;
                    }
                }
            }
            TrackSelectionAction::Clear { renderer_index } => {
                let mut first = true;
                for track in self
                    .tracks
                    .iter_mut()
                    .filter(|track| track.indices.renderer_index == *renderer_index)
                {
                    track.is_selected = first;
                    track.is_auto_selected = first;
                    track.is_manually_set = false;
                    first = false;
                }
            }
        }
        self.track_actions.push(action.clone());
    }
}

/// Select the first track of every renderer, as an automatic choice.
fn auto_select(mut tracks: Vec<TrackInfo>) -> Vec<TrackInfo> {
    let mut seen: Vec<u32> = Vec::new();
    for track in tracks.iter_mut() {
        let renderer = track.indices.renderer_index;
        let first = !seen.contains(&renderer);
        if first {
            seen.push(renderer);
        }
        track.is_selected = first;
        track.is_auto_selected = first;
        track.is_manually_set = false;
    }
    tracks
}

struct SimShared {
    state: Mutex<SimState>,
    listeners: ListenerSet<ExoCallback>,
}

impl SimShared {
    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Run `f` under the state lock and raise whatever it produced after releasing it.
    fn update(&self, f: impl FnOnce(&mut SimState, &mut Vec<ExoCallback>)) {
        let mut out = Vec::new();
        {
            let mut state = self.lock();
            f(&mut state, &mut out);
        }
        for callback in out {
            self.listeners.emit(callback);
        }
    }
}

pub struct SimEngine {
    shared: Arc<SimShared>,
    worker: Option<Worker>,
}

impl SimEngine {
    pub fn new(media: SimMedia, initial: PlayerState) -> Self {
        let position = Duration::from_millis(initial.position_ms).min(media.duration);
        let tick = media.tick;
        let shared = Arc::new(SimShared {
            state: Mutex::new(SimState {
                media,
                state: EngineState::Idle,
                position,
                play_when_ready: initial.is_playing,
                steps_since_ready: None,
                tracks: Vec::new(),
                track_actions: Vec::new(),
                released: false,
            }),
            listeners: ListenerSet::new(),
        });

        let worker = tick.map(|interval| {
            let shared = shared.clone();
            Worker::spawn("sim-engine", move |stop_rx| {
                let ticker = crossbeam_channel::tick(interval);
                loop {
                    crossbeam_channel::select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => shared.update(|state, out| state.step(interval, out)),
                    }
                }
            })
        });

        Self { shared, worker }
    }

    /// Advance one step of `elapsed` media time. Meant for scripted mode.
    pub fn advance(&self, elapsed: Duration) {
        self.shared.update(|state, out| state.step(elapsed, out));
    }

    /// Step until the engine is ready (first frame and tracks reported).
    pub fn advance_to_ready(&self) {
        for _ in 0..2 {
            if self.shared.lock().state == EngineState::Ready {
                return;
            }
            self.advance(Duration::ZERO);
        }
    }

    /// Report `tracks` as the engine's complete track list.
    pub fn report_tracks(&self, tracks: Vec<TrackInfo>) {
        self.shared.update(|state, out| {
            state.tracks = tracks;
            out.push(ExoCallback::TracksChanged(state.tracks.clone()));
        });
    }

    /// Raise a playback failure.
    pub fn fail(&self, error: PlaybackException) {
        self.shared.update(|state, out| {
            state.state = EngineState::Idle;
            state.steps_since_ready = None;
            out.push(ExoCallback::PlayerError(error));
            out.push(ExoCallback::IsPlayingChanged(false));
            out.push(ExoCallback::PlaybackStateChanged(EngineState::Idle));
        });
    }

    /// Track actions received so far, oldest first.
    pub fn track_actions(&self) -> Vec<TrackSelectionAction> {
        self.shared.lock().track_actions.clone()
    }

    pub fn engine_state(&self) -> EngineState {
        self.shared.lock().state
    }

    pub fn is_released(&self) -> bool {
        self.shared.lock().released
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.len()
    }

    fn set_play_when_ready(&self, play_when_ready: bool) {
        self.shared.update(|state, out| {
            if state.state == EngineState::Ended && play_when_ready {
                state.position = Duration::ZERO;
                state.state = EngineState::Ready;
                out.push(ExoCallback::PlaybackStateChanged(EngineState::Ready));
            }
            if state.play_when_ready != play_when_ready {
                state.play_when_ready = play_when_ready;
                out.push(ExoCallback::PlayWhenReadyChanged(play_when_ready));
            }
            out.push(ExoCallback::IsPlayingChanged(state.is_playing()));
        });
    }
}

impl PlaybackEngine for SimEngine {
    type Native = ExoCallback;

    fn player_state(&self) -> PlayerState {
        let state = self.shared.lock();
        PlayerState {
            position_ms: u64::try_from(state.position.as_millis()).unwrap_or(u64::MAX),
            is_playing: state.play_when_ready,
        }
    }

    fn progress(&self) -> EngineProgress {
        let state = self.shared.lock();
        let known = matches!(state.state, EngineState::Ready | EngineState::Ended);
        EngineProgress {
            position: state.position,
            buffered: if known {
                (state.position + BUFFER_AHEAD).min(state.media.duration)
            } else {
                state.position
            },
            duration: known.then_some(state.media.duration),
        }
    }

    fn current_tracks(&self) -> Vec<TrackInfo> {
        self.shared.lock().tracks.clone()
    }

    fn play(&mut self) {
        self.set_play_when_ready(true);
    }

    fn pause(&mut self) {
        self.set_play_when_ready(false);
    }

    fn seek_to(&mut self, position: Duration) {
        self.shared.update(|state, out| {
            state.position = position.min(state.media.duration);
            if state.state == EngineState::Ended && state.position < state.media.duration {
                state.state = EngineState::Ready;
                out.push(ExoCallback::PlaybackStateChanged(EngineState::Ready));
            }
        });
    }

    fn handle_track_action(&mut self, action: &TrackSelectionAction) {
        self.shared.update(|state, out| {
            state.apply_track_action(action);
            if !state.tracks.is_empty() {
                out.push(ExoCallback::TracksChanged(state.tracks.clone()));
            }
        });
    }

    fn add_listener(&mut self, listener: NativeListener<ExoCallback>) -> ListenerId {
        self.shared.listeners.add(listener)
    }

    fn remove_listener(&mut self, id: ListenerId) {
        if !self.shared.listeners.remove(id) {
            tracing::debug!(listener = id.0, "listener already removed");
        }
    }

    fn release(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop_and_join();
        }
        self.shared.listeners.clear();
        self.shared.lock().released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(engine: &mut SimEngine) -> Arc<Mutex<Vec<ExoCallback>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.add_listener(Arc::new(move |callback: ExoCallback| sink.lock().unwrap().push(callback)));
        seen
    }

    #[test]
    fn scripted_engine_reaches_ready_with_tracks() {
        let mut engine = SimEngine::new(SimMedia::default().scripted(), PlayerState::INITIAL);
        let seen = collect(&mut engine);
        assert_eq!(engine.progress().duration, None);

        engine.advance_to_ready();

        assert_eq!(engine.engine_state(), EngineState::Ready);
        assert_eq!(engine.progress().duration, Some(Duration::from_secs(30)));
        let seen = seen.lock().unwrap();
        assert!(seen.contains(&ExoCallback::RenderedFirstFrame));
        assert!(seen.iter().any(|cb| matches!(cb, ExoCallback::TracksChanged(t) if t.len() == 3)));
    }

    #[test]
    fn playing_advances_until_ended() {
        let media = SimMedia {
            duration: Duration::from_secs(1),
            ..SimMedia::default().scripted()
        };
        let mut engine = SimEngine::new(media, PlayerState::new(0, true));
        engine.advance_to_ready();
        engine.advance(Duration::from_millis(600));
        assert_eq!(engine.player_state().position_ms, 600);
        engine.advance(Duration::from_millis(600));
        assert_eq!(engine.engine_state(), EngineState::Ended);
        assert_eq!(engine.progress().position, Duration::from_secs(1));

        engine.play();
        assert_eq!(engine.engine_state(), EngineState::Ready);
        assert_eq!(engine.player_state().position_ms, 0);
    }

    #[test]
    fn late_tracks_are_appended() {
        let media = SimMedia {
            late_after_steps: 1,
            ..SimMedia::default().scripted()
        };
        let engine = SimEngine::new(media, PlayerState::INITIAL);
        engine.advance_to_ready();
        assert_eq!(engine.current_tracks().len(), 3);
        engine.advance(Duration::ZERO);
        let tracks = engine.current_tracks();
        assert_eq!(tracks.len(), 4);
        assert_eq!(tracks[3].track_type, TrackType::Text);
        assert!(tracks[3].is_selected);
    }

    #[test]
    fn set_and_clear_update_selection_flags() {
        let mut engine = SimEngine::new(SimMedia::default().scripted(), PlayerState::INITIAL);
        engine.advance_to_ready();
        let deutsch = engine.current_tracks()[2].clone();

        engine.handle_track_action(&TrackSelectionAction::Set {
            tracks: vec![deutsch.clone()],
        });
        let tracks = engine.current_tracks();
        assert!(tracks[2].is_manually_set && tracks[2].is_selected);
        assert!(!tracks[1].is_selected);

        engine.handle_track_action(&TrackSelectionAction::Clear { renderer_index: 1 });
        let tracks = engine.current_tracks();
        assert!(tracks[1].is_auto_selected);
        assert!(!tracks[2].is_manually_set);
        assert_eq!(engine.track_actions().len(), 2);
    }

    #[test]
    fn seeded_position_is_clamped() {
        let engine = SimEngine::new(
            SimMedia::default().scripted(),
            PlayerState::new(120_000, false),
        );
        assert_eq!(engine.player_state().position_ms, 30_000);
    }

    #[test]
    fn release_stops_worker_and_listeners() {
        let media = SimMedia {
            tick: Some(Duration::from_millis(5)),
            ..SimMedia::default()
        };
        let mut engine = SimEngine::new(media, PlayerState::INITIAL);
        let _seen = collect(&mut engine);
        engine.release();
        assert!(engine.is_released());
        assert_eq!(engine.listener_count(), 0);
    }
}
