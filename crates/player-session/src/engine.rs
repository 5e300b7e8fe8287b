//! Engine capability set consumed by the session controller.
//!
//! A backend provides two things: an engine type implementing [`PlaybackEngine`] and an
//! [`EventNormalizer`] that understands the engine's native callback dialect. The
//! controller is written once against these traits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use player_session_types::{PlayerState, TrackInfo, TrackSelectionAction};

use crate::normalizer::EventNormalizer;

/// Callback registered on an engine's native listener list.
pub type NativeListener<N> = Arc<dyn Fn(N) + Send + Sync>;

/// Token returned by [`PlaybackEngine::add_listener`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Raw progress as the engine reports it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineProgress {
    pub position: Duration,
    pub buffered: Duration,
    /// `None` until the engine knows the media duration.
    pub duration: Option<Duration>,
}

/// Operations every playback backend must support.
///
/// Native callbacks may be raised from any engine thread. After
/// [`remove_listener`](PlaybackEngine::remove_listener) returns, the removed listener must
/// not be invoked again.
pub trait PlaybackEngine: Send + 'static {
    /// Callback payload of this backend's listener surface.
    type Native: Send + 'static;

    fn player_state(&self) -> PlayerState;
    fn progress(&self) -> EngineProgress;
    fn current_tracks(&self) -> Vec<TrackInfo>;

    fn play(&mut self);
    fn pause(&mut self);
    fn seek_to(&mut self, position: Duration);
    fn handle_track_action(&mut self, action: &TrackSelectionAction);

    fn add_listener(&mut self, listener: NativeListener<Self::Native>) -> ListenerId;
    fn remove_listener(&mut self, id: ListenerId);

    /// Free decoder and renderer resources. The engine is not used afterwards.
    fn release(&mut self);
}

/// Factory for engines of one backend, together with the matching normalizer.
pub trait EngineBackend: Send + Sync + 'static {
    type Engine: PlaybackEngine;
    type Normalizer: EventNormalizer<Native = <Self::Engine as PlaybackEngine>::Native>;

    /// Create an engine seeded with `initial` (position and play-when-ready).
    fn create(&self, initial: PlayerState) -> Self::Engine;

    /// Fresh normalizer for one subscription.
    fn normalizer(&self) -> Self::Normalizer;
}

/// Listener list for backend implementations.
///
/// Dispatch happens under the list lock, so [`remove`](ListenerSet::remove) waits for an
/// in-flight dispatch and no callback runs after it returns.
pub struct ListenerSet<N> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, NativeListener<N>)>>,
}

impl<N> Default for ListenerSet<N> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<N: Clone> ListenerSet<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: NativeListener<N>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.lock().unwrap_or_else(|err| err.into_inner());
        listeners.push((id, listener));
        id
    }

    /// Returns `true` when the listener was registered.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(|err| err.into_inner());
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn emit(&self, event: N) {
        let listeners = self.listeners.lock().unwrap_or_else(|err| err.into_inner());
        for (_, listener) in listeners.iter() {
            listener(event.clone());
        }
    }

    pub fn clear(&self) {
        self.listeners
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .map(|listeners| listeners.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
