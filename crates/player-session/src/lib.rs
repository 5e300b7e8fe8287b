//! Playback session controller.
//!
//! Owns one playback engine per logical session, folds the engine's event stream into
//! observable UI projections and keeps enough saved state to recreate the engine after
//! a teardown.
//!
//! ## Layout
//! - [`engine`]: capability set every backend implements, plus the backend factory.
//! - [`normalizer`]: per-dialect translation of native callbacks into [`PlayerEvent`]s.
//! - [`seek`]: progress triples, event-driven and ticked.
//! - [`store`] / [`saved_state`]: durable per-session records.
//! - [`reconcile`]: matching saved manual track selections against reported tracks.
//! - [`controller`]: the per-session state machine.
//! - [`registry`]: process-lifetime map of session id to controller.
//! - [`sim`]: a simulated backend used by the demo host.

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod normalizer;
pub mod reconcile;
pub mod registry;
pub mod saved_state;
pub mod seek;
pub mod sim;
pub mod store;

mod projection;
mod worker;

pub use config::SessionConfig;
pub use controller::{EngineHandle, LifecycleEvent, SessionController};
pub use engine::{EngineBackend, EngineProgress, ListenerId, ListenerSet, NativeListener, PlaybackEngine};
pub use error::{Result, SessionError};
pub use normalizer::EventNormalizer;
pub use registry::SessionRegistry;
pub use saved_state::SavedSessionState;
pub use store::{FileSessionStore, MemorySessionStore, SavedSession, SessionStore};

pub use player_session_types::{
    EngineState, PlaybackException, PlayerEvent, PlayerState, SeekData, TrackIndices, TrackInfo,
    TrackSelectionAction, TrackSize, TrackType, TracksState, UiState, VideoSize,
};
