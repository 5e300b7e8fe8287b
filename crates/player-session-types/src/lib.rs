//! Value types shared between the session controller and view-layer consumers.
//!
//! Everything here is immutable data: safe to clone, compare and move across threads.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Snapshot of the engine's transport state.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerState {
    /// Playback position in milliseconds.
    pub position_ms: u64,
    /// `true` when the engine was playing (or about to play) at snapshot time.
    pub is_playing: bool,
}

impl PlayerState {
    /// State used to seed an engine when nothing was saved for the session.
    pub const INITIAL: PlayerState = PlayerState {
        position_ms: 0,
        is_playing: false,
    };

    pub fn new(position_ms: u64, is_playing: bool) -> Self {
        Self {
            position_ms,
            is_playing,
        }
    }
}

/// Kind of media carried by a track.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    Video,
    Audio,
    Text,
}

/// Pixel size reported for a track (zero for non-video tracks).
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackSize {
    pub width: u32,
    pub height: u32,
}

/// Position of a track inside the engine's renderer/group enumeration.
///
/// This triple is the identity used to match a track across re-enumerations. It is
/// assumed stable for the same media across engine restarts.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TrackIndices {
    /// Index of the track inside its group.
    pub index: u32,
    /// Index of the group inside the renderer.
    pub group_index: u32,
    /// Renderer the group belongs to.
    pub renderer_index: u32,
}

impl TrackIndices {
    pub fn new(index: u32, group_index: u32, renderer_index: u32) -> Self {
        Self {
            index,
            group_index,
            renderer_index,
        }
    }
}

/// One selectable track as reported by the engine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackInfo {
    /// Display name (language label, codec name, ...), when the engine has one.
    pub name: Option<String>,
    /// Media kind.
    pub track_type: TrackType,
    /// Reported dimensions.
    pub size: TrackSize,
    /// Stable identity within the engine's enumeration.
    pub indices: TrackIndices,
    /// Track is flagged as default by the container.
    pub is_default: bool,
    /// Track is currently selected.
    pub is_selected: bool,
    /// Selection came from the engine's own track selector.
    pub is_auto_selected: bool,
    /// Selection was explicitly requested by the user.
    pub is_manually_set: bool,
}

impl TrackInfo {
    /// Build an unselected track with the given identity.
    pub fn new(track_type: TrackType, indices: TrackIndices) -> Self {
        Self {
            name: None,
            track_type,
            size: TrackSize::default(),
            indices,
            is_default: false,
            is_selected: false,
            is_auto_selected: false,
            is_manually_set: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = TrackSize { width, height };
        self
    }

    /// Mark the track as a user's explicit choice.
    pub fn manually_selected(mut self) -> Self {
        self.is_selected = true;
        self.is_auto_selected = false;
        self.is_manually_set = true;
        self
    }

    /// `true` when both tracks occupy the same slot in the engine's enumeration.
    pub fn same_slot(&self, other: &TrackInfo) -> bool {
        self.indices == other.indices
    }
}

/// Track selection request forwarded to the engine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackSelectionAction {
    /// Override the selection for the renderers these tracks belong to.
    Set { tracks: Vec<TrackInfo> },
    /// Revert one renderer to automatic selection.
    Clear { renderer_index: u32 },
}

/// Progress triple published to seek bars.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeekData {
    pub position: Duration,
    pub buffered: Duration,
    pub duration: Duration,
}

impl SeekData {
    pub const INITIAL: SeekData = SeekData {
        position: Duration::ZERO,
        buffered: Duration::ZERO,
        duration: Duration::ZERO,
    };
}

/// State rendered by player controls.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UiState {
    /// Controls may be interacted with. False until the engine is ready and while in PiP.
    pub is_controller_usable: bool,
    /// A loading indicator should be shown.
    pub show_loading: bool,
    /// Latest progress triple.
    pub seek_data: SeekData,
}

impl UiState {
    pub const INITIAL: UiState = UiState {
        is_controller_usable: false,
        show_loading: false,
        seek_data: SeekData::INITIAL,
    };
}

/// Which track kinds the current media offers.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TracksState {
    Available { track_types: Vec<TrackType> },
    #[default]
    NotAvailable,
}

impl TracksState {
    /// Distinct track kinds of `tracks`, in first-seen order.
    pub fn from_tracks(tracks: &[TrackInfo]) -> Self {
        let mut track_types = Vec::new();
        for track in tracks {
            if !track_types.contains(&track.track_type) {
                track_types.push(track.track_type);
            }
        }
        TracksState::Available { track_types }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, TracksState::Available { .. })
    }
}

/// Coarse engine state, shared by every backend dialect.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Decoded video dimensions.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

/// Playback failure reported by an engine.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlaybackException {
    pub message: String,
    pub cause: Option<String>,
}

impl PlaybackException {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl fmt::Display for PlaybackException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}", self.message, cause),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for PlaybackException {}

/// Backend-agnostic playback event, produced by an event normalizer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayerEvent {
    /// First event of every subscription.
    Initial,
    /// Media is ready and the first frame is available.
    PlayerPrepared { play_when_ready: bool },
    IsLoadingChanged { is_loading: bool },
    PlayWhenReadyChanged { play_when_ready: bool },
    PlaybackStateChanged { state: EngineState },
    TracksChanged { tracks: Vec<TrackInfo> },
    VideoSizeChanged { size: VideoSize },
    IsPlayingChanged { is_playing: bool },
    PlayerError { error: PlaybackException },
}

impl PlayerEvent {
    /// Events after which progress should be recomputed immediately.
    pub fn affects_progress(&self) -> bool {
        matches!(
            self,
            PlayerEvent::PlayerPrepared { .. }
                | PlayerEvent::IsLoadingChanged { .. }
                | PlayerEvent::PlayWhenReadyChanged { .. }
                | PlayerEvent::PlaybackStateChanged { .. }
                | PlayerEvent::IsPlayingChanged { .. }
        )
    }
}
