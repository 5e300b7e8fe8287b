//! Per-session view over a [`SessionStore`].
//!
//! Store failures are logged and swallowed: losing a saved position is preferable to
//! failing a lifecycle transition.

use std::sync::Arc;

use player_session_types::{PlayerState, TrackInfo};

use crate::store::{SavedSession, SessionStore};

#[derive(Clone)]
pub struct SavedSessionState {
    session_id: String,
    store: Arc<dyn SessionStore>,
}

impl SavedSessionState {
    pub fn new(session_id: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            session_id: session_id.into(),
            store,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn read(&self) -> SavedSession {
        match self.store.load(&self.session_id) {
            Ok(saved) => saved.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(session_id = %self.session_id, "read saved session failed: {err:#}");
                SavedSession::default()
            }
        }
    }

    /// Saved transport state, or [`PlayerState::INITIAL`] when none was recorded.
    pub fn read_player_state(&self) -> PlayerState {
        self.read().player_state.unwrap_or(PlayerState::INITIAL)
    }

    pub fn read_manual_tracks(&self) -> Vec<TrackInfo> {
        self.read().manual_tracks
    }

    pub fn save_player_state(&self, state: PlayerState) {
        let mut saved = self.read();
        saved.player_state = Some(state);
        self.write(&saved);
    }

    /// Replace the saved track list. Only manually-set entries are kept.
    pub fn save_manual_tracks(&self, tracks: &[TrackInfo]) {
        let mut saved = self.read();
        saved.manual_tracks = manual_only(tracks);
        self.write(&saved);
    }

    /// Write both halves in one store round trip.
    pub fn save(&self, state: PlayerState, tracks: &[TrackInfo]) {
        let saved = SavedSession {
            player_state: Some(state),
            manual_tracks: manual_only(tracks),
        };
        self.write(&saved);
    }

    pub fn clear(&self) {
        if let Err(err) = self.store.clear(&self.session_id) {
            tracing::warn!(session_id = %self.session_id, "clear saved session failed: {err:#}");
        }
    }

    fn write(&self, saved: &SavedSession) {
        if let Err(err) = self.store.save(&self.session_id, saved) {
            tracing::warn!(session_id = %self.session_id, "save session failed: {err:#}");
        }
    }
}

fn manual_only(tracks: &[TrackInfo]) -> Vec<TrackInfo> {
    tracks
        .iter()
        .filter(|track| track.is_manually_set)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;
    use player_session_types::{TrackIndices, TrackType};

    struct FailingStore;

    impl SessionStore for FailingStore {
        fn load(&self, _: &str) -> anyhow::Result<Option<SavedSession>> {
            anyhow::bail!("disk unavailable")
        }
        fn save(&self, _: &str, _: &SavedSession) -> anyhow::Result<()> {
            anyhow::bail!("disk unavailable")
        }
        fn clear(&self, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk unavailable")
        }
    }

    fn state(id: &str) -> SavedSessionState {
        SavedSessionState::new(id, Arc::new(MemorySessionStore::new()))
    }

    #[test]
    fn missing_state_reads_as_initial() {
        let saved = state("a");
        assert_eq!(saved.read_player_state(), PlayerState::INITIAL);
        assert!(saved.read_manual_tracks().is_empty());
    }

    #[test]
    fn only_manual_tracks_are_saved() {
        let saved = state("a");
        let auto = TrackInfo::new(TrackType::Audio, TrackIndices::new(0, 0, 1));
        let manual =
            TrackInfo::new(TrackType::Text, TrackIndices::new(1, 0, 2)).manually_selected();
        saved.save_manual_tracks(&[auto, manual.clone()]);
        assert_eq!(saved.read_manual_tracks(), vec![manual]);
    }

    #[test]
    fn halves_are_saved_independently() {
        let saved = state("a");
        let manual =
            TrackInfo::new(TrackType::Text, TrackIndices::new(1, 0, 2)).manually_selected();
        saved.save_manual_tracks(std::slice::from_ref(&manual));
        saved.save_player_state(PlayerState::new(5000, false));

        assert_eq!(saved.read_player_state(), PlayerState::new(5000, false));
        assert_eq!(saved.read_manual_tracks(), vec![manual]);
    }

    #[test]
    fn clear_forgets_everything() {
        let saved = state("a");
        saved.save(PlayerState::new(1200, true), &[]);
        saved.clear();
        assert_eq!(saved.read_player_state(), PlayerState::INITIAL);
    }

    #[test]
    fn store_failures_fall_back_to_defaults() {
        let saved = SavedSessionState::new("a", Arc::new(FailingStore));
        saved.save_player_state(PlayerState::new(10, true));
        saved.clear();
        assert_eq!(saved.read_player_state(), PlayerState::INITIAL);
    }
}
