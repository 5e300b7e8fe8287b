//! Normalizer for listener-style engines that report state transitions directly.

use player_session_types::{
    EngineState, PlaybackException, PlayerEvent, TrackInfo, VideoSize,
};

use super::EventNormalizer;

/// Native callbacks of a listener-style engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExoCallback {
    PlaybackStateChanged(EngineState),
    PlayWhenReadyChanged(bool),
    IsPlayingChanged(bool),
    IsLoadingChanged(bool),
    TracksChanged(Vec<TrackInfo>),
    VideoSizeChanged(VideoSize),
    RenderedFirstFrame,
    PlayerError(PlaybackException),
}

/// Maps [`ExoCallback`]s onto [`PlayerEvent`]s.
///
/// The first rendered frame becomes `PlayerPrepared`, once per preparation; repeated
/// boolean callbacks carrying an unchanged value are dropped.
#[derive(Debug, Default)]
pub struct ExoNormalizer {
    play_when_ready: bool,
    prepared: bool,
    is_playing: Option<bool>,
    is_loading: Option<bool>,
}

impl ExoNormalizer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventNormalizer for ExoNormalizer {
    type Native = ExoCallback;

    fn normalize(&mut self, native: ExoCallback, out: &mut Vec<PlayerEvent>) {
        match native {
            ExoCallback::PlaybackStateChanged(state) => {
                if state == EngineState::Idle {
                    // Re-preparing after an error or stop yields a new first frame.
                    self.prepared = false;
                }
                out.push(PlayerEvent::PlaybackStateChanged { state });
            }
            ExoCallback::PlayWhenReadyChanged(play_when_ready) => {
                self.play_when_ready = play_when_ready;
                out.push(PlayerEvent::PlayWhenReadyChanged { play_when_ready });
            }
            ExoCallback::IsPlayingChanged(is_playing) => {
                if self.is_playing.replace(is_playing) != Some(is_playing) {
                    out.push(PlayerEvent::IsPlayingChanged { is_playing });
                }
            }
            ExoCallback::IsLoadingChanged(is_loading) => {
                if self.is_loading.replace(is_loading) != Some(is_loading) {
                    out.push(PlayerEvent::IsLoadingChanged { is_loading });
                }
            }
            ExoCallback::TracksChanged(tracks) => {
                out.push(PlayerEvent::TracksChanged { tracks });
            }
            ExoCallback::VideoSizeChanged(size) => {
                out.push(PlayerEvent::VideoSizeChanged { size });
            }
            ExoCallback::RenderedFirstFrame => {
                if !self.prepared {
                    self.prepared = true;
                    out.push(PlayerEvent::PlayerPrepared {
                        play_when_ready: self.play_when_ready,
                    });
                }
            }
            ExoCallback::PlayerError(error) => {
                self.prepared = false;
                out.push(PlayerEvent::PlayerError { error });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(normalizer: &mut ExoNormalizer, native: ExoCallback) -> Vec<PlayerEvent> {
        let mut out = Vec::new();
        normalizer.normalize(native, &mut out);
        out
    }

    #[test]
    fn attach_emits_initial() {
        let mut normalizer = ExoNormalizer::new();
        let mut out = Vec::new();
        normalizer.on_attach(&mut out);
        assert_eq!(out, vec![PlayerEvent::Initial]);
    }

    #[test]
    fn first_frame_maps_to_prepared_once() {
        let mut normalizer = ExoNormalizer::new();
        run(&mut normalizer, ExoCallback::PlayWhenReadyChanged(true));

        assert_eq!(
            run(&mut normalizer, ExoCallback::RenderedFirstFrame),
            vec![PlayerEvent::PlayerPrepared {
                play_when_ready: true
            }]
        );
        assert!(run(&mut normalizer, ExoCallback::RenderedFirstFrame).is_empty());
    }

    #[test]
    fn idle_rearms_prepared() {
        let mut normalizer = ExoNormalizer::new();
        run(&mut normalizer, ExoCallback::RenderedFirstFrame);
        run(
            &mut normalizer,
            ExoCallback::PlaybackStateChanged(EngineState::Idle),
        );
        assert_eq!(
            run(&mut normalizer, ExoCallback::RenderedFirstFrame),
            vec![PlayerEvent::PlayerPrepared {
                play_when_ready: false
            }]
        );
    }

    #[test]
    fn duplicate_booleans_are_dropped() {
        let mut normalizer = ExoNormalizer::new();
        assert_eq!(run(&mut normalizer, ExoCallback::IsPlayingChanged(true)).len(), 1);
        assert!(run(&mut normalizer, ExoCallback::IsPlayingChanged(true)).is_empty());
        assert_eq!(run(&mut normalizer, ExoCallback::IsPlayingChanged(false)).len(), 1);

        assert_eq!(run(&mut normalizer, ExoCallback::IsLoadingChanged(true)).len(), 1);
        assert!(run(&mut normalizer, ExoCallback::IsLoadingChanged(true)).is_empty());
    }

    #[test]
    fn errors_and_tracks_pass_through() {
        let mut normalizer = ExoNormalizer::new();
        let error = PlaybackException::new("source error");
        assert_eq!(
            run(&mut normalizer, ExoCallback::PlayerError(error.clone())),
            vec![PlayerEvent::PlayerError { error }]
        );
        assert_eq!(
            run(&mut normalizer, ExoCallback::TracksChanged(Vec::new())),
            vec![PlayerEvent::TracksChanged { tracks: Vec::new() }]
        );
    }
}
