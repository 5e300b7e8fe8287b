//! Normalizer for prepare/info/error style engines.
//!
//! These engines do not report play-state transitions on their own and signal the
//! first rendered frame through a generic "info" callback.

use player_session_types::{
    EngineState, PlaybackException, PlayerEvent, TrackInfo, VideoSize,
};

use super::EventNormalizer;

pub const MEDIA_INFO_VIDEO_RENDERING_START: i32 = 3;
pub const MEDIA_INFO_BUFFERING_START: i32 = 701;
pub const MEDIA_INFO_BUFFERING_END: i32 = 702;

pub const MEDIA_ERROR_UNKNOWN: i32 = 1;
pub const MEDIA_ERROR_SERVER_DIED: i32 = 100;
pub const MEDIA_ERROR_IO: i32 = -1004;
pub const MEDIA_ERROR_MALFORMED: i32 = -1007;
pub const MEDIA_ERROR_UNSUPPORTED: i32 = -1010;
pub const MEDIA_ERROR_TIMED_OUT: i32 = -110;

/// Native callbacks of a prepare/info/error style engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LegacyCallback {
    Prepared,
    Info { what: i32, extra: i32 },
    BufferingUpdate { percent: u8 },
    VideoSizeChanged { width: u32, height: u32 },
    Completion,
    SeekComplete,
    Error { what: i32, extra: i32 },
    /// Raised by the adapter around `start()` / `pause()`.
    PlayingChanged(bool),
    TracksChanged(Vec<TrackInfo>),
}

#[derive(Debug, Default)]
pub struct LegacyNormalizer {
    play_when_ready: bool,
    prepared: bool,
    is_playing: Option<bool>,
    is_loading: Option<bool>,
}

impl LegacyNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn loading(&mut self, is_loading: bool, out: &mut Vec<PlayerEvent>) {
        if self.is_loading.replace(is_loading) != Some(is_loading) {
            out.push(PlayerEvent::IsLoadingChanged { is_loading });
        }
    }

    fn playing(&mut self, is_playing: bool, out: &mut Vec<PlayerEvent>) {
        if self.is_playing.replace(is_playing) != Some(is_playing) {
            out.push(PlayerEvent::IsPlayingChanged { is_playing });
        }
    }
}

fn error_extra_name(extra: i32) -> Option<&'static str> {
    match extra {
        MEDIA_ERROR_IO => Some("io error"),
        MEDIA_ERROR_MALFORMED => Some("malformed bitstream"),
        MEDIA_ERROR_UNSUPPORTED => Some("unsupported format"),
        MEDIA_ERROR_TIMED_OUT => Some("timed out"),
        _ => None,
    }
}

fn playback_exception(what: i32, extra: i32) -> PlaybackException {
    let message = match what {
        MEDIA_ERROR_SERVER_DIED => "media server died".to_string(),
        MEDIA_ERROR_UNKNOWN => "unknown playback error".to_string(),
        other => format!("playback error (what={other})"),
    };
    let exception = PlaybackException::new(message);
    match error_extra_name(extra) {
        Some(cause) => exception.with_cause(cause),
        None if extra != 0 => exception.with_cause(format!("extra={extra}")),
        None => exception,
    }
}

impl EventNormalizer for LegacyNormalizer {
    type Native = LegacyCallback;

    fn normalize(&mut self, native: LegacyCallback, out: &mut Vec<PlayerEvent>) {
        match native {
            LegacyCallback::Prepared => {
                out.push(PlayerEvent::PlaybackStateChanged {
                    state: EngineState::Ready,
                });
            }
            LegacyCallback::Info { what, .. } => match what {
                MEDIA_INFO_VIDEO_RENDERING_START => {
                    if !self.prepared {
                        self.prepared = true;
                        out.push(PlayerEvent::PlayerPrepared {
                            play_when_ready: self.play_when_ready,
                        });
                    }
                }
                MEDIA_INFO_BUFFERING_START => {
                    self.loading(true, out);
                    out.push(PlayerEvent::PlaybackStateChanged {
                        state: EngineState::Buffering,
                    });
                }
                MEDIA_INFO_BUFFERING_END => {
                    self.loading(false, out);
                    out.push(PlayerEvent::PlaybackStateChanged {
                        state: EngineState::Ready,
                    });
                }
                other => {
                    tracing::trace!(what = other, "dropping engine info callback");
                }
            },
            LegacyCallback::BufferingUpdate { percent } => {
                self.loading(percent < 100, out);
            }
            LegacyCallback::VideoSizeChanged { width, height } => {
                out.push(PlayerEvent::VideoSizeChanged {
                    size: VideoSize { width, height },
                });
            }
            LegacyCallback::Completion => {
                self.playing(false, out);
                out.push(PlayerEvent::PlaybackStateChanged {
                    state: EngineState::Ended,
                });
            }
            LegacyCallback::SeekComplete => {}
            LegacyCallback::Error { what, extra } => {
                self.prepared = false;
                self.playing(false, out);
                out.push(PlayerEvent::PlayerError {
                    error: playback_exception(what, extra),
                });
            }
            LegacyCallback::PlayingChanged(is_playing) => {
                if self.play_when_ready != is_playing {
                    self.play_when_ready = is_playing;
                    out.push(PlayerEvent::PlayWhenReadyChanged {
                        play_when_ready: is_playing,
                    });
                }
                self.playing(is_playing, out);
            }
            LegacyCallback::TracksChanged(tracks) => {
                out.push(PlayerEvent::TracksChanged { tracks });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(normalizer: &mut LegacyNormalizer, native: LegacyCallback) -> Vec<PlayerEvent> {
        let mut out = Vec::new();
        normalizer.normalize(native, &mut out);
        out
    }

    #[test]
    fn rendering_start_info_maps_to_prepared() {
        let mut normalizer = LegacyNormalizer::new();
        run(&mut normalizer, LegacyCallback::PlayingChanged(true));
        let out = run(
            &mut normalizer,
            LegacyCallback::Info {
                what: MEDIA_INFO_VIDEO_RENDERING_START,
                extra: 0,
            },
        );
        assert_eq!(
            out,
            vec![PlayerEvent::PlayerPrepared {
                play_when_ready: true
            }]
        );

        let again = run(
            &mut normalizer,
            LegacyCallback::Info {
                what: MEDIA_INFO_VIDEO_RENDERING_START,
                extra: 0,
            },
        );
        assert!(again.is_empty());
    }

    #[test]
    fn unknown_info_is_dropped() {
        let mut normalizer = LegacyNormalizer::new();
        let out = run(&mut normalizer, LegacyCallback::Info { what: 801, extra: 0 });
        assert!(out.is_empty());
    }

    #[test]
    fn buffering_info_toggles_loading_and_state() {
        let mut normalizer = LegacyNormalizer::new();
        let start = run(
            &mut normalizer,
            LegacyCallback::Info {
                what: MEDIA_INFO_BUFFERING_START,
                extra: 0,
            },
        );
        assert_eq!(
            start,
            vec![
                PlayerEvent::IsLoadingChanged { is_loading: true },
                PlayerEvent::PlaybackStateChanged {
                    state: EngineState::Buffering
                },
            ]
        );
        let update = run(&mut normalizer, LegacyCallback::BufferingUpdate { percent: 40 });
        assert!(update.is_empty());

        let end = run(
            &mut normalizer,
            LegacyCallback::Info {
                what: MEDIA_INFO_BUFFERING_END,
                extra: 0,
            },
        );
        assert_eq!(end[0], PlayerEvent::IsLoadingChanged { is_loading: false });
    }

    #[test]
    fn error_carries_message_and_cause() {
        let mut normalizer = LegacyNormalizer::new();
        let out = run(
            &mut normalizer,
            LegacyCallback::Error {
                what: MEDIA_ERROR_UNKNOWN,
                extra: MEDIA_ERROR_IO,
            },
        );
        match &out[..] {
            [PlayerEvent::PlayerError { error }] => {
                assert_eq!(error.to_string(), "unknown playback error: io error");
            }
            other => panic!("unexpected events: {other:?}"),
        }
    }

    #[test]
    fn completion_stops_playing_once() {
        let mut normalizer = LegacyNormalizer::new();
        run(&mut normalizer, LegacyCallback::PlayingChanged(true));
        let out = run(&mut normalizer, LegacyCallback::Completion);
        assert_eq!(
            out,
            vec![
                PlayerEvent::IsPlayingChanged { is_playing: false },
                PlayerEvent::PlaybackStateChanged {
                    state: EngineState::Ended
                },
            ]
        );
    }
}
