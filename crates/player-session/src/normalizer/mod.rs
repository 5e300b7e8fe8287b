//! Event normalization.
//!
//! Each backend dialect gets an [`EventNormalizer`] that maps its native callbacks onto
//! the closed [`PlayerEvent`] set. [`EventSubscription`] ties one normalizer to one
//! engine for the lifetime of an active session.

pub mod exo;
pub mod legacy;

use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;
use player_session_types::PlayerEvent;

use crate::engine::{ListenerId, NativeListener, PlaybackEngine};

pub use exo::{ExoCallback, ExoNormalizer};
pub use legacy::{LegacyCallback, LegacyNormalizer};

/// Translates one backend's native callbacks into [`PlayerEvent`]s.
pub trait EventNormalizer: Send + 'static {
    type Native: Send + 'static;

    /// Events emitted when the subscription is attached, before any native callback.
    fn on_attach(&mut self, out: &mut Vec<PlayerEvent>) {
        out.push(PlayerEvent::Initial);
    }

    /// Append zero or more events for `native` to `out`.
    fn normalize(&mut self, native: Self::Native, out: &mut Vec<PlayerEvent>);
}

/// A normalizer attached to an engine's listener list.
#[derive(Debug)]
pub(crate) struct EventSubscription {
    listener: ListenerId,
}

impl EventSubscription {
    /// Register a listener on `engine` that normalizes callbacks into `sink`.
    ///
    /// Callbacks raised before this call are never observed.
    pub(crate) fn attach<E, N>(engine: &mut E, mut normalizer: N, sink: Sender<PlayerEvent>) -> Self
    where
        E: PlaybackEngine,
        N: EventNormalizer<Native = E::Native>,
    {
        let mut initial = Vec::new();
        normalizer.on_attach(&mut initial);
        for event in initial {
            let _ = sink.send(event);
        }

        let normalizer = Mutex::new(normalizer);
        let listener: NativeListener<E::Native> = Arc::new(move |native: E::Native| {
            let mut out = Vec::new();
            {
                let mut normalizer = normalizer.lock().unwrap_or_else(|err| err.into_inner());
                normalizer.normalize(native, &mut out);
            }
            for event in out {
                if sink.send(event).is_err() {
                    break;
                }
            }
        });
        let listener = engine.add_listener(listener);
        tracing::debug!(listener = listener.0, "event subscription attached");
        Self { listener }
    }

    /// Remove the listener. No callback for this subscription runs after this returns.
    pub(crate) fn detach<E: PlaybackEngine>(self, engine: &mut E) {
        engine.remove_listener(self.listener);
        tracing::debug!(listener = self.listener.0, "event subscription detached");
    }
}
