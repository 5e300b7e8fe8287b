//! Observable projections of one session.
//!
//! State projections (UI, tracks, seek) are conflated watch channels. Raw events go to an
//! unbounded feed per subscriber so none are dropped; error messages are broadcast.

use std::sync::Mutex;

use player_session_types::{PlayerEvent, SeekData, TracksState, UiState};
use tokio::sync::{broadcast, mpsc, watch};

#[derive(Debug, Default, Clone, Copy)]
struct UiFlags {
    ready: bool,
    picture_in_picture: bool,
}

pub(crate) struct Projections {
    ui: watch::Sender<UiState>,
    tracks: watch::Sender<TracksState>,
    seek: watch::Sender<SeekData>,
    events: Mutex<Vec<mpsc::UnboundedSender<PlayerEvent>>>,
    errors: broadcast::Sender<String>,
    flags: Mutex<UiFlags>,
}

impl Projections {
    pub(crate) fn new(event_buffer: usize) -> Self {
        let (ui, _) = watch::channel(UiState::INITIAL);
        let (tracks, _) = watch::channel(TracksState::NotAvailable);
        let (seek, _) = watch::channel(SeekData::INITIAL);
        let (errors, _) = broadcast::channel(event_buffer.max(1));
        Self {
            ui,
            tracks,
            seek,
            events: Mutex::new(Vec::new()),
            errors,
            flags: Mutex::new(UiFlags::default()),
        }
    }

    pub(crate) fn subscribe_ui(&self) -> watch::Receiver<UiState> {
        self.ui.subscribe()
    }

    pub(crate) fn subscribe_tracks(&self) -> watch::Receiver<TracksState> {
        self.tracks.subscribe()
    }

    pub(crate) fn subscribe_seek(&self) -> watch::Receiver<SeekData> {
        self.seek.subscribe()
    }

    pub(crate) fn subscribe_events(&self) -> mpsc::UnboundedReceiver<PlayerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(tx);
        rx
    }

    pub(crate) fn subscribe_errors(&self) -> broadcast::Receiver<String> {
        self.errors.subscribe()
    }

    pub(crate) fn latest_seek(&self) -> SeekData {
        *self.seek.borrow()
    }

    pub(crate) fn ui_state(&self) -> UiState {
        *self.ui.borrow()
    }

    pub(crate) fn tracks_state(&self) -> TracksState {
        self.tracks.borrow().clone()
    }

    /// Deliver to every live subscriber. Subscribers whose receiver is gone are pruned.
    pub(crate) fn publish_event(&self, event: &PlayerEvent) {
        let mut subscribers = self.events.lock().unwrap_or_else(|err| err.into_inner());
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn publish_error(&self, message: String) {
        let _ = self.errors.send(message);
    }

    pub(crate) fn publish_tracks(&self, state: TracksState) {
        self.tracks.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    pub(crate) fn publish_seek(&self, data: SeekData) {
        self.ui.send_if_modified(|ui| {
            if ui.seek_data == data {
                false
            } else {
                ui.seek_data = data;
                true
            }
        });
        self.seek.send_replace(data);
    }

    pub(crate) fn set_loading(&self, show_loading: bool) {
        self.ui.send_if_modified(|ui| {
            if ui.show_loading == show_loading {
                false
            } else {
                ui.show_loading = show_loading;
                true
            }
        });
    }

    pub(crate) fn set_ready(&self, ready: bool) {
        let mut flags = self.flags.lock().unwrap_or_else(|err| err.into_inner());
        flags.ready = ready;
        self.apply_usable(*flags);
    }

    pub(crate) fn set_picture_in_picture(&self, enabled: bool) {
        let mut flags = self.flags.lock().unwrap_or_else(|err| err.into_inner());
        flags.picture_in_picture = enabled;
        self.apply_usable(*flags);
    }

    pub(crate) fn is_picture_in_picture(&self) -> bool {
        self.flags
            .lock()
            .map(|flags| flags.picture_in_picture)
            .unwrap_or(false)
    }

    fn apply_usable(&self, flags: UiFlags) {
        let usable = flags.ready && !flags.picture_in_picture;
        self.ui.send_if_modified(|ui| {
            if ui.is_controller_usable == usable {
                false
            } else {
                ui.is_controller_usable = usable;
                true
            }
        });
    }

    /// Return every state projection to its initial value. PiP mode is host-owned and kept.
    pub(crate) fn reset(&self) {
        {
            let mut flags = self.flags.lock().unwrap_or_else(|err| err.into_inner());
            flags.ready = false;
        }
        self.seek.send_replace(SeekData::INITIAL);
        self.ui.send_replace(UiState::INITIAL);
        self.publish_tracks(TracksState::NotAvailable);
    }
}
