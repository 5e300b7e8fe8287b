//! Process-lifetime map of session id to controller.
//!
//! Built once at startup with its backend and store and passed down to views. Views hold
//! `Arc` clones of controllers; the registry decides when they are closed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::SessionConfig;
use crate::controller::SessionController;
use crate::engine::EngineBackend;
use crate::saved_state::SavedSessionState;
use crate::store::SessionStore;

pub struct SessionRegistry<B: EngineBackend> {
    backend: Arc<B>,
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
    sessions: Mutex<HashMap<String, Arc<SessionController<B>>>>,
}

impl<B: EngineBackend> SessionRegistry<B> {
    pub fn new(backend: B, store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            store,
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Return the controller for `id`, creating it when absent.
    ///
    /// A controller closed through its own lifecycle is replaced by a fresh one.
    pub fn get(&self, id: &str) -> Arc<SessionController<B>> {
        let mut sessions = self.lock_sessions();
        if let Some(existing) = sessions.get(id) {
            if !existing.is_closed() {
                return existing.clone();
            }
            tracing::debug!(session_id = %id, "replacing closed session");
        }
        let controller = Arc::new(SessionController::new(
            id,
            self.backend.clone(),
            SavedSessionState::new(id, self.store.clone()),
            self.config.clone(),
        ));
        sessions.insert(id.to_string(), controller.clone());
        tracing::info!(session_id = %id, sessions = sessions.len(), "session registered");
        controller
    }

    /// Close and evict `id`. Returns `false` when no such session was registered.
    pub fn remove(&self, id: &str) -> bool {
        let (controller, remaining) = {
            let mut sessions = self.lock_sessions();
            let Some(controller) = sessions.remove(id) else {
                return false;
            };
            (controller, sessions.len())
        };
        controller.close();
        tracing::info!(session_id = %id, sessions = remaining, "session removed");
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock_sessions().contains_key(id)
    }

    /// Tear down every live engine, saving its state. Returns how many were live.
    pub fn on_app_backgrounded(&self) -> usize {
        let controllers: Vec<_> = self.lock_sessions().values().cloned().collect();
        let torn_down = controllers
            .iter()
            .filter(|controller| controller.on_app_backgrounded())
            .count();
        tracing::info!(torn_down, "app backgrounded");
        torn_down
    }

    /// Close and evict every session.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.lock_sessions().drain().collect();
        for (id, controller) in drained {
            controller.close();
            tracing::debug!(session_id = %id, "session closed by registry");
        }
    }

    /// Registered ids, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock_sessions().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock_sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, Arc<SessionController<B>>>> {
        self.sessions.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl<B: EngineBackend> Drop for SessionRegistry<B> {
    fn drop(&mut self) {
        self.close_all();
    }
}
