//! Background threads with deterministic shutdown.

use crossbeam_channel::{Receiver, Sender};

/// A named thread that runs until its stop channel fires or disconnects.
pub(crate) struct Worker {
    name: &'static str,
    stop_tx: Sender<()>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl Worker {
    /// Spawn `body` on a new thread. `body` must return once the stop receiver yields.
    pub(crate) fn spawn<F>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(Receiver<()>) + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(stop_rx));
        let join = match join {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!(worker = name, "failed to spawn worker thread: {err}");
                None
            }
        };
        Self {
            name,
            stop_tx,
            join,
        }
    }

    /// Signal the thread and wait for it to exit.
    pub(crate) fn stop_and_join(mut self) {
        let _ = self.stop_tx.try_send(());
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::warn!(worker = self.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        let _ = self.stop_tx.try_send(());
    }
}
