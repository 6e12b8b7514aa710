// Background periodic flush - a dedicated worker thread that flushes the
// buffered writer on a fixed interval until the engine closes.

use crate::SharedState;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::error;

pub(crate) struct Flusher {
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Flusher {
    /// Spawn the flush worker. It wakes every `interval` to flush under the
    /// engine lock, and terminates on the shutdown signal.
    pub fn spawn(shared: Arc<SharedState>, interval: Duration) -> std::io::Result<Self> {
        let (shutdown, signal) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("seglog-flusher".to_string())
            .spawn(move || flush_loop(shared, signal, interval))?;

        Ok(Self { shutdown, handle })
    }

    /// Request cancellation and wait for the worker to exit. The worker does
    /// not flush on the way out; the caller's final flush covers that.
    pub fn shutdown(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.join();
    }
}

/// Timer-or-cancel select: a timeout means another interval elapsed, a
/// message (or a dropped sender) means shutdown.
fn flush_loop(shared: Arc<SharedState>, signal: mpsc::Receiver<()>, interval: Duration) {
    loop {
        match signal.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                let Ok(mut state) = shared.state.lock() else {
                    // A writer panicked while holding the lock; nothing
                    // left to flush safely.
                    return;
                };
                let Some(writer) = state.writer.as_mut() else {
                    // Closed under us.
                    return;
                };
                if let Err(e) = writer.flush() {
                    // A transient flush failure must not terminate the
                    // writer; the bytes stay buffered for the next attempt.
                    error!(error = %e, "periodic flush failed");
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
