// Notification thread for sessions in worker delivery mode

use podium_mediaplayer_core::{EventSink, PlayerError, PlayerEvent, Result};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = (Arc<dyn EventSink>, PlayerEvent);

/// Posts queued events from a dedicated thread, in order.
pub(crate) struct Worker {
    tx: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub(crate) fn spawn(name: String) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                for (sink, event) in rx {
                    sink.post(event);
                }
                log::debug!("[{}] notification thread exiting", name);
            })
            .map_err(|e| {
                log::error!("Failed to spawn notification thread: {}", e);
                PlayerError::EngineFailure(-12)
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    pub(crate) fn send(&self, sink: Arc<dyn EventSink>, event: PlayerEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if tx.send((sink, event)).is_err() {
            log::warn!("Notification thread gone, {:?} dropped", event.kind);
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the channel ends the loop once queued events are posted
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() == thread::current().id() {
                // Torn down from one of our own callbacks; the thread exits on its own
                log::debug!("Notification thread detached");
            } else if handle.join().is_err() {
                log::error!("Notification thread panicked");
            }
        }
    }
}
