// Notification dispatcher
//
// Engine events are applied to the controller under the state lock, then the
// lock is dropped and the listener is invoked under the notify lock. A
// listener may therefore call straight back into the player.

use crate::session::{SessionState, Shared};
use podium_mediaplayer_core::{
    EventSink, MessageKind, PlayerError, PlayerEvent, PlayerListener, PlayerState,
};
use std::sync::{Arc, Weak};

/// Hook bound into each engine session. Holds the controller weakly so an
/// engine that outlives its player only ever posts into the void.
pub(crate) struct NotifySink {
    shared: Weak<Shared>,
    generation: u64,
}

impl NotifySink {
    pub(crate) fn new(shared: Weak<Shared>, generation: u64) -> Self {
        Self { shared, generation }
    }
}

impl EventSink for NotifySink {
    fn post(&self, event: PlayerEvent) {
        match self.shared.upgrade() {
            Some(shared) => shared.notify(self.generation, event),
            None => log::debug!("{:?} posted to a released player, dropped", event.kind),
        }
    }
}

impl Shared {
    pub(crate) fn notify(&self, generation: u64, event: PlayerEvent) {
        log::trace!(
            "Message received kind={:?} ext1={} ext2={}",
            event.kind,
            event.ext1,
            event.ext2
        );

        let listener = {
            let mut st = self.state.lock();

            if st.engine.is_none() {
                // Errors raised with no session bound are still reported
                if event.kind != MessageKind::Error {
                    log::debug!("{:?} on disconnected player, dropped", event.kind);
                    return;
                }
                log::error!("Error ({}, {}) with no active session", event.ext1, event.ext2);
            } else if st.generation != generation {
                log::debug!("{:?} from a released session, dropped", event.kind);
                return;
            } else if !self.apply(&mut st, &event) {
                return;
            }

            st.listener.clone()
        };

        self.deliver(listener, event);
    }

    /// Update controller state for `event`. Returns whether it should reach the listener.
    fn apply(&self, st: &mut SessionState, event: &PlayerEvent) -> bool {
        match event.kind {
            MessageKind::Nop => true,
            MessageKind::Prepared => {
                if st.state == PlayerState::Preparing {
                    st.set_state(PlayerState::Prepared);
                } else {
                    log::warn!("Prepared received in state {:?}", st.state);
                }
                st.finish_sync_prepare(Ok(()), &self.prepared);
                true
            }
            MessageKind::PlaybackComplete => {
                if st.state == PlayerState::Error {
                    log::warn!("Playback complete received in error state");
                } else if !st.looping {
                    st.set_state(PlayerState::PlaybackComplete);
                }
                true
            }
            MessageKind::Error => {
                log::error!("Engine error ({}, {})", event.ext1, event.ext2);
                st.set_state(PlayerState::Error);
                // The waiting caller gets the status from prepare() instead
                let status = Err(PlayerError::EngineFailure(event.ext1));
                !st.finish_sync_prepare(status, &self.prepared)
            }
            MessageKind::Info => {
                log::info!("Info ({}, {})", event.ext1, event.ext2);
                true
            }
            MessageKind::SeekComplete => {
                st.on_seek_complete();
                true
            }
            MessageKind::BufferingUpdate => {
                st.buffering_percent = Some(event.ext1);
                true
            }
            MessageKind::VideoSizeChanged => {
                log::debug!("New video size {} x {}", event.ext1, event.ext2);
                st.video_width = event.ext1;
                st.video_height = event.ext2;
                true
            }
            MessageKind::Unknown(code) => {
                log::debug!(
                    "Unrecognized message ({}, {}, {}) ignored",
                    code,
                    event.ext1,
                    event.ext2
                );
                false
            }
        }
    }

    /// Invoke the listener, one delivery at a time. The state lock must not be held.
    fn deliver(&self, listener: Option<Weak<dyn PlayerListener>>, event: PlayerEvent) {
        let Some(listener) = listener.and_then(|weak| weak.upgrade()) else {
            return;
        };
        let _serial = self.notify_lock.lock();
        listener.on_event(event);
    }
}

/// Build the sink for a freshly bound session.
pub(crate) fn sink_for(shared: &Arc<Shared>, generation: u64) -> Arc<dyn EventSink> {
    Arc::new(NotifySink::new(Arc::downgrade(shared), generation))
}
