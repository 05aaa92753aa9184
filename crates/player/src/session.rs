// Controller state guarded by the state lock

use crate::config::PlayerConfig;
use parking_lot::{Condvar, Mutex};
use podium_mediaplayer_core::{
    EngineSession, Operation, PlaybackStatus, PlayerError, PlayerListener, PlayerState, Result,
};
use std::collections::HashMap;
use std::sync::Weak;

/// Everything shared between the public API and the notification dispatcher.
pub(crate) struct Shared {
    /// State lock
    pub(crate) state: Mutex<SessionState>,
    /// Signalled when a synchronous prepare is resolved
    pub(crate) prepared: Condvar,
    /// Notify lock: serializes listener invocations, never taken with `state` held
    pub(crate) notify_lock: Mutex<()>,
}

impl Shared {
    pub(crate) fn new(config: &PlayerConfig) -> Self {
        Self {
            state: Mutex::new(SessionState::new(config)),
            prepared: Condvar::new(),
            notify_lock: Mutex::new(()),
        }
    }
}

pub(crate) struct SessionState {
    pub(crate) state: PlayerState,
    pub(crate) engine: Option<Box<dyn EngineSession>>,
    /// Bumped on every bind so late events from a released session can be told apart
    pub(crate) generation: u64,
    pub(crate) listener: Option<Weak<dyn PlayerListener>>,

    pub(crate) duration_ms: Option<i32>,
    /// Latest requested seek target; `None` means "ask the engine"
    pub(crate) position_ms: Option<i32>,
    /// Target of the seek currently outstanding at the engine
    pub(crate) seek_target_ms: Option<i32>,
    pub(crate) video_width: i32,
    pub(crate) video_height: i32,
    pub(crate) buffering_percent: Option<i32>,

    pub(crate) volume_left: f32,
    pub(crate) volume_right: f32,
    pub(crate) looping: bool,
    pub(crate) stream_type: i32,
    pub(crate) audio_session_id: i32,
    pub(crate) aux_send_level: f32,
    pub(crate) aux_effect_id: Option<i32>,

    /// Ticket of the synchronous prepare currently waiting for the engine
    pub(crate) prepare_waiting: Option<u64>,
    pub(crate) prepare_tickets: u64,
    /// Outcomes of resolved synchronous prepares, collected by their waiters
    pub(crate) prepare_results: HashMap<u64, Result<()>>,
}

impl SessionState {
    fn new(config: &PlayerConfig) -> Self {
        Self {
            state: PlayerState::Idle,
            engine: None,
            generation: 0,
            listener: None,
            duration_ms: None,
            position_ms: None,
            seek_target_ms: None,
            video_width: 0,
            video_height: 0,
            buffering_percent: None,
            volume_left: config.volume_left,
            volume_right: config.volume_right,
            looping: false,
            stream_type: config.stream_type,
            audio_session_id: config.audio_session_id,
            aux_send_level: config.aux_send_level,
            aux_effect_id: None,
            prepare_waiting: None,
            prepare_tickets: 0,
            prepare_results: HashMap::new(),
        }
    }

    pub(crate) fn set_state(&mut self, new_state: PlayerState) {
        if self.state != new_state {
            log::debug!("Player state changed: {:?} -> {:?}", self.state, new_state);
            self.state = new_state;
        }
    }

    /// Forget everything learned from the current engine session.
    pub(crate) fn clear_caches(&mut self) {
        self.duration_ms = None;
        self.position_ms = None;
        self.seek_target_ms = None;
        self.video_width = 0;
        self.video_height = 0;
        self.buffering_percent = None;
    }

    /// Engine session for operations that report a missing session as a guard violation.
    pub(crate) fn require_engine(
        &mut self,
        op: &str,
    ) -> Result<&mut (dyn EngineSession + 'static)> {
        match self.engine.as_deref_mut() {
            Some(engine) => Ok(engine),
            None => Err(PlayerError::InvalidOperation(format!(
                "{} called without an engine session",
                op
            ))),
        }
    }

    /// Engine session for operations that report a missing session as `NotInitialized`.
    pub(crate) fn bound_engine(&mut self) -> Result<&mut (dyn EngineSession + 'static)> {
        self.engine.as_deref_mut().ok_or(PlayerError::NotInitialized)
    }

    /// Delegate a lifecycle call to the engine: `target` on success, `Error` on failure.
    pub(crate) fn delegate<F>(&mut self, op: Operation, target: PlayerState, call: F) -> Result<()>
    where
        F: FnOnce(&mut (dyn EngineSession + 'static)) -> Result<()>,
    {
        let engine = self.require_engine(&format!("{:?}", op))?;
        match call(engine) {
            Ok(()) => {
                self.set_state(target);
                Ok(())
            }
            Err(err) => {
                log::error!("{:?} failed in engine: {}", op, err);
                self.set_state(PlayerState::Error);
                Err(err)
            }
        }
    }

    /// Cached duration, fetched from the engine the first time it is positive.
    pub(crate) fn fetch_duration(&mut self) -> Result<i32> {
        self.state.check(Operation::GetDuration)?;
        if let Some(duration) = self.duration_ms.filter(|d| *d > 0) {
            return Ok(duration);
        }
        let duration = self.require_engine("GetDuration")?.get_duration()?;
        if duration > 0 {
            self.duration_ms = Some(duration);
        }
        Ok(duration)
    }

    pub(crate) fn sync_prepare_pending(&self) -> bool {
        self.prepare_waiting.is_some()
    }

    /// Register a synchronous prepare and return the ticket its outcome is filed under.
    pub(crate) fn begin_sync_prepare(&mut self) -> u64 {
        self.prepare_tickets += 1;
        self.prepare_waiting = Some(self.prepare_tickets);
        self.prepare_tickets
    }

    /// Drop a prepare the engine refused before anyone waited on it.
    pub(crate) fn abandon_sync_prepare(&mut self, ticket: u64) {
        if self.prepare_waiting == Some(ticket) {
            self.prepare_waiting = None;
        }
    }

    /// Outcome filed for `ticket`, once it has been resolved.
    pub(crate) fn take_sync_prepare_result(&mut self, ticket: u64) -> Option<Result<()>> {
        self.prepare_results.remove(&ticket)
    }

    /// Resolve the waiting synchronous prepare. Returns false if none was waiting.
    pub(crate) fn finish_sync_prepare(&mut self, status: Result<()>, prepared: &Condvar) -> bool {
        let Some(ticket) = self.prepare_waiting.take() else {
            return false;
        };
        log::debug!("Releasing synchronous prepare #{}: {:?}", ticket, status);
        self.prepare_results.insert(ticket, status);
        prepared.notify_all();
        true
    }

    pub(crate) fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
            seek_pending: self.seek_target_ms.is_some(),
            volume_left: self.volume_left,
            volume_right: self.volume_right,
            looping: self.looping,
            stream_type: self.stream_type,
            audio_session_id: self.audio_session_id,
            buffering_percent: self.buffering_percent,
        }
    }
}

/// Tear down a session that has already been detached from the controller.
/// Must be called without the state lock held.
pub(crate) fn release_engine(mut engine: Box<dyn EngineSession>) -> Result<()> {
    let handle = engine.handle();
    let result = engine.reset();
    if let Err(err) = &result {
        log::warn!("Engine session {:?} reset failed: {}", handle, err);
    }
    engine.disconnect();
    log::info!("Engine session {:?} released", handle);
    result
}
