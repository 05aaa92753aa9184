// Seek coalescing
//
// At most one seek is outstanding at the engine. Requests arriving while one
// is in flight only move `position_ms`; the completion handler chases the
// latest target until the engine has settled on it.

use crate::session::SessionState;
use podium_mediaplayer_core::{Operation, PlayerState, Result};

impl SessionState {
    /// Clamp a seek target to [0, duration] when the duration is known.
    pub(crate) fn clamp_seek(&self, msec: i32) -> i32 {
        if msec < 0 {
            log::debug!("Seek to negative position {} clamped to 0", msec);
            return 0;
        }
        match self.duration_ms {
            Some(duration) if duration > 0 && msec > duration => {
                log::debug!("Seek past end ({} > {}) clamped", msec, duration);
                duration
            }
            _ => msec,
        }
    }

    /// Must be called with the state lock held.
    pub(crate) fn seek_locked(&mut self, msec: i32) -> Result<()> {
        self.state.check(Operation::SeekTo)?;
        self.require_engine("SeekTo")?;

        let target = self.clamp_seek(msec);
        self.position_ms = Some(target);

        if let Some(in_flight) = self.seek_target_ms {
            log::debug!("Seek to {} in progress, queued {}", in_flight, target);
            return Ok(());
        }

        // Refresh the duration so later requests clamp against real data
        if let Err(err) = self.fetch_duration() {
            log::debug!("Duration unavailable before seek: {}", err);
        }

        self.seek_target_ms = Some(target);
        let result = self.require_engine("SeekTo")?.seek_to(target);
        if let Err(err) = &result {
            log::error!("Seek to {} failed in engine: {}", target, err);
            self.seek_target_ms = None;
            self.position_ms = None;
            self.set_state(PlayerState::Error);
        }
        result
    }

    /// Handle `SeekComplete` from the engine.
    pub(crate) fn on_seek_complete(&mut self) {
        match (self.seek_target_ms, self.position_ms) {
            (Some(done), Some(latest)) if done != latest => {
                log::debug!("Seek to {} complete, chasing queued target {}", done, latest);
                self.seek_target_ms = None;
                if let Err(err) = self.seek_locked(latest) {
                    log::warn!("Queued seek to {} dropped: {}", latest, err);
                    self.position_ms = None;
                }
            }
            _ => {
                log::debug!("All seeks complete");
                self.seek_target_ms = None;
                self.position_ms = None;
            }
        }
    }
}
