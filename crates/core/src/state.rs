// Playback state machine and transition guards

use crate::error::{PlayerError, Result};

/// Player lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlayerState {
    /// No data source bound (initial state)
    #[default]
    Idle,
    /// Data source bound, not prepared yet
    Initialized,
    /// Asynchronous prepare requested
    Preparing,
    /// Ready to start
    Prepared,
    /// Playback running
    Started,
    /// Playback paused
    Paused,
    /// Playback stopped, needs a new prepare before starting
    Stopped,
    /// End of media reached while not looping
    PlaybackComplete,
    /// Engine failure; sticky until reset or a new data source
    Error,
}

/// Caller-driven operations subject to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SetDataSource,
    Prepare,
    Start,
    Stop,
    Pause,
    SeekTo,
    GetDuration,
    SetAudioStreamType,
    SetAudioSessionId,
    AttachAuxEffect,
}

/// Outcome of checking an operation against the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Perform the operation
    Proceed,
    /// The requested state already holds; succeed without touching the engine
    AlreadySatisfied,
    /// Reject with `InvalidOperation`
    Reject,
}

impl PlayerState {
    /// Look up `op` in the transition table.
    pub fn guard(self, op: Operation) -> Guard {
        use Operation::*;
        use PlayerState::*;

        match (op, self) {
            (SetDataSource, Idle | Error) => Guard::Proceed,

            (Prepare, Initialized | Stopped) => Guard::Proceed,

            (Start, Started) => Guard::AlreadySatisfied,
            (Start, Prepared | PlaybackComplete | Paused) => Guard::Proceed,

            (Stop, Stopped) => Guard::AlreadySatisfied,
            (Stop, Started | Prepared | Paused | PlaybackComplete) => Guard::Proceed,

            (Pause, Paused | PlaybackComplete) => Guard::AlreadySatisfied,
            (Pause, Started) => Guard::Proceed,

            (SeekTo, Started | Prepared | Paused | PlaybackComplete) => Guard::Proceed,

            (GetDuration, Prepared | Started | Paused | Stopped | PlaybackComplete) => {
                Guard::Proceed
            }

            // The stream type can't change once the engine has been prepared
            (SetAudioStreamType, Prepared | Started | Paused | PlaybackComplete) => Guard::Reject,
            (SetAudioStreamType, _) => Guard::Proceed,

            (SetAudioSessionId, Idle) => Guard::Proceed,

            (AttachAuxEffect, Idle | Error) => Guard::Reject,
            (AttachAuxEffect, _) => Guard::Proceed,

            _ => Guard::Reject,
        }
    }

    /// Like [`PlayerState::guard`], turning a rejection into `InvalidOperation`.
    pub fn check(self, op: Operation) -> Result<Guard> {
        match self.guard(op) {
            Guard::Reject => {
                log::warn!("{:?} called in state {:?}", op, self);
                Err(PlayerError::InvalidOperation(format!(
                    "{:?} called in state {:?}",
                    op, self
                )))
            }
            guard => Ok(guard),
        }
    }

    /// Stable numeric code, matching the order of the variants.
    pub fn code(self) -> i32 {
        match self {
            PlayerState::Idle => 0,
            PlayerState::Initialized => 1,
            PlayerState::Preparing => 2,
            PlayerState::Prepared => 3,
            PlayerState::Started => 4,
            PlayerState::Paused => 5,
            PlayerState::Stopped => 6,
            PlayerState::PlaybackComplete => 7,
            PlayerState::Error => 8,
        }
    }
}

/// Snapshot of the controller's cached fields
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackStatus {
    pub state: PlayerState,
    /// Last requested seek target, if a seek is in flight or unsettled
    pub position_ms: Option<i32>,
    /// Cached duration, once fetched from the engine
    pub duration_ms: Option<i32>,
    /// Whether a seek is outstanding at the engine
    pub seek_pending: bool,
    pub volume_left: f32,
    pub volume_right: f32,
    pub looping: bool,
    pub stream_type: i32,
    pub audio_session_id: i32,
    /// Last value reported by a buffering update (percent)
    pub buffering_percent: Option<i32>,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: PlayerState::Idle,
            position_ms: None,
            duration_ms: None,
            seek_pending: false,
            volume_left: 1.0,
            volume_right: 1.0,
            looping: false,
            stream_type: 3,
            audio_session_id: 0,
            buffering_percent: None,
        }
    }
}
