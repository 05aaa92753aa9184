// Error handling and status codes for the media player

use std::fmt;

/// Status code returned for a successful call
pub const OK: i32 = 0;
/// Guard violation: the operation is not valid in the current state
pub const INVALID_OPERATION: i32 = -38;
/// No engine session is bound
pub const NO_INIT: i32 = -19;
/// Parameter outside its domain
pub const BAD_VALUE: i32 = -22;
/// A synchronous prepare is already waiting
pub const ALREADY_IN_PROGRESS: i32 = -114;
/// Engine reported a failure without a usable code
pub const UNKNOWN_ERROR: i32 = i32::MIN;

/// Media player error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// The state machine does not allow the operation right now
    InvalidOperation(String),

    /// No engine session is bound where one is required
    NotInitialized,

    /// Parameter out of domain
    BadValue(String),

    /// Synchronous prepare re-entered while one is pending
    AlreadyInProgress,

    /// Status propagated verbatim from the engine
    EngineFailure(i32),
}

impl PlayerError {
    /// Status code for this error.
    pub fn status(&self) -> i32 {
        match self {
            PlayerError::InvalidOperation(_) => INVALID_OPERATION,
            PlayerError::NotInitialized => NO_INIT,
            PlayerError::BadValue(_) => BAD_VALUE,
            PlayerError::AlreadyInProgress => ALREADY_IN_PROGRESS,
            // An engine failure must never read as success
            PlayerError::EngineFailure(OK) => UNKNOWN_ERROR,
            PlayerError::EngineFailure(code) => *code,
        }
    }

    /// Inverse of [`PlayerError::status`] for codes coming back from an engine.
    /// Returns `None` for `OK`.
    pub fn from_status(code: i32) -> Option<Self> {
        match code {
            OK => None,
            NO_INIT => Some(PlayerError::NotInitialized),
            ALREADY_IN_PROGRESS => Some(PlayerError::AlreadyInProgress),
            code => Some(PlayerError::EngineFailure(code)),
        }
    }

    pub fn is_engine_failure(&self) -> bool {
        matches!(self, PlayerError::EngineFailure(_))
    }
}

impl fmt::Display for PlayerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PlayerError::InvalidOperation(msg) => write!(f, "Invalid operation: {}", msg),
            PlayerError::NotInitialized => write!(f, "No engine session bound"),
            PlayerError::BadValue(msg) => write!(f, "Bad value: {}", msg),
            PlayerError::AlreadyInProgress => write!(f, "Synchronous prepare already in progress"),
            PlayerError::EngineFailure(code) => write!(f, "Engine failure (status {})", code),
        }
    }
}

impl std::error::Error for PlayerError {}

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Collapse a result into the status code seen by callers across a C-style boundary.
pub fn status_of<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => OK,
        Err(err) => err.status(),
    }
}
