// Core types and traits for the Podium media player

pub mod callback;
pub mod engine;
pub mod error;
pub mod source;
pub mod state;

// Re-export commonly used types
pub use callback::{EventSink, MessageKind, PlayerEvent, PlayerListener};
pub use engine::{EngineSession, Metadata, SessionFactory, SessionHandle, VideoSurface};
pub use error::{status_of, PlayerError, Result};
pub use source::DataSource;
pub use state::{Guard, Operation, PlaybackStatus, PlayerState};
