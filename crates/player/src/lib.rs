// Podium media player: a thread-safe session controller over an asynchronous
// decode engine

pub mod config;
pub mod controller;
mod dispatch;
pub mod logging;
mod seek;
mod session;

pub use config::{PlayerConfig, DEFAULT_STREAM_TYPE, DEFAULT_VOLUME};
pub use controller::MediaPlayer;
pub use logging::init_logging;

// Re-export the engine-facing types so callers only need this crate
pub use podium_mediaplayer_core::{
    status_of, DataSource, EngineSession, EventSink, Guard, MessageKind, Metadata, Operation,
    PlaybackStatus, PlayerError, PlayerEvent, PlayerListener, PlayerState, Result,
    SessionFactory, SessionHandle, VideoSurface,
};
