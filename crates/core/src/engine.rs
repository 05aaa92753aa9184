// Decode engine interface consumed by the media player
//
// The engine owns decoding, demuxing and rendering. The controller only sees
// these traits and never assumes anything about the backend behind them.

use crate::callback::EventSink;
use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Metadata key/value pairs as reported by the engine
pub type Metadata = BTreeMap<String, String>;

/// Opaque identity of an engine session, used to chain sessions together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u64);

/// Opaque native video surface (window handle) passed through to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VideoSurface(pub u64);

/// One playback session inside the decode engine.
/// All calls are expected to return promptly; long running work
/// (async prepare, seeking) completes later through the bound [`EventSink`].
pub trait EngineSession: Send {
    /// Identity of this session
    fn handle(&self) -> SessionHandle;

    /// Bind a URI source with optional request headers
    fn set_data_source_uri(&mut self, uri: &str, headers: &BTreeMap<String, String>)
        -> Result<()>;

    /// Bind a file descriptor source
    fn set_data_source_fd(&mut self, fd: i32, offset: i64, length: i64) -> Result<()>;

    /// Install the hook used to post notifications
    fn set_listener(&mut self, sink: Arc<dyn EventSink>);

    /// Prepare synchronously; completion is still signalled with `Prepared` or `Error`
    fn prepare(&mut self) -> Result<()>;

    /// Start preparing; completion is signalled with `Prepared` or `Error`
    fn prepare_async(&mut self) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn is_playing(&self) -> bool;

    /// Seek to `msec`; completion is signalled with `SeekComplete`
    fn seek_to(&mut self, msec: i32) -> Result<()>;

    fn get_duration(&self) -> Result<i32>;

    fn get_current_position(&self) -> Result<i32>;

    fn get_video_width(&self) -> Result<i32>;

    fn get_video_height(&self) -> Result<i32>;

    fn set_volume(&mut self, left: f32, right: f32) -> Result<()>;

    fn set_looping(&mut self, looping: bool) -> Result<()>;

    fn set_audio_stream_type(&mut self, stream_type: i32) -> Result<()>;

    fn set_metadata_filter(&mut self, allow: &[String], block: &[String]) -> Result<()>;

    fn get_metadata(&self, update_only: bool, apply_filter: bool) -> Result<Metadata>;

    fn set_video_surface(&mut self, surface: Option<VideoSurface>) -> Result<()>;

    /// Chain playback into another session once this one completes
    fn set_next_session(&mut self, next: Option<SessionHandle>) -> Result<()>;

    /// Return the engine session to its unconfigured state
    fn reset(&mut self) -> Result<()>;

    /// Release every engine resource. Called exactly once, last. This can run
    /// on the engine's own notification thread when a listener tears the
    /// player down from inside a callback.
    fn disconnect(&mut self);
}

/// Creates engine sessions; one per bound data source.
pub trait SessionFactory: Send + Sync {
    fn create_session(&self) -> Result<Box<dyn EngineSession>>;
}
