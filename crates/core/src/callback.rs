// Notification types shared by engines, the dispatcher and listeners

/// Message kinds posted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Interface test message
    Nop,
    Prepared,
    PlaybackComplete,
    /// ext1 carries the buffered percentage
    BufferingUpdate,
    SeekComplete,
    /// ext1 = width, ext2 = height
    VideoSizeChanged,
    /// ext1 = framework error code, ext2 = implementation specific code
    Error,
    /// ext1 = info code, ext2 = implementation specific extra
    Info,
    /// Anything the controller does not understand
    Unknown(i32),
}

impl MessageKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => MessageKind::Nop,
            1 => MessageKind::Prepared,
            2 => MessageKind::PlaybackComplete,
            3 => MessageKind::BufferingUpdate,
            4 => MessageKind::SeekComplete,
            5 => MessageKind::VideoSizeChanged,
            100 => MessageKind::Error,
            200 => MessageKind::Info,
            other => MessageKind::Unknown(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            MessageKind::Nop => 0,
            MessageKind::Prepared => 1,
            MessageKind::PlaybackComplete => 2,
            MessageKind::BufferingUpdate => 3,
            MessageKind::SeekComplete => 4,
            MessageKind::VideoSizeChanged => 5,
            MessageKind::Error => 100,
            MessageKind::Info => 200,
            MessageKind::Unknown(code) => code,
        }
    }
}

/// A single notification as posted by the engine and forwarded to the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerEvent {
    pub kind: MessageKind,
    pub ext1: i32,
    pub ext2: i32,
    /// Opaque tag identifying where the event originated (engine thread id, etc.)
    pub origin: i32,
}

impl PlayerEvent {
    pub fn new(kind: MessageKind, ext1: i32, ext2: i32) -> Self {
        Self {
            kind,
            ext1,
            ext2,
            origin: 0,
        }
    }

    pub fn with_origin(mut self, origin: i32) -> Self {
        self.origin = origin;
        self
    }
}

/// Listener registered on a media player.
///
/// Deliveries never overlap, and the player's state lock is not held while
/// `on_event` runs, so implementations may call back into the player.
pub trait PlayerListener: Send + Sync {
    fn on_event(&self, event: PlayerEvent);
}

impl<F> PlayerListener for F
where
    F: Fn(PlayerEvent) + Send + Sync,
{
    fn on_event(&self, event: PlayerEvent) {
        self(event)
    }
}

/// Hook handed to an engine session so it can post notifications back to
/// the controller that owns it. Engines may call `post` from any thread, but
/// never from inside a call the controller made into the engine.
pub trait EventSink: Send + Sync {
    fn post(&self, event: PlayerEvent);
}
