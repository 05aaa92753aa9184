// Call journal and fault points

use podium_mediaplayer_core::{SessionHandle, VideoSurface};
use std::collections::BTreeMap;

/// One call made by the controller into a loopback session.
///
/// Pure queries (position, video size, `is_playing`) are not journaled;
/// `GetDuration` is, so callers can verify that the duration is cached.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetDataSourceUri {
        uri: String,
        headers: BTreeMap<String, String>,
    },
    SetDataSourceFd {
        fd: i32,
        offset: i64,
        length: i64,
    },
    SetListener,
    Prepare,
    PrepareAsync,
    Start,
    Stop,
    Pause,
    SeekTo(i32),
    GetDuration,
    SetVolume(f32, f32),
    SetLooping(bool),
    SetAudioStreamType(i32),
    SetMetadataFilter {
        allow: Vec<String>,
        block: Vec<String>,
    },
    GetMetadata,
    SetVideoSurface(Option<VideoSurface>),
    SetNextSession(Option<SessionHandle>),
    Reset,
    Disconnect,
}

/// Places where a failure can be injected with `LoopbackEngine::fail_on`.
/// A fault stays armed until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    CreateSession,
    SetDataSource,
    Prepare,
    PrepareAsync,
    Start,
    Stop,
    Pause,
    SeekTo,
    GetDuration,
    GetPosition,
    VideoSize,
    Reset,
}

impl EngineCall {
    pub fn fault_point(&self) -> Option<FaultPoint> {
        match self {
            EngineCall::SetDataSourceUri { .. } | EngineCall::SetDataSourceFd { .. } => {
                Some(FaultPoint::SetDataSource)
            }
            EngineCall::Prepare => Some(FaultPoint::Prepare),
            EngineCall::PrepareAsync => Some(FaultPoint::PrepareAsync),
            EngineCall::Start => Some(FaultPoint::Start),
            EngineCall::Stop => Some(FaultPoint::Stop),
            EngineCall::Pause => Some(FaultPoint::Pause),
            EngineCall::SeekTo(_) => Some(FaultPoint::SeekTo),
            EngineCall::GetDuration => Some(FaultPoint::GetDuration),
            EngineCall::Reset => Some(FaultPoint::Reset),
            _ => None,
        }
    }
}
