// Loopback engine session

use crate::journal::{EngineCall, FaultPoint};
use crate::worker::Worker;
use crate::{Bench, Delivery, LoopbackConfig};
use parking_lot::Mutex;
use podium_mediaplayer_core::{
    EngineSession, EventSink, MessageKind, Metadata, PlayerError, PlayerEvent, Result,
    SessionHandle, VideoSurface,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A session that plays nothing: it journals every call, honours injected
/// faults and answers with the configured media properties.
pub struct LoopbackSession {
    handle: SessionHandle,
    config: LoopbackConfig,
    bench: Arc<Mutex<Bench>>,
    sink: Option<Arc<dyn EventSink>>,
    worker: Option<Worker>,
    source: Option<String>,
    position_ms: i32,
    allow: Vec<String>,
    block: Vec<String>,
}

impl LoopbackSession {
    pub(crate) fn new(
        handle: SessionHandle,
        config: LoopbackConfig,
        bench: Arc<Mutex<Bench>>,
    ) -> Result<Self> {
        let worker = match config.delivery {
            Delivery::Worker => Some(Worker::spawn(format!("loopback-notify-{}", handle.0))?),
            Delivery::Manual => None,
        };
        Ok(Self {
            handle,
            config,
            bench,
            sink: None,
            worker,
            source: None,
            position_ms: 0,
            allow: Vec::new(),
            block: Vec::new(),
        })
    }

    /// Journal `call` and fail if its fault point is armed.
    fn record(&self, call: EngineCall) -> Result<()> {
        let point = call.fault_point();
        let mut bench = self.bench.lock();
        bench.journal.push((self.handle, call));
        match point {
            Some(point) => bench.check_fault(point),
            None => Ok(()),
        }
    }

    fn queue(&self, kind: MessageKind, ext1: i32, ext2: i32) {
        let event = PlayerEvent::new(kind, ext1, ext2).with_origin(self.handle.0 as i32);
        match &self.worker {
            Some(worker) => match &self.sink {
                Some(sink) => worker.send(sink.clone(), event),
                None => log::debug!("{:?} queued with no listener, dropped", kind),
            },
            None => self.bench.lock().pending.push_back((self.handle, event)),
        }
    }

    fn set_playing(&self, playing: bool) {
        self.bench.lock().playing.insert(self.handle, playing);
    }

    fn announce_prepared(&self) {
        if !self.config.auto_prepare {
            return;
        }
        if self.config.video_width > 0 && self.config.video_height > 0 {
            self.queue(
                MessageKind::VideoSizeChanged,
                self.config.video_width,
                self.config.video_height,
            );
        }
        self.queue(MessageKind::Prepared, 0, 0);
    }

    fn filtered(&self, key: &str) -> bool {
        let allowed = self.allow.is_empty() || self.allow.iter().any(|k| k == key);
        allowed && !self.block.iter().any(|k| k == key)
    }
}

impl EngineSession for LoopbackSession {
    fn handle(&self) -> SessionHandle {
        self.handle
    }

    fn set_data_source_uri(&mut self, uri: &str, headers: &BTreeMap<String, String>) -> Result<()> {
        self.record(EngineCall::SetDataSourceUri {
            uri: uri.to_string(),
            headers: headers.clone(),
        })?;
        self.source = Some(uri.to_string());
        Ok(())
    }

    fn set_data_source_fd(&mut self, fd: i32, offset: i64, length: i64) -> Result<()> {
        self.record(EngineCall::SetDataSourceFd { fd, offset, length })?;
        self.source = Some(format!("fd:{}@{}+{}", fd, offset, length));
        Ok(())
    }

    fn set_listener(&mut self, sink: Arc<dyn EventSink>) {
        let _ = self.record(EngineCall::SetListener);
        self.bench.lock().sinks.insert(self.handle, sink.clone());
        self.sink = Some(sink);
    }

    fn prepare(&mut self) -> Result<()> {
        self.record(EngineCall::Prepare)?;
        self.announce_prepared();
        Ok(())
    }

    fn prepare_async(&mut self) -> Result<()> {
        self.record(EngineCall::PrepareAsync)?;
        self.announce_prepared();
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.record(EngineCall::Start)?;
        self.set_playing(true);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.record(EngineCall::Stop)?;
        self.set_playing(false);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.record(EngineCall::Pause)?;
        self.set_playing(false);
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.bench
            .lock()
            .playing
            .get(&self.handle)
            .copied()
            .unwrap_or(false)
    }

    fn seek_to(&mut self, msec: i32) -> Result<()> {
        self.record(EngineCall::SeekTo(msec))?;
        self.position_ms = msec;
        if self.config.auto_seek_complete {
            self.queue(MessageKind::SeekComplete, 0, 0);
        }
        Ok(())
    }

    fn get_duration(&self) -> Result<i32> {
        self.record(EngineCall::GetDuration)?;
        Ok(self.config.duration_ms)
    }

    fn get_current_position(&self) -> Result<i32> {
        self.bench.lock().check_fault(FaultPoint::GetPosition)?;
        Ok(self.position_ms)
    }

    fn get_video_width(&self) -> Result<i32> {
        self.bench.lock().check_fault(FaultPoint::VideoSize)?;
        Ok(self.config.video_width)
    }

    fn get_video_height(&self) -> Result<i32> {
        self.bench.lock().check_fault(FaultPoint::VideoSize)?;
        Ok(self.config.video_height)
    }

    fn set_volume(&mut self, left: f32, right: f32) -> Result<()> {
        self.record(EngineCall::SetVolume(left, right))
    }

    fn set_looping(&mut self, looping: bool) -> Result<()> {
        self.record(EngineCall::SetLooping(looping))
    }

    fn set_audio_stream_type(&mut self, stream_type: i32) -> Result<()> {
        self.record(EngineCall::SetAudioStreamType(stream_type))
    }

    fn set_metadata_filter(&mut self, allow: &[String], block: &[String]) -> Result<()> {
        self.record(EngineCall::SetMetadataFilter {
            allow: allow.to_vec(),
            block: block.to_vec(),
        })?;
        self.allow = allow.to_vec();
        self.block = block.to_vec();
        Ok(())
    }

    /// `update_only` limits the result to keys that change during playback.
    fn get_metadata(&self, update_only: bool, apply_filter: bool) -> Result<Metadata> {
        self.record(EngineCall::GetMetadata)?;
        let mut metadata = Metadata::new();
        metadata.insert("position".to_string(), self.position_ms.to_string());
        if !update_only {
            if let Some(source) = &self.source {
                metadata.insert("source".to_string(), source.clone());
            }
            metadata.insert("duration".to_string(), self.config.duration_ms.to_string());
        }
        if apply_filter {
            metadata.retain(|key, _| self.filtered(key));
        }
        Ok(metadata)
    }

    fn set_video_surface(&mut self, surface: Option<VideoSurface>) -> Result<()> {
        self.record(EngineCall::SetVideoSurface(surface))
    }

    fn set_next_session(&mut self, next: Option<SessionHandle>) -> Result<()> {
        if next == Some(self.handle) {
            return Err(PlayerError::BadValue(
                "session chained to itself".to_string(),
            ));
        }
        self.record(EngineCall::SetNextSession(next))
    }

    fn reset(&mut self) -> Result<()> {
        self.record(EngineCall::Reset)?;
        self.set_playing(false);
        self.position_ms = 0;
        Ok(())
    }

    fn disconnect(&mut self) {
        let _ = self.record(EngineCall::Disconnect);
        {
            let mut bench = self.bench.lock();
            bench.sinks.remove(&self.handle);
            bench.playing.remove(&self.handle);
        }
        self.sink = None;
        // Joins the notification thread unless we are running on it
        self.worker.take();
        log::debug!("Loopback session {:?} disconnected", self.handle);
    }
}
