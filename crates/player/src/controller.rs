// Media player session controller
//
// Every public entry point takes the state lock, validates the state machine
// and either transitions locally or forwards to the engine session. Engine
// sessions that are replaced or reset are torn down after the lock is released.

use crate::config::{check_unit_range, PlayerConfig};
use crate::dispatch::sink_for;
use crate::logging::init_logging;
use crate::session::{release_engine, Shared};
use podium_mediaplayer_core::{
    DataSource, Guard, Metadata, Operation, PlaybackStatus, PlayerError, PlayerListener,
    PlayerState, Result, SessionFactory, VideoSurface,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Thread-safe playback controller over one engine session at a time.
///
/// Share it between threads with an `Arc`. A listener that wants to call back
/// into the player should hold that `Arc`; the player itself only keeps a
/// weak reference to its listener.
pub struct MediaPlayer {
    shared: Arc<Shared>,
    factory: Arc<dyn SessionFactory>,
}

impl MediaPlayer {
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        init_logging();
        log::info!("MediaPlayer::new");
        Self {
            shared: Arc::new(Shared::new(&PlayerConfig::default())),
            factory,
        }
    }

    pub fn with_config(factory: Arc<dyn SessionFactory>, config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        init_logging();
        log::info!("MediaPlayer::with_config {:?}", config);
        Ok(Self {
            shared: Arc::new(Shared::new(&config)),
            factory,
        })
    }

    // ------------------------------------------------------------------
    // Data source binding & teardown
    // ------------------------------------------------------------------

    /// Bind a new data source. Only valid in `Idle` or `Error`.
    pub fn set_data_source(&self, source: DataSource) -> Result<()> {
        log::info!("set_data_source({})", source.describe());
        source.validate()?;

        // Fail fast before paying for a new engine session
        self.shared.state.lock().state.check(Operation::SetDataSource)?;

        let mut engine = self.factory.create_session()?;
        let bound = match &source {
            DataSource::Uri { uri, headers } => engine.set_data_source_uri(uri, headers),
            DataSource::Descriptor { fd, offset, length } => {
                engine.set_data_source_fd(*fd, *offset, *length)
            }
        };
        if let Err(err) = bound {
            log::error!("Unable to bind {}: {}", source.describe(), err);
            engine.disconnect();
            return Err(err);
        }

        let previous = {
            let mut st = self.shared.state.lock();
            if let Err(err) = st.state.check(Operation::SetDataSource) {
                drop(st);
                engine.disconnect();
                return Err(err);
            }
            st.generation += 1;
            engine.set_listener(sink_for(&self.shared, st.generation));
            st.clear_caches();
            let previous = st.engine.replace(engine);
            st.set_state(PlayerState::Initialized);
            previous
        };

        if let Some(previous) = previous {
            if let Err(err) = release_engine(previous) {
                log::warn!("Previous session teardown reported {}", err);
            }
        }
        Ok(())
    }

    pub fn set_data_source_uri(&self, uri: &str, headers: BTreeMap<String, String>) -> Result<()> {
        self.set_data_source(DataSource::uri_with_headers(uri, headers))
    }

    pub fn set_data_source_fd(&self, fd: i32, offset: i64, length: i64) -> Result<()> {
        self.set_data_source(DataSource::descriptor(fd, offset, length))
    }

    /// Release the engine session and return to `Idle`. Clears looping and all
    /// cached position, duration and seek state.
    pub fn reset(&self) -> Result<()> {
        log::info!("reset");
        let released = {
            let mut st = self.shared.state.lock();
            st.looping = false;
            if st.state == PlayerState::Idle {
                return Ok(());
            }
            // Nothing will ever resolve a waiting prepare once the session is gone
            st.finish_sync_prepare(
                Err(PlayerError::InvalidOperation(
                    "player reset while preparing".to_string(),
                )),
                &self.shared.prepared,
            );
            st.clear_caches();
            st.aux_effect_id = None;
            st.set_state(PlayerState::Idle);
            st.engine.take()
        };

        match released {
            Some(engine) => release_engine(engine),
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Listener
    // ------------------------------------------------------------------

    /// Register (or clear) the listener. Only a weak reference is kept; the
    /// caller owns the listener and must keep it alive.
    pub fn set_listener(&self, listener: Option<&Arc<dyn PlayerListener>>) {
        log::debug!("set_listener({})", listener.is_some());
        self.shared.state.lock().listener = listener.map(Arc::downgrade);
    }

    pub fn listener(&self) -> Option<Arc<dyn PlayerListener>> {
        self.shared
            .state
            .lock()
            .listener
            .as_ref()
            .and_then(|weak| weak.upgrade())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Prepare and block until the engine reports `Prepared` or `Error`.
    pub fn prepare(&self) -> Result<()> {
        log::info!("prepare");
        let mut st = self.shared.state.lock();
        if st.sync_prepare_pending() {
            return Err(PlayerError::AlreadyInProgress);
        }
        st.state.check(Operation::Prepare)?;

        let ticket = st.begin_sync_prepare();
        if let Err(err) = st.delegate(Operation::Prepare, PlayerState::Preparing, |engine| {
            engine.prepare()
        }) {
            st.abandon_sync_prepare(ticket);
            return Err(err);
        }

        // A later prepare may already be pending by the time we wake; only our
        // own ticket ends the wait
        let status = loop {
            if let Some(status) = st.take_sync_prepare_result(ticket) {
                break status;
            }
            self.shared.prepared.wait(&mut st);
        };
        log::info!("prepare complete: {:?}", status);
        status
    }

    /// Start preparing; completion arrives as a `Prepared` or `Error` notification.
    pub fn prepare_async(&self) -> Result<()> {
        log::info!("prepare_async");
        let mut st = self.shared.state.lock();
        st.state.check(Operation::Prepare)?;
        st.delegate(Operation::Prepare, PlayerState::Preparing, |engine| {
            engine.prepare_async()
        })
    }

    pub fn start(&self) -> Result<()> {
        log::info!("start");
        let mut st = self.shared.state.lock();
        if st.state.check(Operation::Start)? == Guard::AlreadySatisfied {
            return Ok(());
        }
        let (looping, left, right) = (st.looping, st.volume_left, st.volume_right);
        st.delegate(Operation::Start, PlayerState::Started, |engine| {
            if let Err(err) = engine.set_looping(looping) {
                log::warn!("Applying looping before start failed: {}", err);
            }
            if let Err(err) = engine.set_volume(left, right) {
                log::warn!("Applying volume before start failed: {}", err);
            }
            engine.start()
        })
    }

    pub fn stop(&self) -> Result<()> {
        log::info!("stop");
        let mut st = self.shared.state.lock();
        if st.state.check(Operation::Stop)? == Guard::AlreadySatisfied {
            return Ok(());
        }
        st.delegate(Operation::Stop, PlayerState::Stopped, |engine| engine.stop())
    }

    pub fn pause(&self) -> Result<()> {
        log::info!("pause");
        let mut st = self.shared.state.lock();
        if st.state.check(Operation::Pause)? == Guard::AlreadySatisfied {
            return Ok(());
        }
        st.delegate(Operation::Pause, PlayerState::Paused, |engine| engine.pause())
    }

    /// Seek to `msec`. Requests made while a seek is outstanding are coalesced.
    pub fn seek_to(&self, msec: i32) -> Result<()> {
        log::debug!("seek_to({})", msec);
        self.shared.state.lock().seek_locked(msec)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn state(&self) -> PlayerState {
        self.shared.state.lock().state
    }

    /// Snapshot of the cached fields; never contacts the engine.
    pub fn status(&self) -> PlaybackStatus {
        self.shared.state.lock().status()
    }

    /// Ask the engine whether it is rendering. A `Started` player whose engine
    /// says otherwise is corrected to `Paused`.
    pub fn is_playing(&self) -> bool {
        let mut st = self.shared.state.lock();
        let playing = match st.engine.as_deref() {
            Some(engine) => engine.is_playing(),
            None => return false,
        };
        if st.state == PlayerState::Started && !playing {
            log::warn!("Internal/external state mismatch corrected");
            st.set_state(PlayerState::Paused);
        }
        playing
    }

    /// Latest requested seek target while a seek is unsettled, the engine's
    /// position otherwise.
    pub fn current_position(&self) -> Result<i32> {
        let mut st = self.shared.state.lock();
        let cached = st.position_ms;
        let engine = st.require_engine("GetCurrentPosition")?;
        match cached {
            Some(position) => Ok(position),
            None => engine.get_current_position(),
        }
    }

    pub fn duration(&self) -> Result<i32> {
        self.shared.state.lock().fetch_duration()
    }

    pub fn video_width(&self) -> Result<i32> {
        let mut st = self.shared.state.lock();
        let cached = st.video_width;
        let engine = st.require_engine("GetVideoWidth")?;
        Ok(engine.get_video_width().unwrap_or_else(|err| {
            log::debug!("Video width unavailable from engine: {}", err);
            cached
        }))
    }

    pub fn video_height(&self) -> Result<i32> {
        let mut st = self.shared.state.lock();
        let cached = st.video_height;
        let engine = st.require_engine("GetVideoHeight")?;
        Ok(engine.get_video_height().unwrap_or_else(|err| {
            log::debug!("Video height unavailable from engine: {}", err);
            cached
        }))
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Rejected once the engine has been prepared.
    pub fn set_audio_stream_type(&self, stream_type: i32) -> Result<()> {
        log::debug!("set_audio_stream_type({})", stream_type);
        let mut st = self.shared.state.lock();
        if st.stream_type == stream_type {
            return Ok(());
        }
        st.state.check(Operation::SetAudioStreamType)?;
        st.stream_type = stream_type;
        match st.engine.as_deref_mut() {
            Some(engine) => engine.set_audio_stream_type(stream_type),
            None => Ok(()),
        }
    }

    pub fn set_looping(&self, looping: bool) -> Result<()> {
        log::debug!("set_looping({})", looping);
        let mut st = self.shared.state.lock();
        st.looping = looping;
        match st.engine.as_deref_mut() {
            Some(engine) => engine.set_looping(looping),
            None => Ok(()),
        }
    }

    pub fn is_looping(&self) -> bool {
        let st = self.shared.state.lock();
        st.engine.is_some() && st.looping
    }

    pub fn set_volume(&self, left: f32, right: f32) -> Result<()> {
        log::debug!("set_volume({}, {})", left, right);
        check_unit_range("left volume", left)?;
        check_unit_range("right volume", right)?;
        let mut st = self.shared.state.lock();
        st.volume_left = left;
        st.volume_right = right;
        match st.engine.as_deref_mut() {
            Some(engine) => engine.set_volume(left, right),
            None => Ok(()),
        }
    }

    /// Only valid in `Idle`.
    pub fn set_audio_session_id(&self, session_id: i32) -> Result<()> {
        log::debug!("set_audio_session_id({})", session_id);
        let mut st = self.shared.state.lock();
        st.state.check(Operation::SetAudioSessionId)?;
        if session_id < 0 {
            return Err(PlayerError::BadValue(format!(
                "audio session id {} is negative",
                session_id
            )));
        }
        st.audio_session_id = session_id;
        Ok(())
    }

    pub fn audio_session_id(&self) -> i32 {
        self.shared.state.lock().audio_session_id
    }

    pub fn set_aux_effect_send_level(&self, level: f32) -> Result<()> {
        log::debug!("set_aux_effect_send_level({})", level);
        check_unit_range("aux effect send level", level)?;
        self.shared.state.lock().aux_send_level = level;
        Ok(())
    }

    pub fn aux_effect_send_level(&self) -> f32 {
        self.shared.state.lock().aux_send_level
    }

    pub fn attach_aux_effect(&self, effect_id: i32) -> Result<()> {
        log::debug!("attach_aux_effect({})", effect_id);
        let mut st = self.shared.state.lock();
        st.require_engine("AttachAuxEffect")?;
        st.state.check(Operation::AttachAuxEffect)?;
        st.aux_effect_id = Some(effect_id);
        Ok(())
    }

    pub fn attached_aux_effect(&self) -> Option<i32> {
        self.shared.state.lock().aux_effect_id
    }

    pub fn set_metadata_filter(&self, allow: &[String], block: &[String]) -> Result<()> {
        let mut st = self.shared.state.lock();
        st.bound_engine()?.set_metadata_filter(allow, block)
    }

    pub fn metadata(&self, update_only: bool, apply_filter: bool) -> Result<Metadata> {
        let mut st = self.shared.state.lock();
        st.bound_engine()?.get_metadata(update_only, apply_filter)
    }

    pub fn set_video_surface(&self, surface: Option<VideoSurface>) -> Result<()> {
        let mut st = self.shared.state.lock();
        st.bound_engine()?.set_video_surface(surface)
    }

    /// Chain `next` to start once this player completes; `None` clears the chain.
    pub fn set_next_media_player(&self, next: Option<&MediaPlayer>) -> Result<()> {
        // Read the other player's session before taking our own lock so the
        // two state locks are never held together
        let next_handle = match next {
            None => None,
            Some(next) if Arc::ptr_eq(&next.shared, &self.shared) => {
                return Err(PlayerError::BadValue(
                    "a player cannot be chained to itself".to_string(),
                ));
            }
            Some(next) => match next.shared.state.lock().engine.as_deref() {
                Some(engine) => Some(engine.handle()),
                None => {
                    return Err(PlayerError::BadValue(
                        "next player has no data source".to_string(),
                    ))
                }
            },
        };

        let mut st = self.shared.state.lock();
        st.bound_engine()?.set_next_session(next_handle)
    }
}

impl Drop for MediaPlayer {
    fn drop(&mut self) {
        let released = {
            let mut st = self.shared.state.lock();
            st.clear_caches();
            st.set_state(PlayerState::Idle);
            st.engine.take()
        };
        if let Some(engine) = released {
            if let Err(err) = release_engine(engine) {
                log::warn!("Teardown on drop reported {}", err);
            }
        }
    }
}
