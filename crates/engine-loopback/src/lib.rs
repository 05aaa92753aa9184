// Loopback engine for the Podium media player
//
// Implements the engine traits without decoding anything. Every call is
// journaled, faults can be armed per call site, and notifications are either
// held until the test delivers them or posted from a per-session thread.

mod journal;
mod session;
mod worker;

pub use journal::{EngineCall, FaultPoint};
pub use session::LoopbackSession;

use parking_lot::Mutex;
use podium_mediaplayer_core::{
    EngineSession, EventSink, MessageKind, PlayerError, PlayerEvent, Result, SessionFactory,
    SessionHandle,
};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// How queued notifications reach the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Held in a queue until [`LoopbackEngine::deliver_pending`] is called
    Manual,
    /// Posted from a notification thread owned by each session
    Worker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopbackConfig {
    pub delivery: Delivery,
    /// Reported by `get_duration`; 0 means unknown
    pub duration_ms: i32,
    pub video_width: i32,
    pub video_height: i32,
    /// Queue `Prepared` whenever a prepare call succeeds
    pub auto_prepare: bool,
    /// Queue `SeekComplete` whenever a seek call succeeds
    pub auto_seek_complete: bool,
}

impl LoopbackConfig {
    /// Nothing is announced on its own; the test emits every notification.
    pub fn manual() -> Self {
        Self {
            delivery: Delivery::Manual,
            duration_ms: 0,
            video_width: 0,
            video_height: 0,
            auto_prepare: false,
            auto_seek_complete: false,
        }
    }

    /// Behaves like a live engine: completions arrive on another thread.
    pub fn worker() -> Self {
        Self {
            delivery: Delivery::Worker,
            auto_prepare: true,
            auto_seek_complete: true,
            ..Self::manual()
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: i32) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_video_size(mut self, width: i32, height: i32) -> Self {
        self.video_width = width;
        self.video_height = height;
        self
    }

    pub fn with_auto_prepare(mut self, enabled: bool) -> Self {
        self.auto_prepare = enabled;
        self
    }

    pub fn with_auto_seek_complete(mut self, enabled: bool) -> Self {
        self.auto_seek_complete = enabled;
        self
    }
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self::manual()
    }
}

/// State shared by the engine handle and all of its sessions.
/// Never held while posting to a sink.
#[derive(Default)]
pub(crate) struct Bench {
    pub(crate) journal: Vec<(SessionHandle, EngineCall)>,
    pub(crate) faults: HashMap<FaultPoint, i32>,
    pub(crate) pending: VecDeque<(SessionHandle, PlayerEvent)>,
    pub(crate) sinks: HashMap<SessionHandle, Arc<dyn EventSink>>,
    pub(crate) playing: HashMap<SessionHandle, bool>,
    pub(crate) latest: Option<SessionHandle>,
    pub(crate) created: usize,
}

impl Bench {
    pub(crate) fn check_fault(&self, point: FaultPoint) -> Result<()> {
        match self.faults.get(&point) {
            Some(code) => {
                log::debug!("Injected fault {:?} -> {}", point, code);
                Err(PlayerError::EngineFailure(*code))
            }
            None => Ok(()),
        }
    }
}

/// Session factory and test handle. Clones share the same journal.
#[derive(Clone)]
pub struct LoopbackEngine {
    config: LoopbackConfig,
    bench: Arc<Mutex<Bench>>,
}

impl LoopbackEngine {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            bench: Arc::new(Mutex::new(Bench::default())),
        }
    }

    pub fn config(&self) -> &LoopbackConfig {
        &self.config
    }

    /// Every journaled call across all sessions, oldest first.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.bench
            .lock()
            .journal
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn calls_for(&self, handle: SessionHandle) -> Vec<EngineCall> {
        self.bench
            .lock()
            .journal
            .iter()
            .filter(|(h, _)| *h == handle)
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Targets of every seek the engine was asked to perform.
    pub fn seeks(&self) -> Vec<i32> {
        self.bench
            .lock()
            .journal
            .iter()
            .filter_map(|(_, call)| match call {
                EngineCall::SeekTo(msec) => Some(*msec),
                _ => None,
            })
            .collect()
    }

    /// Forget journaled calls, and queued events of sessions that have
    /// disconnected. Long-lived embedders call this to bound the journal.
    pub fn clear_journal(&self) {
        let mut bench = self.bench.lock();
        bench.journal.clear();
        let Bench { pending, sinks, .. } = &mut *bench;
        pending.retain(|(handle, _)| sinks.contains_key(handle));
    }

    pub fn fail_on(&self, point: FaultPoint, code: i32) {
        self.bench.lock().faults.insert(point, code);
    }

    pub fn clear_fault(&self, point: FaultPoint) {
        self.bench.lock().faults.remove(&point);
    }

    pub fn latest_session(&self) -> Option<SessionHandle> {
        self.bench.lock().latest
    }

    pub fn sessions_created(&self) -> usize {
        self.bench.lock().created
    }

    /// Sink the controller bound into `handle`, while it is connected.
    pub fn sink_of(&self, handle: SessionHandle) -> Option<Arc<dyn EventSink>> {
        self.bench.lock().sinks.get(&handle).cloned()
    }

    /// Override what `is_playing` reports for a connected session.
    pub fn set_playing(&self, handle: SessionHandle, playing: bool) {
        let mut bench = self.bench.lock();
        if bench.sinks.contains_key(&handle) {
            bench.playing.insert(handle, playing);
        }
    }

    /// Post an event to the latest session's controller on the calling thread.
    /// Returns false when that session has no connected listener.
    pub fn emit(&self, kind: MessageKind, ext1: i32, ext2: i32) -> bool {
        let Some(handle) = self.latest_session() else {
            return false;
        };
        self.emit_to(handle, PlayerEvent::new(kind, ext1, ext2))
    }

    pub fn emit_to(&self, handle: SessionHandle, event: PlayerEvent) -> bool {
        let sink = self.sink_of(handle);
        match sink {
            Some(sink) => {
                sink.post(event.with_origin(handle.0 as i32));
                true
            }
            None => false,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.bench.lock().pending.len()
    }

    /// Post every queued notification in order. Events for sessions that
    /// have since disconnected are discarded. Returns the number posted.
    pub fn deliver_pending(&self) -> usize {
        let mut posted = 0;
        loop {
            let next = {
                let mut bench = self.bench.lock();
                match bench.pending.pop_front() {
                    Some((handle, event)) => Some((bench.sinks.get(&handle).cloned(), event)),
                    None => None,
                }
            };
            match next {
                Some((Some(sink), event)) => {
                    sink.post(event);
                    posted += 1;
                }
                Some((None, event)) => log::debug!("{:?} for disconnected session dropped", event.kind),
                None => return posted,
            }
        }
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new(LoopbackConfig::default())
    }
}

impl SessionFactory for LoopbackEngine {
    fn create_session(&self) -> Result<Box<dyn EngineSession>> {
        let handle = {
            let mut bench = self.bench.lock();
            bench.check_fault(FaultPoint::CreateSession)?;
            bench.created += 1;
            let handle = SessionHandle(bench.created as u64);
            bench.latest = Some(handle);
            handle
        };
        log::debug!("Loopback session {:?} created", handle);
        let session = LoopbackSession::new(handle, self.config.clone(), self.bench.clone())?;
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn init_test_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    struct RecordingSink {
        events: Mutex<Vec<PlayerEvent>>,
    }

    impl EventSink for RecordingSink {
        fn post(&self, event: PlayerEvent) {
            self.events.lock().push(event);
        }
    }

    fn recording_sink() -> Arc<RecordingSink> {
        Arc::new(RecordingSink {
            events: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_calls_are_journaled_per_session() {
        init_test_logging();
        let engine = LoopbackEngine::default();
        let mut first = engine.create_session().unwrap();
        let mut second = engine.create_session().unwrap();

        first.set_data_source_fd(3, 0, 100).unwrap();
        second.start().unwrap();
        first.seek_to(250).unwrap();

        assert_eq!(engine.sessions_created(), 2);
        assert_eq!(engine.latest_session(), Some(second.handle()));
        assert_eq!(
            engine.calls_for(first.handle()),
            vec![
                EngineCall::SetDataSourceFd {
                    fd: 3,
                    offset: 0,
                    length: 100
                },
                EngineCall::SeekTo(250),
            ]
        );
        assert_eq!(engine.calls_for(second.handle()), vec![EngineCall::Start]);
        assert_eq!(engine.seeks(), vec![250]);
        assert!(second.is_playing());
        assert!(!first.is_playing());
    }

    #[test]
    fn test_faults_stay_armed_until_cleared() {
        init_test_logging();
        let engine = LoopbackEngine::default();
        engine.fail_on(FaultPoint::CreateSession, -12);
        assert_eq!(
            engine.create_session().err(),
            Some(PlayerError::EngineFailure(-12))
        );
        assert_eq!(engine.sessions_created(), 0);
        engine.clear_fault(FaultPoint::CreateSession);

        let mut session = engine.create_session().unwrap();
        engine.fail_on(FaultPoint::Start, -38);
        assert_eq!(session.start(), Err(PlayerError::EngineFailure(-38)));
        assert_eq!(session.start(), Err(PlayerError::EngineFailure(-38)));
        engine.clear_fault(FaultPoint::Start);
        assert_eq!(session.start(), Ok(()));
    }

    #[test]
    fn test_manual_delivery_waits_for_the_test() {
        init_test_logging();
        let engine = LoopbackEngine::new(
            LoopbackConfig::manual()
                .with_auto_prepare(true)
                .with_auto_seek_complete(true)
                .with_video_size(320, 240),
        );
        let sink = recording_sink();
        let mut session = engine.create_session().unwrap();
        session.set_listener(sink.clone());

        session.prepare_async().unwrap();
        session.seek_to(10).unwrap();
        assert!(sink.events.lock().is_empty());
        assert_eq!(engine.pending_len(), 3);

        assert_eq!(engine.deliver_pending(), 3);
        let kinds: Vec<MessageKind> = sink.events.lock().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::VideoSizeChanged,
                MessageKind::Prepared,
                MessageKind::SeekComplete,
            ]
        );
        assert_eq!(engine.pending_len(), 0);
    }

    #[test]
    fn test_disconnect_drops_sink_and_pending_events() {
        init_test_logging();
        let engine = LoopbackEngine::new(LoopbackConfig::manual().with_auto_prepare(true));
        let sink = recording_sink();
        let mut session = engine.create_session().unwrap();
        let handle = session.handle();
        session.set_listener(sink.clone());
        session.prepare().unwrap();

        session.disconnect();

        assert!(engine.sink_of(handle).is_none());
        assert!(!engine.emit(MessageKind::Info, 1, 0));
        assert_eq!(engine.deliver_pending(), 0);
        assert!(sink.events.lock().is_empty());
        assert_eq!(engine.calls_for(handle).last(), Some(&EngineCall::Disconnect));
    }

    #[test]
    fn test_worker_delivery_posts_from_another_thread() {
        init_test_logging();
        struct ChannelSink(std::sync::Mutex<mpsc::Sender<(PlayerEvent, Option<String>)>>);

        impl EventSink for ChannelSink {
            fn post(&self, event: PlayerEvent) {
                let name = std::thread::current().name().map(str::to_string);
                let _ = self.0.lock().unwrap().send((event, name));
            }
        }

        let engine = LoopbackEngine::new(LoopbackConfig::worker());
        let (tx, rx) = mpsc::channel();
        let mut session = engine.create_session().unwrap();
        session.set_listener(Arc::new(ChannelSink(std::sync::Mutex::new(tx))));

        session.prepare_async().unwrap();
        let (event, thread) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.kind, MessageKind::Prepared);
        assert_eq!(event.origin, session.handle().0 as i32);
        assert_eq!(thread.as_deref(), Some("loopback-notify-1"));

        session.seek_to(40).unwrap();
        let (event, _) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.kind, MessageKind::SeekComplete);

        session.disconnect();
        assert_eq!(engine.pending_len(), 0);
    }

    #[test]
    fn test_clear_journal_keeps_live_sessions() {
        init_test_logging();
        let engine = LoopbackEngine::new(LoopbackConfig::manual().with_auto_prepare(true));
        let sink = recording_sink();
        let mut gone = engine.create_session().unwrap();
        gone.set_listener(sink.clone());
        gone.prepare().unwrap();
        gone.disconnect();
        engine.set_playing(gone.handle(), true);

        let mut live = engine.create_session().unwrap();
        live.set_listener(sink.clone());
        live.prepare().unwrap();
        assert_eq!(engine.pending_len(), 2);

        engine.clear_journal();

        assert!(engine.calls().is_empty());
        assert_eq!(engine.pending_len(), 1);
        assert!(!gone.is_playing());
        assert_eq!(engine.deliver_pending(), 1);
        assert_eq!(sink.events.lock()[0].origin, live.handle().0 as i32);

        live.start().unwrap();
        assert_eq!(engine.calls(), vec![EngineCall::Start]);
    }

    #[test]
    fn test_metadata_filters() {
        init_test_logging();
        let engine = LoopbackEngine::new(LoopbackConfig::manual().with_duration_ms(9000));
        let mut session = engine.create_session().unwrap();
        session
            .set_data_source_uri("http://host/a.mp3", &Default::default())
            .unwrap();

        let all = session.get_metadata(false, false).unwrap();
        assert_eq!(all.get("source").map(String::as_str), Some("http://host/a.mp3"));
        assert_eq!(all.get("duration").map(String::as_str), Some("9000"));

        let updates = session.get_metadata(true, false).unwrap();
        assert_eq!(updates.keys().collect::<Vec<_>>(), vec!["position"]);

        session
            .set_metadata_filter(&["duration".to_string(), "source".to_string()], &["source".to_string()])
            .unwrap();
        let filtered = session.get_metadata(false, true).unwrap();
        assert_eq!(filtered.keys().collect::<Vec<_>>(), vec!["duration"]);
    }
}
