// Cross-thread behaviour of the media player against the loopback engine

use podium_engine_loopback::{EngineCall, LoopbackConfig, LoopbackEngine};
use podium_mediaplayer::{
    DataSource, MediaPlayer, MessageKind, PlayerError, PlayerEvent, PlayerListener, PlayerState,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Barrier, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(5);

fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn setup(config: LoopbackConfig) -> (Arc<MediaPlayer>, LoopbackEngine) {
    init_test_logging();
    let engine = LoopbackEngine::new(config);
    let player = Arc::new(MediaPlayer::new(Arc::new(engine.clone())));
    (player, engine)
}

fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(1));
    }
}

/// Forwards every event to a channel.
struct ChannelListener {
    tx: Mutex<Sender<PlayerEvent>>,
}

impl PlayerListener for ChannelListener {
    fn on_event(&self, event: PlayerEvent) {
        let _ = self.tx.lock().unwrap().send(event);
    }
}

#[test]
fn listener_deliveries_never_overlap() {
    struct OverlapDetector {
        inside: AtomicBool,
        overlaps: AtomicUsize,
        delivered: AtomicUsize,
    }

    impl PlayerListener for OverlapDetector {
        fn on_event(&self, _event: PlayerEvent) {
            if self.inside.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_micros(200));
            self.inside.store(false, Ordering::SeqCst);
            self.delivered.fetch_add(1, Ordering::SeqCst);
        }
    }

    let (player, engine) = setup(LoopbackConfig::manual());
    let detector = Arc::new(OverlapDetector {
        inside: AtomicBool::new(false),
        overlaps: AtomicUsize::new(0),
        delivered: AtomicUsize::new(0),
    });
    let listener: Arc<dyn PlayerListener> = detector.clone();
    player.set_listener(Some(&listener));
    player.set_data_source(DataSource::uri("file:///a.mp3")).unwrap();

    const THREADS: usize = 4;
    const PER_THREAD: usize = 25;
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let engine = engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for n in 0..PER_THREAD {
                    engine.emit(MessageKind::BufferingUpdate, (i * PER_THREAD + n) as i32 % 100, 0);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(detector.delivered.load(Ordering::SeqCst), THREADS * PER_THREAD);
    assert_eq!(detector.overlaps.load(Ordering::SeqCst), 0);
    assert_eq!(player.state(), PlayerState::Initialized);
}

#[test]
fn listener_may_call_back_into_player() {
    struct Reentrant {
        player: Weak<MediaPlayer>,
        tx: Mutex<Sender<(MessageKind, Result<i32, PlayerError>)>>,
        reseeked: AtomicBool,
    }

    impl PlayerListener for Reentrant {
        fn on_event(&self, event: PlayerEvent) {
            let Some(player) = self.player.upgrade() else {
                return;
            };
            if event.kind == MessageKind::SeekComplete && !self.reseeked.swap(true, Ordering::SeqCst) {
                player.seek_to(4000).unwrap();
            }
            let position = player.current_position();
            let _ = self.tx.lock().unwrap().send((event.kind, position));
        }
    }

    let (player, engine) = setup(LoopbackConfig::worker().with_duration_ms(10_000));
    let (tx, rx) = mpsc::channel();
    let reentrant = Arc::new(Reentrant {
        player: Arc::downgrade(&player),
        tx: Mutex::new(tx),
        reseeked: AtomicBool::new(false),
    });
    let listener: Arc<dyn PlayerListener> = reentrant.clone();
    player.set_listener(Some(&listener));

    player.set_data_source(DataSource::uri("file:///a.mp3")).unwrap();
    player.prepare().unwrap();
    let (kind, _) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(kind, MessageKind::Prepared);

    player.seek_to(1000).unwrap();
    let (kind, position) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(kind, MessageKind::SeekComplete);
    assert_eq!(position, Ok(4000));

    let (kind, _) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(kind, MessageKind::SeekComplete);
    wait_until("seek to settle", || !player.status().seek_pending);
    assert_eq!(engine.seeks(), vec![1000, 4000]);
    assert_eq!(player.current_position(), Ok(4000));
}

#[test]
fn rapid_seeks_settle_on_latest_target() {
    let (player, engine) = setup(LoopbackConfig::worker().with_duration_ms(60_000));
    player.set_data_source(DataSource::uri("file:///a.mp3")).unwrap();
    player.prepare().unwrap();
    player.start().unwrap();

    for target in (1..=20).map(|n| n * 1000) {
        player.seek_to(target).unwrap();
    }

    wait_until("seeks to settle", || !player.status().seek_pending);
    let seeks = engine.seeks();
    assert_eq!(seeks.last(), Some(&20_000));
    assert!(seeks.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(player.current_position(), Ok(20_000));
    assert_eq!(player.state(), PlayerState::Started);
}

#[test]
fn reset_unblocks_synchronous_prepare() {
    let (player, engine) = setup(LoopbackConfig::manual());
    player.set_data_source(DataSource::uri("file:///a.mp3")).unwrap();

    let waiter = {
        let player = player.clone();
        thread::spawn(move || player.prepare())
    };
    wait_until("prepare to reach the engine", || {
        engine.calls().contains(&EngineCall::Prepare)
    });

    player.reset().unwrap();
    assert!(matches!(
        waiter.join().unwrap(),
        Err(PlayerError::InvalidOperation(_))
    ));
    assert_eq!(player.state(), PlayerState::Idle);
}

#[test]
fn reset_from_notification_thread() {
    struct ResetOnPrepared {
        player: Weak<MediaPlayer>,
        tx: Mutex<Sender<Result<(), PlayerError>>>,
    }

    impl PlayerListener for ResetOnPrepared {
        fn on_event(&self, event: PlayerEvent) {
            if event.kind != MessageKind::Prepared {
                return;
            }
            if let Some(player) = self.player.upgrade() {
                let _ = self.tx.lock().unwrap().send(player.reset());
            }
        }
    }

    let (player, engine) = setup(LoopbackConfig::worker());
    let (tx, rx) = mpsc::channel();
    let listener: Arc<dyn PlayerListener> = Arc::new(ResetOnPrepared {
        player: Arc::downgrade(&player),
        tx: Mutex::new(tx),
    });
    player.set_listener(Some(&listener));
    player.set_data_source(DataSource::uri("file:///a.mp3")).unwrap();
    player.prepare_async().unwrap();

    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Ok(()));
    assert_eq!(player.state(), PlayerState::Idle);
    let disconnects = engine
        .calls()
        .iter()
        .filter(|c| **c == EngineCall::Disconnect)
        .count();
    assert_eq!(disconnects, 1);
}

#[test]
fn concurrent_transport_calls_keep_a_valid_state() {
    let (player, engine) = setup(LoopbackConfig::worker().with_duration_ms(30_000));
    let (tx, rx) = mpsc::channel();
    let listener: Arc<dyn PlayerListener> = Arc::new(ChannelListener { tx: Mutex::new(tx) });
    player.set_listener(Some(&listener));
    player.set_data_source(DataSource::uri("file:///a.mp3")).unwrap();
    player.prepare().unwrap();

    const THREADS: usize = 4;
    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let player = player.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for n in 0..50 {
                    let _ = match (i + n) % 3 {
                        0 => player.start(),
                        1 => player.pause(),
                        _ => player.seek_to((n * 500) as i32),
                    };
                    let _ = player.is_playing();
                    let _ = player.current_position();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    wait_until("seeks to settle", || !player.status().seek_pending);
    assert!(matches!(
        player.state(),
        PlayerState::Started | PlayerState::Paused
    ));
    assert!(rx.try_iter().all(|e| e.kind != MessageKind::Error));

    player.reset().unwrap();
    drop(player);
    let disconnects = engine
        .calls()
        .iter()
        .filter(|c| **c == EngineCall::Disconnect)
        .count();
    assert_eq!(disconnects, 1);
}
