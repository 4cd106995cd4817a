//! Session lifecycle coordinator
//!
//! Owns the ordered start → run → stop → cleanup sequence: builds the
//! canvas and protocol-server surface, starts the capture backend, drives
//! the bounded event loop, and tears everything down in an order that
//! never races a free against a live writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::canvas::{FrameBuffers, Rect};
use crate::capture::{FrameSink, FrameSource, PollCapture, PushCapture};
use crate::config::{CaptureMode, Config};
use crate::error::{CaptureError, RelayError};
use crate::input::InputTranslator;
use crate::ports::{DisplayServer, InputPort, PixelLayout, ServerEvent, SessionPorts};
use crate::relay::{RelayPipeline, RelayStats};

/// Coordination flags shared between the event-loop thread and any thread
/// requesting shutdown.
#[derive(Default)]
pub struct LifecycleFlags {
    stop_requested: AtomicBool,
    stopped: AtomicBool,
    has_client: AtomicBool,
}

impl LifecycleFlags {
    /// Ask the event loop to exit at its next iteration.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// True once a stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// True once the event loop has exited and the capture drained.
    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// True while at least one viewer is attached (sampled per iteration).
    pub fn has_client(&self) -> bool {
        self.has_client.load(Ordering::SeqCst)
    }

    fn set_stopped(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn set_has_client(&self, value: bool) {
        self.has_client.store(value, Ordering::SeqCst);
    }
}

/// Cloneable handle for observing and stopping a running session from
/// another thread.
#[derive(Clone)]
pub struct SessionHandle {
    flags: Arc<LifecycleFlags>,
}

impl SessionHandle {
    /// Request a cooperative stop.
    pub fn request_stop(&self) {
        self.flags.request_stop();
    }

    /// True once the session's run has fully wound down.
    pub fn stopped(&self) -> bool {
        self.flags.stopped()
    }

    /// True while a viewer is attached.
    pub fn has_client(&self) -> bool {
        self.flags.has_client()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Finished,
    CleanedUp,
}

/// A capture backend that has been started, for symmetric teardown.
enum StartedSource {
    Push(Box<dyn PushCapture>),
    Poll(thread::JoinHandle<()>),
}

/// One screen-mirroring session: canvas, pipeline, event loop.
pub struct Session {
    config: Config,
    server: Arc<dyn DisplayServer>,
    injector: Arc<dyn InputPort>,
    buffers: Option<Arc<FrameBuffers>>,
    pipeline: Option<Arc<Mutex<RelayPipeline>>>,
    source: Option<FrameSource>,
    flags: Arc<LifecycleFlags>,
    state: State,
}

impl Session {
    /// Build a session from the collaborator table and resolved options.
    ///
    /// Performs every fatal-init step: logging setup, screen-size query,
    /// canvas allocation, protocol-server canvas construction, credential
    /// registration, capture-backend selection. On failure everything
    /// built so far is dropped before returning.
    pub fn init(ports: SessionPorts, config: Config) -> Result<Self, RelayError> {
        config.validate()?;

        let level = if config.verbose { "debug" } else { "info" };
        let _ = env_logger::Builder::new()
            .parse_filters(&std::env::var("MIRROR_LOG").unwrap_or_else(|_| level.to_string()))
            .try_init();

        let (width, height) = ports
            .metrics
            .screen_size()
            .map_err(|e| RelayError::FatalInit(e.to_string()))?;
        info!(
            "mirroring display {} at {}x{}",
            ports.metrics.display_name(),
            width,
            height
        );

        let buffers = Arc::new(FrameBuffers::new(width, height)?);

        ports
            .server
            .open_canvas(width, height, PixelLayout::RGBA8888)
            .map_err(|e| RelayError::FatalInit(e.to_string()))?;
        if !config.credentials.is_empty() {
            ports
                .server
                .set_credentials(&config.credentials)
                .map_err(|e| RelayError::FatalInit(e.to_string()))?;
        }

        let mut capture = ports.capture;
        let source = match config.capture_mode {
            CaptureMode::Stream => capture.stream.take().map(FrameSource::Push),
            CaptureMode::Pixel => capture.pixel.take().map(FrameSource::Push),
            CaptureMode::Png => capture.snapshot.take().map(FrameSource::Poll),
        }
        .ok_or(CaptureError::MissingBackend(config.capture_mode.as_str()))
        .map_err(|e| RelayError::FatalInit(e.to_string()))?;

        let pipeline = Arc::new(Mutex::new(RelayPipeline::new(
            &config,
            Arc::clone(&buffers),
            Arc::clone(&ports.server),
        )));

        // The first frame viewers see must be a full update.
        ports.server.mark_dirty(Rect::full(width, height));

        Ok(Self {
            config,
            server: ports.server,
            injector: ports.injector,
            buffers: Some(buffers),
            pipeline: Some(pipeline),
            source: Some(source),
            flags: Arc::new(LifecycleFlags::default()),
            state: State::Idle,
        })
    }

    /// Handle for stopping this session from another thread.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            flags: Arc::clone(&self.flags),
        }
    }

    /// Frame accounting from the current or most recent run.
    pub fn stats(&self) -> RelayStats {
        self.pipeline
            .as_ref()
            .map(|p| p.lock().stats().clone())
            .unwrap_or_default()
    }

    /// Run the session until shutdown completes.
    ///
    /// Starts the capture backend, drives the protocol server's bounded
    /// event-processing loop until a stop is observed, then stops capture,
    /// waits out the grace delay and releases server resources. Blocks the
    /// calling thread for the whole session.
    pub fn run(&mut self) -> Result<(), RelayError> {
        if self.state != State::Idle {
            return Err(RelayError::Precondition("session already ran"));
        }
        let source = self
            .source
            .take()
            .ok_or(RelayError::Precondition("capture session already active"))?;
        let buffers = self
            .buffers
            .clone()
            .ok_or(RelayError::Precondition("session cleaned up"))?;
        let pipeline = self
            .pipeline
            .clone()
            .ok_or(RelayError::Precondition("session cleaned up"))?;

        pipeline.lock().reset();
        let mut translator = InputTranslator::new();

        let started = match source {
            FrameSource::Push(mut push) => {
                push.start(self.frame_sink(&pipeline))?;
                info!("push capture started");
                StartedSource::Push(push)
            }
            FrameSource::Poll(poll) => {
                let handle = self.spawn_poll_thread(poll, &pipeline)?;
                StartedSource::Poll(handle)
            }
        };

        info!("event loop running");
        let io_wait = Duration::from_millis(self.config.io_wait_ms);
        let loop_result = loop {
            if self.flags.stop_requested() {
                info!("stop observed, leaving event loop");
                break Ok(());
            }

            let connected = self.server.client_count() > 0;
            self.flags.set_has_client(connected);

            // Hold the front read-lock only while someone is reading.
            let events = if connected {
                let front = buffers.front();
                self.server.process_io(Some(front.bytes()), io_wait)
            } else {
                self.server.process_io(None, io_wait)
            };

            match events {
                Ok(events) => {
                    for event in events {
                        self.handle_event(&mut translator, event);
                    }
                }
                Err(e) => {
                    error!("event processing failed: {e}");
                    self.flags.request_stop();
                    break Err(RelayError::Server(e));
                }
            }
        };

        let stop_result = match started {
            StartedSource::Push(mut push) => push.stop().map_err(RelayError::Capture),
            StartedSource::Poll(handle) => {
                // The poll thread observes the stop flag at its next
                // iteration.
                handle.join().map_err(|_| {
                    RelayError::Capture(CaptureError::Backend("capture thread panicked".into()))
                })
            }
        };

        // Let queued capture callbacks drain before anything is released.
        let grace = Duration::from_millis(self.config.stop_grace_ms);
        if !grace.is_zero() {
            thread::sleep(grace);
        }

        self.server.shutdown();
        self.flags.set_stopped();
        self.state = State::Finished;

        let stats = self.stats();
        info!(
            "session stopped: {} frames seen, {} published, {} paced out, {} unchanged, {} decode failures",
            stats.frames_seen,
            stats.frames_published,
            stats.frames_paced_out,
            stats.frames_unchanged,
            stats.frames_decode_failed
        );

        loop_result.and(stop_result)
    }

    /// Free the canvas buffers and pipeline state.
    ///
    /// Rejected unless a stop was requested and the run fully wound down;
    /// cleaning up a live pipeline would race a free against an active
    /// writer.
    pub fn cleanup(&mut self) -> Result<(), RelayError> {
        if !self.flags.stop_requested() || !self.flags.stopped() {
            return Err(RelayError::Precondition(
                "cleanup requires stop requested and observed",
            ));
        }
        self.pipeline = None;
        self.buffers = None;
        self.source = None;
        self.state = State::CleanedUp;
        info!("session cleaned up");
        Ok(())
    }

    fn frame_sink(&self, pipeline: &Arc<Mutex<RelayPipeline>>) -> FrameSink {
        let pipeline = Arc::clone(pipeline);
        let flags = Arc::clone(&self.flags);
        Box::new(move |payload| {
            // Frames still in flight after a stop request are dropped
            // during the grace drain.
            if flags.stop_requested() {
                return;
            }
            pipeline.lock().submit(payload, Instant::now());
        })
    }

    fn spawn_poll_thread(
        &self,
        mut source: Box<dyn PollCapture>,
        pipeline: &Arc<Mutex<RelayPipeline>>,
    ) -> Result<thread::JoinHandle<()>, RelayError> {
        let pipeline = Arc::clone(pipeline);
        let flags = Arc::clone(&self.flags);
        let interval = Duration::from_micros(1_000_000 / u64::from(self.config.fps.max(1)));

        thread::Builder::new()
            .name("mirror-capture".into())
            .spawn(move || {
                if let Err(e) = source.prepare() {
                    error!("capture prepare failed: {e}");
                    return;
                }
                info!("snapshot capture loop started");
                while !flags.stop_requested() {
                    let start = Instant::now();
                    match source.next_frame() {
                        Ok(payload) => pipeline.lock().submit(payload, Instant::now()),
                        Err(e) => {
                            error!("capture failed: {e}");
                            break;
                        }
                    }
                    let elapsed = start.elapsed();
                    debug!(
                        "snapshot frame time {:.3} ms",
                        elapsed.as_secs_f64() * 1000.0
                    );
                    if elapsed < interval {
                        thread::sleep(interval - elapsed);
                    }
                }
                info!("snapshot capture loop stopped");
            })
            .map_err(|e| RelayError::Capture(CaptureError::Backend(e.to_string())))
    }

    fn handle_event(&self, translator: &mut InputTranslator, event: ServerEvent) {
        match event {
            ServerEvent::Pointer { mask, x, y } => {
                for command in translator.pointer_sample(mask, x, y) {
                    // A failed click must not take the viewer down.
                    if let Err(e) = self.injector.touch(command) {
                        warn!("{e}");
                    }
                }
            }
            ServerEvent::Key { keysym, down } => {
                if translator.key_sample(keysym, down) {
                    info!("shutdown hotkey received");
                    self.flags.request_stop();
                }
            }
            ServerEvent::ClientConnected => info!("viewer connected"),
            ServerEvent::ClientDisconnected => info!("viewer disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureBackends, FramePayload};
    use crate::error::{InjectionError, MetricsError, ServerError};
    use crate::input::{TouchAction, TouchCommand};
    use crate::ports::ScreenMetrics;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    struct MockMetrics;

    impl ScreenMetrics for MockMetrics {
        fn screen_size(&self) -> Result<(u32, u32), MetricsError> {
            Ok((16, 16))
        }

        fn display_name(&self) -> String {
            "mock-display".into()
        }
    }

    #[derive(Default)]
    struct ScriptedServer {
        batches: Mutex<VecDeque<Vec<ServerEvent>>>,
        clients: AtomicUsize,
        dirty: Mutex<Vec<Rect>>,
        shutdowns: AtomicUsize,
    }

    impl ScriptedServer {
        fn script(batches: Vec<Vec<ServerEvent>>) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(batches.into()),
                ..Self::default()
            })
        }
    }

    impl DisplayServer for ScriptedServer {
        fn open_canvas(&self, _: u32, _: u32, _: PixelLayout) -> Result<(), ServerError> {
            Ok(())
        }

        fn set_credentials(&self, _: &[String]) -> Result<(), ServerError> {
            Ok(())
        }

        fn client_count(&self) -> usize {
            self.clients.load(Ordering::SeqCst)
        }

        fn mark_dirty(&self, rect: Rect) {
            self.dirty.lock().push(rect);
        }

        fn process_io(
            &self,
            _front: Option<&[u8]>,
            _timeout: Duration,
        ) -> Result<Vec<ServerEvent>, ServerError> {
            thread::sleep(Duration::from_millis(1));
            Ok(self.batches.lock().pop_front().unwrap_or_default())
        }

        fn shutdown(&self) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordingInjector {
        commands: Mutex<Vec<TouchCommand>>,
    }

    impl InputPort for RecordingInjector {
        fn touch(&self, command: TouchCommand) -> Result<(), InjectionError> {
            self.commands.lock().push(command);
            Ok(())
        }
    }

    /// Push backend that parks its sink in a shared slot so tests can
    /// drive frames, counting stops for idempotence checks.
    #[derive(Default)]
    struct SharedSinkPush {
        sink: Arc<Mutex<Option<FrameSink>>>,
        stops: Arc<AtomicUsize>,
    }

    impl PushCapture for SharedSinkPush {
        fn start(&mut self, sink: FrameSink) -> Result<(), CaptureError> {
            *self.sink.lock() = Some(sink);
            Ok(())
        }

        fn stop(&mut self) -> Result<(), CaptureError> {
            self.sink.lock().take();
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct CountingPoll {
        produced: Arc<AtomicUsize>,
    }

    impl PollCapture for CountingPoll {
        fn next_frame(&mut self) -> Result<FramePayload, CaptureError> {
            let n = self.produced.fetch_add(1, Ordering::SeqCst);
            Ok(FramePayload::Raw {
                data: vec![n as u8; 16 * 16 * 4],
                width: 16,
                height: 16,
                components: 4,
            })
        }
    }

    fn test_config() -> Config {
        Config {
            io_wait_ms: 5,
            stop_grace_ms: 0,
            ..Config::default()
        }
    }

    fn ports(server: Arc<ScriptedServer>, capture: CaptureBackends) -> SessionPorts {
        SessionPorts {
            metrics: Box::new(MockMetrics),
            server,
            injector: Arc::new(RecordingInjector::default()),
            capture,
        }
    }

    fn hotkey_batches() -> Vec<Vec<ServerEvent>> {
        vec![
            vec![ServerEvent::Key { keysym: 0xFFE3, down: true }],
            vec![ServerEvent::Key { keysym: 0x71, down: true }],
        ]
    }

    #[test]
    fn init_fails_without_a_backend_for_the_mode() {
        let server = ScriptedServer::script(Vec::new());
        let result = Session::init(ports(server, CaptureBackends::default()), test_config());
        assert!(matches!(result, Err(RelayError::FatalInit(_))));
    }

    #[test]
    fn init_marks_the_full_canvas_dirty() {
        let server = ScriptedServer::script(Vec::new());
        let capture = CaptureBackends {
            stream: Some(Box::new(SharedSinkPush::default())),
            ..CaptureBackends::default()
        };
        let _session = Session::init(ports(Arc::clone(&server), capture), test_config()).unwrap();
        assert_eq!(server.dirty.lock().as_slice(), &[Rect::full(16, 16)]);
    }

    #[test]
    fn hotkey_stops_the_run_and_releases_the_server() {
        let server = ScriptedServer::script(hotkey_batches());
        let push = SharedSinkPush::default();
        let stops = Arc::clone(&push.stops);
        let capture = CaptureBackends {
            stream: Some(Box::new(push)),
            ..CaptureBackends::default()
        };
        let mut session =
            Session::init(ports(Arc::clone(&server), capture), test_config()).unwrap();

        session.run().unwrap();

        assert!(session.handle().stopped());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(server.shutdowns.load(Ordering::SeqCst), 1);
        assert!(session.cleanup().is_ok());
    }

    #[test]
    fn pointer_events_are_translated_and_injected() {
        let mut batches = vec![
            vec![ServerEvent::Pointer { mask: 1, x: 5, y: 5 }],
            vec![ServerEvent::Pointer { mask: 0, x: 6, y: 5 }],
        ];
        batches.extend(hotkey_batches());
        let server = ScriptedServer::script(batches);
        let capture = CaptureBackends {
            stream: Some(Box::new(SharedSinkPush::default())),
            ..CaptureBackends::default()
        };
        let injector = Arc::new(RecordingInjector::default());
        let injector_port: Arc<dyn InputPort> = injector.clone();
        let mut session = Session::init(
            SessionPorts {
                metrics: Box::new(MockMetrics),
                server,
                injector: injector_port,
                capture,
            },
            test_config(),
        )
        .unwrap();

        session.run().unwrap();

        let commands = injector.commands.lock();
        assert_eq!(
            commands.as_slice(),
            &[
                TouchCommand { action: TouchAction::Down, x: 5, y: 5 },
                TouchCommand { action: TouchAction::Move, x: 5, y: 5 },
                TouchCommand { action: TouchAction::Up, x: 6, y: 5 },
                TouchCommand { action: TouchAction::Move, x: 6, y: 5 },
            ]
        );
    }

    #[test]
    fn pushed_frames_reach_the_front_buffer() {
        let server = ScriptedServer::script(Vec::new());
        let push = SharedSinkPush::default();
        let sink_slot = Arc::clone(&push.sink);
        let capture = CaptureBackends {
            stream: Some(Box::new(push)),
            ..CaptureBackends::default()
        };
        let mut config = test_config();
        config.fps = 250;
        let mut session =
            Session::init(ports(Arc::clone(&server), capture), config).unwrap();
        let handle = session.handle();

        let pusher = thread::spawn(move || {
            // wait for run() to install the sink
            loop {
                if sink_slot.lock().is_some() {
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
            for fill in [0x10u8, 0x20, 0x30] {
                if let Some(sink) = sink_slot.lock().as_mut() {
                    sink(FramePayload::Raw {
                        data: vec![fill; 16 * 16 * 4],
                        width: 16,
                        height: 16,
                        components: 4,
                    });
                }
                thread::sleep(Duration::from_millis(10));
            }
            handle.request_stop();
        });

        session.run().unwrap();
        pusher.join().unwrap();

        let stats = session.stats();
        assert!(stats.frames_seen == 3);
        assert!(stats.frames_published >= 1);
        // init's full mark plus at least one published frame
        assert!(server.dirty.lock().len() >= 2);
    }

    #[test]
    fn poll_source_feeds_the_pipeline() {
        let server = ScriptedServer::script(Vec::new());
        let produced = Arc::new(AtomicUsize::new(0));
        let capture = CaptureBackends {
            snapshot: Some(Box::new(CountingPoll {
                produced: Arc::clone(&produced),
            })),
            ..CaptureBackends::default()
        };
        let mut config = test_config();
        config.capture_mode = CaptureMode::Png;
        config.fps = 100;
        let mut session =
            Session::init(ports(Arc::clone(&server), capture), config).unwrap();
        let handle = session.handle();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(80));
            handle.request_stop();
        });

        session.run().unwrap();
        stopper.join().unwrap();

        assert!(produced.load(Ordering::SeqCst) >= 2);
        assert!(session.stats().frames_published >= 1);
    }

    #[test]
    fn cleanup_before_stop_is_a_precondition_failure() {
        let server = ScriptedServer::script(Vec::new());
        let capture = CaptureBackends {
            stream: Some(Box::new(SharedSinkPush::default())),
            ..CaptureBackends::default()
        };
        let mut session = Session::init(ports(server, capture), test_config()).unwrap();

        assert!(matches!(
            session.cleanup(),
            Err(RelayError::Precondition(_))
        ));

        // stop requested but never observed by a run: still rejected
        session.handle().request_stop();
        assert!(matches!(
            session.cleanup(),
            Err(RelayError::Precondition(_))
        ));
    }

    #[test]
    fn second_run_is_rejected() {
        let server = ScriptedServer::script(hotkey_batches());
        let capture = CaptureBackends {
            stream: Some(Box::new(SharedSinkPush::default())),
            ..CaptureBackends::default()
        };
        let mut session = Session::init(ports(server, capture), test_config()).unwrap();

        session.run().unwrap();
        assert!(matches!(
            session.run(),
            Err(RelayError::Precondition(_))
        ));
    }
}
