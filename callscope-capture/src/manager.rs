//! Capture manager: owns sources and sinks, runs the capture thread and routes
//! every packet to the session store and then to each sink.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use callscope_config::CaptureConfig;
use callscope_core::Packet;
use callscope_telemetry::{EventLogger, MetricsRecorder};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::CaptureError;
use crate::event_loop::{EventLoop, Step};
use crate::sink::CaptureSink;
use crate::source::{CaptureMode, CaptureSource, SourceContext, SourcePoll};
use crate::status::SourceSummary;
use crate::store::SessionStore;

const CAPTURE_THREAD_NAME: &str = "capture";

struct SourceEntry {
    source: Box<dyn CaptureSource>,
    /// Set once the source reported it is exhausted or failed.
    finished: Arc<AtomicBool>,
}

/// What status reads need to know about a source, kept outside the
/// dispatch lock.
struct SourceStatus {
    mode: CaptureMode,
    finished: Arc<AtomicBool>,
}

#[derive(Default)]
struct CaptureState {
    sources: Vec<SourceEntry>,
    sinks: Vec<Box<dyn CaptureSink>>,
    stopped: bool,
}

/// `state` is held by the capture thread for a whole step, including store
/// and sink calls. Everything the controller reads lives outside it.
struct Shared {
    state: Mutex<CaptureState>,
    statuses: RwLock<Vec<SourceStatus>>,
    filter: Mutex<Option<String>>,
    keyfile: RwLock<Option<Arc<Path>>>,
    paused: AtomicBool,
    tls_server: Option<SocketAddr>,
    store: Arc<dyn SessionStore>,
    metrics: MetricsRecorder,
}

impl Shared {
    /// One pass over every live source. Runs on the capture thread.
    fn step(&self) -> Step {
        let mut guard = self.state.lock();
        if guard.stopped {
            return Step::Quit;
        }

        let state = &mut *guard;
        let keyfile = self.keyfile.read().clone();
        let ctx = SourceContext {
            paused: self.paused.load(Ordering::Relaxed),
            tls_server: self.tls_server,
            keyfile: keyfile.as_deref(),
        };

        let mut produced = false;
        for entry in state
            .sources
            .iter_mut()
            .filter(|entry| !entry.finished.load(Ordering::Acquire))
        {
            match entry.source.poll(&ctx) {
                Ok(SourcePoll::Packet(packet)) => {
                    produced = true;
                    self.dispatch_locked(&mut state.sinks, Arc::new(packet));
                }
                Ok(SourcePoll::Idle) => {}
                Ok(SourcePoll::Finished) => {
                    debug!(source = entry.source.name(), "Capture source finished");
                    entry.finished.store(true, Ordering::Release);
                }
                Err(e) => {
                    warn!(source = entry.source.name(), "Capture source failed: {e}");
                    entry.finished.store(true, Ordering::Release);
                }
            }
        }

        if produced {
            Step::Busy
        } else {
            Step::Idle
        }
    }

    fn dispatch_locked(&self, sinks: &mut [Box<dyn CaptureSink>], packet: Arc<Packet>) {
        trace!(len = packet.len(), "Dispatching packet");
        self.store.process_packet(Arc::clone(&packet));
        self.metrics.inc_packets_dispatched();

        let started = Instant::now();
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.write(&packet) {
                warn!(sink = sink.name(), "Sink write failed: {e}");
            }
        }
        self.metrics
            .sink_write_latency
            .observe(started.elapsed().as_nanos() as f64);
    }

    fn summary(&self) -> SourceSummary {
        let mut summary = SourceSummary::default();
        for status in self.statuses.read().iter() {
            if status.mode.is_offline() {
                summary.offline += 1;
                if !status.finished.load(Ordering::Acquire) {
                    summary.loading += 1;
                }
            } else {
                summary.online += 1;
            }
        }
        summary
    }
}

/// Owns the capture sources and sinks and the thread that drives them.
///
/// Build one per process and pass it by reference. Configuration calls and
/// status reads may come from any thread; sources, the store and sinks are
/// only ever invoked from the capture thread, in registration order.
pub struct CaptureManager {
    shared: Arc<Shared>,
    event_loop: EventLoop,
}

impl CaptureManager {
    pub fn new(
        config: &CaptureConfig,
        store: Arc<dyn SessionStore>,
        metrics: MetricsRecorder,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CaptureState::default()),
                statuses: RwLock::new(Vec::new()),
                filter: Mutex::new(None),
                keyfile: RwLock::new(config.keyfile.as_deref().map(Arc::from)),
                paused: AtomicBool::new(false),
                tls_server: config.tls_server,
                store,
                metrics,
            }),
            event_loop: EventLoop::new(Duration::from_millis(u64::from(config.poll_timeout_ms))),
        }
    }

    /// Spawns the capture thread and returns immediately.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.shared.state.lock().stopped {
            return Err(CaptureError::AlreadyStarted);
        }

        let shared = Arc::clone(&self.shared);
        self.event_loop
            .spawn(CAPTURE_THREAD_NAME, move || shared.step())?;

        EventLogger::log_event(
            "capture_started",
            &[("sources", self.sources_count().to_string())],
        );
        Ok(())
    }

    /// Closes every sink, stops the capture thread and waits for it to exit.
    ///
    /// Once this returns no packet reaches the store or a sink again. A sink
    /// whose `close` blocks keeps this call blocked as well.
    #[instrument(skip(self))]
    pub fn stop(&mut self) {
        let first_stop = {
            let mut state = self.shared.state.lock();
            if state.stopped {
                false
            } else {
                for sink in state.sinks.iter_mut() {
                    if let Err(e) = sink.close() {
                        warn!(sink = sink.name(), "Failed to close sink: {e}");
                    }
                }
                state.stopped = true;
                true
            }
        };

        self.event_loop.quit();
        self.event_loop.join();

        if first_stop {
            EventLogger::log_event(
                "capture_stopped",
                &[(
                    "packets",
                    self.shared.metrics.packets_dispatched.get().to_string(),
                )],
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.event_loop.is_running()
    }

    /// Applies `filter` to every source in registration order.
    ///
    /// The expression is only remembered when all sources accept it. Sources
    /// that accepted it before a rejection keep it; nothing is rolled back.
    #[instrument(skip(self))]
    pub fn set_filter(&self, filter: &str) -> Result<(), CaptureError> {
        let mut state = self.shared.state.lock();

        for entry in state.sources.iter_mut() {
            if let Err(e) = entry.source.apply_filter(filter) {
                warn!(source = entry.source.name(), "Source rejected filter: {e}");
                *self.shared.filter.lock() = None;
                self.shared.metrics.filter_rejections.inc();
                return Err(e);
            }
        }

        info!(filter, "Capture filter set");
        *self.shared.filter.lock() = Some(filter.to_string());
        Ok(())
    }

    pub fn filter(&self) -> Option<String> {
        self.shared.filter.lock().clone()
    }

    pub fn add_source(&self, source: impl CaptureSource + 'static) {
        debug!(source = source.name(), mode = ?source.mode(), "Registering capture source");
        let finished = Arc::new(AtomicBool::new(false));
        let mode = source.mode();

        let mut state = self.shared.state.lock();
        state.sources.push(SourceEntry {
            source: Box::new(source),
            finished: Arc::clone(&finished),
        });
        self.shared
            .statuses
            .write()
            .push(SourceStatus { mode, finished });
    }

    pub fn add_sink(&self, sink: impl CaptureSink + 'static) {
        debug!(sink = sink.name(), "Registering capture sink");
        self.shared.state.lock().sinks.push(Box::new(sink));
    }

    /// Hands one packet to the store, then to every sink. Ignored after stop.
    pub fn dispatch(&self, packet: Packet) {
        let mut guard = self.shared.state.lock();
        if guard.stopped {
            trace!("Dropping packet dispatched after stop");
            return;
        }
        self.shared
            .dispatch_locked(&mut guard.sinks, Arc::new(packet));
    }

    pub fn summary(&self) -> SourceSummary {
        self.shared.summary()
    }

    pub fn status_desc(&self) -> &'static str {
        self.summary().description(self.is_paused())
    }

    /// True when no source replays a file.
    pub fn is_online(&self) -> bool {
        !self
            .shared
            .statuses
            .read()
            .iter()
            .any(|status| status.mode.is_offline())
    }

    pub fn sources_count(&self) -> usize {
        self.shared.statuses.read().len()
    }

    /// Advisory: sources consult it through their poll context.
    pub fn set_pause(&self, paused: bool) {
        self.shared.paused.store(paused, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Relaxed)
    }

    pub fn tls_server(&self) -> Option<SocketAddr> {
        self.shared.tls_server
    }

    pub fn set_keyfile(&self, keyfile: impl AsRef<Path>) {
        *self.shared.keyfile.write() = Some(Arc::from(keyfile.as_ref()));
    }

    pub fn keyfile(&self) -> Option<PathBuf> {
        self.shared.keyfile.read().as_deref().map(Path::to_path_buf)
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.shared.metrics
    }
}

impl Drop for CaptureManager {
    fn drop(&mut self) {
        self.stop();

        let mut state = self.shared.state.lock();
        for mut entry in state.sources.drain(..) {
            entry.source.teardown();
        }
        for mut sink in state.sinks.drain(..) {
            sink.teardown();
        }
    }
}
