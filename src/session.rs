//! Session controller
//!
//! A session owns two threads while connected:
//!
//! - the acquisition thread reads the device handle in a tight non-blocking
//!   loop and runs parse → condition → resolve on each report;
//! - the output thread (see [`crate::sync`]) writes frames to the sink.
//!
//! The sink is moved into the threads on connect and handed back when they
//! stop, so a session can be reconnected with the same virtual controller.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, trace, warn};

use crate::conditioner::SignalConditioner;
use crate::device::DeviceHandle;
use crate::error::{DeviceError, SessionError};
use crate::frame::OutputFrame;
use crate::gamepad::GamepadSink;
use crate::keys::{KeySet, LogicalKey};
use crate::mapper::resolve_frame;
use crate::mapping::MappingTable;
use crate::packet::{parse_report, AnalogSample, Report};
use crate::profile::{Shared, TuningProfile};
use crate::sync::OutputSynchronizer;

/// Timing and error-tolerance knobs for the acquisition loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Sleep after an empty read (microseconds)
    pub idle_sleep_us: u64,
    /// Sleep after a failed read (milliseconds)
    pub error_backoff_ms: u64,
    /// Consecutive failed reads that count as a lost connection
    pub max_read_errors: u32,
    /// Longest the output thread waits without a new target (milliseconds)
    pub output_poll_ms: u64,
    /// Read buffer size in bytes
    pub read_buffer_len: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            idle_sleep_us: 50,
            error_backoff_ms: 100,
            max_read_errors: 5,
            output_poll_ms: 5,
            read_buffer_len: 64,
        }
    }
}

impl SessionSettings {
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_micros(self.idle_sleep_us)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn output_poll(&self) -> Duration {
        Duration::from_millis(self.output_poll_ms.max(1))
    }
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionState::Connecting,
            2 => SessionState::Connected,
            _ => SessionState::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
        }
    }
}

/// Lifecycle notifications for the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    /// Stopped on request
    Disconnected,
    /// Stopped because the device went away or kept failing
    ConnectionLost { reason: String },
}

/// Diagnostic counters, reset on every connect
#[derive(Debug, Default)]
pub struct SessionStats {
    packets: AtomicU64,
    analog_samples: AtomicU64,
    boot_reports: AtomicU64,
    unrecognized: AtomicU64,
    read_errors: AtomicU64,
    frames_published: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub packets: u64,
    pub analog_samples: u64,
    pub boot_reports: u64,
    pub unrecognized: u64,
    pub read_errors: u64,
    pub frames_published: u64,
}

impl SessionStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets: self.packets.load(Ordering::Relaxed),
            analog_samples: self.analog_samples.load(Ordering::Relaxed),
            boot_reports: self.boot_reports.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.packets,
            &self.analog_samples,
            &self.boot_reports,
            &self.unrecognized,
            &self.read_errors,
            &self.frames_published,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Per-session key state and the report → frame path
///
/// Owned by the acquisition thread; usable on its own for replay and
/// benchmarking.
pub struct Pipeline {
    conditioner: SignalConditioner,
    active: KeySet,
    /// Keys held in the last boot report
    boot_held: KeySet,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            conditioner: SignalConditioner::new(),
            active: KeySet::new(),
            boot_held: KeySet::new(),
        }
    }

    /// Process one raw report
    ///
    /// Returns the resolved frame, or `None` for unrecognized reports (which
    /// leave all state untouched).
    pub fn handle_report(
        &mut self,
        data: &[u8],
        profile: &TuningProfile,
        mapping: &MappingTable,
        stats: &SessionStats,
    ) -> Option<OutputFrame> {
        let report = parse_report(data);
        match &report {
            Report::Analog(_) => {
                stats.analog_samples.fetch_add(1, Ordering::Relaxed);
            }
            Report::Boot(held) => {
                stats.boot_reports.fetch_add(1, Ordering::Relaxed);
                for key in self.boot_held.difference(held).iter() {
                    self.release(key);
                }
                self.boot_held = *held;
            }
            Report::NotRecognized => {
                stats.unrecognized.fetch_add(1, Ordering::Relaxed);
                trace!("Unrecognized report ({} bytes)", data.len());
                return None;
            }
        }

        for sample in report.samples(profile.max_pressure) {
            self.apply_sample(sample, profile);
        }
        Some(self.resolve(mapping))
    }

    /// Feed one analog sample
    pub fn apply_sample(&mut self, sample: AnalogSample, profile: &TuningProfile) {
        self.conditioner.process(sample.key, sample.raw, profile);
        if sample.raw > profile.deadzone {
            self.active.insert(sample.key);
        } else {
            self.release(sample.key);
        }
    }

    /// Resolve the current key state into a frame
    pub fn resolve(&self, mapping: &MappingTable) -> OutputFrame {
        resolve_frame(&self.active, mapping, |key| self.conditioner.filtered(key))
    }

    fn release(&mut self, key: LogicalKey) {
        self.active.remove(key);
        self.conditioner.clear(key);
    }

    /// Forget all keys
    pub fn reset(&mut self) {
        self.conditioner.reset();
        self.active.clear();
        self.boot_held.clear();
    }

    pub fn active_keys(&self) -> &KeySet {
        &self.active
    }

    pub fn conditioner(&self) -> &SignalConditioner {
        &self.conditioner
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// State visible to both the session owner and the acquisition thread
#[derive(Default)]
struct SessionShared {
    state: AtomicU8,
    running: AtomicBool,
    stats: SessionStats,
    target: Mutex<OutputFrame>,
    active_keys: AtomicUsize,
}

impl SessionShared {
    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

/// Connects a keyboard device handle to a virtual controller
pub struct Session<S: GamepadSink> {
    /// Present while disconnected
    sink: Option<S>,
    profile: Shared<TuningProfile>,
    mapping: Shared<MappingTable>,
    settings: SessionSettings,
    shared: Arc<SessionShared>,
    worker: Option<JoinHandle<Option<S>>>,
    events: Option<UnboundedSender<SessionEvent>>,
}

impl<S: GamepadSink> Session<S> {
    pub fn new(
        sink: S,
        profile: Shared<TuningProfile>,
        mapping: Shared<MappingTable>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sink: Some(sink),
            profile,
            mapping,
            settings,
            shared: Arc::new(SessionShared::default()),
            worker: None,
            events: None,
        }
    }

    /// Deliver lifecycle events to `tx`
    pub fn with_events(mut self, tx: UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Open the device and start the session threads
    ///
    /// A failed open leaves the session disconnected and is not retried.
    pub fn connect<D, F>(&mut self, open: F) -> Result<(), SessionError>
    where
        D: DeviceHandle,
        F: FnOnce() -> Result<D, DeviceError>,
    {
        self.reap_finished();
        if self.worker.is_some() {
            return Err(SessionError::AlreadyConnected);
        }
        let sink = self.sink.take().ok_or(SessionError::SinkUnavailable)?;

        self.shared.set_state(SessionState::Connecting);
        let mut device = match open() {
            Ok(device) => device,
            Err(e) => {
                warn!("Failed to open device: {}", e);
                self.sink = Some(sink);
                self.shared.set_state(SessionState::Disconnected);
                return Err(e.into());
            }
        };

        let mut output = match OutputSynchronizer::start(sink, self.settings.output_poll()) {
            Ok(output) => output,
            Err((e, sink)) => {
                error!("Failed to start output thread: {}", e);
                device.close();
                self.sink = Some(sink);
                self.shared.set_state(SessionState::Disconnected);
                return Err(SessionError::Spawn(e));
            }
        };

        self.shared.stats.reset();
        *self.shared.target.lock() = OutputFrame::ZERO;
        self.shared.active_keys.store(0, Ordering::Relaxed);
        self.shared.running.store(true, Ordering::SeqCst);
        self.shared.set_state(SessionState::Connected);

        let ctx = AcquisitionContext {
            profile: self.profile.clone(),
            mapping: self.mapping.clone(),
            settings: self.settings.clone(),
            shared: self.shared.clone(),
            events: self.events.clone(),
        };
        // Sent before the thread exists so a loss event can never precede it
        self.notify(SessionEvent::Connected);

        // Handed over after the spawn so a failure leaves device and output here
        let (handoff, receive) =
            std::sync::mpsc::sync_channel::<(D, OutputSynchronizer<S>, AcquisitionContext)>(1);
        let spawned = std::thread::Builder::new()
            .name("hallpad-acquire".into())
            .spawn(move || {
                let (device, output, ctx) = receive.recv().ok()?;
                run_acquisition(device, output, ctx)
            });

        let e = match spawned {
            Ok(handle) => match handoff.send((device, output, ctx)) {
                Ok(()) => {
                    self.worker = Some(handle);
                    info!("Session connected");
                    return Ok(());
                }
                Err(returned) => {
                    let _ = handle.join();
                    (device, output, _) = returned.0;
                    std::io::Error::other("acquisition thread exited before starting")
                }
            },
            Err(e) => e,
        };

        error!("Failed to start acquisition thread: {}", e);
        device.close();
        self.sink = output.shutdown();
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.set_state(SessionState::Disconnected);
        self.notify(SessionEvent::ConnectionLost {
            reason: e.to_string(),
        });
        Err(SessionError::Spawn(e))
    }

    /// Stop the session, zero the controller and take the sink back
    pub fn disconnect(&mut self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            self.join_worker(handle);
        }
        self.shared.set_state(SessionState::Disconnected);
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Latest frame handed to the output thread
    pub fn target_frame(&self) -> OutputFrame {
        *self.shared.target.lock()
    }

    pub fn active_key_count(&self) -> usize {
        self.shared.active_keys.load(Ordering::Relaxed)
    }

    pub fn profile(&self) -> &Shared<TuningProfile> {
        &self.profile
    }

    pub fn mapping(&self) -> &Shared<MappingTable> {
        &self.mapping
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Whether the sink is currently held by the session (not by its threads)
    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Take the sink out of a disconnected session
    pub fn take_sink(&mut self) -> Option<S> {
        self.disconnect();
        self.sink.take()
    }

    /// Collect a worker that stopped on its own (connection loss)
    fn reap_finished(&mut self) {
        if self.shared.running.load(Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.worker.take() {
            self.join_worker(handle);
        }
    }

    fn join_worker(&mut self, handle: JoinHandle<Option<S>>) {
        match handle.join() {
            Ok(Some(sink)) => self.sink = Some(sink),
            Ok(None) => error!("Output thread did not return the virtual controller"),
            Err(_) => error!("Acquisition thread panicked"),
        }
    }

    fn notify(&self, event: SessionEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

impl<S: GamepadSink> Drop for Session<S> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.disconnect();
        }
    }
}

struct AcquisitionContext {
    profile: Shared<TuningProfile>,
    mapping: Shared<MappingTable>,
    settings: SessionSettings,
    shared: Arc<SessionShared>,
    events: Option<UnboundedSender<SessionEvent>>,
}

/// Acquisition thread body
///
/// Runs until the running flag clears or the connection is lost, then
/// clears all per-session state and stops the output thread (which zeroes
/// the controller).
fn run_acquisition<D, S>(
    mut device: D,
    mut output: OutputSynchronizer<S>,
    ctx: AcquisitionContext,
) -> Option<S>
where
    D: DeviceHandle,
    S: GamepadSink,
{
    let shared = &ctx.shared;
    let settings = &ctx.settings;
    let mut pipeline = Pipeline::new();
    let mut buf = vec![0u8; settings.read_buffer_len.max(8)];
    let mut consecutive_errors = 0u32;
    let mut lost: Option<String> = None;

    let mut window_start = Instant::now();
    let mut window_packets = 0u64;

    debug!("Acquisition thread started");

    while shared.running.load(Ordering::Acquire) {
        match device.read(&mut buf) {
            Ok(0) => std::thread::sleep(settings.idle_sleep()),
            Ok(n) => {
                consecutive_errors = 0;
                window_packets += 1;
                shared.stats.packets.fetch_add(1, Ordering::Relaxed);

                let profile = ctx.profile.load();
                let mapping = ctx.mapping.load();
                if let Some(frame) =
                    pipeline.handle_report(&buf[..n], &profile, &mapping, &shared.stats)
                {
                    if output.publish(frame) {
                        *shared.target.lock() = frame;
                        shared.stats.frames_published.fetch_add(1, Ordering::Relaxed);
                    }
                    shared
                        .active_keys
                        .store(pipeline.active_keys().len(), Ordering::Relaxed);
                }
            }
            Err(e) if e.is_fatal() => {
                lost = Some(e.to_string());
                break;
            }
            Err(e) => {
                shared.stats.read_errors.fetch_add(1, Ordering::Relaxed);
                consecutive_errors += 1;
                if consecutive_errors >= settings.max_read_errors.max(1) {
                    lost = Some(format!(
                        "{} consecutive read errors (last: {})",
                        consecutive_errors, e
                    ));
                    break;
                }
                warn!(
                    "Read error ({}/{}): {}",
                    consecutive_errors, settings.max_read_errors, e
                );
                std::thread::sleep(settings.error_backoff());
            }
        }

        let elapsed = window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            debug!(
                "{:.0} packets/s, {} active keys",
                window_packets as f64 / elapsed.as_secs_f64(),
                pipeline.active_keys().len()
            );
            window_start = Instant::now();
            window_packets = 0;
        }
    }

    device.close();
    pipeline.reset();
    shared.active_keys.store(0, Ordering::Relaxed);
    *shared.target.lock() = OutputFrame::ZERO;
    let sink = output.shutdown();

    shared.running.store(false, Ordering::SeqCst);
    shared.set_state(SessionState::Disconnected);

    let event = match lost {
        Some(reason) => {
            warn!("Connection lost: {}", reason);
            SessionEvent::ConnectionLost { reason }
        }
        None => {
            info!("Session disconnected");
            SessionEvent::Disconnected
        }
    };
    if let Some(tx) = &ctx.events {
        let _ = tx.send(event);
    }

    sink
}
