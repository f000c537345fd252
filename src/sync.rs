//! Output synchronization
//!
//! The acquisition thread overwrites a single target slot; the output thread
//! wakes on the overwrite (or after a bounded poll), steps the virtual
//! controller towards the target and writes every step. Intermediate targets
//! replaced before the output thread gets to them are dropped.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, trace};

use crate::frame::OutputFrame;
use crate::gamepad::{write_frame, GamepadSink};

/// Step-count thresholds on the largest per-axis delta
pub mod steps {
    /// Deltas up to this are written in one step
    pub const SINGLE_MAX: f32 = 0.2;
    /// Deltas up to this are written in two steps
    pub const DOUBLE_MAX: f32 = 0.35;
    /// Step count for anything larger
    pub const MAX_STEPS: usize = 3;
}

#[derive(Debug)]
struct Slot {
    target: OutputFrame,
    pending: bool,
    closed: bool,
}

/// Single-slot, last-writer-wins frame handoff
#[derive(Debug)]
pub struct FrameMailbox {
    slot: Mutex<Slot>,
    signal: Condvar,
}

impl FrameMailbox {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                target: OutputFrame::ZERO,
                pending: false,
                closed: false,
            }),
            signal: Condvar::new(),
        }
    }

    /// Replace the target if it differs from the current one
    ///
    /// Returns whether the output thread was signalled.
    pub fn publish(&self, frame: OutputFrame) -> bool {
        let mut slot = self.slot.lock();
        if slot.closed || !frame.differs(&slot.target) {
            return false;
        }
        slot.target = frame;
        slot.pending = true;
        self.signal.notify_one();
        true
    }

    /// Wait for a new target or until `timeout` elapses
    ///
    /// Returns the current target and whether the mailbox was closed. The
    /// pending signal is consumed.
    pub fn wait(&self, timeout: Duration) -> (OutputFrame, bool) {
        let mut slot = self.slot.lock();
        if !slot.pending && !slot.closed {
            self.signal.wait_for(&mut slot, timeout);
        }
        slot.pending = false;
        (slot.target, slot.closed)
    }

    /// Force the target to zero and stop accepting frames
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        slot.target = OutputFrame::ZERO;
        slot.closed = true;
        slot.pending = true;
        self.signal.notify_all();
    }

    pub fn target(&self) -> OutputFrame {
        self.slot.lock().target
    }

    pub fn is_closed(&self) -> bool {
        self.slot.lock().closed
    }
}

impl Default for FrameMailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of interpolation steps for a given largest delta
pub fn interpolation_steps(delta: f32) -> usize {
    if delta <= steps::SINGLE_MAX {
        1
    } else if delta <= steps::DOUBLE_MAX {
        2
    } else {
        steps::MAX_STEPS
    }
}

/// Frames to write when moving from `from` to `target`
///
/// The last frame yielded is exactly `target`.
pub fn interpolate(from: OutputFrame, target: OutputFrame) -> impl Iterator<Item = OutputFrame> {
    let n = interpolation_steps(from.max_delta(&target));
    (1..=n).map(move |i| {
        if i == n {
            target
        } else {
            from.lerp(&target, i as f32 / n as f32)
        }
    })
}

/// Owns the output thread and the mailbox feeding it
pub struct OutputSynchronizer<S: GamepadSink> {
    mailbox: Arc<FrameMailbox>,
    thread: Option<JoinHandle<Option<S>>>,
}

impl<S: GamepadSink> OutputSynchronizer<S> {
    /// Spawn the output thread
    ///
    /// `poll` bounds how long the thread sleeps without a signal. If the
    /// thread cannot be spawned the sink is handed back with the error.
    pub fn start(sink: S, poll: Duration) -> Result<Self, (std::io::Error, S)> {
        Self::start_on(std::thread::Builder::new(), sink, poll)
    }

    fn start_on(
        builder: std::thread::Builder,
        sink: S,
        poll: Duration,
    ) -> Result<Self, (std::io::Error, S)> {
        let mailbox = Arc::new(FrameMailbox::new());
        let mailbox_clone = mailbox.clone();
        // The sink is sent only once the thread exists, so a failed spawn keeps it here
        let (handoff, receive) = std::sync::mpsc::sync_channel::<S>(1);

        let spawned = builder.name("hallpad-output".into()).spawn(move || {
            let sink = receive.recv().ok()?;
            Some(run_output_loop(sink, mailbox_clone, poll))
        });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => return Err((e, sink)),
        };
        if let Err(returned) = handoff.send(sink) {
            let _ = thread.join();
            return Err((
                std::io::Error::other("output thread exited before receiving the sink"),
                returned.0,
            ));
        }

        Ok(Self {
            mailbox,
            thread: Some(thread),
        })
    }

    /// Hand a resolved frame to the output thread
    #[inline]
    pub fn publish(&self, frame: OutputFrame) -> bool {
        self.mailbox.publish(frame)
    }

    /// Latest target frame
    pub fn target(&self) -> OutputFrame {
        self.mailbox.target()
    }

    /// Zero the controller, stop the thread and get the sink back
    ///
    /// Returns `None` if the thread panicked or was already stopped.
    pub fn shutdown(&mut self) -> Option<S> {
        self.mailbox.close();
        self.thread.take()?.join().ok().flatten()
    }
}

impl<S: GamepadSink> Drop for OutputSynchronizer<S> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.shutdown();
        }
    }
}

/// Output thread body
///
/// Runs until the mailbox is closed, then writes one all-zero frame and
/// returns the sink.
fn run_output_loop<S: GamepadSink>(mut sink: S, mailbox: Arc<FrameMailbox>, poll: Duration) -> S {
    let mut current = OutputFrame::ZERO;
    debug!("Output thread started");

    loop {
        let (target, closed) = mailbox.wait(poll);
        if closed {
            break;
        }
        if !target.differs(&current) {
            continue;
        }

        for frame in interpolate(current, target) {
            trace!("Output frame {:?}", frame);
            if let Err(e) = write_frame(&mut sink, &frame) {
                debug!("Dropping output frame: {}", e);
            }
        }
        current = target;
    }

    if let Err(e) = write_frame(&mut sink, &OutputFrame::ZERO) {
        debug!("Failed to zero controller on shutdown: {}", e);
    }
    debug!("Output thread stopped");
    sink
}
