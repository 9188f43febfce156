//! Frame scheduling.
//!
//! The display refresh callback is host-provided and injected through
//! [`FrameScheduler`]. Each request schedules exactly one future
//! invocation; a render loop is a chain of such requests, each frame
//! asking for the next.
//!
//! [`ManualFrameDriver`] is the in-process implementation: the host (or a
//! test) calls [`ManualFrameDriver::advance`] once per refresh. Callbacks
//! requested while an advance is running are deferred to the next one,
//! matching display-refresh semantics.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Maximum delta handed to a frame, in seconds. Prevents a long stall
/// from turning into a single huge step.
pub const MAX_FRAME_DELTA: f32 = 0.25;

/// Identifier of a scheduled frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(u64);

impl FrameToken {
    /// Creates a token from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw token value.
    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

/// Timestamp delivered to a frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Seconds since the scheduler started.
    pub timestamp: f64,
}

/// One-shot frame callback.
pub type FrameCallback = Box<dyn FnOnce(FrameTime) + Send>;

/// Host per-frame callback facility.
pub trait FrameScheduler: Send + Sync {
    /// Schedules `callback` to run once on the next refresh.
    fn request_frame(&self, callback: FrameCallback) -> FrameToken;

    /// Cancels a pending request. Unknown or already-run tokens are
    /// ignored.
    fn cancel_frame(&self, token: FrameToken);
}

#[derive(Default)]
struct DriverState {
    next_token: u64,
    now: f64,
    pending: Vec<(FrameToken, FrameCallback)>,
    frames_dispatched: u64,
}

/// Scheduler driven explicitly by the host loop or a test harness.
#[derive(Clone, Default)]
pub struct ManualFrameDriver {
    state: Arc<Mutex<DriverState>>,
}

impl ManualFrameDriver {
    /// Creates a driver at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock by `dt` seconds and runs every callback that was
    /// pending before the call. Returns how many callbacks ran.
    pub fn advance(&self, dt: f64) -> usize {
        let (due, now) = {
            let mut state = self.state.lock();
            state.now += dt.max(0.0);
            let due = std::mem::take(&mut state.pending);
            state.frames_dispatched += due.len() as u64;
            (due, state.now)
        };

        let count = due.len();
        let time = FrameTime { timestamp: now };
        for (_, callback) in due {
            callback(time);
        }
        count
    }

    /// Runs `frames` refreshes of `dt` seconds each. Returns the total
    /// number of callbacks that ran.
    pub fn run(&self, frames: usize, dt: f64) -> usize {
        (0..frames).map(|_| self.advance(dt)).sum()
    }

    /// Number of callbacks waiting for the next refresh.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Current driver time in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.state.lock().now
    }

    /// Total callbacks dispatched since creation.
    #[must_use]
    pub fn frames_dispatched(&self) -> u64 {
        self.state.lock().frames_dispatched
    }
}

impl FrameScheduler for ManualFrameDriver {
    fn request_frame(&self, callback: FrameCallback) -> FrameToken {
        let mut state = self.state.lock();
        let token = FrameToken(state.next_token);
        state.next_token += 1;
        state.pending.push((token, callback));
        token
    }

    fn cancel_frame(&self, token: FrameToken) {
        self.state.lock().pending.retain(|(t, _)| *t != token);
    }
}

impl fmt::Debug for ManualFrameDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualFrameDriver")
            .field("now", &state.now)
            .field("pending", &state.pending.len())
            .field("frames_dispatched", &state.frames_dispatched)
            .finish()
    }
}

/// Per-frame clock handed to update rules.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameClock {
    /// Index of the frame since the field started (first frame is 0).
    pub frame: u64,
    /// Seconds elapsed since the field's first frame.
    pub elapsed: f32,
    /// Seconds since the previous frame, clamped to [`MAX_FRAME_DELTA`].
    pub delta: f32,
}

impl FrameClock {
    /// Elapsed time in milliseconds, the unit most sinusoidal rules are
    /// tuned in.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        f64::from(self.elapsed) * 1000.0
    }
}

/// Turns driver timestamps into [`FrameClock`]s.
#[derive(Debug, Clone, Default)]
pub(crate) struct ClockState {
    start: Option<f64>,
    last: f64,
    frame: u64,
}

impl ClockState {
    pub(crate) fn tick(&mut self, time: FrameTime) -> FrameClock {
        let Some(start) = self.start else {
            self.start = Some(time.timestamp);
            self.last = time.timestamp;
            self.frame = 0;
            return FrameClock::default();
        };

        let delta = (time.timestamp - self.last).max(0.0) as f32;
        self.frame += 1;
        self.last = time.timestamp;

        FrameClock {
            frame: self.frame,
            elapsed: (time.timestamp - start).max(0.0) as f32,
            delta: delta.min(MAX_FRAME_DELTA),
        }
    }
}
