//! Frame pacing for the headless host.
//!
//! Every frame advances the synthetic driver by a fixed `1 / target_fps`
//! step. Wall-clock time is only measured to report how long the engine
//! took per frame, and to sleep out the remaining budget in realtime mode.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Frame timing manager.
#[derive(Debug)]
pub struct FrameTiming {
    /// Target frames per second
    target_fps: u32,
    /// Wall-clock budget per frame
    frame_budget: Duration,
    /// Start of the frame in progress
    frame_start: Instant,
    /// Sleep out the remaining budget after each frame
    realtime: bool,
    /// Recent frame work times in seconds
    frame_times: VecDeque<f32>,
    /// Maximum samples kept for averaging
    max_samples: usize,
    /// Frames measured since creation
    measured: u64,
    /// Sum of every measured frame time in seconds
    total: f64,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(60)
    }
}

impl FrameTiming {
    /// Creates a timing manager for `target_fps` (at least 1).
    #[must_use]
    pub fn new(target_fps: u32) -> Self {
        let target_fps = target_fps.max(1);
        Self {
            target_fps,
            frame_budget: Duration::from_secs_f64(1.0 / f64::from(target_fps)),
            frame_start: Instant::now(),
            realtime: false,
            frame_times: VecDeque::with_capacity(120),
            max_samples: 120,
            measured: 0,
            total: 0.0,
        }
    }

    /// Enables sleeping out the frame budget.
    #[must_use]
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Fixed step handed to the frame driver, in seconds.
    #[must_use]
    pub fn frame_dt(&self) -> f64 {
        1.0 / f64::from(self.target_fps)
    }

    /// Target FPS.
    #[must_use]
    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    /// Marks the start of a frame.
    pub fn begin_frame(&mut self) {
        self.frame_start = Instant::now();
    }

    /// Marks the end of a frame: records how long it took and, in realtime
    /// mode, sleeps for the rest of the budget. Returns the work time in
    /// seconds.
    pub fn end_frame(&mut self) -> f32 {
        let work = self.frame_start.elapsed();
        self.record(work.as_secs_f32());

        if self.realtime && work < self.frame_budget {
            std::thread::sleep(self.frame_budget - work);
        }
        work.as_secs_f32()
    }

    fn record(&mut self, seconds: f32) {
        self.frame_times.push_back(seconds);
        if self.frame_times.len() > self.max_samples {
            self.frame_times.pop_front();
        }
        self.measured += 1;
        self.total += f64::from(seconds);
    }

    /// Average work time over the recent window, in milliseconds.
    #[must_use]
    pub fn recent_frame_time_ms(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }
        (self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32) * 1000.0
    }

    /// Average work time over every measured frame, in milliseconds.
    #[must_use]
    pub fn average_frame_time_ms(&self) -> f64 {
        if self.measured == 0 {
            return 0.0;
        }
        self.total / self.measured as f64 * 1000.0
    }

    /// Frames measured so far.
    #[must_use]
    pub fn measured_frames(&self) -> u64 {
        self.measured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_timing_creation() {
        let timing = FrameTiming::new(60);
        assert_eq!(timing.target_fps(), 60);
        assert!((timing.frame_dt() - 1.0 / 60.0).abs() < 1e-9);
        assert_eq!(FrameTiming::new(0).target_fps(), 1);
    }

    #[test]
    fn test_average_over_all_frames() {
        let mut timing = FrameTiming::new(30);
        timing.record(0.010);
        timing.record(0.030);
        assert_eq!(timing.measured_frames(), 2);
        assert!((timing.average_frame_time_ms() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_recent_window_is_bounded() {
        let mut timing = FrameTiming::new(60);
        for _ in 0..500 {
            timing.record(0.001);
        }
        assert_eq!(timing.frame_times.len(), timing.max_samples);
        assert_eq!(timing.measured_frames(), 500);
        assert!((timing.recent_frame_time_ms() - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_realtime_sleeps_out_budget() {
        let mut timing = FrameTiming::new(50).with_realtime(true);
        let start = Instant::now();
        timing.begin_frame();
        timing.end_frame();
        assert!(start.elapsed() >= Duration::from_millis(19));
    }

    #[test]
    fn test_offline_does_not_sleep() {
        let mut timing = FrameTiming::new(1);
        let start = Instant::now();
        timing.begin_frame();
        timing.end_frame();
        assert!(start.elapsed() < Duration::from_millis(500));
    }
}
