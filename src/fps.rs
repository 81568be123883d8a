//! Rolling frames-per-second estimator.

use std::time::Instant;

/// Counts frames and recomputes an FPS estimate about once per second.
///
/// Frames accumulate until at least one second of wall-clock time has
/// elapsed since the last reset; then `fps = frames / elapsed` and both
/// counters reset. Between recomputes the reported value is stable, so
/// the on-screen readout doesn't flicker every frame.
#[derive(Debug)]
pub struct FpsCounter {
    window_start: Instant,
    frames: u32,
    fps: f64,
}

impl FpsCounter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a counter with an explicit start time (useful in tests).
    pub fn starting_at(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Record one frame and return the current estimate.
    pub fn tick(&mut self) -> f64 {
        self.tick_at(Instant::now())
    }

    /// Record one frame observed at `now`.
    pub fn tick_at(&mut self, now: Instant) -> f64 {
        self.frames += 1;
        let elapsed = now.duration_since(self.window_start).as_secs_f64();
        if elapsed >= 1.0 {
            self.fps = f64::from(self.frames) / elapsed;
            self.frames = 0;
            self.window_start = now;
        }
        self.fps
    }

    /// The current estimate without recording a frame.
    pub fn current(&self) -> f64 {
        self.fps
    }

    /// The overlay label, two-decimal precision.
    pub fn label(&self) -> String {
        format!("FPS: {:.2}", self.fps)
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}
