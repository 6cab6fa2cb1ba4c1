//! Time management utilities

use std::time::{Duration, Instant};

/// Engine tick rate used by animation sampling and the Update clock
pub const DEFAULT_FPS: f32 = 60.0;

/// Physics step length in seconds
pub const FIXED_DELTA: f32 = 1.0 / 50.0;

/// Wall clock frame timer
pub struct Timer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    /// Create a new timer
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
        }
    }

    /// Sample the clock; returns the seconds since the previous call
    pub fn update(&mut self) -> f32 {
        let now = Instant::now();
        self.delta_time = now.duration_since(self.last_frame).as_secs_f32();
        self.total_time += self.delta_time;
        self.last_frame = now;
        self.frame_count += 1;
        self.delta_time
    }

    /// Seconds between the last two samples
    pub const fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Seconds since creation
    pub const fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Number of samples taken
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second since creation
    #[allow(clippy::cast_precision_loss)]
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            self.frame_count as f32 / self.total_time
        } else {
            0.0
        }
    }
}

/// Fixed-rate accumulator
///
/// Feeds variable host deltas in and yields whole steps of `interval` out.
/// Backlog is capped so a long stall does not trigger a burst of catch-up steps.
#[derive(Debug, Clone)]
pub struct FixedClock {
    interval: f32,
    accumulator: f32,
    max_steps: u32,
}

impl FixedClock {
    /// Clock ticking every `interval` seconds
    pub const fn new(interval: f32) -> Self {
        Self {
            interval,
            accumulator: 0.0,
            max_steps: 5,
        }
    }

    /// Tick length in seconds
    pub const fn interval(&self) -> f32 {
        self.interval
    }

    /// Add `dt` seconds and return how many whole ticks are due
    pub fn advance(&mut self, dt: f32) -> u32 {
        self.accumulator += dt.max(0.0);
        let mut steps = 0;
        // Tolerance keeps `1/60` fed as `1/60` from losing a tick to rounding.
        while self.accumulator + 1e-6 >= self.interval && steps < self.max_steps {
            self.accumulator -= self.interval;
            steps += 1;
        }
        if steps == self.max_steps {
            self.accumulator = self.accumulator.min(self.interval);
        }
        self.accumulator = self.accumulator.max(0.0);
        steps
    }

    /// Drop the accumulated backlog
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

/// Simple stopwatch for measuring elapsed time
pub struct Stopwatch {
    start_time: Option<Instant>,
    elapsed: Duration,
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch {
    /// Create a new stopped stopwatch
    pub const fn new() -> Self {
        Self {
            start_time: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Create a stopwatch that is already running
    pub fn start_new() -> Self {
        let mut stopwatch = Self::new();
        stopwatch.start();
        stopwatch
    }

    /// Start or resume
    pub fn start(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(Instant::now());
        }
    }

    /// Stop and accumulate
    pub fn stop(&mut self) {
        if let Some(start) = self.start_time.take() {
            self.elapsed += start.elapsed();
        }
    }

    /// Total elapsed time, including the running span
    pub fn elapsed(&self) -> Duration {
        self.elapsed + self.start_time.map_or(Duration::ZERO, |start| start.elapsed())
    }
}
