//! Time management utilities
//!
//! Engine time is measured in milliseconds as `f64`, matching the
//! timestamps carried by network stream updates.

use std::time::Instant;

/// Monotonic tick clock
///
/// Produces the current tick time, the delta since the previous tick and a
/// tick index that changes every frame. Drive it from wall time with
/// [`TickClock::update`] or deterministically with [`TickClock::advance`].
#[derive(Debug, Clone)]
pub struct TickClock {
    started: Instant,
    offset: f64,
    current_time: f64,
    delta: f64,
    tick_index: u64,
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock {
    /// Create a new clock at time zero
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            offset: 0.0,
            current_time: 0.0,
            delta: 0.0,
            tick_index: 0,
        }
    }

    /// Create a clock starting at a given time in milliseconds
    pub fn starting_at(current_time: f64) -> Self {
        Self {
            offset: current_time,
            current_time,
            ..Self::new()
        }
    }

    /// Advance from wall time (should be called once per frame)
    pub fn update(&mut self) {
        let now = self.offset + self.started.elapsed().as_secs_f64() * 1000.0;
        self.delta = (now - self.current_time).max(0.0);
        self.current_time = now;
        self.tick_index += 1;
    }

    /// Advance by a fixed step in milliseconds
    pub fn advance(&mut self, delta_ms: f64) {
        self.delta = delta_ms.max(0.0);
        self.current_time += self.delta;
        self.tick_index += 1;
    }

    /// Current tick time in milliseconds
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Milliseconds since the previous tick
    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// Index of the current tick
    pub fn tick_index(&self) -> u64 {
        self.tick_index
    }
}
