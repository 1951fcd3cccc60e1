//! Time-buffered interpolation of streamed transforms
//!
//! Remote-driven entities render slightly in the past. Incoming snapshots are
//! buffered with their arrival time plus latency, and each tick the two
//! samples bracketing the render time are blended.

use std::collections::VecDeque;

use crate::core::config::DEFAULT_TIME_STREAM_CAPACITY;
use crate::foundation::math::utils::lerp;
use crate::scene::Entity;

/// Translate, scale and rotate, three values each
pub type TransformSnapshot = [f32; 9];

/// One buffered snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedSample {
    /// Timestamp in milliseconds
    pub time: f64,
    /// Transform values at that time
    pub values: TransformSnapshot,
}

/// Result of sampling a [`TimeStream`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InterpolationOutcome {
    /// Fewer than two samples, or nothing brackets the render time
    Idle,
    /// Blended between a bracketing pair
    Applied(TransformSnapshot),
    /// Every sample is older than the render time; the newest pair was used
    Lag(TransformSnapshot),
}

impl InterpolationOutcome {
    /// Values to apply, if any
    pub fn values(&self) -> Option<&TransformSnapshot> {
        match self {
            Self::Idle => None,
            Self::Applied(values) | Self::Lag(values) => Some(values),
        }
    }

    /// Whether the stream fell behind
    pub fn is_lag(&self) -> bool {
        matches!(self, Self::Lag(_))
    }
}

/// Bounded, oldest-first snapshot buffer
#[derive(Debug, Clone, PartialEq)]
pub struct TimeStream {
    samples: VecDeque<TimedSample>,
    capacity: usize,
}

impl Default for TimeStream {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TIME_STREAM_CAPACITY)
    }
}

impl TimeStream {
    /// Create an empty buffer holding at most `capacity` samples
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of buffered samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of buffered samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Buffered samples, oldest first
    pub fn samples(&self) -> impl Iterator<Item = &TimedSample> {
        self.samples.iter()
    }

    /// Append a sample, dropping the oldest when full
    pub fn push(&mut self, time: f64, values: TransformSnapshot) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(TimedSample { time, values });
    }

    /// Drop every sample
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Blend the samples around `render_time` and prune the stale ones
    pub fn sample(&mut self, render_time: f64) -> InterpolationOutcome {
        let len = self.samples.len();
        if len < 2 {
            return InterpolationOutcome::Idle;
        }

        let next_index = (1..len).find(|&i| self.samples[i].time > render_time);
        match next_index {
            Some(i) => {
                self.samples.drain(..i - 1);
                let (previous, next) = (self.samples[0], self.samples[1]);
                InterpolationOutcome::Applied(blend(&previous, &next, render_time))
            }
            None if len >= 3 && self.samples[len - 1].time < render_time => {
                let (previous, next) = (self.samples[len - 2], self.samples[len - 1]);
                self.samples.pop_front();
                InterpolationOutcome::Lag(blend(&previous, &next, render_time))
            }
            None => InterpolationOutcome::Idle,
        }
    }
}

fn blend(previous: &TimedSample, next: &TimedSample, render_time: f64) -> TransformSnapshot {
    let span = next.time - previous.time;
    let factor = if span <= 0.0 {
        1.0
    } else {
        ((render_time - previous.time) / span).clamp(0.0, 1.0) as f32
    };

    let mut out = [0.0; 9];
    for (i, value) in out.iter_mut().enumerate() {
        *value = lerp(previous.values[i], next.values[i], factor);
    }
    out
}

/// Drive `entity`'s transform from its time stream
pub fn process_interpolate(entity: &mut Entity, render_time: f64) -> InterpolationOutcome {
    let outcome = entity.time_stream_mut().sample(render_time);
    if let Some(values) = outcome.values() {
        entity.apply_snapshot(values);
    }
    outcome
}
