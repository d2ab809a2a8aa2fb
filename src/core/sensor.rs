//! Motion sensor sources
//!
//! The sampling task polls a sensor once per sample interval; a poll that
//! returns `None` means no new reading and is skipped.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::types::{Axes, MotionSample};

/// A device-motion source
pub trait MotionSensor: Send + Sync {
    /// Checked once when monitoring starts
    fn is_available(&self) -> bool;

    /// Next reading, if any
    fn poll(&self) -> Option<MotionSample>;
}

// =============================================================================
// BUFFERED (scripted replays, API-pushed samples)
// =============================================================================

/// Default number of pushed samples held before the oldest are dropped
pub const BUFFERED_SENSOR_CAPACITY: usize = 64;

/// FIFO of readings, filled up front or pushed from outside
#[derive(Debug)]
pub struct BufferedSensor {
    queue: Mutex<VecDeque<MotionSample>>,
    capacity: usize,
    available: bool,
}

impl Default for BufferedSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferedSensor {
    /// Empty, available sensor
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: BUFFERED_SENSOR_CAPACITY,
            available: true,
        }
    }

    /// Sensor that replays `samples` in order, then goes quiet
    pub fn scripted(samples: impl IntoIterator<Item = MotionSample>) -> Self {
        let queue: VecDeque<MotionSample> = samples.into_iter().collect();
        Self {
            capacity: queue.len().max(BUFFERED_SENSOR_CAPACITY),
            queue: Mutex::new(queue),
            available: true,
        }
    }

    /// Sensor on a device without motion hardware
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Queue a reading; drops the oldest when full
    pub fn push(&self, sample: MotionSample) {
        let mut queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(sample);
    }

    /// Readings not yet polled
    pub fn pending(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl MotionSensor for BufferedSensor {
    fn is_available(&self) -> bool {
        self.available
    }

    fn poll(&self) -> Option<MotionSample> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}

// =============================================================================
// SIMULATED (terminal demo)
// =============================================================================

/// Deterministic phone-on-a-desk profile: face-down with a faint wobble,
/// picked up for `pickup_length` samples out of every `pickup_every`.
#[derive(Debug)]
pub struct SimulatedSensor {
    counter: AtomicU64,
    pickup_every: u64,
    pickup_length: u64,
}

impl SimulatedSensor {
    pub fn new(pickup_every: u64, pickup_length: u64) -> Self {
        Self {
            counter: AtomicU64::new(0),
            pickup_every: pickup_every.max(1),
            pickup_length: pickup_length.min(pickup_every),
        }
    }

    /// Never picked up
    pub fn resting() -> Self {
        Self::new(1, 0)
    }

    fn sample_at(&self, n: u64) -> MotionSample {
        let phase = n % self.pickup_every;
        if phase >= self.pickup_every - self.pickup_length {
            // in hand, screen toward the user
            MotionSample::new(Axes::new(0.0, -0.7, 0.7), Axes::new(0.25, 0.3, 0.1))
        } else {
            let wobble = (n % 7) as f64 * 0.004;
            MotionSample::new(
                Axes::new(wobble, -wobble, -0.99),
                Axes::new(wobble, 0.0, wobble / 2.0),
            )
        }
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        // 1.5 s in hand every 20 s
        Self::new(200, 15)
    }
}

impl MotionSensor for SimulatedSensor {
    fn is_available(&self) -> bool {
        true
    }

    fn poll(&self) -> Option<MotionSample> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(self.sample_at(n))
    }
}
