//! Motion sensor readings

use serde::{Deserialize, Serialize};

/// A 3-axis reading in units of g
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Axes {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Axes {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean magnitude
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// One device-motion reading: gravity plus user (linear) acceleration.
///
/// Samples are consumed by the scorer as they arrive and never retained.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionSample {
    /// Gravity direction as seen by the device
    pub gravity: Axes,
    /// Acceleration with gravity removed
    pub acceleration: Axes,
}

impl MotionSample {
    pub fn new(gravity: Axes, acceleration: Axes) -> Self {
        Self {
            gravity,
            acceleration,
        }
    }

    /// Flat on a table, screen down, untouched
    pub fn resting_face_down() -> Self {
        Self::new(Axes::new(0.0, 0.0, -1.0), Axes::default())
    }

    /// Flat on a table, screen up, untouched
    pub fn resting_face_up() -> Self {
        Self::new(Axes::new(0.0, 0.0, 1.0), Axes::default())
    }
}
