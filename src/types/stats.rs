//! Scorer statistics snapshot

use serde::{Deserialize, Serialize};

/// Counters, live flags and percentages of a MotionScorer at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionStats {
    pub total_samples: u64,
    pub face_down_samples: u64,
    pub steady_samples: u64,
    /// Most recent sample was face-down
    pub is_face_down: bool,
    /// Most recent sample was steady
    pub is_steady: bool,
    /// 0-100
    pub face_down_percentage: f64,
    /// 0-100
    pub steady_percentage: f64,
}

impl MotionStats {
    /// Stats after a reset
    pub fn zero() -> Self {
        Self::default()
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "face_down={:.1}% ({}) | steady={:.1}% ({}) | samples={}",
            self.face_down_percentage,
            flag(self.is_face_down),
            self.steady_percentage,
            flag(self.is_steady),
            self.total_samples
        )
    }
}

fn flag(active: bool) -> &'static str {
    if active {
        "on"
    } else {
        "off"
    }
}

/// Percentage of `count` in `total`, 0 when nothing was sampled
pub fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 / total as f64 * 100.0
}
