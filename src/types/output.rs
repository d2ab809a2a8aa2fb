//! Live session updates for terminal display and subscribers

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use crate::types::{MotionStats, ReasonCode, SessionState};

/// Emitted on start, each countdown tick and finish
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUpdate {
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Lifecycle state
    pub state: SessionState,
    /// Seconds left on the countdown
    pub remaining_seconds: u32,
    /// Scorer snapshot at this moment
    pub stats: MotionStats,
    /// Why this update was emitted
    pub reason: ReasonCode,
}

impl SessionUpdate {
    /// Create new update
    pub fn new(
        timestamp: DateTime<Utc>,
        state: SessionState,
        remaining_seconds: u32,
        stats: MotionStats,
        reason: ReasonCode,
    ) -> Self {
        Self {
            timestamp,
            state,
            remaining_seconds,
            stats,
            reason,
        }
    }

    /// Countdown as MM:SS
    pub fn formatted_time(&self) -> String {
        format_countdown(self.remaining_seconds)
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let color = self.state.color_code();
        let reset = SessionState::color_reset();
        let dot = |active: bool| if active { "\x1b[32m●\x1b[0m" } else { "\x1b[90m●\x1b[0m" };

        format!(
            "{}{} {} [{}]{} {} face down {:>5.1}% | {} steady {:>5.1}%",
            color,
            self.state.emoji(),
            self.formatted_time(),
            self.state,
            reset,
            dot(self.stats.is_face_down),
            self.stats.face_down_percentage,
            dot(self.stats.is_steady),
            self.stats.steady_percentage,
        )
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "time={} | state={} | {} | reason={}",
            self.formatted_time(),
            self.state,
            self.stats.to_parseable_string(),
            self.reason.code()
        )
    }
}

/// Seconds as zero-padded MM:SS
pub fn format_countdown(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_countdown() {
        assert_eq!(format_countdown(1500), "25:00");
        assert_eq!(format_countdown(61), "01:01");
        assert_eq!(format_countdown(0), "00:00");
    }

    #[test]
    fn test_parseable_output_format() {
        let update = SessionUpdate::new(
            Utc::now(),
            SessionState::Running,
            299,
            MotionStats::zero(),
            ReasonCode::R200_TICK,
        );
        let s = update.to_parseable_string();
        assert!(s.contains("time=04:59"));
        assert!(s.contains("state=RUNNING"));
        assert!(s.contains("reason=R200_TICK"));
    }
}
