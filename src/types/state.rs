//! Session lifecycle states

use serde::{Deserialize, Serialize};

/// The three states of a focus session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Created, countdown full, not started
    Idle,
    /// Countdown running, motion monitored
    Running,
    /// Ended by timeout or manual stop (terminal)
    Finished,
}

impl SessionState {
    /// Get ANSI color code for terminal display
    pub fn color_code(&self) -> &'static str {
        match self {
            SessionState::Idle => "\x1b[90m",     // Gray
            SessionState::Running => "\x1b[36m",  // Cyan
            SessionState::Finished => "\x1b[1m",  // Bold
        }
    }

    /// Reset ANSI color
    pub fn color_reset() -> &'static str {
        "\x1b[0m"
    }

    /// Get emoji for state
    pub fn emoji(&self) -> &'static str {
        match self {
            SessionState::Idle => "⏸",
            SessionState::Running => "📵",
            SessionState::Finished => "🏁",
        }
    }

    /// Is the countdown running?
    pub fn is_running(&self) -> bool {
        *self == SessionState::Running
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Idle => "IDLE",
            SessionState::Running => "RUNNING",
            SessionState::Finished => "FINISHED",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_screaming_case() {
        let json = serde_json::to_string(&SessionState::Running).unwrap();
        assert_eq!(json, "\"RUNNING\"");
        let back: SessionState = serde_json::from_str("\"FINISHED\"").unwrap();
        assert_eq!(back, SessionState::Finished);
    }

    #[test]
    fn test_only_running_is_running() {
        assert!(!SessionState::Idle.is_running());
        assert!(SessionState::Running.is_running());
        assert!(!SessionState::Finished.is_running());
    }
}
