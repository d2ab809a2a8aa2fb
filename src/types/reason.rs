//! Reason codes for session decisions and state changes

use serde::{Deserialize, Serialize};

/// Reason codes for every controller decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ReasonCode {
    /// Session created, not started
    R000_SESSION_CREATED,

    // =========================================================================
    // R100: Start
    // =========================================================================
    /// Session started, monitoring acquired
    R100_SESSION_STARTED,
    /// start() while already running
    R101_START_IGNORED_RUNNING,
    /// start() with no time left on the countdown
    R102_START_IGNORED_EXPIRED,
    /// start() on a finished session
    R103_START_IGNORED_FINISHED,

    // =========================================================================
    // R200: Countdown
    // =========================================================================
    /// One second elapsed
    R200_TICK,
    /// tick() while not running
    R201_TICK_IGNORED,

    // =========================================================================
    // R300: Finish
    // =========================================================================
    /// Countdown reached zero
    R300_FINISHED_TIMEOUT,
    /// Stopped by the user
    R301_FINISHED_MANUAL,
    /// stop() while not running
    R302_STOP_IGNORED,
    /// Finished without a record: no user id yet
    R303_RECORD_SKIPPED_NO_USER,
    /// Finished without a record: never started
    R304_RECORD_SKIPPED_NO_START,
}

impl ReasonCode {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::R000_SESSION_CREATED => "R000_SESSION_CREATED",
            Self::R100_SESSION_STARTED => "R100_SESSION_STARTED",
            Self::R101_START_IGNORED_RUNNING => "R101_START_IGNORED_RUNNING",
            Self::R102_START_IGNORED_EXPIRED => "R102_START_IGNORED_EXPIRED",
            Self::R103_START_IGNORED_FINISHED => "R103_START_IGNORED_FINISHED",
            Self::R200_TICK => "R200_TICK",
            Self::R201_TICK_IGNORED => "R201_TICK_IGNORED",
            Self::R300_FINISHED_TIMEOUT => "R300_FINISHED_TIMEOUT",
            Self::R301_FINISHED_MANUAL => "R301_FINISHED_MANUAL",
            Self::R302_STOP_IGNORED => "R302_STOP_IGNORED",
            Self::R303_RECORD_SKIPPED_NO_USER => "R303_RECORD_SKIPPED_NO_USER",
            Self::R304_RECORD_SKIPPED_NO_START => "R304_RECORD_SKIPPED_NO_START",
        }
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::R000_SESSION_CREATED => "Ready to start",
            Self::R100_SESSION_STARTED => "Session started",
            Self::R101_START_IGNORED_RUNNING => "Already running",
            Self::R102_START_IGNORED_EXPIRED => "No time remaining",
            Self::R103_START_IGNORED_FINISHED => "Session already finished",
            Self::R200_TICK => "Countdown advanced",
            Self::R201_TICK_IGNORED => "Not running",
            Self::R300_FINISHED_TIMEOUT => "Countdown complete",
            Self::R301_FINISHED_MANUAL => "Stopped by user",
            Self::R302_STOP_IGNORED => "Not running",
            Self::R303_RECORD_SKIPPED_NO_USER => "No user id, result not recorded",
            Self::R304_RECORD_SKIPPED_NO_START => "No start time, result not recorded",
        }
    }

    /// Did this decision end the session?
    pub fn is_finish(&self) -> bool {
        matches!(
            self,
            Self::R300_FINISHED_TIMEOUT
                | Self::R301_FINISHED_MANUAL
                | Self::R303_RECORD_SKIPPED_NO_USER
                | Self::R304_RECORD_SKIPPED_NO_START
        )
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.description())
    }
}
