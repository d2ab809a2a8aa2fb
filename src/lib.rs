//! FaceDown: focus sessions scored by device motion
//!
//! A session passes when the phone stays face-down and steady for most of
//! the countdown: sensor samples → MotionScorer → SessionController → store

pub mod config;
pub mod core;
pub mod types;

// =============================================================================
// CLASSIFICATION THRESHOLDS
// =============================================================================

/// gravity.z below this is face-down (screen toward the ground)
/// -0.75 tolerates modest tilt against the -1g of a flat device
pub const FACE_DOWN_THRESHOLD: f64 = -0.75;

/// Linear acceleration magnitude (g) below this is steady
pub const STEADY_THRESHOLD: f64 = 0.15;

// =============================================================================
// PASS CRITERIA (inclusive)
// =============================================================================

/// Minimum face-down percentage for a passed session
pub const PASS_FACE_DOWN_PERCENTAGE: f64 = 80.0;

/// Minimum steady percentage for a passed session
pub const PASS_STEADY_PERCENTAGE: f64 = 70.0;

// =============================================================================
// TIMING
// =============================================================================

/// Sensor sampling interval (10 Hz)
pub const SAMPLE_INTERVAL_MS: u64 = 100;

/// Countdown tick interval
pub const TICK_INTERVAL_MS: u64 = 1000;

// =============================================================================
// SESSION PRESETS (minutes)
// =============================================================================

pub const PRESET_FOCUS_MINUTES: u32 = 25;
pub const PRESET_DEEP_WORK_MINUTES: u32 = 50;
pub const PRESET_QUICK_TEST_MINUTES: u32 = 5;

// =============================================================================
// HISTORY QUERIES
// =============================================================================

/// Default number of records returned for a user's history
pub const USER_HISTORY_LIMIT: usize = 10;

/// Default number of records returned for a pod's history
pub const POD_HISTORY_LIMIT: usize = 50;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
