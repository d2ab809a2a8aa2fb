//! Core types for FaceDown

mod state;
mod sample;
mod stats;
mod output;
mod reason;
mod record;

pub use state::SessionState;
pub use sample::{Axes, MotionSample};
pub use stats::{MotionStats, percentage};
pub use output::{SessionUpdate, format_countdown};
pub use reason::ReasonCode;
pub use record::{Pod, SessionRecord};
