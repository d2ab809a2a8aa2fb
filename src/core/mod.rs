//! Core modules for FaceDown

pub mod scorer;
pub mod sensor;
pub mod monitor;
pub mod device;
pub mod identity;
pub mod store;
pub mod controller;
pub mod api;

pub use scorer::MotionScorer;
pub use sensor::{MotionSensor, BufferedSensor, SimulatedSensor};
pub use monitor::MotionMonitor;
pub use device::{Clock, SystemClock, ManualClock, ScaledClock, IdleLock, IdleLockHolds, NoIdleLock, ToggleIdleLock};
pub use identity::{IdentityProvider, AnonymousIdentity};
pub use store::{SessionStore, JsonDirStore, MemoryStore, StoreError, record_from_document, record_to_document};
pub use controller::{SessionController, SessionServices, spawn_ticker};
pub use api::{create_router, run_server};
