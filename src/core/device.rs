//! Device-side collaborators: wall clock and idle-lock suppression

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

/// Source of wall-clock time for session start/end stamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs `speed` times faster than `inner` from the moment it is built.
/// Demo runs with a compressed countdown record nominal durations.
pub struct ScaledClock {
    inner: Arc<dyn Clock>,
    origin: DateTime<Utc>,
    speed: f64,
}

impl ScaledClock {
    pub fn new(inner: Arc<dyn Clock>, speed: f64) -> Self {
        Self {
            origin: inner.now(),
            inner,
            speed,
        }
    }
}

impl std::fmt::Debug for ScaledClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScaledClock")
            .field("origin", &self.origin)
            .field("speed", &self.speed)
            .finish()
    }
}

impl Clock for ScaledClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed_ms = (self.inner.now() - self.origin).num_milliseconds() as f64;
        self.origin + Duration::milliseconds((elapsed_ms * self.speed).round() as i64)
    }
}

/// Keeps the screen from auto-locking while a session runs
pub trait IdleLock: Send + Sync {
    fn set_idle_disabled(&self, disabled: bool);
}

/// For hosts without an idle timer
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIdleLock;

impl IdleLock for NoIdleLock {
    fn set_idle_disabled(&self, _disabled: bool) {}
}

/// Remembers the last toggle
#[derive(Debug, Default)]
pub struct ToggleIdleLock {
    disabled: AtomicBool,
}

impl ToggleIdleLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }
}

impl IdleLock for ToggleIdleLock {
    fn set_idle_disabled(&self, disabled: bool) {
        let previous = self.disabled.swap(disabled, Ordering::SeqCst);
        if previous != disabled {
            debug!(disabled, "idle lock toggled");
        }
    }
}

/// Reference-counted front for one device idle lock. The device stays
/// idle-disabled while any session holds it; the last release re-enables it.
pub struct IdleLockHolds {
    device: Arc<dyn IdleLock>,
    holders: Mutex<usize>,
}

impl IdleLockHolds {
    pub fn new(device: Arc<dyn IdleLock>) -> Self {
        Self {
            device,
            holders: Mutex::new(0),
        }
    }

    pub fn acquire(&self) {
        let mut holders = self.holders.lock().unwrap_or_else(PoisonError::into_inner);
        *holders += 1;
        if *holders == 1 {
            self.device.set_idle_disabled(true);
        }
    }

    pub fn release(&self) {
        let mut holders = self.holders.lock().unwrap_or_else(PoisonError::into_inner);
        match *holders {
            0 => warn!("idle lock released without a holder"),
            1 => {
                *holders = 0;
                self.device.set_idle_disabled(false);
            }
            _ => *holders -= 1,
        }
    }

    pub fn holders(&self) -> usize {
        *self.holders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for IdleLockHolds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleLockHolds")
            .field("holders", &self.holders())
            .finish()
    }
}
