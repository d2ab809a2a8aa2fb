//! Session controller: countdown, lifecycle and verdict
//!
//! State transitions:
//! - IDLE → RUNNING: start() with time remaining
//! - RUNNING → FINISHED: countdown reaches zero, or stop()
//!
//! Entering FINISHED stops monitoring, releases the idle lock and (given a
//! user id and a start time) builds the SessionRecord and hands it to the
//! store without waiting for the save.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::FaceDownConfig;
use crate::core::device::{Clock, IdleLock, IdleLockHolds, NoIdleLock, SystemClock};
use crate::core::identity::IdentityProvider;
use crate::core::monitor::MotionMonitor;
use crate::core::sensor::MotionSensor;
use crate::core::store::{SessionStore, StoreError};
use crate::types::{MotionStats, Pod, ReasonCode, SessionRecord, SessionState, SessionUpdate};

/// Capacity of the live update channel
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Collaborators a controller needs, constructed once and shared.
/// Clones share one idle-lock hold count, so concurrent sessions built from
/// the same services keep the device awake until the last one finishes.
#[derive(Clone)]
pub struct SessionServices {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn SessionStore>,
    pub idle_lock: Arc<IdleLockHolds>,
    pub clock: Arc<dyn Clock>,
}

impl SessionServices {
    /// System clock, no idle lock
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            identity,
            store,
            idle_lock: Arc::new(IdleLockHolds::new(Arc::new(NoIdleLock))),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_idle_lock(mut self, device: Arc<dyn IdleLock>) -> Self {
        self.idle_lock = Arc::new(IdleLockHolds::new(device));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// One focus session
pub struct SessionController {
    config: FaceDownConfig,
    session_minutes: u32,
    remaining_seconds: u32,
    state: SessionState,
    session_start_time: Option<DateTime<Utc>>,
    pod: Pod,
    monitor: MotionMonitor,
    services: SessionServices,
    last_record: Option<SessionRecord>,
    last_reason: ReasonCode,
    pending_save: Option<JoinHandle<Result<String, StoreError>>>,
    update_tx: broadcast::Sender<SessionUpdate>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session_minutes", &self.session_minutes)
            .field("remaining_seconds", &self.remaining_seconds)
            .field("state", &self.state)
            .field("pod", &self.pod)
            .field("monitor", &self.monitor)
            .finish()
    }
}

impl SessionController {
    /// Create an idle session of `session_minutes`
    pub fn new(
        session_minutes: u32,
        pod: Pod,
        sensor: Arc<dyn MotionSensor>,
        services: SessionServices,
        config: FaceDownConfig,
    ) -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            monitor: MotionMonitor::new(config.scoring, sensor),
            config,
            session_minutes,
            remaining_seconds: session_minutes.saturating_mul(60),
            state: SessionState::Idle,
            session_start_time: None,
            pod,
            services,
            last_record: None,
            last_reason: ReasonCode::R000_SESSION_CREATED,
            pending_save: None,
            update_tx,
        }
    }

    /// Begin the countdown and motion monitoring
    pub fn start(&mut self) -> ReasonCode {
        let refused = match self.state {
            SessionState::Running => Some(ReasonCode::R101_START_IGNORED_RUNNING),
            SessionState::Finished => Some(ReasonCode::R103_START_IGNORED_FINISHED),
            SessionState::Idle if self.remaining_seconds == 0 => {
                Some(ReasonCode::R102_START_IGNORED_EXPIRED)
            }
            SessionState::Idle => None,
        };
        if let Some(reason) = refused {
            debug!(reason = reason.code(), "start ignored");
            return reason;
        }

        self.session_start_time = Some(self.services.clock.now());
        self.monitor.reset_stats();
        self.state = SessionState::Running;
        self.monitor.start_monitoring();
        self.services.idle_lock.acquire();

        info!(
            minutes = self.session_minutes,
            pod = %self.pod,
            "session started"
        );
        self.emit(ReasonCode::R100_SESSION_STARTED)
    }

    /// Advance the countdown by one second; finishes at zero
    pub fn tick(&mut self) -> ReasonCode {
        if !self.state.is_running() {
            return ReasonCode::R201_TICK_IGNORED;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            return self.finish(ReasonCode::R300_FINISHED_TIMEOUT);
        }
        self.emit(ReasonCode::R200_TICK)
    }

    /// End the session early
    pub fn stop(&mut self) -> ReasonCode {
        if !self.state.is_running() {
            return ReasonCode::R302_STOP_IGNORED;
        }
        self.finish(ReasonCode::R301_FINISHED_MANUAL)
    }

    fn finish(&mut self, reason: ReasonCode) -> ReasonCode {
        self.state = SessionState::Finished;
        self.monitor.stop_monitoring();
        self.services.idle_lock.release();

        let stats = self.monitor.stats();
        let outcome = match (self.session_start_time, self.services.identity.current_user_id()) {
            (None, _) => ReasonCode::R304_RECORD_SKIPPED_NO_START,
            (Some(_), None) => ReasonCode::R303_RECORD_SKIPPED_NO_USER,
            (Some(start_time), Some(user_id)) => {
                let record = self.build_record(user_id, start_time, &stats);
                info!(
                    passed = record.passed,
                    face_down = record.face_down_percentage,
                    steady = record.steady_percentage,
                    duration_seconds = record.duration_seconds,
                    reason = reason.code(),
                    "session finished"
                );
                self.submit(record.clone());
                self.last_record = Some(record);
                reason
            }
        };
        if outcome != reason {
            debug!(reason = outcome.code(), "session finished without a record");
        }
        self.emit(outcome)
    }

    fn build_record(
        &self,
        user_id: String,
        start_time: DateTime<Utc>,
        stats: &MotionStats,
    ) -> SessionRecord {
        let end_time = self.services.clock.now();
        SessionRecord {
            user_id,
            pod: self.pod.clone(),
            start_time,
            end_time,
            duration_seconds: (end_time - start_time).num_seconds(),
            face_down_percentage: stats.face_down_percentage,
            steady_percentage: stats.steady_percentage,
            passed: self
                .config
                .pass
                .is_passed(stats.face_down_percentage, stats.steady_percentage),
        }
    }

    /// Fire-and-forget save; failures are logged only
    fn submit(&mut self, record: SessionRecord) {
        let store = Arc::clone(&self.services.store);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log_save(&store.save(&record));
            return;
        };
        self.pending_save = Some(runtime.spawn(async move {
            let result = tokio::task::spawn_blocking(move || store.save(&record))
                .await
                .unwrap_or_else(|e| Err(StoreError::Unavailable(e.to_string())));
            log_save(&result);
            result
        }));
    }

    /// A save was handed off and has not resolved yet
    pub fn save_pending(&self) -> bool {
        self.pending_save
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the in-flight save, if there is one
    pub async fn wait_for_save(&mut self) -> Option<Result<String, StoreError>> {
        let handle = self.pending_save.take()?;
        Some(
            handle
                .await
                .unwrap_or_else(|e| Err(StoreError::Unavailable(e.to_string()))),
        )
    }

    /// Start, tick once per second until the countdown ends, or stop early
    /// when `shutdown` resolves. Returns the finishing reason, or the reason
    /// start was refused.
    pub async fn run<F>(&mut self, shutdown: F) -> ReasonCode
    where
        F: Future<Output = ()>,
    {
        let started = self.start();
        if started != ReasonCode::R100_SESSION_STARTED {
            return started;
        }

        let period = self.config.tick_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reason = self.tick();
                    if reason.is_finish() {
                        return reason;
                    }
                }
                _ = &mut shutdown => {
                    return self.stop();
                }
            }
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn session_minutes(&self) -> u32 {
        self.session_minutes
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn session_start_time(&self) -> Option<DateTime<Utc>> {
        self.session_start_time
    }

    pub fn pod(&self) -> &Pod {
        &self.pod
    }

    /// Live scorer stats
    pub fn stats(&self) -> MotionStats {
        self.monitor.stats()
    }

    pub fn monitor(&self) -> &MotionMonitor {
        &self.monitor
    }

    /// Result of the finished session, whether or not the save succeeded
    pub fn last_record(&self) -> Option<&SessionRecord> {
        self.last_record.as_ref()
    }

    /// Current state without advancing anything
    pub fn current_update(&self) -> SessionUpdate {
        SessionUpdate::new(
            self.services.clock.now(),
            self.state,
            self.remaining_seconds,
            self.stats(),
            self.last_reason,
        )
    }

    /// Updates on start, every tick and finish
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.update_tx.subscribe()
    }

    /// Stats after every sample
    pub fn subscribe_stats(&self) -> watch::Receiver<MotionStats> {
        self.monitor.subscribe()
    }

    fn emit(&mut self, reason: ReasonCode) -> ReasonCode {
        self.last_reason = reason;
        let update = SessionUpdate::new(
            self.services.clock.now(),
            self.state,
            self.remaining_seconds,
            self.stats(),
            reason,
        );
        let _ = self.update_tx.send(update);
        reason
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        // monitoring is released by the monitor's own drop
        if self.state.is_running() {
            self.services.idle_lock.release();
        }
    }
}

fn log_save(result: &Result<String, StoreError>) {
    match result {
        Ok(id) => info!(document_id = %id, "session result stored"),
        Err(e) => warn!(code = e.code(), error = %e, "failed to save session"),
    }
}

/// Tick a shared controller once per second until it stops running
pub fn spawn_ticker(controller: Arc<Mutex<SessionController>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = controller.lock().await.config.tick_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let mut session = controller.lock().await;
            if !session.is_running() || session.tick().is_finish() {
                break;
            }
        }
    })
}

// =============================================================================
// TESTS
// =============================================================================
