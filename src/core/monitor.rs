//! Motion monitor: drives a MotionScorer from a sensor at a fixed rate
//!
//! The sampling task runs on the tokio runtime and shares the scorer with
//! readers through a mutex. Each task carries a generation number; stopping
//! or restarting bumps the generation under the lock, so a task that is
//! mid-sample when it is aborted can never fold in one more reading.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::ScoringConfig;
use crate::core::scorer::MotionScorer;
use crate::core::sensor::MotionSensor;
use crate::types::{MotionSample, MotionStats};

#[derive(Debug)]
struct Shared {
    scorer: MotionScorer,
    generation: u64,
    active: bool,
}

/// Scorer plus the sampling task feeding it
pub struct MotionMonitor {
    shared: Arc<Mutex<Shared>>,
    sensor: Arc<dyn MotionSensor>,
    sample_interval: Duration,
    stats_tx: watch::Sender<MotionStats>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for MotionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionMonitor")
            .field("sample_interval", &self.sample_interval)
            .field("monitoring", &self.is_monitoring())
            .field("stats", &self.stats())
            .finish()
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MotionMonitor {
    pub fn new(config: ScoringConfig, sensor: Arc<dyn MotionSensor>) -> Self {
        let (stats_tx, _) = watch::channel(MotionStats::zero());
        Self {
            shared: Arc::new(Mutex::new(Shared {
                scorer: MotionScorer::new(config),
                generation: 0,
                active: false,
            })),
            sensor,
            sample_interval: config.sample_interval(),
            stats_tx,
            task: None,
        }
    }

    /// Reset stats and start sampling. Returns false (and logs) when the
    /// sensor is unavailable or there is no runtime to sample on; stats are
    /// left untouched in that case.
    pub fn start_monitoring(&mut self) -> bool {
        if !self.sensor.is_available() {
            warn!("device motion not available, monitoring not started");
            return false;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, monitoring not started");
            return false;
        };

        self.stop_monitoring();

        let generation = {
            let mut shared = lock(&self.shared);
            shared.scorer.reset_stats();
            shared.generation += 1;
            shared.active = true;
            shared.generation
        };
        self.stats_tx.send_replace(MotionStats::zero());

        self.task = Some(runtime.spawn(sample_loop(
            Arc::clone(&self.shared),
            Arc::clone(&self.sensor),
            self.stats_tx.clone(),
            self.sample_interval,
            generation,
        )));
        info!(interval_ms = self.sample_interval.as_millis() as u64, "motion monitoring started");
        true
    }

    /// Stop sampling; counters keep their last values
    pub fn stop_monitoring(&mut self) {
        let was_active = {
            let mut shared = lock(&self.shared);
            let was_active = shared.active;
            shared.active = false;
            shared.generation += 1;
            was_active
        };
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if was_active {
            let stats = self.stats();
            debug!(
                total = stats.total_samples,
                face_down = stats.face_down_percentage,
                steady = stats.steady_percentage,
                "motion monitoring stopped"
            );
        }
    }

    pub fn is_monitoring(&self) -> bool {
        lock(&self.shared).active
    }

    /// Zero all counters; allowed whether or not sampling is running
    pub fn reset_stats(&self) {
        lock(&self.shared).scorer.reset_stats();
        self.stats_tx.send_replace(MotionStats::zero());
    }

    pub fn stats(&self) -> MotionStats {
        lock(&self.shared).scorer.stats()
    }

    /// Fold a sample in directly, bypassing the sensor (replays, tests)
    pub fn ingest(&self, sample: &MotionSample) -> MotionStats {
        let stats = lock(&self.shared).scorer.process_sample(sample);
        self.stats_tx.send_replace(stats);
        stats
    }

    /// Latest stats, updated after every sample
    pub fn subscribe(&self) -> watch::Receiver<MotionStats> {
        self.stats_tx.subscribe()
    }

    pub fn sensor(&self) -> &Arc<dyn MotionSensor> {
        &self.sensor
    }
}

impl Drop for MotionMonitor {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

async fn sample_loop(
    shared: Arc<Mutex<Shared>>,
    sensor: Arc<dyn MotionSensor>,
    stats_tx: watch::Sender<MotionStats>,
    interval: Duration,
    generation: u64,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(sample) = sensor.poll() else {
            continue;
        };
        let stats = {
            let mut shared = lock(&shared);
            if !shared.active || shared.generation != generation {
                break;
            }
            shared.scorer.process_sample(&sample)
        };
        stats_tx.send_replace(stats);
    }
}

// =============================================================================
// TESTS
// =============================================================================
