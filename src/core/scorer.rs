//! Motion scorer: per-sample face-down / steady classification
//!
//! For each sample, in order:
//! 1. total += 1
//! 2. face-down: gravity.z < face_down_threshold (strict)
//! 3. steady: |acceleration| < steady_threshold (strict)
//! 4. overwrite the live flags
//! 5. bump the matching counters
//! 6. recompute both percentages

use tracing::trace;

use crate::config::ScoringConfig;
use crate::types::{percentage, MotionSample, MotionStats};

/// Running face-down / steady statistics over one monitoring interval
#[derive(Debug, Clone)]
pub struct MotionScorer {
    config: ScoringConfig,
    stats: MotionStats,
}

impl Default for MotionScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl MotionScorer {
    /// Create scorer with the given thresholds
    pub fn new(config: ScoringConfig) -> Self {
        Self {
            config,
            stats: MotionStats::zero(),
        }
    }

    /// Classify a sample as (face_down, steady) without touching the counters
    pub fn classify(&self, sample: &MotionSample) -> (bool, bool) {
        let face_down = sample.gravity.z < self.config.face_down_threshold;
        let steady = sample.acceleration.magnitude() < self.config.steady_threshold;
        (face_down, steady)
    }

    /// Fold one sample into the statistics, return the updated snapshot
    pub fn process_sample(&mut self, sample: &MotionSample) -> MotionStats {
        let (face_down, steady) = self.classify(sample);
        let s = &mut self.stats;

        s.total_samples += 1;
        s.is_face_down = face_down;
        s.is_steady = steady;
        if face_down {
            s.face_down_samples += 1;
        }
        if steady {
            s.steady_samples += 1;
        }
        s.face_down_percentage = percentage(s.face_down_samples, s.total_samples);
        s.steady_percentage = percentage(s.steady_samples, s.total_samples);

        trace!(
            total = s.total_samples,
            face_down,
            steady,
            "motion sample"
        );
        *s
    }

    /// Zero counters, percentages and live flags
    pub fn reset_stats(&mut self) {
        self.stats = MotionStats::zero();
    }

    /// Current snapshot
    pub fn stats(&self) -> MotionStats {
        self.stats
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn face_down_percentage(&self) -> f64 {
        self.stats.face_down_percentage
    }

    pub fn steady_percentage(&self) -> f64 {
        self.stats.steady_percentage
    }
}

// =============================================================================
// TESTS
// =============================================================================
