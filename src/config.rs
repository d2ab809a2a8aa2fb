//! Runtime configuration
//!
//! Every field defaults to the constants in the crate root, so a config file
//! only needs the values it overrides:
//!
//! ```json
//! { "scoring": { "steady_threshold": 0.2 }, "pass": { "face_down_percentage": 75.0 } }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    FACE_DOWN_THRESHOLD, PASS_FACE_DOWN_PERCENTAGE, PASS_STEADY_PERCENTAGE, POD_HISTORY_LIMIT,
    SAMPLE_INTERVAL_MS, STEADY_THRESHOLD, TICK_INTERVAL_MS, USER_HISTORY_LIMIT,
};

/// Configuration load/validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "C001_CONFIG_IO",
            Self::Parse { .. } => "C002_CONFIG_PARSE",
            Self::Invalid(_) => "C003_CONFIG_INVALID",
        }
    }
}

/// Sample classification and sampling rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// gravity.z strictly below this is face-down
    pub face_down_threshold: f64,
    /// acceleration magnitude strictly below this is steady
    pub steady_threshold: f64,
    pub sample_interval_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            face_down_threshold: FACE_DOWN_THRESHOLD,
            steady_threshold: STEADY_THRESHOLD,
            sample_interval_ms: SAMPLE_INTERVAL_MS,
        }
    }
}

impl ScoringConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// Session verdict thresholds (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassCriteria {
    pub face_down_percentage: f64,
    pub steady_percentage: f64,
}

impl Default for PassCriteria {
    fn default() -> Self {
        Self {
            face_down_percentage: PASS_FACE_DOWN_PERCENTAGE,
            steady_percentage: PASS_STEADY_PERCENTAGE,
        }
    }
}

impl PassCriteria {
    pub fn is_passed(&self, face_down_percentage: f64, steady_percentage: f64) -> bool {
        face_down_percentage >= self.face_down_percentage
            && steady_percentage >= self.steady_percentage
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceDownConfig {
    pub scoring: ScoringConfig,
    pub pass: PassCriteria,
    pub tick_interval_ms: u64,
    /// Where records and the anonymous identity are kept
    pub data_dir: PathBuf,
    pub user_history_limit: usize,
    pub pod_history_limit: usize,
}

impl Default for FaceDownConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            pass: PassCriteria::default(),
            tick_interval_ms: TICK_INTERVAL_MS,
            data_dir: PathBuf::from("./facedown-data"),
            user_history_limit: USER_HISTORY_LIMIT,
            pod_history_limit: POD_HISTORY_LIMIT,
        }
    }
}

impl FaceDownConfig {
    /// Load from a JSON file and validate
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scoring;
        if !(-1.0..=1.0).contains(&s.face_down_threshold) {
            return Err(ConfigError::Invalid(format!(
                "face_down_threshold {} outside [-1, 1]",
                s.face_down_threshold
            )));
        }
        if !(s.steady_threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "steady_threshold {} must be positive",
                s.steady_threshold
            )));
        }
        if s.sample_interval_ms == 0 || self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("intervals must be non-zero".to_string()));
        }
        for (name, value) in [
            ("pass.face_down_percentage", self.pass.face_down_percentage),
            ("pass.steady_percentage", self.pass.steady_percentage),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{} {} outside [0, 100]", name, value)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_constants() {
        let config = FaceDownConfig::default();
        assert_eq!(config.scoring.face_down_threshold, -0.75);
        assert_eq!(config.scoring.steady_threshold, 0.15);
        assert_eq!(config.scoring.sample_interval(), Duration::from_millis(100));
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pass_criteria_inclusive() {
        let pass = PassCriteria::default();
        assert!(pass.is_passed(80.0, 70.0));
        assert!(!pass.is_passed(79.9, 70.0));
        assert!(!pass.is_passed(80.0, 69.9));
        assert!(pass.is_passed(100.0, 100.0));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "scoring": {{ "steady_threshold": 0.2 }} }}"#).unwrap();

        let config = FaceDownConfig::load(file.path()).unwrap();
        assert_eq!(config.scoring.steady_threshold, 0.2);
        assert_eq!(config.scoring.face_down_threshold, -0.75);
        assert_eq!(config.pass, PassCriteria::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = FaceDownConfig::default();
        config.scoring.steady_threshold = 0.0;
        assert_eq!(config.validate().unwrap_err().code(), "C003_CONFIG_INVALID");

        let mut config = FaceDownConfig::default();
        config.pass.steady_percentage = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = FaceDownConfig::load(Path::new("/nonexistent/facedown.json")).unwrap_err();
        assert_eq!(err.code(), "C001_CONFIG_IO");
    }
}
