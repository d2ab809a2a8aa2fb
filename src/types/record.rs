//! Finished session records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Optional group a session is tagged with
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Pod {
    /// Solo session
    #[default]
    None,
    /// Session counted towards a pod's reporting
    Id(String),
}

impl Pod {
    pub fn id(&self) -> Option<&str> {
        match self {
            Pod::None => None,
            Pod::Id(id) => Some(id),
        }
    }
}

impl From<Option<String>> for Pod {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(id) => Pod::Id(id),
            None => Pod::None,
        }
    }
}

impl From<Pod> for Option<String> {
    fn from(pod: Pod) -> Self {
        match pod {
            Pod::None => None,
            Pod::Id(id) => Some(id),
        }
    }
}

impl std::fmt::Display for Pod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Pod::None => write!(f, "-"),
            Pod::Id(id) => write!(f, "{}", id),
        }
    }
}

/// Result of one finished session. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user_id: String,
    #[serde(rename = "podId")]
    pub pod: Pod,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Wall clock, truncated; may exceed the nominal length when stopped late
    pub duration_seconds: i64,
    pub face_down_percentage: f64,
    pub steady_percentage: f64,
    pub passed: bool,
}

impl SessionRecord {
    pub fn duration_minutes(&self) -> f64 {
        self.duration_seconds as f64 / 60.0
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "{} | {} | {:.1} min | face_down={:.1}% | steady={:.1}% | pod={}",
            self.start_time.format("%Y-%m-%d %H:%M"),
            if self.passed { "PASSED" } else { "FAILED" },
            self.duration_minutes(),
            self.face_down_percentage,
            self.steady_percentage,
            self.pod,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_record(pod: Pod) -> SessionRecord {
        SessionRecord {
            user_id: "user-1".to_string(),
            pod,
            start_time: Utc.with_ymd_and_hms(2025, 10, 3, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 10, 3, 9, 25, 0).unwrap(),
            duration_seconds: 1500,
            face_down_percentage: 91.5,
            steady_percentage: 88.0,
            passed: true,
        }
    }

    #[test]
    fn test_pod_serializes_as_nullable_string() {
        let json = serde_json::to_value(make_record(Pod::None)).unwrap();
        assert!(json["podId"].is_null());

        let json = serde_json::to_value(make_record(Pod::Id("pod-7".to_string()))).unwrap();
        assert_eq!(json["podId"], "pod-7");
        assert_eq!(json["userId"], "user-1");
        assert_eq!(json["durationSeconds"], 1500);
    }

    #[test]
    fn test_duration_minutes() {
        assert_eq!(make_record(Pod::None).duration_minutes(), 25.0);
    }

    #[test]
    fn test_pod_id_accessor() {
        assert_eq!(Pod::None.id(), None);
        assert_eq!(Pod::Id("a".to_string()).id(), Some("a"));
    }
}
