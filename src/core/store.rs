//! Session record store
//!
//! Records are kept as loose JSON documents using the interchange field
//! names (`userId`, `podId`, `startTime`, ...). Reading is forgiving:
//! timestamps may be RFC 3339 strings or `{"seconds", "nanoseconds"}`
//! wrappers, and a document that does not decode is dropped on its own
//! instead of failing the whole query.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{Pod, SessionRecord};

/// Store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Get the code string (for logging)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "S001_STORE_IO",
            Self::Serialize(_) => "S002_STORE_SERIALIZE",
            Self::Unavailable(_) => "S003_STORE_UNAVAILABLE",
        }
    }
}

/// Document store for finished sessions
pub trait SessionStore: Send + Sync {
    /// Write a record, return its document id
    fn save(&self, record: &SessionRecord) -> Result<String, StoreError>;

    /// Every stored document, undecoded
    fn documents(&self) -> Result<Vec<Value>, StoreError>;

    /// A user's sessions, newest first
    fn fetch_user_sessions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(query(self.documents()?, |r| r.user_id == user_id, limit))
    }

    /// A pod's sessions, newest first
    fn fetch_pod_sessions(
        &self,
        pod_id: &str,
        limit: usize,
    ) -> Result<Vec<SessionRecord>, StoreError> {
        Ok(query(self.documents()?, |r| r.pod.id() == Some(pod_id), limit))
    }
}

fn query(
    documents: Vec<Value>,
    filter: impl Fn(&SessionRecord) -> bool,
    limit: usize,
) -> Vec<SessionRecord> {
    let mut records: Vec<SessionRecord> = documents
        .iter()
        .filter_map(record_from_document)
        .filter(|r| filter(r))
        .collect();
    records.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    records.truncate(limit);
    records
}

// =============================================================================
// DOCUMENT CODEC
// =============================================================================

/// Encode for storage (timestamps as RFC 3339 strings)
pub fn record_to_document(record: &SessionRecord) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(record)?)
}

/// Decode a stored document; `None` when a required field is missing,
/// ill-typed, or a timestamp cannot be read
pub fn record_from_document(doc: &Value) -> Option<SessionRecord> {
    let decoded = (|| {
        Some(SessionRecord {
            user_id: doc.get("userId")?.as_str()?.to_string(),
            pod: Pod::from(doc.get("podId").and_then(Value::as_str).map(str::to_string)),
            start_time: parse_timestamp(doc.get("startTime")?)?,
            end_time: parse_timestamp(doc.get("endTime")?)?,
            duration_seconds: doc.get("durationSeconds")?.as_i64()?,
            face_down_percentage: doc.get("faceDownPercentage")?.as_f64()?,
            steady_percentage: doc.get("steadyPercentage")?.as_f64()?,
            passed: doc.get("passed")?.as_bool()?,
        })
    })();
    if decoded.is_none() {
        debug!(document = %doc, "dropping malformed session document");
    }
    decoded
}

/// RFC 3339 string, or a `{"seconds", "nanoseconds"}` wrapper
/// (also accepted with leading underscores)
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))?
                .as_i64()?;
            let nanos = match map.get("nanoseconds").or_else(|| map.get("_nanoseconds")) {
                Some(n) => u32::try_from(n.as_u64()?).ok()?,
                None => 0,
            };
            DateTime::from_timestamp(seconds, nanos)
        }
        _ => None,
    }
}

// =============================================================================
// JSON DIRECTORY STORE
// =============================================================================

/// One pretty-printed JSON file per record
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl SessionStore for JsonDirStore {
    fn save(&self, record: &SessionRecord) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let path = self.dir.join(format!("{}.json", id));

        let json = serde_json::to_string_pretty(&record_to_document(record)?)?;

        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        info!(document_id = %id, path = %path.display(), "session saved");
        Ok(id)
    }

    fn documents(&self) -> Result<Vec<Value>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut documents = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .ok()
                .and_then(|json| serde_json::from_str::<Value>(&json).ok());
            match parsed {
                Some(doc) => documents.push(doc),
                None => debug!(path = %path.display(), "skipping unreadable document"),
            }
        }
        Ok(documents)
    }
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// Documents in a vector; can be switched to fail every save
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<Vec<Value>>,
    fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose saves always fail
    pub fn failing() -> Self {
        let store = Self::new();
        store.set_fail_saves(true);
        store
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Insert a raw document as another writer might have
    pub fn insert_document(&self, doc: Value) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(doc);
    }

    pub fn len(&self) -> usize {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn save(&self, record: &SessionRecord) -> Result<String, StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".to_string()));
        }
        let doc = record_to_document(record)?;
        self.insert_document(doc);
        Ok(Uuid::new_v4().to_string())
    }

    fn documents(&self) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn make_record(user: &str, pod: Pod, hour: u32) -> SessionRecord {
        SessionRecord {
            user_id: user.to_string(),
            pod,
            start_time: Utc.with_ymd_and_hms(2025, 10, 3, hour, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2025, 10, 3, hour, 25, 0).unwrap(),
            duration_seconds: 1500,
            face_down_percentage: 85.0,
            steady_percentage: 75.0,
            passed: true,
        }
    }

    #[test]
    fn test_round_trip_memory() {
        let store = MemoryStore::new();
        let record = make_record("u1", Pod::Id("p1".to_string()), 9);
        store.save(&record).unwrap();

        let fetched = store.fetch_user_sessions("u1", 10).unwrap();
        assert_eq!(fetched, vec![record]);
    }

    #[test]
    fn test_round_trip_json_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path().join("sessions"));
        let record = make_record("u1", Pod::None, 9);
        store.save(&record).unwrap();

        let fetched = store.fetch_user_sessions("u1", 10).unwrap();
        assert_eq!(fetched, vec![record]);
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path().join("never-created"));
        assert!(store.fetch_user_sessions("u1", 10).unwrap().is_empty());
    }

    #[test]
    fn test_newest_first_with_limit() {
        let store = MemoryStore::new();
        for hour in [8, 11, 9, 10] {
            store.save(&make_record("u1", Pod::None, hour)).unwrap();
        }
        store.save(&make_record("u2", Pod::None, 12)).unwrap();

        let fetched = store.fetch_user_sessions("u1", 3).unwrap();
        let hours: Vec<u32> = fetched
            .iter()
            .map(|r| chrono::Timelike::hour(&r.start_time))
            .collect();
        assert_eq!(hours, vec![11, 10, 9]);
    }

    #[test]
    fn test_pod_filter() {
        let store = MemoryStore::new();
        store.save(&make_record("u1", Pod::Id("deep".to_string()), 9)).unwrap();
        store.save(&make_record("u2", Pod::Id("deep".to_string()), 10)).unwrap();
        store.save(&make_record("u3", Pod::Id("other".to_string()), 11)).unwrap();
        store.save(&make_record("u4", Pod::None, 12)).unwrap();

        let fetched = store.fetch_pod_sessions("deep", 50).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].user_id, "u2");
    }

    #[test]
    fn test_wrapper_timestamps_accepted() {
        let store = MemoryStore::new();
        store.insert_document(json!({
            "userId": "u1",
            "podId": null,
            "startTime": { "seconds": 1759482000, "nanoseconds": 0 },
            "endTime": { "_seconds": 1759483500, "_nanoseconds": 500 },
            "durationSeconds": 1500,
            "faceDownPercentage": 90.0,
            "steadyPercentage": 80,
            "passed": true
        }));

        let fetched = store.fetch_user_sessions("u1", 10).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].start_time.timestamp(), 1759482000);
        assert_eq!(fetched[0].end_time.timestamp_subsec_nanos(), 500);
        assert_eq!(fetched[0].steady_percentage, 80.0);
        assert_eq!(fetched[0].pod, Pod::None);
    }

    #[test]
    fn test_malformed_documents_dropped() {
        let store = MemoryStore::new();
        store.save(&make_record("u1", Pod::None, 9)).unwrap();

        let mut missing_passed = record_to_document(&make_record("u1", Pod::None, 10)).unwrap();
        missing_passed.as_object_mut().unwrap().remove("passed");
        store.insert_document(missing_passed);

        let mut bad_time = record_to_document(&make_record("u1", Pod::None, 11)).unwrap();
        bad_time["startTime"] = json!("yesterday");
        store.insert_document(bad_time);

        let mut wrong_type = record_to_document(&make_record("u1", Pod::None, 12)).unwrap();
        wrong_type["durationSeconds"] = json!("1500");
        store.insert_document(wrong_type);

        let fetched = store.fetch_user_sessions("u1", 10).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_unparseable_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDirStore::new(dir.path());
        store.save(&make_record("u1", Pod::None, 9)).unwrap();
        std::fs::write(dir.path().join("garbage.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.fetch_user_sessions("u1", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_failing_store() {
        let store = MemoryStore::failing();
        let err = store.save(&make_record("u1", Pod::None, 9)).unwrap_err();
        assert_eq!(err.code(), "S003_STORE_UNAVAILABLE");
        assert!(store.is_empty());
    }
}
