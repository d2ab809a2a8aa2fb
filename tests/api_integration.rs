//! Integration tests for the HTTP API
//!
//! Tests session endpoints and history queries

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use facedown::config::FaceDownConfig;
use facedown::core::{
    create_router, record_to_document, AnonymousIdentity, MemoryStore, SessionServices,
};
use facedown::types::{Pod, SessionRecord};
use serde_json::{json, Value};
use tower::ServiceExt;

fn create_test_router() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let services = SessionServices::new(Arc::new(AnonymousIdentity::signed_in("api-user")), store.clone());
    (create_router(services, FaceDownConfig::default()), store)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn new_session(app: &Router, body: Value) -> String {
    let (status, json) = send(app, "POST", "/session/new", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    json["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_router();
    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], facedown::VERSION);
    assert_eq!(json["sessions_active"], 0);
    assert_eq!(json["sessions_held"], 0);
}

#[tokio::test]
async fn test_create_session() {
    let (app, _) = create_test_router();
    let (status, json) = send(&app, "POST", "/session/new", Some(json!({"minutes": 25}))).await;

    assert_eq!(status, StatusCode::OK);
    let id = json["session_id"].as_str().unwrap();
    assert_eq!(json["websocket_url"], format!("/ws/{}", id));

    let (status, json) = send(&app, "GET", &format!("/session/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "IDLE");
    assert_eq!(json["remaining_seconds"], 1500);
    assert_eq!(json["time"], "25:00");
    assert_eq!(json["reason"], "R000_SESSION_CREATED");
    assert!(json["result"].is_null());
}

#[tokio::test]
async fn test_zero_minutes_rejected() {
    let (app, _) = create_test_router();
    let (status, _) = send(&app, "POST", "/session/new", Some(json!({"minutes": 0}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let (app, _) = create_test_router();
    for (method, uri) in [
        ("GET", "/session/nope"),
        ("POST", "/session/nope/start"),
        ("POST", "/session/nope/stop"),
        ("DELETE", "/session/nope"),
    ] {
        let (status, _) = send(&app, method, uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn test_full_session_flow() {
    let (app, store) = create_test_router();
    let id = new_session(&app, json!({"minutes": 5, "pod_id": "library"})).await;

    let (status, json) = send(&app, "POST", &format!("/session/{}/start", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "RUNNING");
    assert_eq!(json["pod_id"], "library");

    let (status, _) = send(&app, "POST", &format!("/session/{}/start", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let face_down = json!({
        "gravity": {"x": 0.0, "y": 0.0, "z": -0.98},
        "acceleration": {"x": 0.01, "y": 0.0, "z": 0.0}
    });
    let (status, _) = send(&app, "POST", &format!("/session/{}/sample", id), Some(face_down)).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, json) = send(&app, "POST", &format!("/session/{}/stop", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "FINISHED");
    assert_eq!(json["reason"], "R301_FINISHED_MANUAL");
    assert_eq!(json["result"]["userId"], "api-user");
    assert_eq!(json["result"]["podId"], "library");

    let (status, _) = send(&app, "POST", &format!("/session/{}/stop", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // save is fire-and-forget
    for _ in 0..50 {
        if !store.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.len(), 1);

    let (status, json) = send(&app, "GET", "/users/api-user/sessions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["sessions"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "DELETE", &format!("/session/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &format!("/session/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pod_history_limit_and_order() {
    let (app, store) = create_test_router();
    for (hour, pod) in [(8, "study"), (9, "study"), (10, "other"), (11, "study")] {
        let start = chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2025, 10, 3, hour, 0, 0).unwrap();
        let record = SessionRecord {
            user_id: format!("user-{}", hour),
            pod: Pod::Id(pod.to_string()),
            start_time: start,
            end_time: start + chrono::Duration::minutes(25),
            duration_seconds: 1500,
            face_down_percentage: 90.0,
            steady_percentage: 90.0,
            passed: true,
        };
        store.insert_document(record_to_document(&record).unwrap());
    }
    store.insert_document(json!({"userId": "broken", "podId": "study"}));

    let (status, json) = send(&app, "GET", "/pods/study/sessions?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let sessions = json["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["userId"], "user-11");
    assert_eq!(sessions[1]["userId"], "user-9");

    let (_, json) = send(&app, "GET", "/pods/study/sessions", None).await;
    assert_eq!(json["sessions"].as_array().unwrap().len(), 3);
}

fn sample_json(face_down: bool, steady: bool) -> Value {
    json!({
        "gravity": {"x": 0.0, "y": 0.0, "z": if face_down { -0.98 } else { 0.4 }},
        "acceleration": {"x": if steady { 0.01 } else { 0.5 }, "y": 0.0, "z": 0.0}
    })
}

#[tokio::test(start_paused = true)]
async fn test_pushed_samples_reach_scorer() {
    let (app, _) = create_test_router();
    let id = new_session(&app, json!({"minutes": 5})).await;
    send(&app, "POST", &format!("/session/{}/start", id), None).await;

    for i in 0..10 {
        let (status, _) = send(
            &app,
            "POST",
            &format!("/session/{}/sample", id),
            Some(sample_json(i < 9, i < 8)),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    // one sample per 100 ms; the countdown ticks once at 1 s
    tokio::time::sleep(Duration::from_millis(1_050)).await;

    let (_, json) = send(&app, "GET", &format!("/session/{}", id), None).await;
    assert_eq!(json["state"], "RUNNING");
    assert_eq!(json["remaining_seconds"], 299);
    assert_eq!(json["stats"]["total_samples"], 10);
    assert_eq!(json["stats"]["face_down_samples"], 9);
    assert_eq!(json["stats"]["steady_samples"], 8);

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["sessions_active"], 1);

    let (status, json) = send(&app, "POST", &format!("/session/{}/stop", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let face_down = json["result"]["faceDownPercentage"].as_f64().unwrap();
    let steady = json["result"]["steadyPercentage"].as_f64().unwrap();
    assert!((face_down - 90.0).abs() < 1e-9);
    assert!((steady - 80.0).abs() < 1e-9);
    assert_eq!(json["result"]["passed"], true);
}

#[tokio::test]
async fn test_finished_sessions_are_evicted() {
    let (app, store) = create_test_router();
    let mut finished = Vec::new();
    for _ in 0..3 {
        let id = new_session(&app, json!({"minutes": 5})).await;
        send(&app, "POST", &format!("/session/{}/start", id), None).await;
        send(&app, "POST", &format!("/session/{}/stop", id), None).await;
        finished.push(id);
    }

    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["sessions_active"], 0);
    assert_eq!(health["sessions_held"], 3);

    for _ in 0..50 {
        if store.len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(store.len(), 3);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let fresh = new_session(&app, json!({"minutes": 5})).await;
    let (_, health) = send(&app, "GET", "/health", None).await;
    assert_eq!(health["sessions_held"], 1);

    for id in &finished {
        let (status, _) = send(&app, "GET", &format!("/session/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    let (status, _) = send(&app, "GET", &format!("/session/{}", fresh), None).await;
    assert_eq!(status, StatusCode::OK);

    // results stay queryable from the store
    let (_, json) = send(&app, "GET", "/users/api-user/sessions", None).await;
    assert_eq!(json["sessions"].as_array().unwrap().len(), 3);
}
