//! HTTP + WebSocket API for FaceDown sessions
//!
//! Endpoints:
//! - POST /session/new - Create session
//! - GET /session/{id} - Get session status
//! - POST /session/{id}/start - Start countdown and monitoring
//! - POST /session/{id}/stop - Stop early
//! - POST /session/{id}/sample - Push a motion sample
//! - DELETE /session/{id} - Discard session (stops monitoring)
//! - GET /users/{user_id}/sessions - User history
//! - GET /pods/{pod_id}/sessions - Pod history
//! - WS /ws/{id} - Live updates out, samples in
//! - GET /health - Health check

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade, ws::{Message, WebSocket}},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::FaceDownConfig;
use crate::core::controller::{spawn_ticker, SessionController, SessionServices};
use crate::core::sensor::BufferedSensor;
use crate::types::{
    format_countdown, MotionSample, MotionStats, Pod, ReasonCode, SessionRecord, SessionState,
    SessionUpdate,
};

/// A live session and the sensor its client feeds
pub struct Session {
    pub controller: Arc<Mutex<SessionController>>,
    pub sensor: Arc<BufferedSensor>,
    ticker: Option<JoinHandle<()>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// App state
pub struct AppState {
    pub sessions: RwLock<HashMap<String, Session>>,
    pub services: SessionServices,
    pub config: FaceDownConfig,
}

/// Create new session request
#[derive(Debug, Deserialize)]
pub struct NewSessionRequest {
    pub minutes: u32,
    pub pod_id: Option<String>,
}

/// Create new session response
#[derive(Debug, Serialize)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
}

/// Session status response
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub state: String,
    pub remaining_seconds: u32,
    pub time: String,
    pub pod_id: Option<String>,
    pub stats: MotionStats,
    pub reason: ReasonCode,
    pub result: Option<SessionRecord>,
}

/// History query
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// History response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub sessions: Vec<SessionRecord>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Sessions currently running
    pub sessions_active: usize,
    /// Sessions held in memory, any state
    pub sessions_held: usize,
}

/// Create the API router
pub fn create_router(services: SessionServices, config: FaceDownConfig) -> Router {
    let state = Arc::new(AppState {
        sessions: RwLock::new(HashMap::new()),
        services,
        config,
    });

    Router::new()
        .route("/health", get(health))
        .route("/session/new", post(create_session))
        .route("/session/:id", get(get_session).delete(delete_session))
        .route("/session/:id/start", post(start_session))
        .route("/session/:id/stop", post(stop_session))
        .route("/session/:id/sample", post(push_sample))
        .route("/users/:user_id/sessions", get(user_sessions))
        .route("/pods/:pod_id/sessions", get(pod_sessions))
        .route("/ws/:id", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.sessions.read().await;
    let mut running = 0;
    for session in sessions.values() {
        if session.controller.lock().await.is_running() {
            running += 1;
        }
    }
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: running,
        sessions_held: sessions.len(),
    })
}

/// Create new session
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewSessionRequest>,
) -> Result<Json<NewSessionResponse>, StatusCode> {
    if req.minutes == 0 {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let session_id = format!("session_{}", Uuid::new_v4().simple());
    let sensor = Arc::new(BufferedSensor::new());
    let controller = SessionController::new(
        req.minutes,
        Pod::from(req.pod_id),
        sensor.clone(),
        state.services.clone(),
        state.config.clone(),
    );

    let session = Session {
        controller: Arc::new(Mutex::new(controller)),
        sensor,
        ticker: None,
    };

    let mut sessions = state.sessions.write().await;
    prune_finished(&mut sessions);
    sessions.insert(session_id.clone(), session);
    info!(session_id = %session_id, minutes = req.minutes, "session created");

    Ok(Json(NewSessionResponse {
        session_id: session_id.clone(),
        websocket_url: format!("/ws/{}", session_id),
    }))
}

/// Get session status
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, StatusCode> {
    let controller = find_controller(&state, &id).await?;
    let controller = controller.lock().await;
    Ok(Json(status_of(id, &controller)))
}

/// Start countdown and monitoring
async fn start_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<SessionStatusResponse>), StatusCode> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;

    let mut controller = session.controller.lock().await;
    let reason = controller.start();
    let status = status_of(id, &controller);
    drop(controller);

    if reason != ReasonCode::R100_SESSION_STARTED {
        return Ok((StatusCode::CONFLICT, Json(status)));
    }
    session.ticker = Some(spawn_ticker(session.controller.clone()));
    Ok((StatusCode::OK, Json(status)))
}

/// Stop early
async fn stop_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<SessionStatusResponse>), StatusCode> {
    let controller = find_controller(&state, &id).await?;
    let mut controller = controller.lock().await;
    let reason = controller.stop();
    let code = if reason == ReasonCode::R302_STOP_IGNORED {
        StatusCode::CONFLICT
    } else {
        StatusCode::OK
    };
    Ok((code, Json(status_of(id, &controller))))
}

/// Discard a session; dropping the controller releases monitoring
async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> StatusCode {
    let mut sessions = state.sessions.write().await;
    match sessions.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

/// Push one sample into the session's sensor
async fn push_sample(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(sample): Json<MotionSample>,
) -> StatusCode {
    let sessions = state.sessions.read().await;
    match sessions.get(&id) {
        Some(session) => {
            session.sensor.push(sample);
            StatusCode::ACCEPTED
        }
        None => StatusCode::NOT_FOUND,
    }
}

/// A user's history, newest first
async fn user_sessions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, StatusCode> {
    let limit = query.limit.unwrap_or(state.config.user_history_limit);
    let store = state.services.store.clone();
    let sessions = tokio::task::spawn_blocking(move || store.fetch_user_sessions(&user_id, limit))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            warn!(code = e.code(), error = %e, "history query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(HistoryResponse { sessions }))
}

/// A pod's history, newest first
async fn pod_sessions(
    State(state): State<Arc<AppState>>,
    Path(pod_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, StatusCode> {
    let limit = query.limit.unwrap_or(state.config.pod_history_limit);
    let store = state.services.store.clone();
    let sessions = tokio::task::spawn_blocking(move || store.fetch_pod_sessions(&pod_id, limit))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|e| {
            warn!(code = e.code(), error = %e, "pod history query failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(HistoryResponse { sessions }))
}

/// WebSocket handler for live updates
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let sessions = state.sessions.read().await;
    let session = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let rx = session.controller.lock().await.subscribe();
    let sensor = session.sensor.clone();
    drop(sessions);

    Ok(ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, rx, sensor).await;
    }))
}

async fn handle_websocket(
    socket: WebSocket,
    rx: broadcast::Receiver<SessionUpdate>,
    sensor: Arc<BufferedSensor>,
) {
    let (sender, receiver) = socket.split();
    pump_socket(sender, receiver, rx, sensor).await;
}

/// Forward updates to the client; accept samples from it. Returns when
/// either direction closes.
async fn pump_socket<Tx, Rx, E>(
    mut sender: Tx,
    mut receiver: Rx,
    mut rx: broadcast::Receiver<SessionUpdate>,
    sensor: Arc<BufferedSensor>,
) where
    Tx: Sink<Message> + Unpin + Send + 'static,
    Rx: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Send + 'static,
{
    let mut send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(update) => {
                    let json = serde_json::to_string(&update).unwrap_or_default();
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "websocket client lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<MotionSample>(&text) {
                    Ok(sample) => sensor.push(sample),
                    Err(e) => debug!(error = %e, "ignoring malformed sample"),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

async fn find_controller(
    state: &AppState,
    id: &str,
) -> Result<Arc<Mutex<SessionController>>, StatusCode> {
    let sessions = state.sessions.read().await;
    sessions
        .get(id)
        .map(|s| s.controller.clone())
        .ok_or(StatusCode::NOT_FOUND)
}

/// Drop finished sessions whose save has resolved; their results are in the
/// store. Sessions locked by a request in flight are kept for the next pass.
fn prune_finished(sessions: &mut HashMap<String, Session>) {
    let before = sessions.len();
    sessions.retain(|_, session| match session.controller.try_lock() {
        Ok(controller) => {
            controller.state() != SessionState::Finished || controller.save_pending()
        }
        Err(_) => true,
    });
    let evicted = before - sessions.len();
    if evicted > 0 {
        debug!(evicted, "finished sessions evicted");
    }
}

fn status_of(session_id: String, controller: &SessionController) -> SessionStatusResponse {
    let update = controller.current_update();
    SessionStatusResponse {
        session_id,
        state: update.state.to_string(),
        remaining_seconds: update.remaining_seconds,
        time: format_countdown(update.remaining_seconds),
        pod_id: controller.pod().id().map(str::to_string),
        stats: update.stats,
        reason: update.reason,
        result: controller.last_record().cloned(),
    }
}

/// Run the API server
pub async fn run_server(
    addr: &str,
    services: SessionServices,
    config: FaceDownConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_router(services, config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "FaceDown API listening");
    println!("📵 FaceDown API running on {}", addr);
    println!("  POST   /session/new          - Create session");
    println!("  GET    /session/:id          - Get status");
    println!("  POST   /session/:id/start    - Start");
    println!("  POST   /session/:id/stop     - Stop");
    println!("  POST   /session/:id/sample   - Push sample");
    println!("  DELETE /session/:id          - Discard");
    println!("  GET    /users/:id/sessions   - User history");
    println!("  GET    /pods/:id/sessions    - Pod history");
    println!("  WS     /ws/:id               - Live updates");
    println!("  GET    /health               - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
