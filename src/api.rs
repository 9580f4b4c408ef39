//! HTTP surface.
//!
//! A thin axum layer over the [`Controller`] and its [`StateStore`]:
//! read-only snapshots for dashboards, and two write paths that stage a
//! schedule for the next cycle boundary.
//!
//! | Route | Method | Body |
//! |---|---|---|
//! | `/health` | GET | `{"status":"ok"}` |
//! | `/api/snapshot` | GET | engine snapshot |
//! | `/api/device` | GET | device-reported view |
//! | `/api/scores` | POST | congestion scores → allocation |
//! | `/api/schedule` | POST | explicit schedule → allocation |
//! | `/api/serial_status` | GET | link health |
//! | `/api/payload` | GET | last allocation as plain text |
//!
//! [`StateStore`]: crate::store::StateStore

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::controller::{Controller, ScoreInput};
use crate::error::ApiError;
use crate::schedule::{Direction, PerDirection, Schedule};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 16 * 1024;

/// Binds `bind` and serves the API until `cancel` fires.
///
/// Returns the server task and the bound address (useful with port 0).
///
/// # Errors
///
/// Returns [`ApiError::InvalidAddress`] or [`ApiError::Bind`] when the
/// listener cannot be set up.
pub async fn serve(
    bind: &str,
    controller: Arc<Controller>,
    cancel: CancellationToken,
) -> Result<(JoinHandle<()>, SocketAddr), ApiError> {
    let addr = parse_bind_addr(bind)?;
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ApiError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let bound = listener.local_addr().map_err(|source| ApiError::Bind {
        addr: addr.clone(),
        source,
    })?;

    let router = build_router(controller);
    let handle = tokio::spawn(async move {
        info!(%bound, "HTTP API listening");
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
            })
            .await
            .ok();
        debug!("HTTP API shut down");
    });

    Ok((handle, bound))
}

/// Builds the API router.
pub fn build_router(controller: Arc<Controller>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/snapshot", get(snapshot))
        .route("/api/device", get(device))
        .route("/api/scores", post(submit_scores))
        .route("/api/schedule", post(stage_schedule))
        .route("/api/serial_status", get(serial_status))
        .route("/api/payload", get(payload))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(controller)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn snapshot(State(controller): State<Arc<Controller>>) -> Response {
    Json(controller.store().snapshot(Instant::now())).into_response()
}

async fn device(State(controller): State<Arc<Controller>>) -> Response {
    Json(controller.store().device_view(Instant::now())).into_response()
}

async fn submit_scores(
    State(controller): State<Arc<Controller>>,
    body: axum::body::Bytes,
) -> Response {
    let scores = match parse_scores(&body) {
        Ok(scores) => scores,
        Err(e) => return e.into_response(),
    };
    Json(controller.submit_scores(&scores).await).into_response()
}

async fn stage_schedule(
    State(controller): State<Arc<Controller>>,
    body: axum::body::Bytes,
) -> Response {
    let schedule: Schedule = match serde_json::from_slice(&body) {
        Ok(schedule) => schedule,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid schedule body: {e}") })),
            )
                .into_response();
        }
    };
    match controller.stage_schedule(schedule).await {
        Ok(allocation) => Json(allocation).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn serial_status(State(controller): State<Arc<Controller>>) -> Response {
    Json(controller.bridge().status().await).into_response()
}

async fn payload(State(controller): State<Arc<Controller>>) -> String {
    format_payload(&controller.store().last_allocation())
}

/// Reads a score object. Each direction is looked up by name; missing,
/// non-numeric and null entries become `None` and get the fallback score.
fn parse_scores(body: &[u8]) -> Result<ScoreInput, ApiError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::InvalidScores(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(ApiError::InvalidScores(
            "expected an object keyed by direction".to_string(),
        ));
    };
    Ok(PerDirection::from_fn(|d: Direction| {
        map.get(d.as_str()).and_then(Value::as_f64)
    }))
}

/// Schedule as comma-separated values with two decimals, in wire order.
fn format_payload(schedule: &Schedule) -> String {
    Direction::ALL
        .iter()
        .map(|&d| format!("{:.2},{:.2}", schedule.green(d), schedule.red(d)))
        .collect::<Vec<_>>()
        .join(",")
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidSchedule { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidScores(_) => StatusCode::BAD_REQUEST,
            Self::Bind { .. } | Self::InvalidAddress(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Normalizes a bind address: `"8000"` and `":8000"` bind all interfaces.
///
/// # Errors
///
/// Returns [`ApiError::InvalidAddress`] when the result is not a socket
/// address.
pub fn parse_bind_addr(input: &str) -> Result<String, ApiError> {
    let addr = if input.starts_with(':') {
        format!("0.0.0.0{input}")
    } else if input.parse::<u16>().is_ok() {
        format!("0.0.0.0:{input}")
    } else {
        input.to_string()
    };
    addr.parse::<SocketAddr>()
        .map_err(|_| ApiError::InvalidAddress(input.to_string()))?;
    Ok(addr)
}
