//! HTTP control plane.
//!
//! Start/stop the simulation, read stats snapshots and the loaded
//! configuration. Deliberately unauthenticated: the simulator is an
//! internal tool driven from localhost or a trusted network.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::config::SimulatorConfig;
use crate::engine::{Engine, EngineError};
use crate::stats::{StatsCollector, StatsSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub stats: Arc<StatsCollector>,
    pub config: Arc<SimulatorConfig>,
}

#[derive(Serialize)]
struct StatusBody {
    running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/stats", get(stats))
        .route("/config", get(config))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn status(State(state): State<AppState>) -> Json<StatusBody> {
    Json(StatusBody {
        running: state.engine.is_running(),
        message: None,
    })
}

async fn start(
    State(state): State<AppState>,
) -> Result<Json<StatusBody>, (StatusCode, Json<ErrorBody>)> {
    match state.engine.start() {
        Ok(()) => Ok(Json(StatusBody {
            running: true,
            message: Some("simulation started"),
        })),
        Err(err @ EngineError::AlreadyRunning) => Err((
            StatusCode::CONFLICT,
            Json(ErrorBody {
                error: err.to_string(),
            }),
        )),
        Err(err) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: err.to_string(),
            }),
        )),
    }
}

async fn stop(State(state): State<AppState>) -> Json<StatusBody> {
    state.engine.stop().await;
    Json(StatusBody {
        running: false,
        message: Some("simulation stopped"),
    })
}

async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot())
}

async fn config(State(state): State<AppState>) -> Json<SimulatorConfig> {
    Json((*state.config).clone())
}
