//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub queue: QueueHealthResponse,
    pub transports: TransportHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct QueueHealthResponse {
    pub workers: usize,
    pub queued: usize,
}

#[derive(Debug, Serialize)]
pub struct TransportHealthResponse {
    pub email: Option<String>,
    pub sms: Option<String>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let dispatcher = &state.dispatcher;

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        queue: QueueHealthResponse {
            workers: dispatcher.worker_count(),
            queued: dispatcher.queued(),
        },
        transports: TransportHealthResponse {
            email: dispatcher
                .transport(crate::job::JobType::Email)
                .map(|t| t.name().to_string()),
            sms: dispatcher
                .transport(crate::job::JobType::Sms)
                .map(|t| t.name().to_string()),
        },
    })
}
