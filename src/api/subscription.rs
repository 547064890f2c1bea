//! Email unsubscribe management, backed by the email transport.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::job::JobType;
use crate::server::AppState;
use crate::transport::Transport;

#[derive(Debug, Serialize)]
pub struct UnsubscriptionsResponse {
    pub templates: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResubscribeRequest {
    pub email: String,
    #[serde(default)]
    pub templates: Vec<String>,
}

fn email_transport(state: &AppState) -> Result<Arc<dyn Transport>> {
    state
        .dispatcher
        .transport(JobType::Email)
        .ok_or_else(|| AppError::Internal("No email transport configured".to_string()))
}

fn unsupported() -> AppError {
    AppError::Internal("Transport does not support managing subscriptions".to_string())
}

/// GET /api/v1/subscriptions/{email}
#[tracing::instrument(name = "http.unsubscriptions", skip(state))]
pub async fn get_unsubscriptions(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<UnsubscriptionsResponse>> {
    let transport = email_transport(&state)?;
    let manager = transport.subscriptions().ok_or_else(unsupported)?;

    let templates = manager.unsubscribed_templates(&email).await?;
    Ok(Json(UnsubscriptionsResponse { templates }))
}

/// POST /api/v1/subscriptions/resubscribe
///
/// An empty template list resubscribes the address to everything.
#[tracing::instrument(name = "http.resubscribe", skip(state, request), fields(email = %request.email))]
pub async fn resubscribe(
    State(state): State<AppState>,
    Json(request): Json<ResubscribeRequest>,
) -> Result<StatusCode> {
    if request.email.is_empty() {
        return Err(AppError::Validation("email is required".to_string()));
    }

    let transport = email_transport(&state)?;
    let manager = transport.subscriptions().ok_or_else(unsupported)?;

    if request.templates.is_empty() {
        manager.resubscribe_all(&request.email).await?;
    } else {
        try_join_all(
            request
                .templates
                .iter()
                .map(|template_id| manager.resubscribe_template(&request.email, template_id)),
        )
        .await?;
    }

    Ok(StatusCode::NO_CONTENT)
}
