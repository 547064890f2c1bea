//! Job submission and listing endpoints.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::Result;
use crate::job::{Job, JobType, Params};
use crate::repository::JobCriteria;
use crate::server::AppState;

use super::{CollectionMeta, Page};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub template_id: String,
    pub locale: String,
    pub target: String,
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub params: Params,
}

/// POST /api/v1/jobs - Persist and queue a job; delivery is asynchronous
#[tracing::instrument(
    name = "http.send",
    skip(state, request),
    fields(job_type = %request.job_type, template_id = %request.template_id)
)]
pub async fn send(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Result<(StatusCode, Json<Job>)> {
    let job = state
        .dispatcher
        .send(
            request.job_type,
            &request.template_id,
            &request.locale,
            &request.target,
            &request.external_id,
            request.params,
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// GET /api/v1/jobs
#[tracing::instrument(name = "http.list_jobs", skip(state))]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(criteria): Query<JobCriteria>,
) -> Result<Json<Page<Job>>> {
    let (data, total) = state.dispatcher.job_repository().matching(&criteria).await?;

    Ok(Json(Page {
        data,
        meta: CollectionMeta {
            total,
            limit: criteria.page_limit(),
            offset: criteria.page_offset(),
        },
    }))
}
