//! Template administration endpoints.
//!
//! Templates are addressed as `locale:templateId`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::job::JobType;
use crate::repository::TemplateCriteria;
use crate::server::AppState;
use crate::template::Template;

use super::{CollectionMeta, Page};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateRequest {
    #[serde(default)]
    pub update_parameters: bool,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub html_body: String,
    #[serde(default)]
    pub text_body: String,
}

#[derive(Debug, Deserialize)]
pub struct TestTemplateRequest {
    /// `locale:templateId`
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub target: String,
}

/// Split `locale:templateId` on the first colon
pub fn parse_template_key(key: &str) -> Result<(String, String)> {
    match key.split_once(':') {
        Some((locale, template_id)) if !locale.is_empty() && !template_id.is_empty() => {
            Ok((template_id.to_string(), locale.to_string()))
        }
        _ => Err(AppError::Validation(format!(
            "Invalid id {}, locale:templateId expected",
            key
        ))),
    }
}

async fn load(state: &AppState, key: &str) -> Result<Template> {
    let (template_id, locale) = parse_template_key(key)?;
    Ok(state
        .dispatcher
        .template_repository()
        .get(&template_id, &locale)
        .await?)
}

/// Fill in a missing text body and make sure every part renders
fn prepare(state: &AppState, template: &mut Template) -> Result<()> {
    if template.text_body.is_empty() {
        if let Some(text) = state.dispatcher.html_to_text(&template.html_body) {
            template.text_body = text;
        }
    }

    state.dispatcher.preview(template).map_err(|e| {
        AppError::Unprocessable(format!("Failed to render template with error: {}", e))
    })?;

    Ok(())
}

/// GET /api/v1/templates
#[tracing::instrument(name = "http.list_templates", skip(state))]
pub async fn list_templates(
    State(state): State<AppState>,
    Query(criteria): Query<TemplateCriteria>,
) -> Result<Json<Page<Template>>> {
    let (data, total) = state
        .dispatcher
        .template_repository()
        .matching(&criteria)
        .await?;

    Ok(Json(Page {
        data,
        meta: CollectionMeta {
            total,
            limit: criteria.page_limit(),
            offset: criteria.page_offset(),
        },
    }))
}

/// POST /api/v1/templates
#[tracing::instrument(
    name = "http.create_template",
    skip(state, template),
    fields(template_id = %template.template_id, locale = %template.locale)
)]
pub async fn create_template(
    State(state): State<AppState>,
    Json(mut template): Json<Template>,
) -> Result<(StatusCode, Json<Template>)> {
    if template.template_id.is_empty() || template.locale.is_empty() {
        return Err(AppError::Validation(
            "Template id and locale are required".to_string(),
        ));
    }

    prepare(&state, &mut template)?;

    let now = Utc::now();
    template.created_at = now;
    template.updated_at = now;
    state.dispatcher.template_repository().create(&template).await?;

    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /api/v1/templates/{id}
#[tracing::instrument(name = "http.get_template", skip(state))]
pub async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Template>> {
    Ok(Json(load(&state, &id).await?))
}

/// PUT /api/v1/templates/{id}
#[tracing::instrument(name = "http.update_template", skip(state, request))]
pub async fn update_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateTemplateRequest>,
) -> Result<Json<Template>> {
    let mut template = load(&state, &id).await?;

    template.subject = request.subject;
    template.text_body = request.text_body;
    template.html_body = request.html_body;
    template.update_parameters = request.update_parameters;
    template.enabled = request.enabled;
    template.description = request.description;

    prepare(&state, &mut template)?;

    template.updated_at = Utc::now();
    state.dispatcher.template_repository().update(&template).await?;

    Ok(Json(template))
}

/// DELETE /api/v1/templates/{id}
#[tracing::instrument(name = "http.delete_template", skip(state))]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let template = load(&state, &id).await?;
    state.dispatcher.template_repository().delete(&template).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/templates/test - Send a template with its stored parameters
#[tracing::instrument(name = "http.test_template", skip(state, request), fields(id = %request.id))]
pub async fn test_template(
    State(state): State<AppState>,
    Json(request): Json<TestTemplateRequest>,
) -> Result<StatusCode> {
    let template = load(&state, &request.id).await?;

    let job_type: JobType = request
        .job_type
        .parse()
        .map_err(AppError::Validation)?;

    state
        .dispatcher
        .send(
            job_type,
            &template.template_id,
            &template.locale,
            &request.target,
            "",
            template.parameters.clone(),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_template_key() {
        assert_eq!(
            parse_template_key("en:welcome").unwrap(),
            ("welcome".to_string(), "en".to_string())
        );
        assert_eq!(
            parse_template_key("sv:order:shipped").unwrap(),
            ("order:shipped".to_string(), "sv".to_string())
        );
        assert!(parse_template_key("welcome").is_err());
        assert!(parse_template_key(":welcome").is_err());
        assert!(parse_template_key("en:").is_err());
    }
}
