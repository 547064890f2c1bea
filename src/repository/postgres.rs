//! PostgreSQL repositories.
//!
//! Table structure (see `migrations/`):
//! - `communication_jobs` - one row per job, params stored as JSONB
//! - `communication_templates` - primary key (`template_id`, `locale`)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::job::{Job, JobType, Params};
use crate::template::Template;

use super::{JobCriteria, JobRepository, RepositoryError, TemplateCriteria, TemplateRepository};

const JOB_COLUMNS: &str =
    "id, external_id, job_type, template_id, locale, target, params, sent_at, created_at";

const TEMPLATE_COLUMNS: &str = "template_id, locale, enabled, description, parameters, \
     update_parameters, subject, text_body, html_body, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    external_id: String,
    job_type: String,
    template_id: String,
    locale: String,
    target: String,
    params: serde_json::Value,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = RepositoryError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let job_type: JobType = row
            .job_type
            .parse()
            .map_err(RepositoryError::Unavailable)?;

        Ok(Job {
            id: row.id,
            external_id: row.external_id,
            job_type,
            template_id: row.template_id,
            locale: row.locale,
            target: row.target,
            params: json_to_params(row.params)?,
            sent_at: row.sent_at,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    template_id: String,
    locale: String,
    enabled: bool,
    description: String,
    parameters: serde_json::Value,
    update_parameters: bool,
    subject: String,
    text_body: String,
    html_body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for Template {
    type Error = RepositoryError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(Template {
            template_id: row.template_id,
            locale: row.locale,
            enabled: row.enabled,
            description: row.description,
            parameters: json_to_params(row.parameters)?,
            update_parameters: row.update_parameters,
            subject: row.subject,
            text_body: row.text_body,
            html_body: row.html_body,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `LIKE` pattern matching values that start with `prefix` literally
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn json_to_params(value: serde_json::Value) -> Result<Params, RepositoryError> {
    match value {
        serde_json::Value::Null => Ok(Params::new()),
        other => Ok(serde_json::from_value(other)?),
    }
}

/// PostgreSQL-backed job repository
pub struct PostgresJobRepository {
    pool: PgPool,
}

impl PostgresJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, criteria: &JobCriteria) {
        builder.push(" WHERE TRUE");

        if let Some(job_type) = criteria.job_type {
            builder.push(" AND job_type = ").push_bind(job_type.as_str());
        }
        if let Some(prefix) = criteria.template_id.as_deref().filter(|v| !v.is_empty()) {
            builder
                .push(" AND template_id LIKE ")
                .push_bind(like_prefix(prefix))
                .push(" ESCAPE '\\'");
        }
        if let Some(locale) = criteria.locale.as_deref().filter(|v| !v.is_empty()) {
            builder
                .push(" AND LOWER(locale) = LOWER(")
                .push_bind(locale.to_string())
                .push(")");
        }
        if let Some(target) = criteria.target.as_deref().filter(|v| !v.is_empty()) {
            builder
                .push(" AND LOWER(target) = LOWER(")
                .push_bind(target.to_string())
                .push(")");
        }
        if let Some(external_id) = criteria.external_id.as_deref().filter(|v| !v.is_empty()) {
            builder
                .push(" AND external_id = ")
                .push_bind(external_id.to_string());
        }
        if let Some(after) = criteria.sent_after {
            builder.push(" AND sent_at >= ").push_bind(after);
        }
        if let Some(before) = criteria.sent_before {
            builder.push(" AND sent_at <= ").push_bind(before);
        }
    }
}

#[async_trait]
impl JobRepository for PostgresJobRepository {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        let params = serde_json::to_value(&job.params)?;

        sqlx::query(
            r#"
            INSERT INTO communication_jobs
                (id, external_id, job_type, template_id, locale, target, params, sent_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(job.id)
        .bind(&job.external_id)
        .bind(job.job_type.as_str())
        .bind(&job.template_id)
        .bind(&job.locale)
        .bind(&job.target)
        .bind(&params)
        .bind(job.sent_at)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(job.id.to_string())
            }
            other => RepositoryError::Postgres(other),
        })?;

        tracing::trace!(job_id = %job.id, "Job inserted into PostgreSQL");
        Ok(())
    }

    async fn update(&self, job: &Job) -> Result<(), RepositoryError> {
        let params = serde_json::to_value(&job.params)?;

        let result = sqlx::query(
            r#"
            UPDATE communication_jobs
            SET external_id = $2, job_type = $3, template_id = $4, locale = $5,
                target = $6, params = $7, sent_at = $8
            WHERE id = $1
            "#,
        )
        .bind(job.id)
        .bind(&job.external_id)
        .bind(job.job_type.as_str())
        .bind(&job.template_id)
        .bind(&job.locale)
        .bind(&job.target)
        .bind(&params)
        .bind(job.sent_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(job.id.to_string()));
        }

        Ok(())
    }

    async fn get_pending(&self) -> Result<Vec<Job>, RepositoryError> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM communication_jobs WHERE sent_at IS NULL ORDER BY created_at ASC",
            JOB_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Job::try_from).collect()
    }

    async fn matching(&self, criteria: &JobCriteria) -> Result<(Vec<Job>, usize), RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM communication_jobs");
        Self::push_filters(&mut count, criteria);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM communication_jobs",
            JOB_COLUMNS
        ));
        Self::push_filters(&mut select, criteria);
        select
            .push(" ORDER BY created_at ASC LIMIT ")
            .push_bind(criteria.page_limit() as i64)
            .push(" OFFSET ")
            .push_bind(criteria.page_offset() as i64);

        let rows: Vec<JobRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let jobs = rows
            .into_iter()
            .map(Job::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((jobs, total as usize))
    }
}

/// PostgreSQL-backed template repository
pub struct PostgresTemplateRepository {
    pool: PgPool,
}

impl PostgresTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, criteria: &TemplateCriteria) {
        builder.push(" WHERE TRUE");

        if let Some(prefix) = criteria.template_id.as_deref().filter(|v| !v.is_empty()) {
            builder
                .push(" AND template_id LIKE ")
                .push_bind(like_prefix(prefix))
                .push(" ESCAPE '\\'");
        }
        if let Some(locale) = criteria.locale.as_deref().filter(|v| !v.is_empty()) {
            builder
                .push(" AND LOWER(locale) = LOWER(")
                .push_bind(locale.to_string())
                .push(")");
        }
        if let Some(enabled) = criteria.enabled {
            builder.push(" AND enabled = ").push_bind(enabled);
        }
    }
}

#[async_trait]
impl TemplateRepository for PostgresTemplateRepository {
    async fn get(&self, template_id: &str, locale: &str) -> Result<Template, RepositoryError> {
        let row: Option<TemplateRow> = sqlx::query_as(&format!(
            "SELECT {} FROM communication_templates WHERE template_id = $1 AND locale = $2",
            TEMPLATE_COLUMNS
        ))
        .bind(template_id)
        .bind(locale)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Template::try_from(row),
            None => Err(RepositoryError::NotFound(format!("{}:{}", locale, template_id))),
        }
    }

    async fn create(&self, template: &Template) -> Result<(), RepositoryError> {
        let parameters = serde_json::to_value(&template.parameters)?;

        sqlx::query(
            r#"
            INSERT INTO communication_templates
                (template_id, locale, enabled, description, parameters, update_parameters,
                 subject, text_body, html_body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&template.template_id)
        .bind(&template.locale)
        .bind(template.enabled)
        .bind(&template.description)
        .bind(&parameters)
        .bind(template.update_parameters)
        .bind(&template.subject)
        .bind(&template.text_body)
        .bind(&template.html_body)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(template.key())
            }
            other => RepositoryError::Postgres(other),
        })?;

        Ok(())
    }

    async fn update(&self, template: &Template) -> Result<(), RepositoryError> {
        let parameters = serde_json::to_value(&template.parameters)?;

        let result = sqlx::query(
            r#"
            UPDATE communication_templates
            SET enabled = $3, description = $4, parameters = $5, update_parameters = $6,
                subject = $7, text_body = $8, html_body = $9, updated_at = $10
            WHERE template_id = $1 AND locale = $2
            "#,
        )
        .bind(&template.template_id)
        .bind(&template.locale)
        .bind(template.enabled)
        .bind(&template.description)
        .bind(&parameters)
        .bind(template.update_parameters)
        .bind(&template.subject)
        .bind(&template.text_body)
        .bind(&template.html_body)
        .bind(template.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(template.key()));
        }

        Ok(())
    }

    async fn delete(&self, template: &Template) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM communication_templates WHERE template_id = $1 AND locale = $2",
        )
        .bind(&template.template_id)
        .bind(&template.locale)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(template.key()));
        }

        Ok(())
    }

    async fn matching(
        &self,
        criteria: &TemplateCriteria,
    ) -> Result<(Vec<Template>, usize), RepositoryError> {
        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM communication_templates");
        Self::push_filters(&mut count, criteria);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {} FROM communication_templates",
            TEMPLATE_COLUMNS
        ));
        Self::push_filters(&mut select, criteria);
        select
            .push(" ORDER BY template_id ASC, locale ASC LIMIT ")
            .push_bind(criteria.page_limit() as i64)
            .push(" OFFSET ")
            .push_bind(criteria.page_offset() as i64);

        let rows: Vec<TemplateRow> = select.build_query_as().fetch_all(&self.pool).await?;
        let templates = rows
            .into_iter()
            .map(Template::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((templates, total as usize))
    }
}
