//! Repository factory

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::postgres::PostgresPool;

use super::memory::{MemoryJobRepository, MemoryTemplateRepository};
use super::postgres::{PostgresJobRepository, PostgresTemplateRepository};
use super::{JobRepository, TemplateRepository};

/// Job and template repositories sharing one backend
#[derive(Clone)]
pub struct Repositories {
    pub jobs: Arc<dyn JobRepository>,
    pub templates: Arc<dyn TemplateRepository>,
}

impl Repositories {
    /// Fresh in-memory pair
    pub fn memory() -> Self {
        Self {
            jobs: Arc::new(MemoryJobRepository::new()),
            templates: Arc::new(MemoryTemplateRepository::new()),
        }
    }
}

/// Create repositories based on configuration.
///
/// - `"postgres"`: PostgreSQL tables, if a pool is provided
/// - `"memory"` (default): DashMap-backed, lost on restart
///
/// ```rust,ignore
/// let repos = create_repositories(&settings.storage, Some(pg_pool.clone()));
/// ```
pub fn create_repositories(
    settings: &StorageConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Repositories {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(backend = "postgres", "Creating PostgreSQL repositories");
                Repositories {
                    jobs: Arc::new(PostgresJobRepository::new(pool.pool().clone())),
                    templates: Arc::new(PostgresTemplateRepository::new(pool.pool().clone())),
                }
            } else {
                tracing::warn!(
                    "PostgreSQL backend requested but no pool provided, falling back to memory"
                );
                Repositories::memory()
            }
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating in-memory repositories");
            Repositories::memory()
        }
        other => {
            tracing::warn!(
                backend = %other,
                "Unknown storage backend, falling back to memory"
            );
            Repositories::memory()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobType, Params};

    #[tokio::test]
    async fn test_postgres_without_pool_falls_back() {
        let settings = StorageConfig {
            backend: "postgres".to_string(),
            ..Default::default()
        };

        let repos = create_repositories(&settings, None);
        let job = Job::new(JobType::Sms, "otp", "en", "+4670", "", Params::new());
        repos.jobs.create(&job).await.unwrap();
        assert_eq!(repos.jobs.get_pending().await.unwrap().len(), 1);
    }
}
