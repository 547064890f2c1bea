//! Durable storage of jobs and templates.
//!
//! The dispatcher only talks to the [`JobRepository`] and [`TemplateRepository`]
//! traits. Two implementations are provided:
//!
//! - `memory`: DashMap backed, used by tests and local development
//! - `postgres`: PostgreSQL tables `communication_jobs` and `communication_templates`
//!
//! Use [`create_repositories`] to build the pair selected in configuration.

mod criteria;
mod error;
mod factory;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::job::Job;
use crate::template::Template;

pub use criteria::{JobCriteria, TemplateCriteria, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
pub use error::RepositoryError;
pub use factory::{create_repositories, Repositories};
pub use memory::{MemoryJobRepository, MemoryTemplateRepository};
pub use postgres::{PostgresJobRepository, PostgresTemplateRepository};

/// Persistent store of jobs.
///
/// Implementations must be safe for concurrent use by every worker; the
/// dispatcher performs no locking around them.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError>;

    async fn update(&self, job: &Job) -> Result<(), RepositoryError>;

    /// All jobs whose `sent_at` is still unset, oldest first
    async fn get_pending(&self) -> Result<Vec<Job>, RepositoryError>;

    /// Page of jobs matching `criteria` and the total match count
    async fn matching(&self, criteria: &JobCriteria) -> Result<(Vec<Job>, usize), RepositoryError>;
}

/// Persistent store of templates keyed by (`template_id`, `locale`)
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    /// Returns [`RepositoryError::NotFound`] when no template exists for the key
    async fn get(&self, template_id: &str, locale: &str) -> Result<Template, RepositoryError>;

    async fn create(&self, template: &Template) -> Result<(), RepositoryError>;

    async fn update(&self, template: &Template) -> Result<(), RepositoryError>;

    async fn delete(&self, template: &Template) -> Result<(), RepositoryError>;

    async fn matching(
        &self,
        criteria: &TemplateCriteria,
    ) -> Result<(Vec<Template>, usize), RepositoryError>;
}
