//! In-memory repositories using DashMap.
//!
//! Contents are lost on restart. Used by tests and by the `memory` storage
//! backend for local development.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::job::Job;
use crate::template::Template;

use super::{JobCriteria, JobRepository, RepositoryError, TemplateCriteria, TemplateRepository};

/// In-memory job repository
#[derive(Default)]
pub struct MemoryJobRepository {
    jobs: DashMap<Uuid, Job>,
}

impl MemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a job by id
    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.jobs.get(id).map(|job| job.clone())
    }

    /// Snapshot of every stored job
    pub fn all(&self) -> Vec<Job> {
        self.jobs.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobRepository for MemoryJobRepository {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        match self.jobs.entry(job.id) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(job.id.to_string())),
            Entry::Vacant(entry) => {
                entry.insert(job.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, job: &Job) -> Result<(), RepositoryError> {
        match self.jobs.get_mut(&job.id) {
            Some(mut stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(job.id.to_string())),
        }
    }

    async fn get_pending(&self) -> Result<Vec<Job>, RepositoryError> {
        let mut pending: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| !entry.is_sent())
            .map(|entry| entry.value().clone())
            .collect();

        pending.sort_by_key(|job| job.created_at);
        Ok(pending)
    }

    async fn matching(&self, criteria: &JobCriteria) -> Result<(Vec<Job>, usize), RepositoryError> {
        let mut matched: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| criteria.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        matched.sort_by_key(|job| job.created_at);
        let total = matched.len();
        let page = matched
            .into_iter()
            .skip(criteria.page_offset())
            .take(criteria.page_limit())
            .collect();

        Ok((page, total))
    }
}

/// In-memory template repository
#[derive(Default)]
pub struct MemoryTemplateRepository {
    templates: DashMap<(String, String), Template>,
}

impl MemoryTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a template without going through the async trait
    pub fn find(&self, template_id: &str, locale: &str) -> Option<Template> {
        self.templates
            .get(&Self::key(template_id, locale))
            .map(|t| t.clone())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    fn key(template_id: &str, locale: &str) -> (String, String) {
        (template_id.to_string(), locale.to_string())
    }
}

#[async_trait]
impl TemplateRepository for MemoryTemplateRepository {
    async fn get(&self, template_id: &str, locale: &str) -> Result<Template, RepositoryError> {
        self.find(template_id, locale)
            .ok_or_else(|| RepositoryError::NotFound(format!("{}:{}", locale, template_id)))
    }

    async fn create(&self, template: &Template) -> Result<(), RepositoryError> {
        let key = Self::key(&template.template_id, &template.locale);
        match self.templates.entry(key) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(template.key())),
            Entry::Vacant(entry) => {
                entry.insert(template.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, template: &Template) -> Result<(), RepositoryError> {
        let key = Self::key(&template.template_id, &template.locale);
        match self.templates.get_mut(&key) {
            Some(mut stored) => {
                *stored = template.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(template.key())),
        }
    }

    async fn delete(&self, template: &Template) -> Result<(), RepositoryError> {
        self.templates
            .remove(&Self::key(&template.template_id, &template.locale))
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(template.key()))
    }

    async fn matching(
        &self,
        criteria: &TemplateCriteria,
    ) -> Result<(Vec<Template>, usize), RepositoryError> {
        let mut matched: Vec<Template> = self
            .templates
            .iter()
            .filter(|entry| criteria.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        matched.sort_by(|a, b| {
            (a.template_id.as_str(), a.locale.as_str()).cmp(&(b.template_id.as_str(), b.locale.as_str()))
        });
        let total = matched.len();
        let page = matched
            .into_iter()
            .skip(criteria.page_offset())
            .take(criteria.page_limit())
            .collect();

        Ok((page, total))
    }
}
