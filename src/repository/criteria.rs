//! Listing filters shared by the repository implementations

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::job::{Job, JobType};
use crate::template::Template;

/// Page size used when a listing request does not set one
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Largest page a listing returns, whatever the request asks for
pub const MAX_PAGE_LIMIT: usize = 1000;

fn default_limit() -> usize {
    DEFAULT_PAGE_LIMIT
}

fn clamp_limit(limit: usize) -> usize {
    limit.min(MAX_PAGE_LIMIT)
}

fn clamp_offset(offset: usize) -> usize {
    offset.min(i64::MAX as usize)
}

/// Filter for job listings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCriteria {
    #[serde(default, rename = "type")]
    pub job_type: Option<JobType>,
    /// Matches ids starting with this value
    pub template_id: Option<String>,
    /// Case-insensitive
    pub locale: Option<String>,
    /// Case-insensitive
    pub target: Option<String>,
    pub external_id: Option<String>,
    pub sent_after: Option<DateTime<Utc>>,
    pub sent_before: Option<DateTime<Utc>>,

    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for JobCriteria {
    fn default() -> Self {
        Self {
            job_type: None,
            template_id: None,
            locale: None,
            target: None,
            external_id: None,
            sent_after: None,
            sent_before: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl JobCriteria {
    /// Requested page size, capped at [`MAX_PAGE_LIMIT`]
    pub fn page_limit(&self) -> usize {
        clamp_limit(self.limit)
    }

    /// Requested offset, capped to what storage can address
    pub fn page_offset(&self) -> usize {
        clamp_offset(self.offset)
    }

    pub fn matches(&self, job: &Job) -> bool {
        if let Some(job_type) = self.job_type {
            if job.job_type != job_type {
                return false;
            }
        }

        if let Some(prefix) = non_empty(&self.template_id) {
            if !job.template_id.starts_with(prefix) {
                return false;
            }
        }

        if let Some(locale) = non_empty(&self.locale) {
            if !job.locale.eq_ignore_ascii_case(locale) {
                return false;
            }
        }

        if let Some(target) = non_empty(&self.target) {
            if !job.target.eq_ignore_ascii_case(target) {
                return false;
            }
        }

        if let Some(external_id) = non_empty(&self.external_id) {
            if job.external_id != external_id {
                return false;
            }
        }

        if let Some(after) = self.sent_after {
            if !job.sent_at.is_some_and(|sent| sent >= after) {
                return false;
            }
        }

        if let Some(before) = self.sent_before {
            if !job.sent_at.is_some_and(|sent| sent <= before) {
                return false;
            }
        }

        true
    }
}

/// Filter for template listings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateCriteria {
    /// Matches ids starting with this value
    pub template_id: Option<String>,
    pub locale: Option<String>,
    pub enabled: Option<bool>,

    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for TemplateCriteria {
    fn default() -> Self {
        Self {
            template_id: None,
            locale: None,
            enabled: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

impl TemplateCriteria {
    pub fn page_limit(&self) -> usize {
        clamp_limit(self.limit)
    }

    pub fn page_offset(&self) -> usize {
        clamp_offset(self.offset)
    }

    pub fn matches(&self, template: &Template) -> bool {
        if let Some(prefix) = non_empty(&self.template_id) {
            if !template.template_id.starts_with(prefix) {
                return false;
            }
        }

        if let Some(locale) = non_empty(&self.locale) {
            if !template.locale.eq_ignore_ascii_case(locale) {
                return false;
            }
        }

        if let Some(enabled) = self.enabled {
            if template.enabled != enabled {
                return false;
            }
        }

        true
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
