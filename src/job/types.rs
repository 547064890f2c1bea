use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller supplied template parameters
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Delivery channel of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Email,
    Sms,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Email => "email",
            JobType::Sms => "sms",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(JobType::Email),
            "sms" => Ok(JobType::Sms),
            other => Err(format!("Unsupported job type {}", other)),
        }
    }
}

/// One outbound email or SMS, tracked from submission to delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Unique job identifier
    pub id: Uuid,
    /// Opaque correlation id supplied by the caller (may be empty)
    #[serde(default)]
    pub external_id: String,
    #[serde(rename = "type")]
    pub job_type: JobType,

    pub template_id: String,
    pub locale: String,
    /// Email address or phone number
    pub target: String,

    #[serde(default)]
    pub params: Params,

    /// `None` while the job is pending delivery
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        job_type: JobType,
        template_id: impl Into<String>,
        locale: impl Into<String>,
        target: impl Into<String>,
        external_id: impl Into<String>,
        params: Params,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id: external_id.into(),
            job_type,
            template_id: template_id.into(),
            locale: locale.into(),
            target: target.into(),
            params,
            sent_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_sent(&self) -> bool {
        self.sent_at.is_some()
    }

    /// Record a successful delivery. The first stamp wins.
    pub fn mark_sent(&mut self) {
        if self.sent_at.is_none() {
            self.sent_at = Some(Utc::now());
        }
    }
}
