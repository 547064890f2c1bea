//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod jobs;
mod metrics;
mod routes;
mod subscription;
mod template;

use serde::Serialize;

pub use health::health;
pub use jobs::{list_jobs, send, SendRequest};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
pub use subscription::{get_unsubscriptions, resubscribe, ResubscribeRequest};
pub use template::{
    create_template, delete_template, get_template, list_templates, parse_template_key,
    test_template, update_template, TestTemplateRequest, UpdateTemplateRequest,
};

/// Paged listing envelope
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: CollectionMeta,
}

#[derive(Debug, Serialize)]
pub struct CollectionMeta {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}
