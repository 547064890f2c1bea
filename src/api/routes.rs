use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::health::health;
use super::jobs::{list_jobs, send};
use super::metrics::prometheus_metrics;
use super::subscription::{get_unsubscriptions, resubscribe};
use super::template::{
    create_template, delete_template, get_template, list_templates, test_template,
    update_template,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                // Templates
                .route("/templates", get(list_templates).post(create_template))
                .route("/templates/test", post(test_template))
                .route(
                    "/templates/{id}",
                    get(get_template).put(update_template).delete(delete_template),
                )
                // Jobs
                .route("/jobs", get(list_jobs).post(send))
                // Subscriptions
                .route("/subscriptions/resubscribe", post(resubscribe))
                .route("/subscriptions/{email}", get(get_unsubscriptions)),
        )
}
