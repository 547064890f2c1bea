//! Prometheus metrics for the dispatcher.
//!
//! - Job metrics (submitted, sent, failed by stage)
//! - Template metrics (placeholders created)
//! - Queue metrics (depth, overflow outcomes, startup requeue)
//! - Transport latency

mod helpers;

pub use helpers::{encode_metrics, JobMetrics, QueueMetrics, TemplateMetrics, TransportMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "dispatch";

lazy_static! {
    // ============================================================================
    // Job Metrics
    // ============================================================================

    /// Jobs accepted by send_email / send_sms
    pub static ref JOBS_SUBMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_jobs_submitted_total", METRIC_PREFIX),
        "Total jobs submitted",
        &["type"]
    ).unwrap();

    /// Jobs delivered by a transport
    pub static ref JOBS_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_jobs_sent_total", METRIC_PREFIX),
        "Total jobs delivered",
        &["type"]
    ).unwrap();

    /// Job processing failures by stage (template, transport, persist)
    pub static ref JOBS_FAILED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_jobs_failed_total", METRIC_PREFIX),
        "Total job processing failures",
        &["stage"]
    ).unwrap();

    // ============================================================================
    // Template Metrics
    // ============================================================================

    pub static ref PLACEHOLDERS_CREATED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_placeholder_templates_created_total", METRIC_PREFIX),
        "Total placeholder templates created for missing keys"
    ).unwrap();

    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Jobs currently buffered in the queue
    pub static ref QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_queue_depth", METRIC_PREFIX),
        "Number of jobs buffered in the queue"
    ).unwrap();

    /// What happened to jobs that found the queue full
    pub static ref QUEUE_OVERFLOW_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_queue_overflow_total", METRIC_PREFIX),
        "Queue overflow outcomes",
        &["outcome"]
    ).unwrap();

    pub static ref JOBS_REQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_jobs_requeued_total", METRIC_PREFIX),
        "Pending jobs requeued at startup"
    ).unwrap();

    // ============================================================================
    // Transport Metrics
    // ============================================================================

    pub static ref TRANSPORT_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_transport_latency_seconds", METRIC_PREFIX),
        "Transport send latency in seconds",
        &["type"],
        vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();
}
