//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::job::JobType;

use super::{
    JOBS_FAILED_TOTAL, JOBS_REQUEUED_TOTAL, JOBS_SENT_TOTAL, JOBS_SUBMITTED_TOTAL,
    PLACEHOLDERS_CREATED_TOTAL, QUEUE_DEPTH, QUEUE_OVERFLOW_TOTAL, TRANSPORT_LATENCY,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording job metrics
pub struct JobMetrics;

impl JobMetrics {
    pub fn record_submitted(job_type: JobType) {
        JOBS_SUBMITTED_TOTAL
            .with_label_values(&[job_type.as_str()])
            .inc();
    }

    pub fn record_sent(job_type: JobType) {
        JOBS_SENT_TOTAL.with_label_values(&[job_type.as_str()]).inc();
    }

    /// Template could not be resolved
    pub fn record_template_failure() {
        JOBS_FAILED_TOTAL.with_label_values(&["template"]).inc();
    }

    /// Render or delivery failed
    pub fn record_transport_failure() {
        JOBS_FAILED_TOTAL.with_label_values(&["transport"]).inc();
    }

    /// Storage write failed
    pub fn record_persist_failure() {
        JOBS_FAILED_TOTAL.with_label_values(&["persist"]).inc();
    }
}

/// Helper struct for recording template metrics
pub struct TemplateMetrics;

impl TemplateMetrics {
    pub fn record_placeholder_created() {
        PLACEHOLDERS_CREATED_TOTAL.inc();
    }
}

/// Helper struct for recording queue metrics
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn record_enqueued() {
        QUEUE_DEPTH.inc();
    }

    pub fn record_dequeued() {
        QUEUE_DEPTH.dec();
    }

    /// Job left in storage because the queue was full
    pub fn record_spilled() {
        QUEUE_OVERFLOW_TOTAL.with_label_values(&["spilled"]).inc();
    }

    /// Job handed to a waiting producer
    pub fn record_deferred() {
        QUEUE_OVERFLOW_TOTAL.with_label_values(&["deferred"]).inc();
    }

    /// Waiting producer gave up
    pub fn record_timed_out() {
        QUEUE_OVERFLOW_TOTAL.with_label_values(&["timed_out"]).inc();
    }

    pub fn record_requeued(count: usize) {
        JOBS_REQUEUED_TOTAL.inc_by(count as u64);
    }
}

/// Helper struct for recording transport metrics
pub struct TransportMetrics;

impl TransportMetrics {
    pub fn record_latency(job_type: JobType, seconds: f64) {
        TRANSPORT_LATENCY
            .with_label_values(&[job_type.as_str()])
            .observe(seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_prefix() {
        JobMetrics::record_submitted(JobType::Email);
        QueueMetrics::record_spilled();

        let output = encode_metrics().unwrap();
        assert!(output.contains("dispatch_jobs_submitted_total"));
        assert!(output.contains("dispatch_queue_overflow_total"));
    }
}
