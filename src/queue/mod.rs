//! Bounded in-process job queue with a fixed worker pool.
//!
//! Jobs are always persisted before they reach the queue, so the queue is
//! allowed to lose them: a job that cannot be buffered stays pending in
//! storage and is picked up again at the next startup.
//!
//! Overflow handling when the buffer is full:
//! - [`OverflowPolicy::Spill`]: the job is left in storage only
//! - [`OverflowPolicy::Wait`]: a bounded number of background producers wait
//!   for a free slot, spilling on timeout or shutdown

mod pool;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{DispatcherConfig, OverflowPolicySetting};
use crate::job::Job;

pub use pool::JobQueue;

/// Processes one dequeued job. Called concurrently from every worker.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: Job);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    Spill,
    Wait,
}

impl From<OverflowPolicySetting> for OverflowPolicy {
    fn from(setting: OverflowPolicySetting) -> Self {
        match setting {
            OverflowPolicySetting::Spill => OverflowPolicy::Spill,
            OverflowPolicySetting::Wait => OverflowPolicy::Wait,
        }
    }
}

/// Configuration for the job queue
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Buffered jobs before overflow handling applies
    pub capacity: usize,
    /// Number of concurrent workers
    pub worker_count: usize,
    pub overflow_policy: OverflowPolicy,
    /// How long a waiting producer holds on to a job
    pub enqueue_timeout: Duration,
    /// Upper bound on concurrently waiting producers
    pub max_waiting_producers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            worker_count: 5,
            overflow_policy: OverflowPolicy::Wait,
            enqueue_timeout: Duration::from_millis(5000),
            max_waiting_producers: 1000,
        }
    }
}

impl From<&DispatcherConfig> for QueueConfig {
    fn from(settings: &DispatcherConfig) -> Self {
        Self {
            capacity: settings.queue_capacity,
            worker_count: settings.worker_count,
            overflow_policy: settings.overflow_policy.into(),
            enqueue_timeout: Duration::from_millis(settings.enqueue_timeout_ms),
            max_waiting_producers: settings.max_waiting_producers,
        }
    }
}

/// What happened to an enqueued job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Buffered for a worker
    Queued,
    /// Queue full; a background producer will buffer it when a slot frees up
    Deferred,
    /// Queue full; left pending in storage until next startup
    Spilled,
    /// Job already has `sent_at` set
    AlreadySent,
    /// Queue has been shut down
    Closed,
}
