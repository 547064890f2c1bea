use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;

use crate::job::Job;
use crate::metrics::QueueMetrics;

use super::{EnqueueOutcome, JobHandler, OverflowPolicy, QueueConfig};

/// Bounded job buffer drained by a fixed set of workers
pub struct JobQueue {
    sender: mpsc::Sender<Job>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    config: QueueConfig,
    /// Permits for background producers under the wait policy
    waiting: Arc<Semaphore>,
    shutdown: broadcast::Sender<()>,
    closed: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobQueue {
    /// Create the queue and spawn exactly `config.worker_count` workers
    pub fn start(config: QueueConfig, handler: Arc<dyn JobHandler>) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let (shutdown, _) = broadcast::channel(1);

        let workers = (0..config.worker_count)
            .map(|id| {
                let worker = Worker {
                    id,
                    receiver: receiver.clone(),
                    handler: handler.clone(),
                    shutdown: shutdown.subscribe(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        tracing::info!(
            worker_count = config.worker_count,
            capacity = config.capacity,
            overflow_policy = ?config.overflow_policy,
            "Job queue started"
        );

        Self {
            sender,
            receiver,
            waiting: Arc::new(Semaphore::new(config.max_waiting_producers)),
            config,
            shutdown,
            closed: AtomicBool::new(false),
            workers: Mutex::new(workers),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    /// Jobs currently buffered
    pub fn len(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Hand a persisted job to the workers. Never blocks the caller.
    pub fn enqueue(&self, job: Job) -> EnqueueOutcome {
        if self.is_closed() {
            tracing::debug!(job_id = %job.id, "Queue closed, job left pending");
            return EnqueueOutcome::Closed;
        }

        if job.is_sent() {
            tracing::debug!(job_id = %job.id, "Refusing already sent job");
            return EnqueueOutcome::AlreadySent;
        }

        match self.sender.try_send(job) {
            Ok(()) => {
                QueueMetrics::record_enqueued();
                EnqueueOutcome::Queued
            }
            Err(TrySendError::Full(job)) => self.overflow(job),
            Err(TrySendError::Closed(job)) => {
                tracing::debug!(job_id = %job.id, "Queue closed, job left pending");
                EnqueueOutcome::Closed
            }
        }
    }

    fn overflow(&self, job: Job) -> EnqueueOutcome {
        if self.config.overflow_policy == OverflowPolicy::Spill {
            return spill(&job);
        }

        let permit = match self.waiting.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => return spill(&job),
        };

        let sender = self.sender.clone();
        let mut shutdown = self.shutdown.subscribe();
        let enqueue_timeout = self.config.enqueue_timeout;
        QueueMetrics::record_deferred();

        tokio::spawn(async move {
            let _permit = permit;
            let job_id = job.id;

            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::debug!(job_id = %job_id, "Shutdown while waiting for queue slot, job left pending");
                }
                result = tokio::time::timeout(enqueue_timeout, sender.send(job)) => match result {
                    Ok(Ok(())) => QueueMetrics::record_enqueued(),
                    Ok(Err(_)) => {
                        tracing::debug!(job_id = %job_id, "Queue closed while waiting, job left pending");
                    }
                    Err(_) => {
                        QueueMetrics::record_timed_out();
                        tracing::warn!(
                            job_id = %job_id,
                            timeout_ms = enqueue_timeout.as_millis() as u64,
                            "Queue still full after timeout, job left pending in storage"
                        );
                    }
                },
            }
        });

        EnqueueOutcome::Deferred
    }

    /// Stop all workers. In-flight jobs finish; buffered jobs are dropped
    /// and stay pending in storage.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let _ = self.shutdown.send(());

        let handles = std::mem::take(&mut *self.workers.lock().await);
        let worker_count = handles.len();
        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker task failed");
            }
        }

        let mut receiver = self.receiver.lock().await;
        receiver.close();
        let mut dropped = 0usize;
        while receiver.try_recv().is_ok() {
            QueueMetrics::record_dequeued();
            dropped += 1;
        }

        tracing::info!(
            workers = worker_count,
            dropped,
            "Job queue stopped"
        );
    }
}

fn spill(job: &Job) -> EnqueueOutcome {
    QueueMetrics::record_spilled();
    tracing::warn!(
        job_id = %job.id,
        template_id = %job.template_id,
        "Queue full, job left pending in storage"
    );
    EnqueueOutcome::Spilled
}

struct Worker {
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    handler: Arc<dyn JobHandler>,
    shutdown: broadcast::Receiver<()>,
}

impl Worker {
    async fn run(mut self) {
        tracing::debug!(worker_id = self.id, "Worker started");

        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.recv() => break,
                job = next_job(&self.receiver) => job,
            };

            let Some(job) = next else {
                break;
            };
            QueueMetrics::record_dequeued();

            if job.is_sent() {
                tracing::debug!(job_id = %job.id, "Skipping already sent job");
                continue;
            }

            self.handler.handle(job).await;
        }

        tracing::debug!(worker_id = self.id, "Worker stopped");
    }
}

async fn next_job(receiver: &Mutex<mpsc::Receiver<Job>>) -> Option<Job> {
    receiver.lock().await.recv().await
}
