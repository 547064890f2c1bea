//! Dispatch orchestration.
//!
//! Send path: `send_email`/`send_sms` persist a [`Job`] and hand it to the
//! [`JobQueue`]. A worker later resolves the template, captures example
//! parameters when the template asks for them, and calls the transport.
//! The job is stamped sent only after the transport reports success.
//!
//! Failed jobs stay pending in storage and are retried when the process
//! next starts; there is no in-process retry.

mod builder;
mod error;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::job::{Job, JobType, Params};
use crate::metrics::JobMetrics;
use crate::queue::{EnqueueOutcome, JobHandler, JobQueue};
use crate::repository::{JobRepository, TemplateRepository};
use crate::template::{RenderError, RenderedMessage, Renderer, Template, TemplateResolver};
use crate::transport::Transport;

pub use builder::DispatcherBuilder;
pub use error::DispatchError;

/// Converts an HTML body into a plain-text body
pub type HtmlToText = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Shared state used by every worker
struct DispatchCore {
    templates: Arc<dyn TemplateRepository>,
    jobs: Arc<dyn JobRepository>,
    resolver: TemplateResolver,
    renderer: Renderer,
    email: Option<Arc<dyn Transport>>,
    sms: Option<Arc<dyn Transport>>,
}

impl DispatchCore {
    fn transport(&self, job_type: JobType) -> Option<&Arc<dyn Transport>> {
        match job_type {
            JobType::Email => self.email.as_ref(),
            JobType::Sms => self.sms.as_ref(),
        }
    }

    /// Resolve, capture parameters, send, then stamp and persist the job
    async fn process(&self, mut job: Job) -> Result<(), DispatchError> {
        let transport = self
            .transport(job.job_type)
            .ok_or(DispatchError::TransportNotConfigured(job.job_type))?;

        let mut template = self
            .resolver
            .resolve(&job.template_id, &job.locale)
            .await
            .inspect_err(|_| JobMetrics::record_template_failure())?;

        // Persisted before sending so a crash mid-send does not capture twice
        if template.update_parameters {
            template.parameters = job.params.clone();
            template.update_parameters = false;
            template.updated_at = Utc::now();
            self.templates
                .update(&template)
                .await
                .inspect_err(|_| JobMetrics::record_template_failure())?;

            tracing::debug!(
                template_id = %template.template_id,
                locale = %template.locale,
                "Captured example parameters"
            );
        }

        transport
            .send(&job, &template, &self.renderer)
            .await
            .inspect_err(|_| JobMetrics::record_transport_failure())?;

        job.mark_sent();
        JobMetrics::record_sent(job.job_type);

        if let Err(e) = self.jobs.update(&job).await {
            // Delivered but still pending in storage; it will be sent again on restart
            JobMetrics::record_persist_failure();
            tracing::error!(error = %e, "Failed to mark job as sent");
        }

        Ok(())
    }
}

#[async_trait]
impl JobHandler for DispatchCore {
    #[tracing::instrument(
        skip(self, job),
        fields(
            job_id = %job.id,
            job_type = %job.job_type,
            template_id = %job.template_id,
            locale = %job.locale
        )
    )]
    async fn handle(&self, job: Job) {
        if let Err(e) = self.process(job).await {
            tracing::error!(error = %e, "Failed to process job");
        }
    }
}

/// Entry point for sending notifications.
///
/// Cheap to clone; clones share the same workers and repositories.
#[derive(Clone)]
pub struct Dispatcher {
    core: Arc<DispatchCore>,
    queue: Arc<JobQueue>,
    html_to_text: Option<HtmlToText>,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Queue an email. Returns once the job is persisted; delivery is asynchronous.
    pub async fn send_email(
        &self,
        template_id: &str,
        locale: &str,
        email: &str,
        external_id: &str,
        params: Params,
    ) -> Result<Job, DispatchError> {
        self.submit(JobType::Email, template_id, locale, email, external_id, params)
            .await
    }

    /// Queue an SMS. Returns once the job is persisted; delivery is asynchronous.
    pub async fn send_sms(
        &self,
        template_id: &str,
        locale: &str,
        number: &str,
        external_id: &str,
        params: Params,
    ) -> Result<Job, DispatchError> {
        self.submit(JobType::Sms, template_id, locale, number, external_id, params)
            .await
    }

    /// Dispatch by job type
    pub async fn send(
        &self,
        job_type: JobType,
        template_id: &str,
        locale: &str,
        target: &str,
        external_id: &str,
        params: Params,
    ) -> Result<Job, DispatchError> {
        self.submit(job_type, template_id, locale, target, external_id, params)
            .await
    }

    async fn submit(
        &self,
        job_type: JobType,
        template_id: &str,
        locale: &str,
        target: &str,
        external_id: &str,
        params: Params,
    ) -> Result<Job, DispatchError> {
        if self.core.transport(job_type).is_none() {
            return Err(DispatchError::TransportNotConfigured(job_type));
        }

        let job = Job::new(job_type, template_id, locale, target, external_id, params);
        self.core.jobs.create(&job).await?;
        JobMetrics::record_submitted(job_type);

        let outcome = self.queue.enqueue(job.clone());
        tracing::debug!(
            job_id = %job.id,
            job_type = %job_type,
            template_id = %template_id,
            outcome = ?outcome,
            "Job submitted"
        );

        Ok(job)
    }

    /// Render all three parts of `template` with the job's parameters
    pub fn render(&self, template: &Template, job: &Job) -> Result<RenderedMessage, RenderError> {
        self.core.renderer.render_message(template, &job.params)
    }

    /// Render `template` against its own stored example parameters
    pub fn preview(&self, template: &Template) -> Result<RenderedMessage, RenderError> {
        self.core
            .renderer
            .render_message(template, &template.parameters)
    }

    pub fn renderer(&self) -> &Renderer {
        &self.core.renderer
    }

    pub fn resolver(&self) -> &TemplateResolver {
        &self.core.resolver
    }

    pub fn transport(&self, job_type: JobType) -> Option<Arc<dyn Transport>> {
        self.core.transport(job_type).cloned()
    }

    pub fn template_repository(&self) -> Arc<dyn TemplateRepository> {
        self.core.templates.clone()
    }

    pub fn job_repository(&self) -> Arc<dyn JobRepository> {
        self.core.jobs.clone()
    }

    /// Apply the configured HTML-to-text converter, if any
    pub fn html_to_text(&self, html: &str) -> Option<String> {
        self.html_to_text.as_ref().map(|convert| convert(html))
    }

    pub fn worker_count(&self) -> usize {
        self.queue.worker_count()
    }

    /// Jobs waiting in the queue
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Requeue a stored job, e.g. after an operator fixed its template
    pub fn requeue(&self, job: Job) -> EnqueueOutcome {
        self.queue.enqueue(job)
    }

    /// Wait for `signal`, then stop the workers. In-flight jobs complete;
    /// buffered jobs stay pending in storage.
    pub async fn shutdown<F>(&self, signal: F)
    where
        F: Future<Output = ()>,
    {
        signal.await;
        tracing::info!("Dispatcher shutting down");
        self.queue.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryJobRepository, MemoryTemplateRepository, RepositoryError};
    use crate::transport::TransportError;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<RenderedMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn send(
            &self,
            job: &Job,
            template: &Template,
            renderer: &Renderer,
        ) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Unsupported("down".to_string()));
            }
            let message = renderer.render_message(template, &job.params)?;
            self.sent.lock().await.push(message);
            Ok(())
        }
    }

    struct Fixture {
        templates: Arc<MemoryTemplateRepository>,
        jobs: Arc<MemoryJobRepository>,
        transport: Arc<RecordingTransport>,
    }

    impl Fixture {
        fn new(fail: bool) -> Self {
            Self {
                templates: Arc::new(MemoryTemplateRepository::new()),
                jobs: Arc::new(MemoryJobRepository::new()),
                transport: Arc::new(RecordingTransport {
                    fail,
                    ..Default::default()
                }),
            }
        }

        async fn dispatcher(&self) -> Dispatcher {
            Dispatcher::builder()
                .template_repository(self.templates.clone())
                .job_repository(self.jobs.clone())
                .email_transport(self.transport.clone())
                .worker_count(2)
                .build()
                .await
                .unwrap()
        }
    }

    fn params(key: &str, value: &str) -> Params {
        let mut params = Params::new();
        params.insert(key.to_string(), json!(value));
        params
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    #[tokio::test]
    async fn test_build_requires_repositories() {
        let result = Dispatcher::builder().build().await;
        assert!(matches!(result, Err(DispatchError::MissingTemplateRepository)));

        let result = Dispatcher::builder()
            .template_repository(Arc::new(MemoryTemplateRepository::new()))
            .build()
            .await;
        assert!(matches!(result, Err(DispatchError::MissingJobRepository)));
    }

    #[tokio::test]
    async fn test_build_rejects_zero_workers() {
        let result = Dispatcher::builder()
            .template_repository(Arc::new(MemoryTemplateRepository::new()))
            .job_repository(Arc::new(MemoryJobRepository::new()))
            .worker_count(0)
            .build()
            .await;
        assert!(matches!(result, Err(DispatchError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_send_without_transport() {
        let fixture = Fixture::new(false);
        let dispatcher = fixture.dispatcher().await;

        let result = dispatcher
            .send_sms("otp", "en", "+4670", "", Params::new())
            .await;
        assert!(matches!(
            result,
            Err(DispatchError::TransportNotConfigured(JobType::Sms))
        ));
        assert!(fixture.jobs.is_empty());
    }

    #[tokio::test]
    async fn test_job_persisted_before_delivery() {
        let fixture = Fixture::new(false);
        let dispatcher = fixture.dispatcher().await;

        let job = dispatcher
            .send_email("welcome", "en", "a@x.com", "order-7", params("name", "Ann"))
            .await
            .unwrap();

        let stored = fixture.jobs.get(&job.id).unwrap();
        assert_eq!(stored.external_id, "order-7");
        assert_eq!(stored.job_type, JobType::Email);
    }

    #[tokio::test]
    async fn test_capture_parameters_once() {
        let fixture = Fixture::new(false);
        let mut template = Template::new("welcome", "en");
        template.enabled = true;
        template.update_parameters = true;
        template.subject = "Hi {{name}}".to_string();
        fixture.templates.create(&template).await.unwrap();

        let dispatcher = fixture.dispatcher().await;
        dispatcher
            .send_email("welcome", "en", "a@x.com", "", params("name", "Ann"))
            .await
            .unwrap();
        settle().await;
        dispatcher
            .send_email("welcome", "en", "b@x.com", "", params("name", "Bob"))
            .await
            .unwrap();
        settle().await;

        let stored = fixture.templates.find("welcome", "en").unwrap();
        assert!(!stored.update_parameters);
        assert_eq!(stored.parameters["name"], "Ann");
    }

    /// Templates that read from memory but refuse every update
    struct ReadOnlyTemplates(Arc<MemoryTemplateRepository>);

    #[async_trait]
    impl TemplateRepository for ReadOnlyTemplates {
        async fn get(&self, template_id: &str, locale: &str) -> Result<Template, RepositoryError> {
            self.0.get(template_id, locale).await
        }
        async fn create(&self, template: &Template) -> Result<(), RepositoryError> {
            self.0.create(template).await
        }
        async fn update(&self, _: &Template) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable("read-only".to_string()))
        }
        async fn delete(&self, template: &Template) -> Result<(), RepositoryError> {
            self.0.delete(template).await
        }
        async fn matching(
            &self,
            criteria: &crate::repository::TemplateCriteria,
        ) -> Result<(Vec<Template>, usize), RepositoryError> {
            self.0.matching(criteria).await
        }
    }

    /// Jobs that are created in memory but never updated
    struct UnmarkableJobs(Arc<MemoryJobRepository>);

    #[async_trait]
    impl JobRepository for UnmarkableJobs {
        async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
            self.0.create(job).await
        }
        async fn update(&self, _: &Job) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable("read-only".to_string()))
        }
        async fn get_pending(&self) -> Result<Vec<Job>, RepositoryError> {
            self.0.get_pending().await
        }
        async fn matching(
            &self,
            criteria: &crate::repository::JobCriteria,
        ) -> Result<(Vec<Job>, usize), RepositoryError> {
            self.0.matching(criteria).await
        }
    }

    #[tokio::test]
    async fn test_failed_capture_blocks_delivery() {
        let fixture = Fixture::new(false);
        let mut template = Template::new("welcome", "en");
        template.enabled = true;
        template.update_parameters = true;
        template.subject = "Hi {{name}}".to_string();
        fixture.templates.create(&template).await.unwrap();

        let dispatcher = Dispatcher::builder()
            .template_repository(Arc::new(ReadOnlyTemplates(fixture.templates.clone())))
            .job_repository(fixture.jobs.clone())
            .email_transport(fixture.transport.clone())
            .build()
            .await
            .unwrap();

        let job = dispatcher
            .send_email("welcome", "en", "a@x.com", "", params("name", "Ann"))
            .await
            .unwrap();
        settle().await;

        assert!(fixture.transport.sent.lock().await.is_empty());
        assert!(fixture.jobs.get(&job.id).unwrap().sent_at.is_none());
        assert_eq!(fixture.jobs.get_pending().await.unwrap().len(), 1);

        let stored = fixture.templates.find("welcome", "en").unwrap();
        assert!(stored.update_parameters);
        assert!(stored.parameters.is_empty());
    }

    #[tokio::test]
    async fn test_unpersisted_sent_mark_leaves_job_pending() {
        let fixture = Fixture::new(false);
        let mut template = Template::new("welcome", "en");
        template.enabled = true;
        template.subject = "Hi {{name}}".to_string();
        fixture.templates.create(&template).await.unwrap();

        let dispatcher = Dispatcher::builder()
            .template_repository(fixture.templates.clone())
            .job_repository(Arc::new(UnmarkableJobs(fixture.jobs.clone())))
            .email_transport(fixture.transport.clone())
            .build()
            .await
            .unwrap();

        let job = dispatcher
            .send_email("welcome", "en", "a@x.com", "", params("name", "Ann"))
            .await
            .unwrap();
        settle().await;

        let sent = fixture.transport.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Hi Ann");

        // Delivered, but storage still reports it pending for the next start
        assert!(fixture.jobs.get(&job.id).unwrap().sent_at.is_none());
        assert_eq!(fixture.jobs.get_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_leaves_job_pending() {
        let fixture = Fixture::new(true);
        let dispatcher = fixture.dispatcher().await;

        let job = dispatcher
            .send_email("welcome", "en", "a@x.com", "", Params::new())
            .await
            .unwrap();
        settle().await;

        assert!(fixture.jobs.get(&job.id).unwrap().sent_at.is_none());
        assert_eq!(fixture.jobs.get_pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_render_failure_leaves_job_pending() {
        let fixture = Fixture::new(false);
        let mut template = Template::new("broken", "en");
        template.enabled = true;
        template.html_body = "{{#each}}".to_string();
        fixture.templates.create(&template).await.unwrap();

        let dispatcher = fixture.dispatcher().await;
        let job = dispatcher
            .send_email("broken", "en", "a@x.com", "", Params::new())
            .await
            .unwrap();
        settle().await;

        assert!(fixture.jobs.get(&job.id).unwrap().sent_at.is_none());
        assert!(fixture.transport.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_render_and_preview() {
        let fixture = Fixture::new(false);
        let dispatcher = Dispatcher::builder()
            .template_repository(fixture.templates.clone())
            .job_repository(fixture.jobs.clone())
            .static_params(params("brand", "Acme"))
            .build()
            .await
            .unwrap();

        let mut template = Template::new("welcome", "en");
        template.subject = "{{brand}}: hi {{name}}".to_string();
        template.parameters = params("name", "Ann");

        let job = Job::new(JobType::Email, "welcome", "en", "a@x.com", "", params("name", "Bob"));
        assert_eq!(dispatcher.render(&template, &job).unwrap().subject, "Acme: hi Bob");
        assert_eq!(dispatcher.preview(&template).unwrap().subject, "Acme: hi Ann");
    }

    #[tokio::test]
    async fn test_html_to_text_converter() {
        let fixture = Fixture::new(false);
        let dispatcher = Dispatcher::builder()
            .template_repository(fixture.templates.clone())
            .job_repository(fixture.jobs.clone())
            .html_to_text(|html| html.replace("<b>", "").replace("</b>", ""))
            .build()
            .await
            .unwrap();

        assert_eq!(dispatcher.html_to_text("<b>Hi</b>").as_deref(), Some("Hi"));
    }

    #[tokio::test]
    async fn test_pending_lookup_failure_is_fatal() {
        struct BrokenJobs;

        #[async_trait]
        impl JobRepository for BrokenJobs {
            async fn create(&self, _: &Job) -> Result<(), RepositoryError> {
                Ok(())
            }
            async fn update(&self, _: &Job) -> Result<(), RepositoryError> {
                Ok(())
            }
            async fn get_pending(&self) -> Result<Vec<Job>, RepositoryError> {
                Err(RepositoryError::Unavailable("down".to_string()))
            }
            async fn matching(
                &self,
                _: &crate::repository::JobCriteria,
            ) -> Result<(Vec<Job>, usize), RepositoryError> {
                Ok((Vec::new(), 0))
            }
        }

        let result = Dispatcher::builder()
            .template_repository(Arc::new(MemoryTemplateRepository::new()))
            .job_repository(Arc::new(BrokenJobs))
            .build()
            .await;
        assert!(matches!(result, Err(DispatchError::Repository(_))));
    }
}
