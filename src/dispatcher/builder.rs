use std::sync::Arc;

use handlebars::HelperDef;

use crate::config::Settings;
use crate::job::Params;
use crate::metrics::QueueMetrics;
use crate::queue::{EnqueueOutcome, JobQueue, QueueConfig};
use crate::repository::{JobRepository, Repositories, TemplateRepository};
use crate::template::{RendererBuilder, TemplateResolver};
use crate::transport::Transport;

use super::{DispatchCore, DispatchError, Dispatcher, HtmlToText};

/// Assembles a [`Dispatcher`].
///
/// ```rust,ignore
/// let dispatcher = Dispatcher::builder()
///     .repositories(repos)
///     .email_transport(email)
///     .fallback_locale("en")
///     .build()
///     .await?;
/// ```
pub struct DispatcherBuilder {
    templates: Option<Arc<dyn TemplateRepository>>,
    jobs: Option<Arc<dyn JobRepository>>,
    email: Option<Arc<dyn Transport>>,
    sms: Option<Arc<dyn Transport>>,
    fallback_locale: String,
    renderer: RendererBuilder,
    queue: QueueConfig,
    html_to_text: Option<HtmlToText>,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            templates: None,
            jobs: None,
            email: None,
            sms: None,
            fallback_locale: "en".to_string(),
            renderer: RendererBuilder::new(),
            queue: QueueConfig::default(),
            html_to_text: None,
        }
    }

    /// Apply dispatcher settings and static parameters
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.fallback_locale = settings.dispatcher.fallback_locale.clone();
        self.queue = QueueConfig::from(&settings.dispatcher);
        self.renderer = self.renderer.static_params(settings.static_params.clone());
        self
    }

    pub fn template_repository(mut self, repository: Arc<dyn TemplateRepository>) -> Self {
        self.templates = Some(repository);
        self
    }

    pub fn job_repository(mut self, repository: Arc<dyn JobRepository>) -> Self {
        self.jobs = Some(repository);
        self
    }

    pub fn repositories(self, repositories: Repositories) -> Self {
        self.template_repository(repositories.templates)
            .job_repository(repositories.jobs)
    }

    pub fn email_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.email = Some(transport);
        self
    }

    pub fn sms_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.sms = Some(transport);
        self
    }

    pub fn fallback_locale(mut self, locale: impl Into<String>) -> Self {
        self.fallback_locale = locale.into();
        self
    }

    pub fn worker_count(mut self, count: usize) -> Self {
        self.queue.worker_count = count;
        self
    }

    pub fn queue_config(mut self, config: QueueConfig) -> Self {
        self.queue = config;
        self
    }

    pub fn static_params(mut self, params: Params) -> Self {
        self.renderer = self.renderer.static_params(params);
        self
    }

    /// Register a template helper shared by every render
    pub fn helper<H>(mut self, name: &str, helper: H) -> Self
    where
        H: HelperDef + Send + Sync + 'static,
    {
        self.renderer = self.renderer.helper(name, helper);
        self
    }

    /// Converter used to derive a text body when a template update omits one
    pub fn html_to_text<F>(mut self, converter: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.html_to_text = Some(Arc::new(converter));
        self
    }

    /// Validate configuration, start the workers and requeue pending jobs
    pub async fn build(self) -> Result<Dispatcher, DispatchError> {
        let templates = self
            .templates
            .ok_or(DispatchError::MissingTemplateRepository)?;
        let jobs = self.jobs.ok_or(DispatchError::MissingJobRepository)?;

        if self.queue.worker_count == 0 {
            return Err(DispatchError::InvalidConfig(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.fallback_locale.is_empty() {
            return Err(DispatchError::InvalidConfig(
                "fallback_locale must not be empty".to_string(),
            ));
        }

        let core = Arc::new(DispatchCore {
            resolver: TemplateResolver::new(templates.clone(), self.fallback_locale),
            templates,
            jobs,
            renderer: self.renderer.build(),
            email: self.email,
            sms: self.sms,
        });

        let queue = Arc::new(JobQueue::start(self.queue, core.clone()));

        let pending = match core.jobs.get_pending().await {
            Ok(pending) => pending,
            Err(e) => {
                queue.shutdown().await;
                return Err(e.into());
            }
        };

        let requeued = pending
            .into_iter()
            .map(|job| queue.enqueue(job))
            .filter(|outcome| *outcome != EnqueueOutcome::AlreadySent)
            .count();
        QueueMetrics::record_requeued(requeued);

        tracing::info!(
            requeued,
            email = core.email.as_ref().map(|t| t.name()).unwrap_or("none"),
            sms = core.sms.as_ref().map(|t| t.name()).unwrap_or("none"),
            "Dispatcher started"
        );

        Ok(Dispatcher {
            core,
            queue,
            html_to_text: self.html_to_text,
        })
    }
}
