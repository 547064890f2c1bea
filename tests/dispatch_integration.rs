//! End-to-end dispatch tests
//!
//! These tests drive the dispatcher through its public API with in-memory
//! repositories and a recording transport, covering template fallback,
//! parameter capture and recovery of pending jobs across restarts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use notification_dispatcher::dispatcher::Dispatcher;
use notification_dispatcher::job::{Job, Params};
use notification_dispatcher::repository::{
    JobRepository, MemoryJobRepository, MemoryTemplateRepository, TemplateRepository,
};
use notification_dispatcher::template::{RenderedMessage, Renderer, Template, PLACEHOLDER_SUBJECT};
use notification_dispatcher::transport::{Transport, TransportError};

/// Transport that keeps every rendered message it was asked to deliver
#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(String, RenderedMessage)>>,
    down: AtomicBool,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<(String, RenderedMessage)> {
        self.sent.lock().unwrap().clone()
    }

    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
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
        if self.down.load(Ordering::SeqCst) {
            return Err(TransportError::Provider {
                provider: "recording",
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        let message = renderer.render_message(template, &job.params)?;
        self.sent.lock().unwrap().push((job.target.clone(), message));
        Ok(())
    }
}

struct TestEnvironment {
    templates: Arc<MemoryTemplateRepository>,
    jobs: Arc<MemoryJobRepository>,
    email: Arc<RecordingTransport>,
    sms: Arc<RecordingTransport>,
}

impl TestEnvironment {
    fn new() -> Self {
        Self {
            templates: Arc::new(MemoryTemplateRepository::new()),
            jobs: Arc::new(MemoryJobRepository::new()),
            email: Arc::new(RecordingTransport::default()),
            sms: Arc::new(RecordingTransport::default()),
        }
    }

    async fn dispatcher(&self) -> Dispatcher {
        Dispatcher::builder()
            .template_repository(self.templates.clone())
            .job_repository(self.jobs.clone())
            .email_transport(self.email.clone())
            .sms_transport(self.sms.clone())
            .fallback_locale("en")
            .worker_count(3)
            .build()
            .await
            .expect("dispatcher should build")
    }

    async fn add_template(&self, id: &str, locale: &str, enabled: bool, subject: &str, text: &str) {
        let mut template = Template::new(id, locale);
        template.enabled = enabled;
        template.subject = subject.to_string();
        template.text_body = text.to_string();
        template.html_body = format!("<p>{}</p>", text);
        self.templates.create(&template).await.unwrap();
    }
}

fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect()
}

/// Poll `check` until it holds or a second passes
async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..50 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

/// Template `welcome`/`en` with subject `Hi {{.name}}` and params `name=Ann`
/// is delivered with subject `Hi Ann`. In Handlebars syntax that subject is
/// written `Hi {{name}}`.
#[tokio::test]
async fn test_email_rendered_and_marked_sent() {
    let env = TestEnvironment::new();
    env.add_template("welcome", "en", true, "Hi {{name}}", "Welcome {{name}}")
        .await;
    let dispatcher = env.dispatcher().await;

    let job = dispatcher
        .send_email("welcome", "en", "ann@example.com", "user-1", params(&[("name", "Ann")]))
        .await
        .unwrap();

    assert!(eventually(|| env.jobs.get(&job.id).is_some_and(|j| j.is_sent())).await);

    let sent = env.email.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "ann@example.com");
    assert_eq!(sent[0].1.subject, "Hi Ann");
    assert_eq!(sent[0].1.text, "Welcome Ann");
    assert_eq!(sent[0].1.html, "<p>Welcome Ann</p>");
    assert_eq!(env.sms.count(), 0);
}

#[tokio::test]
async fn test_missing_template_creates_placeholders() {
    let env = TestEnvironment::new();
    let dispatcher = env.dispatcher().await;

    dispatcher
        .send_sms("otp", "sv", "+46700000000", "", params(&[("code", "1234")]))
        .await
        .unwrap();

    assert!(eventually(|| env.sms.count() == 1).await);

    let (target, message) = env.sms.sent().remove(0);
    assert_eq!(target, "+46700000000");
    assert_eq!(message.subject, PLACEHOLDER_SUBJECT);
    assert_eq!(
        message.text,
        "A template is missing for template id: otp, locale: en"
    );

    // Both keys now exist, disabled, for an operator to fill in
    let requested = env.templates.find("otp", "sv").unwrap();
    assert!(!requested.enabled);
    assert!(requested.update_parameters);

    // The fallback placeholder was used for delivery and captured the params
    let fallback = env.templates.find("otp", "en").unwrap();
    assert!(!fallback.enabled);
    assert!(!fallback.update_parameters);
    assert_eq!(fallback.parameters["code"], "1234");
}

#[tokio::test]
async fn test_disabled_locale_falls_back() {
    let env = TestEnvironment::new();
    env.add_template("welcome", "sv", false, "Hej {{name}}", "Hej").await;
    env.add_template("welcome", "en", true, "Hello {{name}}", "Hello").await;
    let dispatcher = env.dispatcher().await;

    dispatcher
        .send_email("welcome", "sv", "a@example.com", "", params(&[("name", "Ann")]))
        .await
        .unwrap();

    assert!(eventually(|| env.email.count() == 1).await);
    assert_eq!(env.email.sent()[0].1.subject, "Hello Ann");
}

#[tokio::test]
async fn test_static_params_available_to_templates() {
    let env = TestEnvironment::new();
    env.add_template("receipt", "en", true, "{{brand}} receipt for {{name}}", "")
        .await;

    let dispatcher = Dispatcher::builder()
        .template_repository(env.templates.clone())
        .job_repository(env.jobs.clone())
        .email_transport(env.email.clone())
        .static_params(params(&[("brand", "Acme"), ("name", "nobody")]))
        .build()
        .await
        .unwrap();

    dispatcher
        .send_email("receipt", "en", "a@example.com", "", params(&[("name", "Ann")]))
        .await
        .unwrap();

    assert!(eventually(|| env.email.count() == 1).await);
    assert_eq!(env.email.sent()[0].1.subject, "Acme receipt for Ann");
}

#[tokio::test]
async fn test_failed_delivery_is_retried_after_restart() {
    let env = TestEnvironment::new();
    env.add_template("welcome", "en", true, "Hi {{name}}", "").await;
    env.email.down.store(true, Ordering::SeqCst);

    let dispatcher = env.dispatcher().await;
    let job = dispatcher
        .send_email("welcome", "en", "a@example.com", "", params(&[("name", "Ann")]))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!env.jobs.get(&job.id).unwrap().is_sent());
    dispatcher.shutdown(async {}).await;

    // Provider recovers; a new dispatcher over the same storage picks the job up
    env.email.down.store(false, Ordering::SeqCst);
    let _restarted = env.dispatcher().await;

    assert!(eventually(|| env.jobs.get(&job.id).is_some_and(|j| j.is_sent())).await);
    assert_eq!(env.email.count(), 1);
    assert!(env.jobs.get_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sent_jobs_not_requeued_on_restart() {
    let env = TestEnvironment::new();
    env.add_template("welcome", "en", true, "Hi", "").await;

    let dispatcher = env.dispatcher().await;
    dispatcher
        .send_email("welcome", "en", "a@example.com", "", Params::new())
        .await
        .unwrap();
    assert!(eventually(|| env.email.count() == 1).await);
    dispatcher.shutdown(async {}).await;

    let _restarted = env.dispatcher().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.email.count(), 1);
}

#[tokio::test]
async fn test_jobs_after_shutdown_stay_pending() {
    let env = TestEnvironment::new();
    env.add_template("welcome", "en", true, "Hi", "").await;

    let dispatcher = env.dispatcher().await;
    dispatcher.shutdown(async {}).await;

    let job = dispatcher
        .send_email("welcome", "en", "a@example.com", "", Params::new())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.email.count(), 0);
    assert!(!env.jobs.get(&job.id).unwrap().is_sent());
}

#[tokio::test]
async fn test_concurrent_submissions_all_delivered() {
    let env = TestEnvironment::new();
    env.add_template("otp", "en", true, "", "Code {{code}}").await;
    let dispatcher = env.dispatcher().await;

    let submissions = (0..20).map(|i| {
        let dispatcher = dispatcher.clone();
        async move {
            dispatcher
                .send_sms("otp", "en", &format!("+4670000{:04}", i), "", params(&[("code", "1")]))
                .await
        }
    });
    let results = futures::future::join_all(submissions).await;
    assert!(results.iter().all(|r| r.is_ok()));

    assert!(eventually(|| env.sms.count() == 20).await);
    assert!(eventually(|| env.jobs.all().iter().all(|j| j.is_sent())).await);
}
