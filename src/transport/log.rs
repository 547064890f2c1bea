use async_trait::async_trait;

use crate::job::{Job, JobType};
use crate::template::{Renderer, Template};

use super::{Transport, TransportError};

/// Renders messages and logs them instead of delivering.
///
/// Used for local development and when no provider is configured.
#[derive(Debug, Default, Clone)]
pub struct LogTransport;

impl LogTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LogTransport {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(
        &self,
        job: &Job,
        template: &Template,
        renderer: &Renderer,
    ) -> Result<(), TransportError> {
        match job.job_type {
            JobType::Email => {
                let message = renderer.render_message(template, &job.params)?;
                tracing::info!(
                    job_id = %job.id,
                    template_id = %template.template_id,
                    locale = %template.locale,
                    target = %job.target,
                    subject = %message.subject,
                    text = %message.text,
                    html_bytes = message.html.len(),
                    "Email (log transport)"
                );
            }
            JobType::Sms => {
                let text = renderer.render(&template.text_body, &job.params)?;
                tracing::info!(
                    job_id = %job.id,
                    template_id = %template.template_id,
                    locale = %template.locale,
                    target = %job.target,
                    message = %text,
                    "SMS (log transport)"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Params;
    use serde_json::json;

    #[tokio::test]
    async fn test_log_transport_renders() {
        let mut template = Template::new("welcome", "en");
        template.subject = "Hi {{name}}".to_string();
        let mut params = Params::new();
        params.insert("name".to_string(), json!("Ann"));
        let job = Job::new(JobType::Email, "welcome", "en", "a@x.com", "", params);

        assert!(LogTransport::new()
            .send(&job, &template, &Renderer::default())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_log_transport_render_failure() {
        let mut template = Template::new("otp", "en");
        template.text_body = "{{#if}}".to_string();
        let job = Job::new(JobType::Sms, "otp", "en", "+4670", "", Params::new());

        let result = LogTransport::new()
            .send(&job, &template, &Renderer::default())
            .await;
        assert!(matches!(result, Err(TransportError::Render(_))));
    }
}
