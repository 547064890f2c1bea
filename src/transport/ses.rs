//! AWS SES email provider integration.

use std::time::Instant;

use async_trait::async_trait;
use aws_sdk_sesv2::config::{BehaviorVersion, Region};
use aws_sdk_sesv2::error::DisplayErrorContext;
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent, Message, MessageTag};
use aws_sdk_sesv2::Client;

use crate::config::EmailConfig;
use crate::job::Job;
use crate::metrics::TransportMetrics;
use crate::template::{RenderedMessage, Renderer, Template};

use super::{Transport, TransportError};

const CHARSET: &str = "UTF-8";

/// Tag name carrying the template id on every message
const TEMPLATE_TAG: &str = "template";

/// AWS SES transport. Credentials come from the AWS default provider chain.
pub struct SesTransport {
    client: Client,
    from: String,
    reply_to: Option<String>,
    configuration_set: Option<String>,
    skip_text: bool,
}

impl SesTransport {
    pub async fn new(config: &EmailConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.aws_region.clone().filter(|r| !r.is_empty()) {
            loader = loader.region(Region::new(region));
        }
        let aws_config = loader.load().await;

        Self::from_client(Client::new(&aws_config), config)
    }

    /// Create from an existing SDK client
    pub fn from_client(client: Client, config: &EmailConfig) -> Self {
        Self {
            client,
            from: config.from.clone(),
            reply_to: config.reply_to.clone().filter(|r| !r.is_empty()),
            configuration_set: config.configuration_set.clone().filter(|c| !c.is_empty()),
            skip_text: config.skip_text,
        }
    }

    fn email_content(&self, message: &RenderedMessage) -> Result<EmailContent, TransportError> {
        let mut body = Body::builder().html(content(&message.html)?);
        if !self.skip_text {
            body = body.text(content(&message.text)?);
        }

        let message = Message::builder()
            .subject(content(&message.subject)?)
            .body(body.build())
            .build();

        Ok(EmailContent::builder().simple(message).build())
    }
}

fn content(data: &str) -> Result<Content, TransportError> {
    Content::builder()
        .data(data)
        .charset(CHARSET)
        .build()
        .map_err(sdk_error)
}

fn template_tag(template_id: &str) -> Result<MessageTag, TransportError> {
    MessageTag::builder()
        .name(TEMPLATE_TAG)
        .value(template_id)
        .build()
        .map_err(sdk_error)
}

fn sdk_error(e: impl std::error::Error) -> TransportError {
    TransportError::Sdk {
        provider: "ses",
        message: DisplayErrorContext(e).to_string(),
    }
}

#[async_trait]
impl Transport for SesTransport {
    fn name(&self) -> &'static str {
        "ses"
    }

    async fn send(
        &self,
        job: &Job,
        template: &Template,
        renderer: &Renderer,
    ) -> Result<(), TransportError> {
        let message = renderer.render_message(template, &job.params)?;

        let mut request = self
            .client
            .send_email()
            .from_email_address(&self.from)
            .destination(Destination::builder().to_addresses(&job.target).build())
            .content(self.email_content(&message)?)
            .email_tags(template_tag(&template.template_id)?);

        if let Some(reply_to) = &self.reply_to {
            request = request.reply_to_addresses(reply_to);
        }
        if let Some(configuration_set) = &self.configuration_set {
            request = request.configuration_set_name(configuration_set);
        }

        tracing::debug!(
            job_id = %job.id,
            template_id = %template.template_id,
            "Sending email via AWS SES"
        );

        let start = Instant::now();
        let result = request.send().await;
        TransportMetrics::record_latency(job.job_type, start.elapsed().as_secs_f64());
        result.map_err(sdk_error)?;

        tracing::debug!(job_id = %job.id, "Email sent successfully via AWS SES");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(skip_text: bool) -> SesTransport {
        let config = aws_sdk_sesv2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-north-1"))
            .build();
        let email = EmailConfig {
            from: "Acme <no-reply@acme.test>".to_string(),
            reply_to: Some(String::new()),
            skip_text,
            ..Default::default()
        };
        SesTransport::from_client(Client::from_conf(config), &email)
    }

    fn message() -> RenderedMessage {
        RenderedMessage {
            subject: "Hi Ann".to_string(),
            text: "Welcome Ann".to_string(),
            html: "<p>Welcome Ann</p>".to_string(),
        }
    }

    #[test]
    fn test_all_parts_utf8() {
        let content = transport(false).email_content(&message()).unwrap();
        let message = content.simple().unwrap();

        let subject = message.subject().unwrap();
        assert_eq!(subject.data(), "Hi Ann");
        assert_eq!(subject.charset(), Some(CHARSET));

        let body = message.body().unwrap();
        assert_eq!(body.text().unwrap().data(), "Welcome Ann");
        assert_eq!(body.html().unwrap().data(), "<p>Welcome Ann</p>");
        assert_eq!(body.html().unwrap().charset(), Some(CHARSET));
    }

    #[test]
    fn test_skip_text() {
        let content = transport(true).email_content(&message()).unwrap();
        let body = content.simple().unwrap().body().unwrap();
        assert!(body.text().is_none());
        assert!(body.html().is_some());
    }

    #[test]
    fn test_template_tag() {
        let tag = template_tag("welcome").unwrap();
        assert_eq!(tag.name(), "template");
        assert_eq!(tag.value(), "welcome");
    }

    #[test]
    fn test_settings_applied() {
        let transport = transport(false);
        assert_eq!(transport.name(), "ses");
        assert_eq!(transport.from, "Acme <no-reply@acme.test>");
        assert!(transport.reply_to.is_none());
        assert!(transport.subscriptions().is_none());
    }
}
