//! Mailgun email provider integration.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::config::EmailConfig;
use crate::job::Job;
use crate::metrics::TransportMetrics;
use crate::template::{Renderer, Template};

use super::{SubscriptionManager, Transport, TransportError, USER_AGENT};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Mailgun transport.
///
/// Every message is tagged with its template id, which is what Mailgun
/// unsubscribes are scoped by.
pub struct MailgunTransport {
    client: Client,
    api_base: String,
    domain: String,
    api_key: String,
    from: String,
    reply_to: Option<String>,
    skip_text: bool,
}

#[derive(Deserialize)]
struct UnsubscribeRecord {
    #[serde(default)]
    tags: Vec<String>,
}

impl MailgunTransport {
    pub fn new(config: &EmailConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_base: config.region.api_base().to_string(),
            domain: config.domain.clone(),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            reply_to: config.reply_to.clone().filter(|r| !r.is_empty()),
            skip_text: config.skip_text,
        })
    }

    /// Point the transport at another API base (e.g. a sandbox)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.api_base, self.domain)
    }

    /// The address becomes a single percent-encoded path segment
    fn unsubscribes_url(&self, email: &str) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", self.api_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.api_base.clone()))?
            .pop_if_empty()
            .extend([self.domain.as_str(), "unsubscribes", email]);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Provider {
            provider: "mailgun",
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Transport for MailgunTransport {
    fn name(&self) -> &'static str {
        "mailgun"
    }

    async fn send(
        &self,
        job: &Job,
        template: &Template,
        renderer: &Renderer,
    ) -> Result<(), TransportError> {
        let subject = renderer.render(&template.subject, &job.params)?;
        let html = renderer.render(&template.html_body, &job.params)?;
        let text = if self.skip_text {
            None
        } else {
            Some(renderer.render(&template.text_body, &job.params)?)
        };

        let mut form: Vec<(&str, &str)> = vec![
            ("from", self.from.as_str()),
            ("to", job.target.as_str()),
            ("subject", subject.as_str()),
            ("html", html.as_str()),
            ("o:tag", template.template_id.as_str()),
        ];
        if let Some(text) = text.as_deref() {
            form.push(("text", text));
        }
        if let Some(reply_to) = self.reply_to.as_deref() {
            form.push(("h:Reply-To", reply_to));
        }

        tracing::debug!(
            job_id = %job.id,
            template_id = %template.template_id,
            "Sending email via Mailgun"
        );

        let start = Instant::now();
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth("api", Some(&self.api_key))
            .form(&form)
            .send()
            .await?;
        TransportMetrics::record_latency(job.job_type, start.elapsed().as_secs_f64());

        Self::check(response).await?;
        tracing::debug!(job_id = %job.id, "Email sent successfully via Mailgun");
        Ok(())
    }

    fn subscriptions(&self) -> Option<&dyn SubscriptionManager> {
        Some(self)
    }
}

#[async_trait]
impl SubscriptionManager for MailgunTransport {
    async fn unsubscribed_templates(&self, email: &str) -> Result<Vec<String>, TransportError> {
        let response = self
            .client
            .get(self.unsubscribes_url(email)?)
            .basic_auth("api", Some(&self.api_key))
            .send()
            .await?;

        // No record means the address is subscribed to everything
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        let record: UnsubscribeRecord = Self::check(response).await?.json().await?;
        Ok(record.tags)
    }

    async fn resubscribe_all(&self, email: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .delete(self.unsubscribes_url(email)?)
            .basic_auth("api", Some(&self.api_key))
            .send()
            .await?;

        Self::check(response).await?;
        tracing::info!(email = %email, "Resubscribed to all templates");
        Ok(())
    }

    async fn resubscribe_template(
        &self,
        email: &str,
        template_id: &str,
    ) -> Result<(), TransportError> {
        let response = self
            .client
            .delete(self.unsubscribes_url(email)?)
            .query(&[("tag", template_id)])
            .basic_auth("api", Some(&self.api_key))
            .send()
            .await?;

        Self::check(response).await?;
        tracing::info!(email = %email, template_id = %template_id, "Resubscribed to template");
        Ok(())
    }
}
