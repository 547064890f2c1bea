//! 46elks SMS provider integration.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;

use crate::config::SmsConfig;
use crate::job::Job;
use crate::metrics::TransportMetrics;
use crate::template::{Renderer, Template};

use super::{Transport, TransportError, USER_AGENT};

const ELKS_API: &str = "https://api.46elks.com/a1/sms";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// 46elks transport. Sends the rendered text body; subject and HTML are ignored.
pub struct ElksTransport {
    client: Client,
    endpoint: String,
    from: String,
    username: String,
    password: String,
}

impl ElksTransport {
    pub fn new(config: &SmsConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: ELKS_API.to_string(),
            from: config.from.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Transport for ElksTransport {
    fn name(&self) -> &'static str {
        "46elks"
    }

    async fn send(
        &self,
        job: &Job,
        template: &Template,
        renderer: &Renderer,
    ) -> Result<(), TransportError> {
        let message = renderer.render(&template.text_body, &job.params)?;

        let form = [
            ("from", self.from.as_str()),
            ("to", job.target.as_str()),
            ("message", message.as_str()),
        ];

        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .form(&form)
            .send()
            .await?;
        TransportMetrics::record_latency(job.job_type, start.elapsed().as_secs_f64());

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Provider {
                provider: "46elks",
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(job_id = %job.id, "SMS sent via 46elks");
        Ok(())
    }
}
