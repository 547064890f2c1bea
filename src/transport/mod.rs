//! Delivery transports.
//!
//! A transport renders the parts of a template it needs and hands the
//! result to a provider. Implementations:
//!
//! - [`LogTransport`]: logs the rendered message instead of delivering it
//! - [`MailgunTransport`]: email via the Mailgun HTTP API, with unsubscribe management
//! - [`SesTransport`]: email via AWS SES
//! - [`ElksTransport`]: SMS via 46elks

mod elks;
mod error;
mod factory;
mod log;
mod mailgun;
mod ses;

use async_trait::async_trait;

use crate::job::Job;
use crate::template::{Renderer, Template};

pub use elks::ElksTransport;
pub use error::TransportError;
pub use factory::{create_email_transport, create_sms_transport};
pub use log::LogTransport;
pub use mailgun::MailgunTransport;
pub use ses::SesTransport;

/// User-Agent sent by every HTTP transport
pub const USER_AGENT: &str = concat!("notification-dispatcher/", env!("CARGO_PKG_VERSION"));

/// Delivers one job using an already resolved template
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    async fn send(
        &self,
        job: &Job,
        template: &Template,
        renderer: &Renderer,
    ) -> Result<(), TransportError>;

    /// Unsubscribe management, when the provider supports it
    fn subscriptions(&self) -> Option<&dyn SubscriptionManager> {
        None
    }
}

/// Per-template unsubscribe state kept by an email provider
#[async_trait]
pub trait SubscriptionManager: Send + Sync {
    /// Template ids the address has unsubscribed from
    async fn unsubscribed_templates(&self, email: &str) -> Result<Vec<String>, TransportError>;

    async fn resubscribe_all(&self, email: &str) -> Result<(), TransportError>;

    async fn resubscribe_template(&self, email: &str, template_id: &str)
        -> Result<(), TransportError>;
}
