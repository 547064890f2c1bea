//! Transport factory

use std::sync::Arc;

use crate::config::{EmailConfig, EmailProvider, SmsConfig, SmsProvider};

use super::{ElksTransport, LogTransport, MailgunTransport, SesTransport, Transport};

/// Create the email transport selected in configuration.
///
/// Returns `None` for `provider = "none"`. A Mailgun transport that cannot
/// be built falls back to logging. SES loads AWS credentials and region
/// from the default provider chain, hence async.
pub async fn create_email_transport(settings: &EmailConfig) -> Option<Arc<dyn Transport>> {
    match settings.provider {
        EmailProvider::None => {
            tracing::info!("Email transport disabled");
            None
        }
        EmailProvider::Log => {
            tracing::info!(provider = "log", "Creating email transport");
            Some(Arc::new(LogTransport::new()))
        }
        EmailProvider::Mailgun => {
            if settings.domain.is_empty() || settings.api_key.is_empty() {
                tracing::warn!(
                    "Mailgun requested without domain or api_key, falling back to log transport"
                );
                return Some(Arc::new(LogTransport::new()));
            }

            match MailgunTransport::new(settings) {
                Ok(transport) => {
                    tracing::info!(
                        provider = "mailgun",
                        domain = %settings.domain,
                        region = ?settings.region,
                        "Creating email transport"
                    );
                    Some(Arc::new(transport))
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to create Mailgun transport, falling back to log transport"
                    );
                    Some(Arc::new(LogTransport::new()))
                }
            }
        }
        EmailProvider::Ses => {
            if settings.from.is_empty() {
                tracing::warn!("SES requested without a from address, falling back to log transport");
                return Some(Arc::new(LogTransport::new()));
            }

            let transport = SesTransport::new(settings).await;
            tracing::info!(
                provider = "ses",
                region = settings.aws_region.as_deref().unwrap_or("default"),
                "Creating email transport"
            );
            Some(Arc::new(transport))
        }
    }
}

/// Create the SMS transport selected in configuration.
pub fn create_sms_transport(settings: &SmsConfig) -> Option<Arc<dyn Transport>> {
    match settings.provider {
        SmsProvider::None => {
            tracing::info!("SMS transport disabled");
            None
        }
        SmsProvider::Log => {
            tracing::info!(provider = "log", "Creating SMS transport");
            Some(Arc::new(LogTransport::new()))
        }
        SmsProvider::Elks => {
            if settings.username.is_empty() || settings.password.is_empty() {
                tracing::warn!(
                    "46elks requested without credentials, falling back to log transport"
                );
                return Some(Arc::new(LogTransport::new()));
            }

            match ElksTransport::new(settings) {
                Ok(transport) => {
                    tracing::info!(provider = "46elks", "Creating SMS transport");
                    Some(Arc::new(transport))
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Failed to create 46elks transport, falling back to log transport"
                    );
                    Some(Arc::new(LogTransport::new()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_none_disables() {
        let email = EmailConfig {
            provider: EmailProvider::None,
            ..Default::default()
        };
        assert!(create_email_transport(&email).await.is_none());

        let sms = SmsConfig {
            provider: SmsProvider::None,
            ..Default::default()
        };
        assert!(create_sms_transport(&sms).is_none());
    }

    #[tokio::test]
    async fn test_missing_credentials_fall_back_to_log() {
        let email = EmailConfig {
            provider: EmailProvider::Mailgun,
            ..Default::default()
        };
        assert_eq!(create_email_transport(&email).await.unwrap().name(), "log");

        let sms = SmsConfig {
            provider: SmsProvider::Elks,
            ..Default::default()
        };
        assert_eq!(create_sms_transport(&sms).unwrap().name(), "log");
    }

    #[tokio::test]
    async fn test_configured_providers() {
        let email = EmailConfig {
            provider: EmailProvider::Mailgun,
            domain: "mg.acme.test".to_string(),
            api_key: "key".to_string(),
            ..Default::default()
        };
        let transport = create_email_transport(&email).await.unwrap();
        assert_eq!(transport.name(), "mailgun");
        assert!(transport.subscriptions().is_some());

        let sms = SmsConfig {
            provider: SmsProvider::Elks,
            username: "u".to_string(),
            password: "p".to_string(),
            ..Default::default()
        };
        assert_eq!(create_sms_transport(&sms).unwrap().name(), "46elks");
    }

    #[tokio::test]
    async fn test_ses_provider() {
        let email = EmailConfig {
            provider: EmailProvider::Ses,
            ..Default::default()
        };
        assert_eq!(create_email_transport(&email).await.unwrap().name(), "log");

        let email = EmailConfig {
            provider: EmailProvider::Ses,
            from: "no-reply@acme.test".to_string(),
            aws_region: Some("eu-north-1".to_string()),
            ..Default::default()
        };
        let transport = create_email_transport(&email).await.unwrap();
        assert_eq!(transport.name(), "ses");
        assert!(transport.subscriptions().is_none());
    }
}
