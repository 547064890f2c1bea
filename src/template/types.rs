use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::Params;

/// Localized message content keyed by (`template_id`, `locale`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(rename = "id")]
    pub template_id: String,
    pub locale: String,

    /// Disabled templates are only used as a marker that triggers fallback
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,

    /// Last captured example parameters, used to preview rendering
    #[serde(default)]
    pub parameters: Params,
    /// When set, the next delivery captures its job params into `parameters`
    #[serde(default)]
    pub update_parameters: bool,

    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub text_body: String,
    #[serde(default)]
    pub html_body: String,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Template {
    /// Create an empty, disabled template
    pub fn new(template_id: impl Into<String>, locale: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            template_id: template_id.into(),
            locale: locale.into(),
            enabled: false,
            description: String::new(),
            parameters: Params::new(),
            update_parameters: false,
            subject: String::new(),
            text_body: String::new(),
            html_body: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Build the stand-in template created when (`template_id`, `locale`) is missing.
    ///
    /// Placeholders stay disabled and ask for the next job's parameters, so an
    /// operator finds both the missing key and realistic example data.
    pub fn placeholder(template_id: &str, locale: &str) -> Self {
        let body = format!(
            "A template is missing for template id: {}, locale: {}",
            template_id, locale
        );

        Self {
            update_parameters: true,
            subject: PLACEHOLDER_SUBJECT.to_string(),
            text_body: body.clone(),
            html_body: body,
            ..Self::new(template_id, locale)
        }
    }

    /// Operator facing id in the form `locale:templateId`
    pub fn key(&self) -> String {
        format!("{}:{}", self.locale, self.template_id)
    }
}

/// Subject line of auto-created placeholder templates
pub const PLACEHOLDER_SUBJECT: &str = "[notification-dispatcher] template missing";

/// Rendered message parts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderedMessage {
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_inert_and_learning() {
        let tpl = Template::placeholder("otp", "sv");

        assert!(!tpl.enabled);
        assert!(tpl.update_parameters);
        assert_eq!(tpl.subject, PLACEHOLDER_SUBJECT);
        assert!(tpl.text_body.contains("otp"));
        assert!(tpl.text_body.contains("sv"));
        assert_eq!(tpl.text_body, tpl.html_body);
    }

    #[test]
    fn test_key_format() {
        let tpl = Template::new("welcome", "en");
        assert_eq!(tpl.key(), "en:welcome");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let tpl: Template =
            serde_json::from_str(r#"{"id": "welcome", "locale": "en", "subject": "Hi"}"#).unwrap();

        assert_eq!(tpl.template_id, "welcome");
        assert!(!tpl.enabled);
        assert!(tpl.parameters.is_empty());
        assert_eq!(tpl.subject, "Hi");
    }
}
