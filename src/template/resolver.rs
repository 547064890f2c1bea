use std::sync::Arc;

use crate::metrics::TemplateMetrics;
use crate::repository::{RepositoryError, TemplateRepository};

use super::Template;

/// Finds the template to use for a (`template_id`, `locale`) pair.
///
/// Lookup order:
/// 1. the requested locale, if it exists and is enabled
/// 2. the fallback locale, enabled or not
///
/// Every key found missing along the way gets a disabled placeholder
/// template written to the repository so operators can see what to fill in.
#[derive(Clone)]
pub struct TemplateResolver {
    repository: Arc<dyn TemplateRepository>,
    fallback_locale: String,
}

impl TemplateResolver {
    pub fn new(repository: Arc<dyn TemplateRepository>, fallback_locale: impl Into<String>) -> Self {
        Self {
            repository,
            fallback_locale: fallback_locale.into(),
        }
    }

    pub fn fallback_locale(&self) -> &str {
        &self.fallback_locale
    }

    #[tracing::instrument(skip(self), fields(fallback_locale = %self.fallback_locale))]
    pub async fn resolve(&self, template_id: &str, locale: &str) -> Result<Template, RepositoryError> {
        match self.repository.get(template_id, locale).await {
            Ok(template) if template.enabled => return Ok(template),
            Ok(_) => {
                tracing::debug!(template_id, locale, "Template disabled, using fallback locale");
            }
            Err(e) if e.is_not_found() => {
                // Best effort; the fallback lookup still decides the outcome
                if let Err(e) = self.create_placeholder(template_id, locale).await {
                    tracing::error!(
                        template_id,
                        locale,
                        error = %e,
                        "Failed to create placeholder template"
                    );
                }
            }
            Err(e) => return Err(e),
        }

        match self.repository.get(template_id, &self.fallback_locale).await {
            Ok(template) => Ok(template),
            Err(e) if e.is_not_found() => {
                self.create_placeholder(template_id, &self.fallback_locale)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn create_placeholder(
        &self,
        template_id: &str,
        locale: &str,
    ) -> Result<Template, RepositoryError> {
        let placeholder = Template::placeholder(template_id, locale);
        self.repository.create(&placeholder).await?;

        TemplateMetrics::record_placeholder_created();
        tracing::warn!(template_id, locale, "Created placeholder for missing template");

        Ok(placeholder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryTemplateRepository;
    use crate::template::PLACEHOLDER_SUBJECT;

    fn enabled(id: &str, locale: &str, subject: &str) -> Template {
        let mut template = Template::new(id, locale);
        template.enabled = true;
        template.subject = subject.to_string();
        template
    }

    fn resolver(repo: &Arc<MemoryTemplateRepository>) -> TemplateResolver {
        TemplateResolver::new(repo.clone(), "en")
    }

    #[tokio::test]
    async fn test_resolve_requested_locale() {
        let repo = Arc::new(MemoryTemplateRepository::new());
        repo.create(&enabled("welcome", "sv", "Hej")).await.unwrap();
        repo.create(&enabled("welcome", "en", "Hi")).await.unwrap();

        let template = resolver(&repo).resolve("welcome", "sv").await.unwrap();
        assert_eq!(template.subject, "Hej");
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn test_disabled_uses_fallback_without_placeholder() {
        let repo = Arc::new(MemoryTemplateRepository::new());
        let mut disabled = enabled("welcome", "sv", "Hej");
        disabled.enabled = false;
        repo.create(&disabled).await.unwrap();
        repo.create(&enabled("welcome", "en", "Hi")).await.unwrap();

        let template = resolver(&repo).resolve("welcome", "sv").await.unwrap();
        assert_eq!(template.locale, "en");
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_enabled_flag_ignored() {
        let repo = Arc::new(MemoryTemplateRepository::new());
        let mut fallback = enabled("welcome", "en", "Hi");
        fallback.enabled = false;
        repo.create(&fallback).await.unwrap();

        let template = resolver(&repo).resolve("welcome", "sv").await.unwrap();
        assert_eq!(template.subject, "Hi");
        assert!(!template.enabled);
        // Placeholder for the missing "sv" key
        assert!(repo.find("welcome", "sv").is_some());
    }

    #[tokio::test]
    async fn test_missing_everywhere_creates_two_placeholders() {
        let repo = Arc::new(MemoryTemplateRepository::new());

        let template = resolver(&repo).resolve("otp", "sv").await.unwrap();
        assert_eq!(template.locale, "en");
        assert_eq!(template.subject, PLACEHOLDER_SUBJECT);
        assert!(template.update_parameters);

        let sv = repo.find("otp", "sv").unwrap();
        assert!(!sv.enabled);
        assert!(sv.update_parameters);
        assert!(repo.find("otp", "en").is_some());
    }

    #[tokio::test]
    async fn test_requested_is_fallback_locale() {
        let repo = Arc::new(MemoryTemplateRepository::new());

        // First create succeeds, second lookup hits the fresh placeholder
        let template = resolver(&repo).resolve("otp", "en").await.unwrap();
        assert_eq!(template.template_id, "otp");
        assert_eq!(template.locale, "en");
        assert_eq!(repo.len(), 1);
    }
}
