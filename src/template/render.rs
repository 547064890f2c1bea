//! Template rendering with static and per-job parameters.
//!
//! Bodies are parsed on every call, so an edited template takes effect on the
//! next send without any cache to invalidate.

use std::sync::Arc;

use handlebars::{Handlebars, HelperDef};
use thiserror::Error;

use crate::job::Params;

use super::helpers::register_builtin_helpers;
use super::types::{RenderedMessage, Template};

#[derive(Debug, Error)]
#[error("Failed to render {part}: {source}")]
pub struct RenderError {
    pub part: &'static str,
    #[source]
    source: handlebars::RenderError,
}

/// Expands template bodies against merged parameters.
///
/// Cheap to clone; the helper table and the static parameters are shared by
/// every clone and never change after construction.
#[derive(Clone)]
pub struct Renderer {
    registry: Arc<Handlebars<'static>>,
    static_params: Arc<Params>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("static_params", &self.static_params)
            .finish_non_exhaustive()
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Renderer {
    pub fn new(static_params: Params) -> Self {
        Self::builder().static_params(static_params).build()
    }

    pub fn builder() -> RendererBuilder {
        RendererBuilder::new()
    }

    /// Static parameters overlaid with `job_params`; job values win on collision
    pub fn merge_params(&self, job_params: &Params) -> Params {
        let mut merged = (*self.static_params).clone();
        for (key, value) in job_params {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Render a single body string
    pub fn render(&self, body: &str, job_params: &Params) -> Result<String, RenderError> {
        self.render_part("body", body, &self.merge_params(job_params))
    }

    /// Render subject, text and html of `template`. Fails if any part fails.
    pub fn render_message(
        &self,
        template: &Template,
        job_params: &Params,
    ) -> Result<RenderedMessage, RenderError> {
        let params = self.merge_params(job_params);

        Ok(RenderedMessage {
            subject: self.render_part("subject", &template.subject, &params)?,
            text: self.render_part("text body", &template.text_body, &params)?,
            html: self.render_part("html body", &template.html_body, &params)?,
        })
    }

    fn render_part(
        &self,
        part: &'static str,
        body: &str,
        params: &Params,
    ) -> Result<String, RenderError> {
        self.registry
            .render_template(body, params)
            .map_err(|source| RenderError { part, source })
    }
}

/// Collects helpers and static parameters before the renderer is shared
pub struct RendererBuilder {
    registry: Handlebars<'static>,
    static_params: Params,
}

impl Default for RendererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererBuilder {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        register_builtin_helpers(&mut registry);

        Self {
            registry,
            static_params: Params::new(),
        }
    }

    /// Set the process-wide parameters merged into every render
    pub fn static_params(mut self, params: Params) -> Self {
        self.static_params = params;
        self
    }

    /// Add a named helper to the shared helper table
    pub fn helper<H>(mut self, name: &str, helper: H) -> Self
    where
        H: HelperDef + Send + Sync + 'static,
    {
        self.registry.register_helper(name, Box::new(helper));
        self
    }

    pub fn build(self) -> Renderer {
        Renderer {
            registry: Arc::new(self.registry),
            static_params: Arc::new(self.static_params),
        }
    }
}
