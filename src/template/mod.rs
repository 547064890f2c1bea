//! Message templates.
//!
//! This module provides:
//! - the [`Template`] record keyed by (`template_id`, `locale`)
//! - [`TemplateResolver`]: locale fallback and placeholder creation
//! - [`Renderer`]: Handlebars rendering with static parameters and helpers
//! - [`html_to_text`]: derives a text body from an HTML body
//!
//! # Example
//!
//! ```ignore
//! let renderer = Renderer::builder()
//!     .static_params(static_params)
//!     .build();
//!
//! let template = resolver.resolve("welcome", "sv").await?;
//! let message = renderer.render_message(&template, &job.params)?;
//! ```

mod helpers;
mod render;
mod resolver;
mod text;
mod types;

pub use render::{RenderError, Renderer, RendererBuilder};
pub use resolver::TemplateResolver;
pub use text::html_to_text;
pub use types::{RenderedMessage, Template, PLACEHOLDER_SUBJECT};
