use thiserror::Error;

use crate::template::RenderError;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("{provider} returned {status}: {body}")]
    Provider {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// Request through a provider SDK failed
    #[error("{provider} request failed: {message}")]
    Sdk {
        provider: &'static str,
        message: String,
    },

    #[error("Invalid provider URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}
