use thiserror::Error;

use crate::job::JobType;
use crate::repository::RepositoryError;
use crate::template::RenderError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Missing template repository")]
    MissingTemplateRepository,

    #[error("Missing job repository")]
    MissingJobRepository,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No {0} transport configured")]
    TransportNotConfigured(JobType),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
