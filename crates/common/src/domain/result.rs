use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Malformed telemetry feed: {0}")]
    MalformedFeed(String),

    #[error("Device already exists: {0}")]
    DeviceAlreadyExists(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
