use crate::errors::{assembly::AssemblyError, repository::RepositoryError};
use rdkafka::error::KafkaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Repository error: {0}")]
    Repo(#[from] RepositoryError),

    #[error("Assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Validation failed: {0:?}")]
    Validation(Vec<String>),

    #[error("Kafka error: {0}")]
    Kafka(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ServiceError {
    /// Transient failures leave the input untouched and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Repo(err) => err.is_transient(),
            ServiceError::Assembly(err) => err.is_transient(),
            ServiceError::Kafka(_) => true,
            _ => false,
        }
    }
}

impl From<KafkaError> for ServiceError {
    fn from(error: KafkaError) -> Self {
        ServiceError::Kafka(error.to_string())
    }
}
