use crate::errors::{repository::RepositoryError, service::ServiceError};
use thiserror::Error;
use tonic::Status;

#[derive(Debug, Error)]
pub enum AppErrorGrpc {
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
    #[error("Unhandled: {0}")]
    Unhandled(String),
}

impl From<AppErrorGrpc> for Status {
    fn from(err: AppErrorGrpc) -> Self {
        match err {
            AppErrorGrpc::Service(service_err) => match service_err {
                ServiceError::Validation(errors) => {
                    Status::invalid_argument(format!("Validation failed: {errors:?}"))
                }

                ServiceError::Assembly(err) if err.is_transient() => {
                    Status::internal(format!("Order assembly failed: {err}"))
                }
                ServiceError::Assembly(err) => Status::invalid_argument(err.to_string()),

                ServiceError::Repo(repo_err) => match repo_err {
                    RepositoryError::NotFound => Status::not_found("Order not found"),
                    RepositoryError::InvalidTransition { from, to } => {
                        Status::invalid_argument(format!("Invalid status transition: {from} -> {to}"))
                    }
                    RepositoryError::Sqlx(_) => Status::internal("Database error"),
                    RepositoryError::Timeout(msg) => {
                        Status::internal(format!("Storage timeout: {msg}"))
                    }
                    RepositoryError::Corrupted(msg) | RepositoryError::Custom(msg) => {
                        Status::internal(msg)
                    }
                },

                ServiceError::Kafka(err) => Status::internal(format!("Kafka error: {err}")),

                ServiceError::Internal(msg) | ServiceError::Custom(msg) => Status::internal(msg),
            },

            AppErrorGrpc::Unhandled(msg) => Status::internal(format!("Unhandled error: {msg}")),
        }
    }
}
