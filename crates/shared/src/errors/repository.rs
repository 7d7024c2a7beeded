use sqlx::Error as SqlxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Sqlx(#[from] SqlxError),

    #[error("Not found")]
    NotFound,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Corrupted record: {0}")]
    Corrupted(String),

    #[error("Custom: {0}")]
    Custom(String),
}

impl RepositoryError {
    /// Whether retrying the same operation later can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RepositoryError::Timeout(_) => true,
            RepositoryError::Sqlx(err) => match err {
                SqlxError::Io(_)
                | SqlxError::PoolTimedOut
                | SqlxError::PoolClosed
                | SqlxError::WorkerCrashed
                | SqlxError::Tls(_) => true,
                // serialization_failure, deadlock_detected, admin shutdown
                SqlxError::Database(db) => {
                    matches!(db.code().as_deref(), Some("40001" | "40P01" | "57P01"))
                }
                _ => false,
            },
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_pool_errors_are_transient() {
        assert!(RepositoryError::Timeout("create".into()).is_transient());
        assert!(RepositoryError::Sqlx(SqlxError::PoolTimedOut).is_transient());
    }

    #[test]
    fn business_errors_are_not_transient() {
        assert!(!RepositoryError::NotFound.is_transient());
        assert!(
            !RepositoryError::InvalidTransition {
                from: "PENDING".into(),
                to: "SHIPPED".into(),
            }
            .is_transient()
        );
        assert!(!RepositoryError::Sqlx(SqlxError::RowNotFound).is_transient());
    }
}
