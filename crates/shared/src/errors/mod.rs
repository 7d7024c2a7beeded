mod assembly;
mod grpc;
mod repository;
mod service;

pub use self::assembly::{AssemblyError, DecodeError, PriceLookupError};
pub use self::grpc::AppErrorGrpc;
pub use self::repository::RepositoryError;
pub use self::service::ServiceError;
