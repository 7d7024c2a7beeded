pub mod grpc_client;
pub mod kafka;
pub mod order;
