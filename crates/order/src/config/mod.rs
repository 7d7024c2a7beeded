pub mod grpc_config;
pub mod myconfig;
pub mod server_config;
