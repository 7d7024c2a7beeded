use crate::config::myconfig::Config;
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub grpc_addr: std::net::SocketAddr,
    pub metrics_addr: std::net::SocketAddr,
    pub database_url: String,
    pub run_migrations: bool,
}

impl ServerConfig {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            grpc_addr: format!("0.0.0.0:{}", config.order.grpc_port)
                .parse()
                .context("Invalid gRPC address")?,
            metrics_addr: format!("0.0.0.0:{}", config.order.metric_port)
                .parse()
                .context("Invalid metrics address")?,
            database_url: config.database_url.clone(),
            run_migrations: config.run_migrations,
        })
    }
}
