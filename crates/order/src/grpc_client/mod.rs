pub mod product;

use crate::config::grpc_config::GrpcClientConfig;
use anyhow::{Context, Result};
use genproto::product::product_query_service_client::ProductQueryServiceClient;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};

#[derive(Clone)]
pub struct GrpcClients {
    pub product_query_client: ProductQueryServiceClient<Channel>,
}

impl GrpcClients {
    pub fn init(config: GrpcClientConfig) -> Result<Self> {
        let product_channel = Self::connect(config.product, "product-service")?;

        Ok(Self {
            product_query_client: ProductQueryServiceClient::new(product_channel),
        })
    }

    /// Lazily connected, so a catalog outage at startup surfaces as a
    /// retryable lookup failure instead of aborting the service.
    fn connect(addr: String, service: &str) -> Result<Channel> {
        let endpoint = Endpoint::from_shared(addr.clone())
            .with_context(|| format!("Invalid gRPC address for {service}: {addr}"))?;

        let configured_endpoint = endpoint
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(10))
            .http2_keep_alive_interval(Duration::from_secs(30))
            .keep_alive_timeout(Duration::from_secs(5))
            .initial_connection_window_size(1_048_576)
            .initial_stream_window_size(1_048_576);

        Ok(configured_endpoint.connect_lazy())
    }
}
