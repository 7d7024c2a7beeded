use crate::{
    config::{grpc_config::GrpcClientConfig, myconfig::Config},
    di::{DependenciesInject, DependenciesInjectDeps},
    grpc_client::GrpcClients,
    kafka::ConsumerMetrics,
};
use anyhow::{Context, Result};
use prometheus_client::registry::Registry;
use shared::{
    abstract_trait::DynKafka,
    config::{ConnectionPool, Kafka},
};
use std::{fmt, sync::Arc};
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub di_container: DependenciesInject,
    pub registry: Arc<Mutex<Registry>>,
    pub kafka_config: DynKafka,
    pub consumer_metrics: ConsumerMetrics,
    pub config: Config,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("deps", &self.di_container)
            .field("consumer_metrics", &self.consumer_metrics)
            .field("config", &self.config)
            .finish()
    }
}

impl AppState {
    pub fn new(pool: ConnectionPool, config: Config) -> Result<Self> {
        let kafka_config = Arc::new(
            Kafka::new(&config.kafka.broker).context("Failed to create Kafka producer")?,
        ) as DynKafka;
        let mut registry = Registry::default();

        let deps = DependenciesInjectDeps {
            pool,
            kafka: kafka_config.clone(),
            config: config.clone(),
        };

        let grpc_config = GrpcClientConfig::init().context("failed config grpc")?;

        let clients = GrpcClients::init(grpc_config).context("failed grpc client")?;

        let di_container = DependenciesInject::new(deps, clients, &mut registry);

        let consumer_metrics = ConsumerMetrics::new(&mut registry);

        Ok(Self {
            di_container,
            registry: Arc::new(Mutex::new(registry)),
            kafka_config,
            consumer_metrics,
            config,
        })
    }
}
