use crate::{
    abstract_trait::{
        grpc_client::DynPriceLookup,
        kafka::DynDeadLetterSink,
        order::repository::{DynOrderCommandRepository, DynOrderQueryRepository},
    },
    config::myconfig::Config,
    grpc_client::{GrpcClients, product::ProductGrpcClientService},
    kafka::KafkaDeadLetterSink,
    repository::order::{OrderCommandRepository, OrderQueryRepository},
    service::{
        assembler::OrderAssembler,
        order::{OrderCommandService, OrderCommandServiceDeps, OrderQueryService},
    },
};
use prometheus_client::registry::Registry;
use shared::{abstract_trait::DynKafka, config::ConnectionPool};
use std::{fmt, sync::Arc};

#[derive(Clone)]
pub struct DependenciesInject {
    pub order_query: OrderQueryService,
    pub order_command: OrderCommandService,
    pub dead_letter_sink: DynDeadLetterSink,
}

impl fmt::Debug for DependenciesInject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependenciesInject")
            .field("order_query", &"OrderQueryService")
            .field("order_command", &"OrderCommandService")
            .field("dead_letter_sink", &"DynDeadLetterSink")
            .finish()
    }
}

#[derive(Clone)]
pub struct DependenciesInjectDeps {
    pub pool: ConnectionPool,
    pub kafka: DynKafka,
    pub config: Config,
}

impl DependenciesInject {
    pub fn new(deps: DependenciesInjectDeps, clients: GrpcClients, registry: &mut Registry) -> Self {
        let DependenciesInjectDeps {
            pool,
            kafka,
            config,
        } = deps;

        let store_timeout = config.timeouts.store;

        let order_query_repo: DynOrderQueryRepository =
            Arc::new(OrderQueryRepository::new(pool.clone(), store_timeout));
        let order_command_repo: DynOrderCommandRepository =
            Arc::new(OrderCommandRepository::new(pool, store_timeout));

        let price_lookup: DynPriceLookup =
            Arc::new(ProductGrpcClientService::new(clients.product_query_client));

        let assembler = OrderAssembler::new(price_lookup, config.timeouts.price_lookup);

        let order_query = OrderQueryService::new(order_query_repo.clone(), registry);

        let order_command_deps = OrderCommandServiceDeps {
            assembler,
            command: order_command_repo,
            query: order_query_repo,
            kafka: kafka.clone(),
            created_topic: config.kafka.order_created_topic.clone(),
        };

        let order_command = OrderCommandService::new(order_command_deps, registry);

        let dead_letter_sink: DynDeadLetterSink = Arc::new(KafkaDeadLetterSink::new(
            kafka,
            config.kafka.dead_letter_topic.clone(),
        ));

        Self {
            order_query,
            order_command,
            dead_letter_sink,
        }
    }
}
