use crate::{
    abstract_trait::order::{repository::DynOrderQueryRepository, service::OrderQueryServiceTrait},
    domain::response::{api::ApiResponse, order::OrderResponse},
};
use async_trait::async_trait;
use opentelemetry::KeyValue;
use prometheus_client::registry::Registry;
use shared::{
    errors::ServiceError,
    utils::{Method, Metrics, Status as StatusUtils, TracingContext},
};
use tracing::info;

#[derive(Clone)]
pub struct OrderQueryService {
    query: DynOrderQueryRepository,
    metrics: Metrics,
}

impl OrderQueryService {
    pub fn new(query: DynOrderQueryRepository, registry: &mut Registry) -> Self {
        let metrics = Metrics::new();
        metrics.register(registry, "order_query_service", "OrderQueryService");

        Self { query, metrics }
    }
}

#[async_trait]
impl OrderQueryServiceTrait for OrderQueryService {
    async fn get_order(&self, order_id: &str) -> Result<ApiResponse<OrderResponse>, ServiceError> {
        info!("🔍 Fetching order ID={order_id}");

        let tracing_ctx = TracingContext::start(
            "order-query-service",
            "get_order",
            vec![
                KeyValue::new("component", "order"),
                KeyValue::new("operation", "find_by_id"),
                KeyValue::new("order_id", order_id.to_string()),
            ],
        );

        match self.query.find_by_id(order_id).await {
            Ok(order) => {
                let elapsed = tracing_ctx.finish(true, "Order retrieved");
                self.metrics
                    .record(Method::Get, StatusUtils::Success, elapsed);

                Ok(ApiResponse {
                    status: "success".into(),
                    message: "Order retrieved successfully".into(),
                    data: OrderResponse::from(&order),
                })
            }
            Err(e) => {
                let elapsed = tracing_ctx.finish(false, &e.to_string());
                self.metrics.record(Method::Get, StatusUtils::Error, elapsed);
                Err(ServiceError::Repo(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        abstract_trait::order::repository::OrderCommandRepositoryTrait,
        domain::order::{Order, OrderLine},
        test_utils::InMemoryOrderStore,
    };
    use chrono::Utc;
    use rust_decimal::Decimal;
    use shared::errors::RepositoryError;
    use std::sync::Arc;

    #[tokio::test]
    async fn returns_stored_order_with_lines() {
        let store = Arc::new(InMemoryOrderStore::new());
        let order = Order::new(
            "o-1".into(),
            "u1".into(),
            "cart-1".into(),
            vec![
                OrderLine::priced("p1".into(), "Mug".into(), Decimal::new(1000, 2), 2).unwrap(),
            ],
            Utc::now(),
        )
        .unwrap();
        store.create(&order).await.unwrap();

        let service = OrderQueryService::new(store, &mut Registry::default());
        let response = service.get_order("o-1").await.unwrap();

        assert_eq!(response.data.order_id, "o-1");
        assert_eq!(response.data.items.len(), 1);
        assert_eq!(response.data.items[0].subtotal, Decimal::new(2000, 2));
    }

    #[tokio::test]
    async fn missing_order_is_not_found() {
        let service =
            OrderQueryService::new(Arc::new(InMemoryOrderStore::new()), &mut Registry::default());

        let err = service.get_order("nope").await.unwrap_err();

        assert!(matches!(err, ServiceError::Repo(RepositoryError::NotFound)));
    }
}
