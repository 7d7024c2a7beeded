use crate::{
    abstract_trait::order::{
        repository::{CreateOutcome, DynOrderCommandRepository, DynOrderQueryRepository},
        service::OrderCommandServiceTrait,
    },
    domain::{
        event::{LineItem, OrderEvent},
        order::Order,
        requests::order::{CreateOrderRequest, UpdateOrderStatusRequest},
        response::{api::ApiResponse, order::OrderResponse},
    },
    service::assembler::OrderAssembler,
};
use shared::{
    abstract_trait::DynKafka,
    errors::ServiceError,
    utils::{Method, Metrics, Status as StatusUtils, TracingContext},
};

use async_trait::async_trait;
use opentelemetry::KeyValue;
use prometheus_client::registry::Registry;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

const TRACER_NAME: &str = "order-command-service";
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct OrderCommandService {
    assembler: OrderAssembler,
    command: DynOrderCommandRepository,
    query: DynOrderQueryRepository,
    kafka: DynKafka,
    created_topic: String,
    metrics: Metrics,
}

pub struct OrderCommandServiceDeps {
    pub assembler: OrderAssembler,
    pub command: DynOrderCommandRepository,
    pub query: DynOrderQueryRepository,
    pub kafka: DynKafka,
    pub created_topic: String,
}

impl OrderCommandService {
    pub fn new(deps: OrderCommandServiceDeps, registry: &mut Registry) -> Self {
        let OrderCommandServiceDeps {
            assembler,
            command,
            query,
            kafka,
            created_topic,
        } = deps;

        let metrics = Metrics::new();
        metrics.register(registry, "order_command_service", "OrderCommandService");

        Self {
            assembler,
            command,
            query,
            kafka,
            created_topic,
            metrics,
        }
    }

    fn complete_tracing(
        &self,
        tracing_ctx: &TracingContext,
        method: Method,
        is_success: bool,
        message: &str,
    ) {
        let elapsed = tracing_ctx.finish(is_success, message);
        let status = if is_success {
            StatusUtils::Success
        } else {
            StatusUtils::Error
        };
        self.metrics.record(method, status, elapsed);
    }

    async fn place_order_inner(
        &self,
        req: &CreateOrderRequest,
    ) -> Result<CreateOutcome, ServiceError> {
        req.validate()
            .map_err(|e| ServiceError::Validation(vec![e.to_string()]))?;

        let idempotency_key = req
            .idempotency_key
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if let Some(existing) = self.query.find_by_idempotency_key(&idempotency_key).await? {
            info!(
                idempotency_key = %idempotency_key,
                order_id = existing.id(),
                "🔁 Order already exists for idempotency key"
            );
            return Ok(CreateOutcome::Existing(existing));
        }

        let items: Vec<LineItem> = req.items.iter().map(LineItem::from).collect();

        let order = self
            .assembler
            .assemble(&req.user_id, &items, &idempotency_key)
            .await?;

        let outcome = self.command.create(&order).await?;

        match &outcome {
            CreateOutcome::Created(order) => self.publish_created(order).await,
            CreateOutcome::Existing(order) => {
                info!(
                    idempotency_key = %idempotency_key,
                    order_id = order.id(),
                    "🔁 Concurrent create resolved to existing order"
                );
            }
        }

        Ok(outcome)
    }

    async fn publish_created(&self, order: &Order) {
        let payload = match serde_json::to_vec(&OrderEvent::from(order)) {
            Ok(payload) => payload,
            Err(e) => {
                error!("❌ Failed to serialize order event: {e:?}");
                return;
            }
        };

        let publish = self.kafka.publish(&self.created_topic, order.id(), &payload);

        match tokio::time::timeout(PUBLISH_TIMEOUT, publish).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("❌ Failed to publish event: {e:?}"),
            Err(_) => warn!(
                order_id = order.id(),
                "⏱️ Gave up publishing order event after {PUBLISH_TIMEOUT:?}"
            ),
        }
    }
}

#[async_trait]
impl OrderCommandServiceTrait for OrderCommandService {
    async fn place_order(&self, req: &CreateOrderRequest) -> Result<CreateOutcome, ServiceError> {
        info!("🏗️ Creating new order for user_id={}", req.user_id);

        let method = Method::Post;

        let tracing_ctx = TracingContext::start(
            TRACER_NAME,
            "place_order",
            vec![
                KeyValue::new("component", "order"),
                KeyValue::new("operation", "create"),
                KeyValue::new("order.user_id", req.user_id.clone()),
            ],
        );

        match self.place_order_inner(req).await {
            Ok(outcome) => {
                let message = if outcome.is_replay() {
                    "Order already exists"
                } else {
                    "Order created successfully"
                };
                self.complete_tracing(&tracing_ctx, method, true, message);
                Ok(outcome)
            }
            Err(e) => {
                self.complete_tracing(&tracing_ctx, method, false, &e.to_string());
                Err(e)
            }
        }
    }

    async fn create_order(
        &self,
        req: &CreateOrderRequest,
    ) -> Result<ApiResponse<OrderResponse>, ServiceError> {
        let outcome = self.place_order(req).await?;

        let message = if outcome.is_replay() {
            "Order already exists"
        } else {
            "Order created successfully"
        };

        Ok(ApiResponse {
            status: "success".into(),
            message: message.into(),
            data: OrderResponse::from(outcome.order()),
        })
    }

    async fn update_order_status(
        &self,
        req: &UpdateOrderStatusRequest,
    ) -> Result<ApiResponse<OrderResponse>, ServiceError> {
        let method = Method::Put;
        info!("✏️ Updating order ID={} to {}", req.order_id, req.status);

        let tracing_ctx = TracingContext::start(
            TRACER_NAME,
            "update_order_status",
            vec![
                KeyValue::new("component", "order"),
                KeyValue::new("operation", "update_status"),
                KeyValue::new("order_id", req.order_id.clone()),
                KeyValue::new("order.status", req.status.to_string()),
            ],
        );

        if let Err(e) = req.validate() {
            self.complete_tracing(&tracing_ctx, method, false, "Invalid update request");
            return Err(ServiceError::Validation(vec![e.to_string()]));
        }

        match self.command.update_status(&req.order_id, req.status).await {
            Ok(order) => {
                self.complete_tracing(&tracing_ctx, method, true, "Order status updated");

                Ok(ApiResponse {
                    status: "success".into(),
                    message: "Order status updated successfully".into(),
                    data: OrderResponse::from(&order),
                })
            }
            Err(e) => {
                self.complete_tracing(&tracing_ctx, method, false, &e.to_string());
                Err(ServiceError::Repo(e))
            }
        }
    }
}
