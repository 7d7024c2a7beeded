use std::fmt;

use crate::{
    abstract_trait::order::service::DynOrderCommandService,
    domain::{
        order::OrderStatus,
        requests::order::{
            CreateOrderItemRequest as DomainCreateOrderItemRequest,
            CreateOrderRequest as DomainCreateOrderRequest,
            UpdateOrderStatusRequest as DomainUpdateOrderStatusRequest,
        },
    },
};
use genproto::order::{
    ApiResponseOrder, CreateOrderRequest, UpdateOrderStatusRequest,
    order_command_service_server::OrderCommandService,
};
use shared::errors::AppErrorGrpc;
use tonic::{Request, Response, Status};
use tracing::info;

const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct OrderCommandGrpcServiceImpl {
    pub order_command_service: DynOrderCommandService,
}

impl fmt::Debug for OrderCommandGrpcServiceImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderCommandGrpcServiceImpl")
            .field("order_command_service", &"DynOrderCommandService")
            .finish()
    }
}

impl OrderCommandGrpcServiceImpl {
    pub fn new(order: DynOrderCommandService) -> Self {
        Self {
            order_command_service: order,
        }
    }
}

#[tonic::async_trait]
impl OrderCommandService for OrderCommandGrpcServiceImpl {
    async fn create_order(
        &self,
        request: Request<CreateOrderRequest>,
    ) -> Result<Response<ApiResponseOrder>, Status> {
        info!("Creating new order");

        let req = request.into_inner();

        if let Some(request_id) = &req.request_id
            && request_id.chars().count() > MAX_REQUEST_ID_LEN
        {
            return Err(Status::invalid_argument(format!(
                "request_id must be at most {MAX_REQUEST_ID_LEN} characters"
            )));
        }

        let items = req
            .items
            .into_iter()
            .map(|i| DomainCreateOrderItemRequest {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect::<Vec<_>>();

        let domain_req = DomainCreateOrderRequest {
            user_id: req.user_id,
            items,
            idempotency_key: req.request_id,
        };

        let api_response = self
            .order_command_service
            .create_order(&domain_req)
            .await
            .map_err(AppErrorGrpc::from)?;

        info!(
            "Order created successfully with ID: {}",
            api_response.data.order_id
        );

        let reply = ApiResponseOrder {
            status: api_response.status,
            message: api_response.message,
            data: Some(api_response.data.into()),
        };

        Ok(Response::new(reply))
    }

    async fn update_order_status(
        &self,
        request: Request<UpdateOrderStatusRequest>,
    ) -> Result<Response<ApiResponseOrder>, Status> {
        let req = request.into_inner();

        info!("Updating order status: ID={}", req.order_id);

        let status = req
            .status
            .parse::<OrderStatus>()
            .map_err(Status::invalid_argument)?;

        let domain_req = DomainUpdateOrderStatusRequest {
            order_id: req.order_id,
            status,
        };

        let api_response = self
            .order_command_service
            .update_order_status(&domain_req)
            .await
            .map_err(AppErrorGrpc::from)?;

        let reply = ApiResponseOrder {
            status: api_response.status,
            message: api_response.message,
            data: Some(api_response.data.into()),
        };

        info!("Order status updated: ID={}", domain_req.order_id);
        Ok(Response::new(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        service::{
            assembler::OrderAssembler,
            order::{OrderCommandService as CommandService, OrderCommandServiceDeps},
        },
        test_utils::{InMemoryOrderStore, RecordingKafka, StaticPriceLookup},
    };
    use genproto::order::CreateOrderItemRequest;
    use prometheus_client::registry::Registry;
    use rust_decimal::Decimal;
    use std::{sync::Arc, time::Duration};
    use tonic::Code;

    fn handler(lookup: StaticPriceLookup) -> OrderCommandGrpcServiceImpl {
        let store = Arc::new(InMemoryOrderStore::new());
        let service = CommandService::new(
            OrderCommandServiceDeps {
                assembler: OrderAssembler::new(Arc::new(lookup), Duration::from_millis(200)),
                command: store.clone(),
                query: store,
                kafka: Arc::new(RecordingKafka::new()),
                created_topic: "order.created".into(),
            },
            &mut Registry::default(),
        );

        OrderCommandGrpcServiceImpl::new(Arc::new(service))
    }

    fn catalog() -> StaticPriceLookup {
        StaticPriceLookup::new()
            .with_product("p1", "Mug", Decimal::new(1050, 2))
            .unavailable("p-down")
    }

    fn create_request(request_id: Option<&str>, items: &[(&str, i32)]) -> CreateOrderRequest {
        CreateOrderRequest {
            user_id: "u1".into(),
            items: items
                .iter()
                .map(|(product_id, quantity)| CreateOrderItemRequest {
                    product_id: product_id.to_string(),
                    quantity: *quantity,
                })
                .collect(),
            request_id: request_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn create_order_renders_decimal_strings() {
        let handler = handler(catalog());

        let reply = handler
            .create_order(Request::new(create_request(Some("r-1"), &[("p1", 3)])))
            .await
            .unwrap()
            .into_inner();

        let data = reply.data.unwrap();
        assert_eq!(reply.status, "success");
        assert_eq!(data.total_amount, "31.50");
        assert_eq!(data.status, "PENDING");
        assert_eq!(data.items[0].unit_price, "10.50");
    }

    #[tokio::test]
    async fn repeated_request_id_returns_the_same_order() {
        let handler = handler(catalog());

        let first = handler
            .create_order(Request::new(create_request(Some("r-1"), &[("p1", 1)])))
            .await
            .unwrap()
            .into_inner();
        let second = handler
            .create_order(Request::new(create_request(Some("r-1"), &[("p1", 1)])))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(
            first.data.unwrap().order_id,
            second.data.unwrap().order_id
        );
        assert_eq!(second.message, "Order already exists");
    }

    #[tokio::test]
    async fn maps_failures_to_status_codes() {
        let handler = handler(catalog());

        let cases = [
            (create_request(None, &[]), Code::InvalidArgument),
            (create_request(None, &[("p1", 0)]), Code::InvalidArgument),
            (create_request(None, &[("p9", 1)]), Code::InvalidArgument),
            (create_request(None, &[("p-down", 1)]), Code::Internal),
            (
                create_request(Some(&"r".repeat(129)), &[("p1", 1)]),
                Code::InvalidArgument,
            ),
        ];

        for (req, code) in cases {
            let status = handler.create_order(Request::new(req)).await.unwrap_err();
            assert_eq!(status.code(), code, "{}", status.message());
        }
    }

    #[tokio::test]
    async fn request_id_at_the_length_limit_is_accepted() {
        let handler = handler(catalog());

        let reply = handler
            .create_order(Request::new(create_request(
                Some(&"r".repeat(MAX_REQUEST_ID_LEN)),
                &[("p1", 1)],
            )))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(reply.status, "success");
    }

    #[tokio::test]
    async fn update_status_rejects_unknown_names_and_orders() {
        let handler = handler(catalog());

        let bad_name = handler
            .update_order_status(Request::new(UpdateOrderStatusRequest {
                order_id: "o-1".into(),
                status: "LOST".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(bad_name.code(), Code::InvalidArgument);

        let missing = handler
            .update_order_status(Request::new(UpdateOrderStatusRequest {
                order_id: "o-1".into(),
                status: "paid".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(missing.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn update_status_moves_order_forward() {
        let handler = handler(catalog());
        let created = handler
            .create_order(Request::new(create_request(None, &[("p1", 1)])))
            .await
            .unwrap()
            .into_inner();
        let order_id = created.data.unwrap().order_id;

        let reply = handler
            .update_order_status(Request::new(UpdateOrderStatusRequest {
                order_id: order_id.clone(),
                status: "PAID".into(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(reply.data.unwrap().status, "PAID");

        let skipped = handler
            .update_order_status(Request::new(UpdateOrderStatusRequest {
                order_id,
                status: "DELIVERED".into(),
            }))
            .await
            .unwrap_err();
        assert_eq!(skipped.code(), Code::InvalidArgument);
    }
}
