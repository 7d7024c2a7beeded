use crate::abstract_trait::order::service::DynOrderQueryService;
use genproto::order::{
    ApiResponseOrder, FindByIdOrderRequest, order_query_service_server::OrderQueryService,
};
use shared::errors::AppErrorGrpc;
use std::fmt;
use tonic::{Request, Response, Status};
use tracing::info;

#[derive(Clone)]
pub struct OrderQueryGrpcServiceImpl {
    pub order_query_service: DynOrderQueryService,
}

impl fmt::Debug for OrderQueryGrpcServiceImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderQueryGrpcServiceImpl")
            .field("order_query_service", &"DynOrderQueryService")
            .finish()
    }
}

impl OrderQueryGrpcServiceImpl {
    pub fn new(order: DynOrderQueryService) -> Self {
        Self {
            order_query_service: order,
        }
    }
}

#[tonic::async_trait]
impl OrderQueryService for OrderQueryGrpcServiceImpl {
    async fn get_order(
        &self,
        request: Request<FindByIdOrderRequest>,
    ) -> Result<Response<ApiResponseOrder>, Status> {
        let req = request.into_inner();

        info!("Handling gRPC request: GetOrder ID={}", req.order_id);

        if req.order_id.trim().is_empty() {
            return Err(Status::invalid_argument("order_id is required"));
        }

        let api_response = self
            .order_query_service
            .get_order(&req.order_id)
            .await
            .map_err(AppErrorGrpc::from)?;

        let reply = ApiResponseOrder {
            status: api_response.status,
            message: api_response.message,
            data: Some(api_response.data.into()),
        };

        info!("Successfully fetched order ID={}", req.order_id);
        Ok(Response::new(reply))
    }
}
