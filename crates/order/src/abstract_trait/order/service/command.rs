use crate::{
    abstract_trait::order::repository::CreateOutcome,
    domain::{
        requests::order::{CreateOrderRequest, UpdateOrderStatusRequest},
        response::{api::ApiResponse, order::OrderResponse},
    },
};
use async_trait::async_trait;
use shared::errors::ServiceError;
use std::sync::Arc;

pub type DynOrderCommandService = Arc<dyn OrderCommandServiceTrait + Send + Sync>;

#[async_trait]
pub trait OrderCommandServiceTrait {
    /// Shared by the checkout consumer and the RPC handler.
    async fn place_order(&self, req: &CreateOrderRequest) -> Result<CreateOutcome, ServiceError>;

    async fn create_order(
        &self,
        req: &CreateOrderRequest,
    ) -> Result<ApiResponse<OrderResponse>, ServiceError>;

    async fn update_order_status(
        &self,
        req: &UpdateOrderStatusRequest,
    ) -> Result<ApiResponse<OrderResponse>, ServiceError>;
}
