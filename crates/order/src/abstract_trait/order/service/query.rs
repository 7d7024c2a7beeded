use crate::domain::response::{api::ApiResponse, order::OrderResponse};
use async_trait::async_trait;
use shared::errors::ServiceError;
use std::sync::Arc;

pub type DynOrderQueryService = Arc<dyn OrderQueryServiceTrait + Send + Sync>;

#[async_trait]
pub trait OrderQueryServiceTrait {
    async fn get_order(&self, order_id: &str) -> Result<ApiResponse<OrderResponse>, ServiceError>;
}
