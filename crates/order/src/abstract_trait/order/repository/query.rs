use crate::domain::order::Order;
use async_trait::async_trait;
use shared::errors::RepositoryError;
use std::sync::Arc;

pub type DynOrderQueryRepository = Arc<dyn OrderQueryRepositoryTrait + Send + Sync>;

#[async_trait]
pub trait OrderQueryRepositoryTrait {
    async fn find_by_id(&self, order_id: &str) -> Result<Order, RepositoryError>;

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, RepositoryError>;
}
