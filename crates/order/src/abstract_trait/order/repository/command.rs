use crate::domain::order::{Order, OrderStatus};
use async_trait::async_trait;
use shared::errors::RepositoryError;
use std::sync::Arc;

pub type DynOrderCommandRepository = Arc<dyn OrderCommandRepositoryTrait + Send + Sync>;

/// Result of an idempotent create: either this call wrote the order, or an
/// order with the same idempotency key already existed and is returned as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(Order),
    Existing(Order),
}

impl CreateOutcome {
    pub fn order(&self) -> &Order {
        match self {
            CreateOutcome::Created(order) | CreateOutcome::Existing(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            CreateOutcome::Created(order) | CreateOutcome::Existing(order) => order,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, CreateOutcome::Existing(_))
    }
}

#[async_trait]
pub trait OrderCommandRepositoryTrait {
    /// Writes the header and every line atomically.
    async fn create(&self, order: &Order) -> Result<CreateOutcome, RepositoryError>;

    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError>;
}
