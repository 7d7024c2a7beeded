use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::errors::RepositoryError;
use sqlx::FromRow;

use crate::{
    domain::order::{Order as OrderDomain, OrderLine, OrderStatus},
    model::order_item::OrderItem,
};

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub idempotency_key: String,
    pub total_amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    // model to domain
    pub fn into_domain(self, items: Vec<OrderItem>) -> Result<OrderDomain, RepositoryError> {
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(|e| RepositoryError::Corrupted(format!("order {}: {e}", self.id)))?;

        let lines = items.into_iter().map(OrderLine::from).collect();

        OrderDomain::restore(
            self.id,
            self.user_id,
            self.idempotency_key,
            lines,
            self.total_amount,
            status,
            self.created_at,
            self.updated_at,
        )
    }
}
