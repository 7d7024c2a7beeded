use std::time::Duration;

use crate::{
    abstract_trait::order::repository::OrderQueryRepositoryTrait,
    domain::order::Order,
    model::order::Order as OrderModel,
    repository::order::{ORDER_COLUMNS, find_by_key, load_order, with_timeout},
};
use shared::{config::ConnectionPool, errors::RepositoryError};

use async_trait::async_trait;
use tracing::error;

pub struct OrderQueryRepository {
    db: ConnectionPool,
    timeout: Duration,
}

impl OrderQueryRepository {
    pub fn new(db: ConnectionPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn find_by_id_inner(&self, order_id: &str) -> Result<Order, RepositoryError> {
        let mut tx = self.db.begin().await.map_err(RepositoryError::from)?;

        let row = sqlx::query_as::<_, OrderModel>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| {
            error!("❌ Failed to fetch order {order_id}: {err:?}");
            RepositoryError::from(err)
        })?;

        let order = load_order(&mut tx, row).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        order.ok_or(RepositoryError::NotFound)
    }

    async fn find_by_key_inner(&self, key: &str) -> Result<Option<Order>, RepositoryError> {
        let mut tx = self.db.begin().await.map_err(RepositoryError::from)?;

        let order = find_by_key(&mut tx, key).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(order)
    }
}

#[async_trait]
impl OrderQueryRepositoryTrait for OrderQueryRepository {
    async fn find_by_id(&self, order_id: &str) -> Result<Order, RepositoryError> {
        with_timeout(self.timeout, "find_order", self.find_by_id_inner(order_id)).await
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, RepositoryError> {
        with_timeout(
            self.timeout,
            "find_order_by_idempotency_key",
            self.find_by_key_inner(key),
        )
        .await
    }
}
