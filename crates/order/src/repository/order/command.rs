use std::time::Duration;

use crate::{
    abstract_trait::order::repository::{CreateOutcome, OrderCommandRepositoryTrait},
    domain::order::{Order, OrderStatus},
    model::order::Order as OrderModel,
    repository::order::{ORDER_COLUMNS, fetch_items, find_by_key, with_timeout},
};
use shared::{config::ConnectionPool, errors::RepositoryError};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info};

pub struct OrderCommandRepository {
    db: ConnectionPool,
    timeout: Duration,
}

impl OrderCommandRepository {
    pub fn new(db: ConnectionPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn create_in_tx(&self, order: &Order) -> Result<CreateOutcome, RepositoryError> {
        let mut tx = self.db.begin().await.map_err(RepositoryError::from)?;

        let inserted: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO orders (id, user_id, idempotency_key, total_amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(order.id())
        .bind(order.user_id())
        .bind(order.idempotency_key())
        .bind(order.total_amount())
        .bind(order.status().as_str())
        .bind(order.created_at())
        .bind(order.updated_at())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| {
            error!(
                "❌ Failed to create order for user {}: {:?}",
                order.user_id(),
                err
            );
            RepositoryError::from(err)
        })?;

        if inserted.is_none() {
            tx.rollback().await.map_err(RepositoryError::from)?;

            let mut conn = self.db.acquire().await.map_err(RepositoryError::from)?;
            let existing = find_by_key(&mut conn, order.idempotency_key())
                .await?
                .ok_or_else(|| {
                    RepositoryError::Custom(format!(
                        "idempotency key {} conflicted but no order was found",
                        order.idempotency_key()
                    ))
                })?;

            info!(
                "🔁 Order {} already exists for key {}",
                existing.id(),
                order.idempotency_key()
            );
            return Ok(CreateOutcome::Existing(existing));
        }

        for (line_no, line) in order.lines().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, line_no, product_id, product_name, quantity, unit_price, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(order.id())
            .bind(line_no as i32)
            .bind(&line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.subtotal)
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                error!(
                    "❌ Failed to create item {} for order {}: {:?}",
                    line.product_id,
                    order.id(),
                    err
                );
                RepositoryError::from(err)
            })?;
        }

        tx.commit().await.map_err(RepositoryError::from)?;

        info!(
            "✅ Created order ID {} for user {} with {} items",
            order.id(),
            order.user_id(),
            order.lines().len()
        );
        Ok(CreateOutcome::Created(order.clone()))
    }

    async fn update_status_in_tx(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.db.begin().await.map_err(RepositoryError::from)?;

        let row = sqlx::query_as::<_, OrderModel>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| {
            error!("❌ Failed to lock order {order_id}: {err:?}");
            RepositoryError::from(err)
        })?
        .ok_or(RepositoryError::NotFound)?;

        let items = fetch_items(&mut tx, order_id).await?;
        let mut order = row.into_domain(items)?;

        order.transition_to(status, Utc::now())?;

        sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id())
            .bind(order.status().as_str())
            .bind(order.updated_at())
            .execute(&mut *tx)
            .await
            .map_err(|err| {
                error!("❌ Failed to update status of order {order_id}: {err:?}");
                RepositoryError::from(err)
            })?;

        tx.commit().await.map_err(RepositoryError::from)?;

        info!("🔄 Updated order ID {} to {}", order.id(), order.status());
        Ok(order)
    }
}

#[async_trait]
impl OrderCommandRepositoryTrait for OrderCommandRepository {
    async fn create(&self, order: &Order) -> Result<CreateOutcome, RepositoryError> {
        with_timeout(self.timeout, "create_order", self.create_in_tx(order)).await
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        with_timeout(
            self.timeout,
            "update_order_status",
            self.update_status_in_tx(order_id, status),
        )
        .await
    }
}
