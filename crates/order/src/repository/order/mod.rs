mod command;
mod query;

pub use self::command::OrderCommandRepository;
pub use self::query::OrderQueryRepository;

use std::{future::Future, time::Duration};

use shared::errors::RepositoryError;
use sqlx::PgConnection;
use tracing::error;

use crate::{
    domain::order::Order as OrderDomain,
    model::{order::Order as OrderModel, order_item::OrderItem as OrderItemModel},
};

const ORDER_COLUMNS: &str =
    "id, user_id, idempotency_key, total_amount, status, created_at, updated_at";

async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            error!("❌ {operation} timed out after {limit:?}");
            Err(RepositoryError::Timeout(format!(
                "{operation} exceeded {limit:?}"
            )))
        }
    }
}

async fn fetch_items(
    conn: &mut PgConnection,
    order_id: &str,
) -> Result<Vec<OrderItemModel>, RepositoryError> {
    sqlx::query_as::<_, OrderItemModel>(
        r#"
        SELECT order_id, line_no, product_id, product_name, quantity, unit_price, subtotal
        FROM order_items
        WHERE order_id = $1
        ORDER BY line_no
        "#,
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
    .map_err(|err| {
        error!("❌ Failed to load items for order {order_id}: {err:?}");
        RepositoryError::from(err)
    })
}

async fn load_order(
    conn: &mut PgConnection,
    row: Option<OrderModel>,
) -> Result<Option<OrderDomain>, RepositoryError> {
    let Some(row) = row else {
        return Ok(None);
    };

    let items = fetch_items(conn, &row.id).await?;
    row.into_domain(items).map(Some)
}

async fn find_by_key(
    conn: &mut PgConnection,
    key: &str,
) -> Result<Option<OrderDomain>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderModel>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE idempotency_key = $1"
    ))
    .bind(key)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|err| {
        error!("❌ Failed to look up idempotency key {key}: {err:?}");
        RepositoryError::from(err)
    })?;

    load_order(conn, row).await
}
