//! Postgres-backed store tests. `#[sqlx::test]` creates a scratch database
//! per test, so `DATABASE_URL` must point at a reachable server.

use std::time::Duration;

use chrono::Utc;
use order::{
    abstract_trait::order::repository::{
        CreateOutcome, OrderCommandRepositoryTrait, OrderQueryRepositoryTrait,
    },
    domain::order::{Order, OrderLine, OrderStatus},
    repository::order::{OrderCommandRepository, OrderQueryRepository},
};
use rust_decimal::Decimal;
use shared::errors::RepositoryError;
use sqlx::PgPool;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(5);

fn sample_order(key: &str) -> Order {
    Order::new(
        Uuid::new_v4().to_string(),
        "u1".into(),
        key.into(),
        vec![
            OrderLine::priced("p1".into(), "Mug".into(), Decimal::new(1000, 2), 2).unwrap(),
            OrderLine::priced("p2".into(), "Pen".into(), Decimal::new(333, 2), 3).unwrap(),
        ],
        Utc::now(),
    )
    .unwrap()
}

fn repos(pool: &PgPool) -> (OrderCommandRepository, OrderQueryRepository) {
    (
        OrderCommandRepository::new(pool.clone(), TIMEOUT),
        OrderQueryRepository::new(pool.clone(), TIMEOUT),
    )
}

async fn count_orders(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[sqlx::test(migrations = "./migrations")]
async fn created_order_reads_back_with_lines_in_order(pool: PgPool) {
    let (command, query) = repos(&pool);
    let order = sample_order("cart-1");

    let outcome = command.create(&order).await.unwrap();
    assert!(matches!(outcome, CreateOutcome::Created(_)));

    let stored = query.find_by_id(order.id()).await.unwrap();
    assert_eq!(stored.total_amount(), Decimal::new(2999, 2));
    assert_eq!(stored.status(), OrderStatus::Pending);
    let products: Vec<_> = stored.lines().iter().map(|l| l.product_id.as_str()).collect();
    assert_eq!(products, vec!["p1", "p2"]);
    assert_eq!(stored.lines()[1].subtotal, Decimal::new(999, 2));
}

#[sqlx::test(migrations = "./migrations")]
async fn second_create_with_same_key_returns_existing(pool: PgPool) {
    let (command, query) = repos(&pool);
    let first = sample_order("cart-1");
    let second = sample_order("cart-1");

    command.create(&first).await.unwrap();
    let outcome = command.create(&second).await.unwrap();

    assert!(outcome.is_replay());
    assert_eq!(outcome.order().id(), first.id());
    assert_eq!(count_orders(&pool).await, 1);

    let by_key = query.find_by_idempotency_key("cart-1").await.unwrap();
    assert_eq!(by_key.map(|o| o.id().to_string()), Some(first.id().to_string()));
}

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_creates_persist_one_order(pool: PgPool) {
    let (command, _) = repos(&pool);
    let a = sample_order("cart-race");
    let b = sample_order("cart-race");

    let (ra, rb) = tokio::join!(command.create(&a), command.create(&b));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.is_replay() as u8 + rb.is_replay() as u8, 1);
    assert_eq!(ra.order().id(), rb.order().id());
    assert_eq!(count_orders(&pool).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn status_updates_are_validated(pool: PgPool) {
    let (command, query) = repos(&pool);
    let order = sample_order("cart-1");
    command.create(&order).await.unwrap();

    let err = command
        .update_status(order.id(), OrderStatus::Delivered)
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidTransition { .. }));

    let paid = command
        .update_status(order.id(), OrderStatus::Paid)
        .await
        .unwrap();
    assert_eq!(paid.status(), OrderStatus::Paid);
    assert_eq!(
        query.find_by_id(order.id()).await.unwrap().status(),
        OrderStatus::Paid
    );

    let missing = command
        .update_status("missing", OrderStatus::Paid)
        .await
        .unwrap_err();
    assert!(matches!(missing, RepositoryError::NotFound));
}

#[sqlx::test(migrations = "./migrations")]
async fn unknown_lookups(pool: PgPool) {
    let (_, query) = repos(&pool);

    assert!(matches!(
        query.find_by_id("nope").await,
        Err(RepositoryError::NotFound)
    ));
    assert!(query.find_by_idempotency_key("nope").await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn tampered_total_is_reported_as_corruption(pool: PgPool) {
    let (command, query) = repos(&pool);
    let order = sample_order("cart-1");
    command.create(&order).await.unwrap();

    sqlx::query("UPDATE orders SET total_amount = 1 WHERE id = $1")
        .bind(order.id())
        .execute(&pool)
        .await
        .unwrap();

    assert!(matches!(
        query.find_by_id(order.id()).await,
        Err(RepositoryError::Corrupted(_))
    ));
}

#[sqlx::test(migrations = "./migrations")]
async fn failed_line_insert_leaves_no_order(pool: PgPool) {
    let (command, query) = repos(&pool);
    let order = Order::new(
        Uuid::new_v4().to_string(),
        "u1".into(),
        "cart-dup".into(),
        vec![
            OrderLine::priced("p1".into(), "Mug".into(), Decimal::new(1000, 2), 1).unwrap(),
            OrderLine::priced("p1".into(), "Mug".into(), Decimal::new(1000, 2), 2).unwrap(),
        ],
        Utc::now(),
    )
    .unwrap();

    assert!(command.create(&order).await.is_err());

    assert!(matches!(
        query.find_by_id(order.id()).await,
        Err(RepositoryError::NotFound)
    ));
    assert!(query.find_by_idempotency_key("cart-dup").await.unwrap().is_none());
    assert_eq!(count_orders(&pool).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn orders_with_lines_cannot_be_deleted(pool: PgPool) {
    let (command, query) = repos(&pool);
    let order = sample_order("cart-1");
    command.create(&order).await.unwrap();

    let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(order.id())
        .execute(&pool)
        .await;

    assert!(deleted.is_err());
    assert_eq!(query.find_by_id(order.id()).await.unwrap().lines().len(), 2);
}
