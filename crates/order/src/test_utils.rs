//! In-memory doubles for the store, catalog, broker and dead-letter sink.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    abstract_trait::KafkaTrait,
    errors::{PriceLookupError, RepositoryError, ServiceError},
};

use crate::{
    abstract_trait::{
        grpc_client::PriceLookupTrait,
        kafka::{DeadLetterSinkTrait, MessageStreamTrait},
        order::repository::{
            CreateOutcome, OrderCommandRepositoryTrait, OrderQueryRepositoryTrait,
        },
    },
    domain::{
        event::{DeadLetterRecord, InboundMessage},
        order::{Order, OrderStatus},
        response::product::ProductPrice,
    },
};

#[derive(Default)]
pub struct StaticPriceLookup {
    prices: HashMap<String, ProductPrice>,
    unavailable: HashSet<String>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl StaticPriceLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, id: &str, name: &str, unit_price: Decimal) -> Self {
        self.prices.insert(
            id.to_string(),
            ProductPrice {
                product_id: id.to_string(),
                name: name.to_string(),
                unit_price,
            },
        );
        self
    }

    pub fn unavailable(mut self, id: &str) -> Self {
        self.unavailable.insert(id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl PriceLookupTrait for StaticPriceLookup {
    async fn get_price(&self, product_id: &str) -> Result<ProductPrice, PriceLookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.unavailable.contains(product_id) {
            return Err(PriceLookupError::Unavailable("catalog offline".into()));
        }

        self.prices
            .get(product_id)
            .cloned()
            .ok_or_else(|| PriceLookupError::NotFound(product_id.to_string()))
    }
}

/// Keeps the same idempotency and transition rules as the Postgres store.
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: Mutex<HashMap<String, Order>>,
    by_key: Mutex<HashMap<String, String>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.orders.lock().unwrap().values().cloned().collect()
    }

    /// Walks an order along allowed transitions until it reaches `status`.
    pub fn force_status(&self, order_id: &str, status: OrderStatus) {
        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(order_id).unwrap();
        let mut path = vec![];
        match status {
            OrderStatus::Pending => {}
            OrderStatus::Paid => path.push(OrderStatus::Paid),
            OrderStatus::Shipped => path.extend([OrderStatus::Paid, OrderStatus::Shipped]),
            OrderStatus::Delivered => path.extend([
                OrderStatus::Paid,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
            ]),
            OrderStatus::Cancelled => path.push(OrderStatus::Cancelled),
        }
        for next in path {
            order.transition_to(next, Utc::now()).unwrap();
        }
    }
}

#[async_trait]
impl OrderCommandRepositoryTrait for InMemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<CreateOutcome, RepositoryError> {
        let mut by_key = self.by_key.lock().unwrap();
        let mut orders = self.orders.lock().unwrap();

        if let Some(existing_id) = by_key.get(order.idempotency_key()) {
            let existing = orders
                .get(existing_id)
                .cloned()
                .ok_or(RepositoryError::NotFound)?;
            return Ok(CreateOutcome::Existing(existing));
        }

        by_key.insert(order.idempotency_key().to_string(), order.id().to_string());
        orders.insert(order.id().to_string(), order.clone());

        Ok(CreateOutcome::Created(order.clone()))
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(order_id).ok_or(RepositoryError::NotFound)?;

        order.transition_to(status, Utc::now())?;

        Ok(order.clone())
    }
}

#[async_trait]
impl OrderQueryRepositoryTrait for InMemoryOrderStore {
    async fn find_by_id(&self, order_id: &str) -> Result<Order, RepositoryError> {
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<Order>, RepositoryError> {
        let by_key = self.by_key.lock().unwrap();
        let orders = self.orders.lock().unwrap();

        Ok(by_key.get(key).and_then(|id| orders.get(id)).cloned())
    }
}

/// Fails the first `failures` creates with a timeout, then delegates.
pub struct FlakyOrderStore {
    inner: Arc<InMemoryOrderStore>,
    failures: AtomicUsize,
    attempts: AtomicUsize,
}

impl FlakyOrderStore {
    pub fn new(inner: Arc<InMemoryOrderStore>, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderCommandRepositoryTrait for FlakyOrderStore {
    async fn create(&self, order: &Order) -> Result<CreateOutcome, RepositoryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Timeout("create".into()));
        }

        self.inner.create(order).await
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        self.inner.update_status(order_id, status).await
    }
}

#[derive(Default)]
pub struct RecordingKafka {
    published: Mutex<Vec<(String, String, Vec<u8>)>>,
}

impl RecordingKafka {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, String, Vec<u8>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl KafkaTrait for RecordingKafka {
    async fn publish(&self, topic: &str, key: &str, value: &[u8]) -> Result<(), ServiceError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), key.to_string(), value.to_vec()));
        Ok(())
    }
}

/// Producer whose sends never complete, like a broker that stopped answering.
pub struct HangingKafka;

#[async_trait]
impl KafkaTrait for HangingKafka {
    async fn publish(&self, _topic: &str, _key: &str, _value: &[u8]) -> Result<(), ServiceError> {
        std::future::pending().await
    }
}

/// Broker stand-in: hands out queued messages and records acks by offset.
#[derive(Default)]
pub struct InMemoryStream {
    queue: Mutex<VecDeque<InboundMessage>>,
    acked: Mutex<Vec<i64>>,
    closed: AtomicBool,
}

impl InMemoryStream {
    pub fn new(messages: Vec<InboundMessage>) -> Self {
        Self {
            queue: Mutex::new(messages.into()),
            ..Default::default()
        }
    }

    pub fn acked(&self) -> Vec<i64> {
        self.acked.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub async fn wait_for_acks(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.acked.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for acks");
    }
}

#[async_trait]
impl MessageStreamTrait for InMemoryStream {
    async fn fetch(&self) -> Result<Option<InboundMessage>, ServiceError> {
        let next = self.queue.lock().unwrap().pop_front();

        if next.is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        Ok(next)
    }

    async fn ack(&self, message: &InboundMessage) -> Result<(), ServiceError> {
        self.acked.lock().unwrap().push(message.offset);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingDeadLetterSink {
    records: Mutex<Vec<DeadLetterRecord>>,
    failures: AtomicUsize,
}

impl RecordingDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            ..Default::default()
        }
    }

    pub fn records(&self) -> Vec<DeadLetterRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeadLetterSinkTrait for RecordingDeadLetterSink {
    async fn send(&self, record: &DeadLetterRecord) -> Result<(), ServiceError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ServiceError::Kafka("dead-letter topic unavailable".into()));
        }

        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

pub fn checkout_message(offset: i64, cart_id: &str, items: &str) -> InboundMessage {
    let payload = format!(
        r#"{{"event_type":"CHECKOUT","user_id":"u1","cart_id":"{cart_id}","items":{items},"timestamp":"2024-05-01T10:00:00Z"}}"#
    );

    InboundMessage {
        topic: "cart-events".into(),
        partition: 0,
        offset,
        key: Some(cart_id.to_string()),
        payload: Some(payload.into_bytes()),
    }
}

pub fn raw_message(offset: i64, payload: &str) -> InboundMessage {
    InboundMessage {
        topic: "cart-events".into(),
        partition: 0,
        offset,
        key: None,
        payload: Some(payload.as_bytes().to_vec()),
    }
}
