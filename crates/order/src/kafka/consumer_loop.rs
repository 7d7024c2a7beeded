use std::{fmt, sync::Arc, time::Duration};

use backon::{BackoffBuilder, ExponentialBuilder, Retryable};
use prometheus_client::{
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};
use prometheus_client_derive_encode::{EncodeLabelSet, EncodeLabelValue};
use shared::errors::ServiceError;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    abstract_trait::kafka::{DynDeadLetterSink, MessageStreamTrait},
    domain::event::{DeadLetterRecord, InboundMessage},
    kafka::event::{CheckoutEventHandler, HandleError, HandleOutcome},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Fetching,
    Processing,
    Ack,
    Retry,
    DeadLetter,
    Stopped,
}

impl fmt::Display for ConsumerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub fetch_timeout: Duration,
    pub retry_min_delay: Duration,
    pub retry_max_delay: Duration,
    /// Total publish attempts for one dead-letter record, first try included.
    pub dead_letter_max_attempts: usize,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(1),
            retry_min_delay: Duration::from_millis(200),
            retry_max_delay: Duration::from_secs(30),
            dead_letter_max_attempts: 5,
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Persisted,
    Replayed,
    Ignored,
    Retried,
    DeadLettered,
    DeadLetterFailed,
    Abandoned,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    pub outcome: Outcome,
}

#[derive(Clone, Debug, Default)]
pub struct ConsumerMetrics {
    pub messages: Family<OutcomeLabels, Counter>,
}

impl ConsumerMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "checkout_consumer_messages",
            "Checkout messages handled by the consumer, by outcome",
            metrics.messages.clone(),
        );
        metrics
    }

    pub fn record(&self, outcome: Outcome) {
        self.messages.get_or_create(&OutcomeLabels { outcome }).inc();
    }

    pub fn count(&self, outcome: Outcome) -> u64 {
        self.messages.get_or_create(&OutcomeLabels { outcome }).get()
    }
}

enum Disposition {
    Ack,
    Abandon,
}

/// Drives one checkout subscription: fetch, handle, then ack or dead-letter.
///
/// A message is acked only after it was persisted, ignored or parked on the
/// dead-letter topic. Transient failures are retried with exponential backoff
/// for as long as it takes; a shutdown during the wait abandons the message
/// unacked so the broker redelivers it.
pub struct CheckoutConsumer<S> {
    stream: Arc<S>,
    handler: CheckoutEventHandler,
    dead_letters: DynDeadLetterSink,
    settings: ConsumerSettings,
    metrics: ConsumerMetrics,
    state: ConsumerState,
}

impl<S: MessageStreamTrait + 'static> CheckoutConsumer<S> {
    pub fn new(
        stream: Arc<S>,
        handler: CheckoutEventHandler,
        dead_letters: DynDeadLetterSink,
        settings: ConsumerSettings,
        metrics: ConsumerMetrics,
    ) -> Self {
        Self {
            stream,
            handler,
            dead_letters,
            settings,
            metrics,
            state: ConsumerState::Idle,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    fn transition(&mut self, next: ConsumerState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Consumer state change");
            self.state = next;
        }
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> ConsumerState {
        info!("🚀 Checkout consumer started");

        loop {
            self.transition(ConsumerState::Fetching);

            let fetched = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                fetched = tokio::time::timeout(self.settings.fetch_timeout, self.stream.fetch()) => fetched,
            };

            let message = match fetched {
                Ok(Ok(Some(message))) => message,
                Ok(Ok(None)) | Err(_) => {
                    self.transition(ConsumerState::Idle);
                    continue;
                }
                Ok(Err(e)) => {
                    error!("💀 Kafka consumer error: {e}. Retrying in {:?}...", self.settings.retry_max_delay);
                    self.transition(ConsumerState::Idle);
                    if wait_or_shutdown(&mut shutdown, self.settings.retry_max_delay).await {
                        break;
                    }
                    continue;
                }
            };

            match self.process(&message, &mut shutdown).await {
                Disposition::Ack => {
                    self.transition(ConsumerState::Ack);
                    if let Err(e) = self.stream.ack(&message).await {
                        error!(
                            topic = message.topic,
                            offset = message.offset,
                            "❌ Failed to ack message: {e}"
                        );
                    }
                    self.transition(ConsumerState::Idle);
                }
                Disposition::Abandon => break,
            }
        }

        self.stream.close().await;
        self.transition(ConsumerState::Stopped);
        info!("✅ Checkout consumer stopped");

        self.state
    }

    async fn process(
        &mut self,
        message: &InboundMessage,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Disposition {
        let mut backoff = ExponentialBuilder::default()
            .with_min_delay(self.settings.retry_min_delay)
            .with_max_delay(self.settings.retry_max_delay)
            .with_max_times(usize::MAX)
            .with_jitter()
            .build();

        loop {
            self.transition(ConsumerState::Processing);

            match self.handler.handle(message).await {
                Ok(HandleOutcome::Persisted { order_id, replayed }) => {
                    info!(
                        topic = message.topic,
                        offset = message.offset,
                        order_id,
                        replayed,
                        "✅ Event processed successfully"
                    );
                    self.metrics.record(if replayed {
                        Outcome::Replayed
                    } else {
                        Outcome::Persisted
                    });
                    return Disposition::Ack;
                }
                Ok(HandleOutcome::Ignored { .. }) => {
                    self.metrics.record(Outcome::Ignored);
                    return Disposition::Ack;
                }
                Err(HandleError::Poison(reason)) => {
                    self.dead_letter(message, &reason).await;
                    return Disposition::Ack;
                }
                Err(HandleError::Transient(reason)) => {
                    self.transition(ConsumerState::Retry);
                    self.metrics.record(Outcome::Retried);

                    let delay = backoff.next().unwrap_or(self.settings.retry_max_delay);
                    warn!(
                        topic = message.topic,
                        offset = message.offset,
                        "⚠️ Transient failure, retrying in {delay:?}: {reason}"
                    );

                    if wait_or_shutdown(shutdown, delay).await {
                        warn!(
                            topic = message.topic,
                            offset = message.offset,
                            "🛑 Shutdown during retry, leaving message for redelivery"
                        );
                        self.metrics.record(Outcome::Abandoned);
                        return Disposition::Abandon;
                    }
                }
            }
        }
    }

    async fn dead_letter(&mut self, message: &InboundMessage, reason: &str) {
        self.transition(ConsumerState::DeadLetter);

        let record = DeadLetterRecord::new(message, reason);
        let record = &record;
        let sink = &self.dead_letters;

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.settings.retry_min_delay)
            .with_max_delay(self.settings.retry_max_delay)
            .with_max_times(self.settings.dead_letter_max_attempts.saturating_sub(1));

        let result = (|| async move { sink.send(record).await })
            .retry(backoff)
            .sleep(tokio::time::sleep)
            .notify(|err: &ServiceError, dur: Duration| {
                warn!("⚠️ Dead-letter publish failed, retrying in {dur:?}: {err}");
            })
            .await;

        match result {
            Ok(()) => {
                error!(
                    topic = message.topic,
                    offset = message.offset,
                    reason,
                    "☠️ Poison message moved to dead-letter topic"
                );
                self.metrics.record(Outcome::DeadLettered);
            }
            Err(e) => {
                error!(
                    topic = message.topic,
                    offset = message.offset,
                    reason,
                    "❌ Dead-letter publish gave up, skipping message: {e}"
                );
                self.metrics.record(Outcome::DeadLetterFailed);
            }
        }
    }
}

/// Returns true when shutdown arrived before the delay elapsed.
async fn wait_or_shutdown(shutdown: &mut broadcast::Receiver<()>, delay: Duration) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.recv() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        abstract_trait::order::repository::DynOrderCommandRepository,
        service::{
            assembler::OrderAssembler,
            order::{OrderCommandService, OrderCommandServiceDeps},
        },
        test_utils::{
            FlakyOrderStore, InMemoryOrderStore, InMemoryStream, RecordingDeadLetterSink,
            RecordingKafka, StaticPriceLookup, checkout_message, raw_message,
        },
    };
    use rust_decimal::Decimal;
    use tokio::task::JoinHandle;

    const ITEMS: &str = r#"[{"product_id":"p1","quantity":2}]"#;

    struct Harness {
        stream: Arc<InMemoryStream>,
        store: Arc<InMemoryOrderStore>,
        dead_letters: Arc<RecordingDeadLetterSink>,
        metrics: ConsumerMetrics,
        shutdown: broadcast::Sender<()>,
        handle: JoinHandle<ConsumerState>,
    }

    impl Harness {
        async fn stop(self) -> ConsumerState {
            self.shutdown.send(()).unwrap();
            tokio::time::timeout(Duration::from_secs(5), self.handle)
                .await
                .expect("consumer did not stop")
                .unwrap()
        }
    }

    fn settings() -> ConsumerSettings {
        ConsumerSettings {
            fetch_timeout: Duration::from_millis(50),
            retry_min_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(5),
            dead_letter_max_attempts: 3,
        }
    }

    fn start(
        messages: Vec<InboundMessage>,
        store: Arc<InMemoryOrderStore>,
        command: DynOrderCommandRepository,
        dead_letters: Arc<RecordingDeadLetterSink>,
    ) -> Harness {
        let lookup = StaticPriceLookup::new().with_product("p1", "Mug", Decimal::new(1000, 2));
        let mut registry = Registry::default();

        let service = OrderCommandService::new(
            OrderCommandServiceDeps {
                assembler: OrderAssembler::new(Arc::new(lookup), Duration::from_millis(200)),
                command,
                query: store.clone(),
                kafka: Arc::new(RecordingKafka::new()),
                created_topic: "order.created".into(),
            },
            &mut registry,
        );

        let stream = Arc::new(InMemoryStream::new(messages));
        let metrics = ConsumerMetrics::new(&mut registry);
        let (shutdown, rx) = broadcast::channel(1);

        let consumer = CheckoutConsumer::new(
            stream.clone(),
            CheckoutEventHandler::new(Arc::new(service)),
            dead_letters.clone(),
            settings(),
            metrics.clone(),
        );
        let handle = tokio::spawn(consumer.run(rx));

        Harness {
            stream,
            store,
            dead_letters,
            metrics,
            shutdown,
            handle,
        }
    }

    fn start_simple(messages: Vec<InboundMessage>) -> Harness {
        let store = Arc::new(InMemoryOrderStore::new());
        start(
            messages,
            store.clone(),
            store,
            Arc::new(RecordingDeadLetterSink::new()),
        )
    }

    #[tokio::test]
    async fn persists_and_acks_checkout() {
        let h = start_simple(vec![checkout_message(0, "cart-1", ITEMS)]);

        h.stream.wait_for_acks(1).await;

        assert_eq!(h.store.len(), 1);
        assert_eq!(h.store.orders()[0].total_amount(), Decimal::new(2000, 2));
        assert_eq!(h.metrics.count(Outcome::Persisted), 1);

        let stream = h.stream.clone();
        assert_eq!(h.stop().await, ConsumerState::Stopped);
        assert!(stream.is_closed());
    }

    #[tokio::test]
    async fn redelivered_checkout_creates_one_order() {
        let h = start_simple(vec![
            checkout_message(0, "cart-1", ITEMS),
            checkout_message(1, "cart-1", ITEMS),
        ]);

        h.stream.wait_for_acks(2).await;

        assert_eq!(h.stream.acked(), vec![0, 1]);
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.metrics.count(Outcome::Replayed), 1);
        h.stop().await;
    }

    #[tokio::test]
    async fn poison_message_is_dead_lettered_and_stream_continues() {
        let h = start_simple(vec![
            raw_message(0, "{not json"),
            checkout_message(1, "cart-1", r#"[{"product_id":"p9","quantity":1}]"#),
            checkout_message(2, "cart-2", ITEMS),
        ]);

        h.stream.wait_for_acks(3).await;

        assert_eq!(h.stream.acked(), vec![0, 1, 2]);
        let records = h.dead_letters.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].offset, 0);
        assert_eq!(records[0].payload, "{not json");
        assert!(records[1].reason.contains("p9"));
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.metrics.count(Outcome::DeadLettered), 2);
        h.stop().await;
    }

    #[tokio::test]
    async fn non_checkout_events_are_acked_without_orders() {
        let h = start_simple(vec![raw_message(
            0,
            r#"{"event_type":"CART_UPDATED","user_id":"u1"}"#,
        )]);

        h.stream.wait_for_acks(1).await;

        assert_eq!(h.store.len(), 0);
        assert!(h.dead_letters.records().is_empty());
        assert_eq!(h.metrics.count(Outcome::Ignored), 1);
        h.stop().await;
    }

    #[tokio::test]
    async fn transient_store_failures_are_retried_on_the_same_message() {
        let store = Arc::new(InMemoryOrderStore::new());
        let flaky = Arc::new(FlakyOrderStore::new(store.clone(), 2));
        let h = start(
            vec![checkout_message(0, "cart-1", ITEMS)],
            store,
            flaky.clone(),
            Arc::new(RecordingDeadLetterSink::new()),
        );

        h.stream.wait_for_acks(1).await;

        assert_eq!(flaky.attempts(), 3);
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.metrics.count(Outcome::Retried), 2);
        assert!(h.dead_letters.records().is_empty());
        h.stop().await;
    }

    #[tokio::test]
    async fn shutdown_during_retry_leaves_message_unacked() {
        let store = Arc::new(InMemoryOrderStore::new());
        let flaky = Arc::new(FlakyOrderStore::new(store.clone(), usize::MAX));
        let h = start(
            vec![checkout_message(0, "cart-1", ITEMS)],
            store,
            flaky.clone(),
            Arc::new(RecordingDeadLetterSink::new()),
        );

        tokio::time::timeout(Duration::from_secs(5), async {
            while flaky.attempts() < 2 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .unwrap();

        let stream = h.stream.clone();
        let metrics = h.metrics.clone();
        assert_eq!(h.stop().await, ConsumerState::Stopped);

        assert!(stream.acked().is_empty());
        assert!(stream.is_closed());
        assert_eq!(metrics.count(Outcome::Abandoned), 1);
    }

    #[tokio::test]
    async fn gives_up_on_dead_letter_after_bounded_attempts() {
        let store = Arc::new(InMemoryOrderStore::new());
        let h = start(
            vec![raw_message(0, "{not json")],
            store.clone(),
            store,
            Arc::new(RecordingDeadLetterSink::failing(10)),
        );

        h.stream.wait_for_acks(1).await;

        assert!(h.dead_letters.records().is_empty());
        assert_eq!(h.metrics.count(Outcome::DeadLetterFailed), 1);
        h.stop().await;
    }

    #[tokio::test]
    async fn dead_letter_publish_is_retried() {
        let store = Arc::new(InMemoryOrderStore::new());
        let h = start(
            vec![raw_message(0, "{not json")],
            store.clone(),
            store,
            Arc::new(RecordingDeadLetterSink::failing(2)),
        );

        h.stream.wait_for_acks(1).await;

        assert_eq!(h.dead_letters.records().len(), 1);
        h.stop().await;
    }
}
