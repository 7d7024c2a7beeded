use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    abstract_trait::order::service::DynOrderCommandService,
    domain::{
        event::{DecodedEvent, InboundMessage, decode},
        requests::order::CreateOrderRequest,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Persisted { order_id: String, replayed: bool },
    Ignored { event_type: String },
}

/// Poison messages can never succeed and go to the dead-letter topic.
/// Transient failures are retried against the same message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandleError {
    #[error("poison message: {0}")]
    Poison(String),

    #[error("transient failure: {0}")]
    Transient(String),
}

pub struct CheckoutEventHandler {
    order_command: DynOrderCommandService,
}

impl fmt::Debug for CheckoutEventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutEventHandler")
            .field("order_command", &"DynOrderCommandService")
            .finish()
    }
}

impl CheckoutEventHandler {
    pub fn new(order_command: DynOrderCommandService) -> Self {
        Self { order_command }
    }

    pub async fn handle(&self, message: &InboundMessage) -> Result<HandleOutcome, HandleError> {
        let topic = message.topic.as_str();

        let payload = message
            .payload
            .as_deref()
            .ok_or_else(|| HandleError::Poison("empty message payload".into()))?;

        let event = match decode(payload).map_err(|e| HandleError::Poison(e.to_string()))? {
            DecodedEvent::Checkout(event) => event,
            DecodedEvent::Unknown { event_type } => {
                info!(topic, offset = message.offset, event_type, "Skipping non-checkout event");
                return Ok(HandleOutcome::Ignored { event_type });
            }
        };

        if let Some(key) = message.key.as_deref()
            && key != event.cart_id
        {
            warn!(
                topic,
                key,
                cart_id = event.cart_id,
                "Message key does not match event cart_id"
            );
        }

        let req = CreateOrderRequest::from(&event);

        match self.order_command.place_order(&req).await {
            Ok(outcome) => Ok(HandleOutcome::Persisted {
                order_id: outcome.order().id().to_string(),
                replayed: outcome.is_replay(),
            }),
            Err(e) if e.is_transient() => Err(HandleError::Transient(e.to_string())),
            Err(e) => Err(HandleError::Poison(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        service::{
            assembler::OrderAssembler,
            order::{OrderCommandService, OrderCommandServiceDeps},
        },
        test_utils::{
            InMemoryOrderStore, RecordingKafka, StaticPriceLookup, checkout_message, raw_message,
        },
    };
    use prometheus_client::registry::Registry;
    use rust_decimal::Decimal;
    use std::{sync::Arc, time::Duration};

    fn handler(lookup: StaticPriceLookup) -> (CheckoutEventHandler, Arc<InMemoryOrderStore>) {
        let store = Arc::new(InMemoryOrderStore::new());
        let service = OrderCommandService::new(
            OrderCommandServiceDeps {
                assembler: OrderAssembler::new(Arc::new(lookup), Duration::from_millis(200)),
                command: store.clone(),
                query: store.clone(),
                kafka: Arc::new(RecordingKafka::new()),
                created_topic: "order.created".into(),
            },
            &mut Registry::default(),
        );

        (CheckoutEventHandler::new(Arc::new(service)), store)
    }

    fn catalog() -> StaticPriceLookup {
        StaticPriceLookup::new().with_product("p1", "Mug", Decimal::new(1000, 2))
    }

    const ITEMS: &str = r#"[{"product_id":"p1","quantity":1}]"#;

    #[tokio::test]
    async fn persists_checkout_and_reports_replays() {
        let (handler, store) = handler(catalog());
        let message = checkout_message(0, "cart-1", ITEMS);

        let first = handler.handle(&message).await.unwrap();
        let second = handler.handle(&message).await.unwrap();

        let HandleOutcome::Persisted { order_id, replayed } = first else {
            panic!("expected a persisted order");
        };
        assert!(!replayed);
        assert_eq!(
            second,
            HandleOutcome::Persisted {
                order_id,
                replayed: true
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn ignores_other_event_types() {
        let (handler, store) = handler(catalog());

        let outcome = handler
            .handle(&raw_message(0, r#"{"event_type":"ITEM_ADDED"}"#))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            HandleOutcome::Ignored {
                event_type: "ITEM_ADDED".into()
            }
        );
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn empty_and_malformed_payloads_are_poison() {
        let (handler, _) = handler(catalog());

        let mut empty = raw_message(0, "");
        empty.payload = None;

        assert!(matches!(
            handler.handle(&empty).await,
            Err(HandleError::Poison(_))
        ));
        assert!(matches!(
            handler.handle(&raw_message(1, "not json")).await,
            Err(HandleError::Poison(_))
        ));
    }

    #[tokio::test]
    async fn unknown_product_is_poison_but_catalog_outage_is_transient() {
        let (handler, _) = handler(catalog().unavailable("p2"));

        let unknown = handler
            .handle(&checkout_message(0, "cart-1", r#"[{"product_id":"p9","quantity":1}]"#))
            .await;
        assert!(matches!(unknown, Err(HandleError::Poison(ref r)) if r.contains("p9")));

        let outage = handler
            .handle(&checkout_message(1, "cart-2", r#"[{"product_id":"p2","quantity":1}]"#))
            .await;
        assert!(matches!(outage, Err(HandleError::Transient(_))));
    }

    #[tokio::test]
    async fn cart_id_wins_over_a_mismatched_key() {
        let (handler, store) = handler(catalog());
        let mut message = checkout_message(0, "cart-1", ITEMS);
        message.key = Some("something-else".into());

        handler.handle(&message).await.unwrap();

        assert_eq!(store.orders()[0].idempotency_key(), "cart-1");
    }

    #[tokio::test]
    async fn long_cart_ids_are_persisted() {
        let (handler, store) = handler(catalog());
        let cart_id = "c".repeat(200);

        let outcome = handler
            .handle(&checkout_message(0, &cart_id, ITEMS))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            HandleOutcome::Persisted {
                replayed: false,
                ..
            }
        ));
        assert_eq!(store.len(), 1);
        assert_eq!(store.orders()[0].idempotency_key(), cart_id);
    }
}
