use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::errors::DecodeError;

use crate::domain::order::Order;

pub const CHECKOUT_EVENT_TYPE: &str = "CHECKOUT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub product_id: String,
    pub quantity: i32,
}

/// A validated checkout request as published by the cart service.
/// Carries no prices: those are looked up when the order is assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutEvent {
    pub event_type: String,
    pub user_id: String,
    pub cart_id: String,
    pub items: Vec<LineItem>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    Checkout(CheckoutEvent),
    Unknown { event_type: String },
}

#[derive(Deserialize)]
struct RawEnvelope {
    event_type: Option<String>,
    user_id: Option<String>,
    cart_id: Option<String>,
    items: Option<Vec<RawLineItem>>,
    timestamp: Option<String>,
}

#[derive(Deserialize)]
struct RawLineItem {
    product_id: Option<String>,
    quantity: Option<i64>,
}

pub fn decode(payload: &[u8]) -> Result<DecodedEvent, DecodeError> {
    let raw: RawEnvelope =
        serde_json::from_slice(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let event_type = required(raw.event_type, "event_type")?;

    if event_type != CHECKOUT_EVENT_TYPE {
        return Ok(DecodedEvent::Unknown { event_type });
    }

    let user_id = required(raw.user_id, "user_id")?;
    let cart_id = required(raw.cart_id, "cart_id")?;

    let raw_items = raw
        .items
        .ok_or_else(|| DecodeError::MissingField("items".into()))?;

    if raw_items.is_empty() {
        return Err(DecodeError::InvalidField {
            field: "items".into(),
            reason: "must contain at least one item".into(),
        });
    }

    let items = raw_items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| decode_item(idx, item))
        .collect::<Result<Vec<_>, _>>()?;

    let timestamp = required(raw.timestamp, "timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| DecodeError::InvalidField {
            field: "timestamp".into(),
            reason: e.to_string(),
        })?
        .with_timezone(&Utc);

    Ok(DecodedEvent::Checkout(CheckoutEvent {
        event_type,
        user_id,
        cart_id,
        items,
        timestamp,
    }))
}

pub fn encode(event: &CheckoutEvent) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(event)
}

fn decode_item(idx: usize, item: RawLineItem) -> Result<LineItem, DecodeError> {
    let product_id = required(item.product_id, &format!("items[{idx}].product_id"))?;

    let quantity = item
        .quantity
        .ok_or_else(|| DecodeError::MissingField(format!("items[{idx}].quantity")))?;

    let quantity = i32::try_from(quantity)
        .ok()
        .filter(|q| *q > 0)
        .ok_or_else(|| DecodeError::InvalidField {
            field: format!("items[{idx}].quantity"),
            reason: format!("must be a positive 32-bit integer, got {quantity}"),
        })?;

    Ok(LineItem {
        product_id,
        quantity,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, DecodeError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(DecodeError::InvalidField {
            field: field.to_string(),
            reason: "must not be blank".into(),
        }),
        None => Err(DecodeError::MissingField(field.to_string())),
    }
}

/// A message as handed to the consumer loop, independent of the broker client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterRecord {
    pub source_topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub reason: String,
    pub payload: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterRecord {
    pub fn new(message: &InboundMessage, reason: impl Into<String>) -> Self {
        Self {
            source_topic: message.topic.clone(),
            partition: message.partition,
            offset: message.offset,
            key: message.key.clone(),
            reason: reason.into(),
            payload: message
                .payload
                .as_deref()
                .map(|p| String::from_utf8_lossy(p).into_owned())
                .unwrap_or_default(),
            failed_at: Utc::now(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrderItemEvent {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum OrderEvent {
    Created {
        order_id: String,
        user_id: String,
        total_amount: Decimal,
        items: Vec<OrderItemEvent>,
    },
}

impl From<&Order> for OrderEvent {
    fn from(order: &Order) -> Self {
        OrderEvent::Created {
            order_id: order.id().to_string(),
            user_id: order.user_id().to_string(),
            total_amount: order.total_amount(),
            items: order
                .lines()
                .iter()
                .map(|line| OrderItemEvent {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                })
                .collect(),
        }
    }
}
