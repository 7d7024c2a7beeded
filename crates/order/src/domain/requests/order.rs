use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{
    event::{CheckoutEvent, LineItem},
    order::OrderStatus,
};

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1))]
    #[serde(rename = "user_id")]
    pub user_id: String,

    #[validate(length(min = 1), nested)]
    pub items: Vec<CreateOrderItemRequest>,

    /// Cart id for checkout events, caller request id for direct calls.
    #[validate(length(min = 1))]
    #[serde(rename = "idempotency_key")]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CreateOrderItemRequest {
    #[validate(length(min = 1))]
    #[serde(rename = "product_id")]
    pub product_id: String,

    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct UpdateOrderStatusRequest {
    #[validate(length(min = 1))]
    #[serde(rename = "order_id")]
    pub order_id: String,

    pub status: OrderStatus,
}

impl From<&LineItem> for CreateOrderItemRequest {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
        }
    }
}

impl From<&CreateOrderItemRequest> for LineItem {
    fn from(item: &CreateOrderItemRequest) -> Self {
        Self {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
        }
    }
}

impl From<&CheckoutEvent> for CreateOrderRequest {
    fn from(event: &CheckoutEvent) -> Self {
        Self {
            user_id: event.user_id.clone(),
            items: event.items.iter().map(CreateOrderItemRequest::from).collect(),
            idempotency_key: Some(event.cart_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_request_shape() {
        let valid = CreateOrderRequest {
            user_id: "u1".into(),
            items: vec![CreateOrderItemRequest {
                product_id: "p1".into(),
                quantity: 1,
            }],
            idempotency_key: None,
        };
        assert!(valid.validate().is_ok());

        let no_items = CreateOrderRequest {
            items: vec![],
            ..valid.clone()
        };
        assert!(no_items.validate().is_err());

        let zero_quantity = CreateOrderRequest {
            items: vec![CreateOrderItemRequest {
                product_id: "p1".into(),
                quantity: 0,
            }],
            ..valid.clone()
        };
        assert!(zero_quantity.validate().is_err());

        let blank_key = CreateOrderRequest {
            idempotency_key: Some(String::new()),
            ..valid
        };
        assert!(blank_key.validate().is_err());
    }
}
