use crate::domain::order::{Order, OrderLine};
use genproto::order::{
    OrderItemResponse as OrderItemResponseProto, OrderResponse as OrderResponseProto,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OrderResponse {
    pub order_id: String,
    pub user_id: String,
    pub total_amount: Decimal,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    #[serde(rename = "created_at")]
    pub created_at: String,
    #[serde(rename = "updated_at")]
    pub updated_at: String,
}

// domain to response
impl From<&OrderLine> for OrderItemResponse {
    fn from(line: &OrderLine) -> Self {
        OrderItemResponse {
            product_id: line.product_id.clone(),
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.subtotal,
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        OrderResponse {
            order_id: order.id().to_string(),
            user_id: order.user_id().to_string(),
            total_amount: order.total_amount(),
            status: order.status().to_string(),
            items: order.lines().iter().map(OrderItemResponse::from).collect(),
            created_at: order.created_at().to_rfc3339(),
            updated_at: order.updated_at().to_rfc3339(),
        }
    }
}

// response to proto
impl From<OrderItemResponse> for OrderItemResponseProto {
    fn from(value: OrderItemResponse) -> Self {
        OrderItemResponseProto {
            product_id: value.product_id,
            product_name: value.product_name,
            quantity: value.quantity,
            unit_price: value.unit_price.to_string(),
            subtotal: value.subtotal.to_string(),
        }
    }
}

impl From<OrderResponse> for OrderResponseProto {
    fn from(value: OrderResponse) -> Self {
        OrderResponseProto {
            order_id: value.order_id,
            user_id: value.user_id,
            total_amount: value.total_amount.to_string(),
            status: value.status,
            items: value.items.into_iter().map(Into::into).collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
