use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::domain::order::OrderLine;

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub order_id: String,
    pub line_no: i32,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl From<OrderItem> for OrderLine {
    fn from(item: OrderItem) -> Self {
        OrderLine {
            product_id: item.product_id,
            product_name: item.product_name,
            unit_price: item.unit_price,
            quantity: item.quantity,
            subtotal: item.subtotal,
        }
    }
}
