use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::errors::{AssemblyError, RepositoryError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, next),
            (Pending, Paid)
                | (Paid, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Paid, Cancelled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{other}'")),
        }
    }
}

/// A priced line. Price and name are snapshots taken when the order was assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: String,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
}

impl OrderLine {
    pub fn priced(
        product_id: String,
        product_name: String,
        unit_price: Decimal,
        quantity: i32,
    ) -> Result<Self, AssemblyError> {
        if quantity <= 0 {
            return Err(AssemblyError::InvalidQuantity {
                product_id,
                quantity: i64::from(quantity),
            });
        }

        let subtotal = unit_price
            .checked_mul(Decimal::from(quantity))
            .ok_or_else(|| AssemblyError::AmountOverflow(product_id.clone()))?;

        Ok(Self {
            product_id,
            product_name,
            unit_price,
            quantity,
            subtotal,
        })
    }
}

/// Order aggregate. The total is always the sum of the line subtotals and
/// the status only moves along the allowed transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: String,
    user_id: String,
    idempotency_key: String,
    lines: Vec<OrderLine>,
    total_amount: Decimal,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        id: String,
        user_id: String,
        idempotency_key: String,
        lines: Vec<OrderLine>,
        now: DateTime<Utc>,
    ) -> Result<Self, AssemblyError> {
        if lines.is_empty() {
            return Err(AssemblyError::EmptyOrder);
        }

        let total_amount = sum_lines(&lines)?;

        Ok(Self {
            id,
            user_id,
            idempotency_key,
            lines,
            total_amount,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds an order from storage, checking that the stored total still
    /// matches its lines.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: String,
        user_id: String,
        idempotency_key: String,
        lines: Vec<OrderLine>,
        total_amount: Decimal,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, RepositoryError> {
        if lines.is_empty() {
            return Err(RepositoryError::Corrupted(format!("order {id} has no lines")));
        }

        let computed = sum_lines(&lines)
            .map_err(|e| RepositoryError::Corrupted(format!("order {id}: {e}")))?;

        if computed != total_amount {
            return Err(RepositoryError::Corrupted(format!(
                "order {id} total {total_amount} does not match lines {computed}"
            )));
        }

        Ok(Self {
            id,
            user_id,
            idempotency_key,
            lines,
            total_amount,
            status,
            created_at,
            updated_at,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn transition_to(
        &mut self,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if !self.status.can_transition_to(next) {
            return Err(RepositoryError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }

        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

fn sum_lines(lines: &[OrderLine]) -> Result<Decimal, AssemblyError> {
    lines.iter().try_fold(Decimal::ZERO, |acc, line| {
        acc.checked_add(line.subtotal)
            .ok_or_else(|| AssemblyError::AmountOverflow(line.product_id.clone()))
    })
}
