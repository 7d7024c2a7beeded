use std::{collections::HashMap, time::Duration};

use chrono::Utc;
use shared::errors::{AssemblyError, PriceLookupError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    abstract_trait::grpc_client::DynPriceLookup,
    domain::{
        event::LineItem,
        order::{Order, OrderLine},
        response::product::ProductPrice,
    },
};

/// Turns requested line items into a priced, PENDING order. Prices come only
/// from the injected lookup, never from the request.
#[derive(Clone)]
pub struct OrderAssembler {
    price_lookup: DynPriceLookup,
    lookup_timeout: Duration,
}

impl OrderAssembler {
    pub fn new(price_lookup: DynPriceLookup, lookup_timeout: Duration) -> Self {
        Self {
            price_lookup,
            lookup_timeout,
        }
    }

    pub async fn assemble(
        &self,
        user_id: &str,
        items: &[LineItem],
        idempotency_key: &str,
    ) -> Result<Order, AssemblyError> {
        if user_id.trim().is_empty() {
            return Err(AssemblyError::MissingUser);
        }

        if items.is_empty() {
            return Err(AssemblyError::EmptyOrder);
        }

        let merged = merge_items(items)?;
        let mut lines = Vec::with_capacity(merged.len());

        for (product_id, quantity) in merged {
            let product = self.lookup(&product_id).await?;

            if product.unit_price.is_sign_negative() {
                return Err(AssemblyError::InvalidPrice {
                    product_id,
                    reason: format!("negative price {}", product.unit_price),
                });
            }

            debug!(
                product_id = %product_id,
                unit_price = %product.unit_price,
                quantity,
                "Priced order line"
            );

            lines.push(OrderLine::priced(
                product_id,
                product.name,
                product.unit_price,
                quantity,
            )?);
        }

        Order::new(
            Uuid::new_v4().to_string(),
            user_id.to_string(),
            idempotency_key.to_string(),
            lines,
            Utc::now(),
        )
    }

    async fn lookup(&self, product_id: &str) -> Result<ProductPrice, AssemblyError> {
        let result =
            tokio::time::timeout(self.lookup_timeout, self.price_lookup.get_price(product_id))
                .await;

        match result {
            Ok(Ok(product)) => Ok(product),
            Ok(Err(PriceLookupError::NotFound(_))) => {
                Err(AssemblyError::UnknownProduct(product_id.to_string()))
            }
            Ok(Err(PriceLookupError::InvalidPrice { reason, .. })) => {
                Err(AssemblyError::InvalidPrice {
                    product_id: product_id.to_string(),
                    reason,
                })
            }
            Ok(Err(PriceLookupError::Unavailable(reason))) => {
                warn!(product_id, "⚠️ Price lookup unavailable: {reason}");
                Err(AssemblyError::PriceLookupUnavailable {
                    product_id: product_id.to_string(),
                    reason,
                })
            }
            Err(_) => {
                warn!(product_id, "⚠️ Price lookup timed out");
                Err(AssemblyError::PriceLookupUnavailable {
                    product_id: product_id.to_string(),
                    reason: format!("timed out after {:?}", self.lookup_timeout),
                })
            }
        }
    }
}

/// Merges duplicate product ids, keeping the order in which each product
/// first appeared. Any non-positive quantity rejects the whole request.
fn merge_items(items: &[LineItem]) -> Result<Vec<(String, i32)>, AssemblyError> {
    if let Some(bad) = items.iter().find(|item| item.quantity <= 0) {
        return Err(AssemblyError::InvalidQuantity {
            product_id: bad.product_id.clone(),
            quantity: i64::from(bad.quantity),
        });
    }

    let mut merged: Vec<(String, i32)> = Vec::with_capacity(items.len());
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for item in items {
        match positions.get(item.product_id.as_str()) {
            Some(&idx) => {
                let entry = &mut merged[idx];
                entry.1 = entry
                    .1
                    .checked_add(item.quantity)
                    .ok_or_else(|| AssemblyError::AmountOverflow(item.product_id.clone()))?;
            }
            None => {
                positions.insert(item.product_id.as_str(), merged.len());
                merged.push((item.product_id.clone(), item.quantity));
            }
        }
    }

    Ok(merged)
}
