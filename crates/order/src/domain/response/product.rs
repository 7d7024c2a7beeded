use std::str::FromStr;

use genproto::product::ProductResponse as ProductResponseProto;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::errors::PriceLookupError;

/// Catalog snapshot for one product, as needed to price an order line.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProductPrice {
    pub product_id: String,
    pub name: String,
    pub unit_price: Decimal,
}

// proto to domain
impl TryFrom<ProductResponseProto> for ProductPrice {
    type Error = PriceLookupError;

    fn try_from(value: ProductResponseProto) -> Result<Self, Self::Error> {
        let unit_price =
            Decimal::from_str(value.price.trim()).map_err(|e| PriceLookupError::InvalidPrice {
                product_id: value.id.clone(),
                reason: e.to_string(),
            })?;

        Ok(ProductPrice {
            product_id: value.id,
            name: value.name,
            unit_price,
        })
    }
}
