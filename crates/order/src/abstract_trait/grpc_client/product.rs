use crate::domain::response::product::ProductPrice;
use async_trait::async_trait;
use shared::errors::PriceLookupError;
use std::sync::Arc;

pub type DynPriceLookup = Arc<dyn PriceLookupTrait + Send + Sync>;

#[async_trait]
pub trait PriceLookupTrait {
    async fn get_price(&self, product_id: &str) -> Result<ProductPrice, PriceLookupError>;
}
