use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("User id is required")]
    MissingUser,

    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: String, quantity: i64 },

    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    #[error("Invalid catalog price for product {product_id}: {reason}")]
    InvalidPrice { product_id: String, reason: String },

    #[error("Amount overflow while pricing product {0}")]
    AmountOverflow(String),

    #[error("Price lookup unavailable for product {product_id}: {reason}")]
    PriceLookupUnavailable { product_id: String, reason: String },
}

impl AssemblyError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AssemblyError::PriceLookupUnavailable { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PriceLookupError {
    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Invalid price for product {product_id}: {reason}")]
    InvalidPrice { product_id: String, reason: String },

    #[error("Price lookup unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },
}
