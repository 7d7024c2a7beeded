mod product;

pub use self::product::{DynPriceLookup, PriceLookupTrait};
