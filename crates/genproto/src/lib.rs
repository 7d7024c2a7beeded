pub mod order {
    include!("gen/order.rs");
}

pub mod product {
    include!("gen/product.rs");
}
