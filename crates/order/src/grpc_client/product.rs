use crate::{
    abstract_trait::grpc_client::PriceLookupTrait, domain::response::product::ProductPrice,
};
use async_trait::async_trait;
use genproto::product::{
    FindByIdProductRequest,
    product_query_service_client::ProductQueryServiceClient as ProductQueryServiceGrpcClient,
};
use opentelemetry::{Context, global};
use shared::{errors::PriceLookupError, utils::MetadataInjector};
use tonic::{Code, Request, transport::Channel};
use tracing::{error, info};

pub struct ProductGrpcClientService {
    client: ProductQueryServiceGrpcClient<Channel>,
}

impl ProductGrpcClientService {
    pub fn new(client: ProductQueryServiceGrpcClient<Channel>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PriceLookupTrait for ProductGrpcClientService {
    async fn get_price(&self, product_id: &str) -> Result<ProductPrice, PriceLookupError> {
        let mut req = Request::new(FindByIdProductRequest {
            id: product_id.to_string(),
        });

        global::get_text_map_propagator(|propagator| {
            propagator.inject_context(&Context::current(), &mut MetadataInjector(req.metadata_mut()))
        });

        let mut client = self.client.clone();

        let response = client.find_by_id(req).await.map_err(|status| match status.code() {
            Code::NotFound | Code::InvalidArgument => {
                PriceLookupError::NotFound(product_id.to_string())
            }
            code => {
                error!("❌ gRPC error fetching product {product_id}: {code:?} {}", status.message());
                PriceLookupError::Unavailable(format!("{code:?}: {}", status.message()))
            }
        })?;

        let product = response.into_inner().data.ok_or_else(|| {
            PriceLookupError::InvalidPrice {
                product_id: product_id.to_string(),
                reason: "product data is missing in gRPC response".into(),
            }
        })?;

        let price = ProductPrice::try_from(product)?;
        info!("✅ Product found: id={} price={}", price.product_id, price.unit_price);

        Ok(price)
    }
}
