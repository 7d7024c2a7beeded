use crate::domain::event::{DeadLetterRecord, InboundMessage};
use async_trait::async_trait;
use shared::errors::ServiceError;
use std::sync::Arc;

pub type DynDeadLetterSink = Arc<dyn DeadLetterSinkTrait + Send + Sync>;

/// Source of checkout messages. `fetch` returns `Ok(None)` when nothing is
/// available yet; `ack` marks a message as done so it is not redelivered.
#[async_trait]
pub trait MessageStreamTrait: Send + Sync {
    async fn fetch(&self) -> Result<Option<InboundMessage>, ServiceError>;

    async fn ack(&self, message: &InboundMessage) -> Result<(), ServiceError>;

    async fn close(&self);
}

#[async_trait]
pub trait DeadLetterSinkTrait {
    async fn send(&self, record: &DeadLetterRecord) -> Result<(), ServiceError>;
}
