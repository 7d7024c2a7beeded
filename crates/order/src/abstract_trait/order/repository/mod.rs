mod command;
mod query;

pub use self::command::{CreateOutcome, DynOrderCommandRepository, OrderCommandRepositoryTrait};
pub use self::query::{DynOrderQueryRepository, OrderQueryRepositoryTrait};
