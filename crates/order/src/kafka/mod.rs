pub mod consumer_loop;
pub mod event;
pub mod kafka_consumer;

pub use self::consumer_loop::{
    CheckoutConsumer, ConsumerMetrics, ConsumerSettings, ConsumerState, Outcome,
};
pub use self::event::{CheckoutEventHandler, HandleError, HandleOutcome};
pub use self::kafka_consumer::{KafkaCheckoutStream, KafkaDeadLetterSink};
