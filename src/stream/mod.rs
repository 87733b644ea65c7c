//! Message stream implementations for different backends

pub mod in_memory;
#[cfg(feature = "kafka")]
pub mod kafka;

pub use in_memory::InMemoryBroker;
#[cfg(feature = "kafka")]
pub use kafka::{KafkaOrderPublisher, KafkaOrderStream};
