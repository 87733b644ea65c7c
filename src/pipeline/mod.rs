//! Order pipeline: ingestion, read path, warm-up and the demo producer

pub mod consumer;
pub mod producer;
pub mod reader;
pub mod retry;
pub mod warmup;

pub use consumer::{MalformedMessage, OrderConsumer, Outcome};
pub use producer::{OrderProducer, fake_order};
pub use reader::OrderReader;
pub use retry::{Exhausted, RetryPolicy};
pub use warmup::{WarmUpConfig, warm_up};
