//! Core module containing the order aggregate and the contracts the pipeline
//! is built on

pub mod cache;
pub mod error;
pub mod order;
pub mod store;
pub mod stream;

pub use cache::OrderCache;
pub use error::{
    ConfigError, ErrorResponse, ReadError, ServiceError, StoreError, StreamError, WarmUpError,
};
pub use order::{Delivery, Item, Order, Payment, truncate_to_micros};
pub use store::OrderStore;
pub use stream::{OrderPublisher, OrderStream, StreamMessage};
