//! Payment simulator.
//!
//! Consumes `OrderCreatedEvent`, waits an artificial processing delay,
//! decides success or failure by a configured probability, and publishes
//! the `PaymentProcessedEvent` carrying the decision. Holds no persistent
//! state of its own.

pub mod config;
pub mod processor;

pub use config::PaymentConfig;
pub use processor::PaymentProcessor;
