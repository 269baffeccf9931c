//! Order fulfillment orchestration.
//!
//! The orchestrator is the transaction boundary of the pipeline: it ties
//! the cart snapshot, the inventory ledger, and the order aggregate into
//! one checkout unit of work, publishes the resulting event after commit,
//! and converges order status on the asynchronous payment outcome —
//! advancing on success, releasing inventory and cancelling on failure.

pub mod cart;
pub mod error;
pub mod listener;
pub mod orchestrator;

pub use cart::CartService;
pub use error::FulfillmentError;
pub use orchestrator::FulfillmentService;
