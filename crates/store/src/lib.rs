//! Persistence layer for the order fulfillment pipeline.
//!
//! The shared mutable resource of the whole system is the product stock
//! table, and every mutation of it goes through the [`InventoryLedger`]:
//! exclusive row locks acquired on the distinct product ids in ascending
//! order, in a single pass, before any quantity is read. Overlapping
//! reservations serialize on their shared rows in one global order and can
//! never form a wait cycle.
//!
//! Two interchangeable backends implement the traits: [`MemoryStore`]
//! (per-row tokio mutexes) and [`PostgresStore`]
//! (`SELECT … ORDER BY id FOR UPDATE`).

pub mod cache;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cache::ProductCache;
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use store::{
    CancelOutcome, CartStore, FulfillmentStore, InventoryLedger, OrderStore, ProductStore,
    ReserveRequest, ReservedLine,
};
