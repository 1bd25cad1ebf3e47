//! Arbor Storage - Store Adapter and Cache
//!
//! The narrow store boundary consumed by the tree engine, an in-memory
//! transactional implementation of it, and the TTL cache with its
//! per-request action buffer.

pub mod cache;
pub mod memory;
pub mod store;

pub use cache::{
    ActionBuffer, BarrierStatus, CacheAction, CacheStats, DrainBarrier, TtlCache,
};
pub use memory::{MemoryStore, MemoryTransaction, RowVersion, MEMORY_TARGET};
pub use store::{DocumentStore, StoreTransaction};
