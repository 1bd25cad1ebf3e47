//! Document cache kept consistent with committed store writes.
//!
//! [`TtlCache`] holds committed documents with a sliding expiry and is
//! swept periodically under the [`DrainBarrier`]. Mutating requests stage
//! their cache effects in an [`ActionBuffer`] and flush it only after the
//! store transaction commits.

pub mod actions;
pub mod barrier;
pub mod ttl;

pub use actions::{ActionBuffer, CacheAction};
pub use barrier::{AdmissionGuard, BarrierStatus, DrainBarrier, ExclusiveGuard};
pub use ttl::{CacheStats, TtlCache};
