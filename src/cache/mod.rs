//! Per-session memo of remote reads.
//!
//! This module provides a store-agnostic caching mechanism that:
//! - Keys entries by remote path
//! - Runs the fetcher only on a miss and keeps only successful results
//! - Forgets entries only through explicit invalidation (refresh)

mod layer;
mod traits;

pub use layer::SessionCache;
pub use traits::{CacheResult, CacheSource};
