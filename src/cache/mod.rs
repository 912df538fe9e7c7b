//! Client-side query cache.
//!
//! This module provides a domain-agnostic caching mechanism that:
//! - Keys results by a semantic query identity (`QueryKey`)
//! - Stores entities once and shares them between query results, so an
//!   in-place patch is visible in every result containing the entity
//! - Supports explicit invalidation (mark stale, refetch on next read)
//! - Provides basic offline mode (serve stale cache when network unavailable)

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{AnyStorage, CacheStorage, MemoryStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource, Cacheable, QueryKey};
