//! Cadabra: a sidecar cache for relational query results
//!
//! SELECT statements are reduced to a semantic `CacheKey` and stored
//! under a deterministic fingerprint; INSERT/UPDATE/DELETE statements
//! are reduced to a `WriteInfo` and translated into a minimal, precise
//! set of cache entries to drop. Invalidation is conservative: whenever
//! non-overlap cannot be proven, the entry goes.

pub mod analysis;
pub mod cache;
mod error;
pub mod parsing;
pub mod server;
pub mod types;

pub use analysis::{
    analyze_select, analyze_write, should_invalidate, CacheKey, Classification, CondOp,
    Condition, JoinCondition, OrderBy, SetOperation, TableAccess, WriteInfo, WriteOp,
};
pub use cache::{Cache, CacheConfig, StoreMetrics};
pub use error::{Error, Result};
pub use types::{Params, Value};
