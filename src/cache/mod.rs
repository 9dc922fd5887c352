//! The cache façade
//!
//! Wraps the index-backed store with process counters. All methods are
//! `&self`; the store serializes its own shared state, so a `Cache` can
//! sit behind an `Arc` and serve concurrent callers.

pub mod config;
mod store;

use crate::analysis::{CacheKey, WriteInfo};
use crate::error::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use config::CacheConfig;
pub use store::{IndexSizes, StoreMetrics};

/// Monotonic process counters, exposed on `/stats` and `/metrics`.
#[derive(Debug, Default)]
pub struct Counters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub registrations: AtomicU64,
    pub invalidations: AtomicU64,
    pub entries_invalidated: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// The cache: registration, lookup, and write-driven invalidation.
pub struct Cache {
    store: store::Store,
    counters: Counters,
}

impl Cache {
    /// Open (or create) a cache at the configured location.
    pub fn open(config: CacheConfig) -> Result<Self> {
        Ok(Self {
            store: store::Store::open(config)?,
            counters: Counters::default(),
        })
    }

    /// Store a result under its fingerprint, indexing it for
    /// invalidation. Overwrites any previous entry with the same
    /// fingerprint.
    pub fn register(&self, fingerprint: &str, result: &[u8], key: &CacheKey) -> Result<()> {
        self.store.register(fingerprint, result, key)?;
        Counters::bump(&self.counters.registrations);
        Ok(())
    }

    /// Fetch a cached result. A miss is `Ok(None)`.
    pub fn get(&self, fingerprint: &str) -> Result<Option<Arc<Vec<u8>>>> {
        let result = self.store.get(fingerprint)?;
        match &result {
            Some(_) => Counters::bump(&self.counters.hits),
            None => Counters::bump(&self.counters.misses),
        }
        Ok(result)
    }

    /// Drop every cached entry the write can affect; returns how many
    /// were deleted.
    pub fn invalidate(&self, write: &WriteInfo) -> Result<usize> {
        let deleted = self.store.invalidate(write)?;
        Counters::bump(&self.counters.invalidations);
        self.counters
            .entries_invalidated
            .fetch_add(deleted as u64, Ordering::Relaxed);
        Ok(deleted)
    }

    /// Report how many entries the write would delete, without deleting.
    pub fn preview_invalidate(&self, write: &WriteInfo) -> Result<usize> {
        self.store.preview_invalidate(write)
    }

    /// Drop every entry registered for a table; returns how many were
    /// deleted.
    pub fn clear_table(&self, table: &str) -> Result<usize> {
        self.store.clear_table(table)
    }

    /// Entry counts and index sizes.
    pub fn metrics(&self) -> Result<StoreMetrics> {
        self.store.metrics()
    }

    /// Process counters.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Flush to disk.
    pub fn close(&self) -> Result<()> {
        self.store.close()
    }
}
