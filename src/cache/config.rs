//! Cache storage configuration

use fjall::{CompressionType, PersistMode};
use std::path::{Path, PathBuf};

/// Default capacity of the in-process LRU front.
pub const DEFAULT_LRU_CAPACITY: usize = 1000;

/// Configuration for the cache store. Constructing a config never
/// touches the filesystem; directories are created when the store is
/// opened.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Base directory for storage files. `None` means a throwaway
    /// temporary directory, chosen when the store is opened (this is
    /// what `--db :memory:` maps to).
    pub data_dir: Option<PathBuf>,

    /// Fjall block cache size in bytes.
    pub block_cache_size: u64,

    /// Compression type for stored entries.
    pub compression: CompressionType,

    /// Persistence mode for commits.
    pub persist_mode: PersistMode,

    /// Capacity of the in-process LRU of deserialized results.
    pub lru_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            block_cache_size: 64 * 1024 * 1024,
            compression: CompressionType::Lz4,
            persist_mode: PersistMode::Buffer,
            lru_capacity: DEFAULT_LRU_CAPACITY,
        }
    }
}

impl CacheConfig {
    /// Config rooted at a real path, for persistent deployments.
    pub fn at_path(path: impl AsRef<Path>) -> Self {
        Self {
            data_dir: Some(path.as_ref().to_path_buf()),
            ..Self::default()
        }
    }

    /// Config optimized for tests: a throwaway directory, no
    /// compression, buffered persistence.
    pub fn for_testing() -> Self {
        Self {
            compression: CompressionType::None,
            ..Self::default()
        }
    }
}
