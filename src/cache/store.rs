//! The index-backed cache store
//!
//! Five fjall partitions: the entries table plus four secondary indexes
//! (by table, by row, by column, by aggregate) that let invalidation
//! enumerate candidate fingerprints without scanning the whole cache.
//! Every mutation of an entry and its index rows happens in one atomic
//! batch. An in-process LRU of deserialized results fronts reads; it is
//! the only non-transactional shared state and sits behind a mutex.
//!
//! Composite index keys are `segment \0 segment \0 fingerprint`; the
//! fingerprint never contains a NUL, so it is recovered from the last
//! segment.

use crate::analysis::key::{CacheKey, Classification};
use crate::analysis::{decider, fingerprint::is_primary_key_column, WriteInfo, WriteOp};
use crate::cache::config::CacheConfig;
use crate::error::Result;
use crate::types::Value;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A stored cache entry. The result blob is opaque; the cache key is
/// carried as JSON so collisions and invalidation decisions always run
/// on the full stored key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    result: Vec<u8>,
    cache_key: String,
    created_at: u64,
}

/// Store metrics: entry counts and index sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreMetrics {
    pub total_entries: u64,
    pub by_table: BTreeMap<String, u64>,
    pub index_sizes: IndexSizes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSizes {
    pub table: u64,
    pub row: u64,
    pub column: u64,
    pub aggregate: u64,
}

/// The fjall-backed store with its LRU front.
pub struct Store {
    keyspace: Keyspace,
    entries: PartitionHandle,
    by_table: PartitionHandle,
    by_row: PartitionHandle,
    by_column: PartitionHandle,
    by_aggregate: PartitionHandle,
    lru: Mutex<LruCache<String, Arc<Vec<u8>>>>,
    persist_mode: PersistMode,
}

impl Store {
    /// Open (or create) the store at the configured path. A config
    /// without a path gets a kept temporary directory here, so the
    /// failure surfaces as `StorageFailed` instead of a panic.
    /// Partition creation is idempotent.
    pub fn open(config: CacheConfig) -> Result<Self> {
        let data_dir = match &config.data_dir {
            Some(path) => path.clone(),
            None => tempfile::tempdir()?.keep(),
        };
        std::fs::create_dir_all(&data_dir)?;

        let keyspace = fjall::Config::new(&data_dir)
            .cache_size(config.block_cache_size)
            .open()?;

        let entries = keyspace.open_partition(
            "cache_entries",
            PartitionCreateOptions::default()
                .block_size(64 * 1024)
                .compression(config.compression),
        )?;
        let index_options = || {
            PartitionCreateOptions::default()
                .block_size(16 * 1024)
                .compression(fjall::CompressionType::None)
        };
        let by_table = keyspace.open_partition("idx_by_table", index_options())?;
        let by_row = keyspace.open_partition("idx_by_row", index_options())?;
        let by_column = keyspace.open_partition("idx_by_column", index_options())?;
        let by_aggregate = keyspace.open_partition("idx_by_aggregate", index_options())?;

        let capacity = NonZeroUsize::new(config.lru_capacity).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            keyspace,
            entries,
            by_table,
            by_row,
            by_column,
            by_aggregate,
            lru: Mutex::new(LruCache::new(capacity)),
            persist_mode: config.persist_mode,
        })
    }

    /// Upsert a cache entry and all of its index rows atomically.
    pub fn register(&self, fingerprint: &str, result: &[u8], key: &CacheKey) -> Result<()> {
        let entry = StoredEntry {
            result: result.to_vec(),
            cache_key: serde_json::to_string(key)?,
            created_at: unix_seconds(),
        };

        let mut batch = self.keyspace.batch();
        batch.insert(&self.entries, fingerprint, bincode::serialize(&entry)?);
        for row in index_rows(fingerprint, key) {
            batch.insert(self.partition(row.family), row.key, "");
        }
        batch.commit()?;
        self.keyspace.persist(self.persist_mode)?;

        // A register that overwrites a colliding fingerprint must not
        // leave the old result in the LRU.
        self.lru.lock().pop(fingerprint);
        Ok(())
    }

    /// Fetch a result blob, LRU first.
    pub fn get(&self, fingerprint: &str) -> Result<Option<Arc<Vec<u8>>>> {
        if let Some(result) = self.lru.lock().get(fingerprint) {
            return Ok(Some(result.clone()));
        }
        let Some(raw) = self.entries.get(fingerprint)? else {
            return Ok(None);
        };
        let entry: StoredEntry = bincode::deserialize(&raw)?;
        let result = Arc::new(entry.result);
        self.lru
            .lock()
            .put(fingerprint.to_string(), result.clone());
        Ok(Some(result))
    }

    /// Invalidate every cached entry the write can affect. Returns the
    /// number of entries deleted.
    pub fn invalidate(&self, write: &WriteInfo) -> Result<usize> {
        let doomed = self.decide(write)?;
        self.delete_entries(&doomed)
    }

    /// Like `invalidate`, but only reports how many entries would go.
    pub fn preview_invalidate(&self, write: &WriteInfo) -> Result<usize> {
        Ok(self.decide(write)?.len())
    }

    /// Drop every entry registered for a table. Returns the number of
    /// entries deleted.
    pub fn clear_table(&self, table: &str) -> Result<usize> {
        let mut doomed = Vec::new();
        for item in self.by_table.prefix(prefix_key(&[table])) {
            let (key, _) = item?;
            if let Some(fingerprint) = fingerprint_from_key(&key) {
                if let Some((_, cache_key)) = self.load_key(&fingerprint)? {
                    doomed.push((fingerprint, cache_key));
                }
            }
        }
        self.delete_entries(&doomed)
    }

    /// Entry counts and index sizes.
    pub fn metrics(&self) -> Result<StoreMetrics> {
        let mut by_table = BTreeMap::new();
        let mut table_rows = 0u64;
        for item in self.by_table.iter() {
            let (key, _) = item?;
            table_rows += 1;
            if let Some(table) = first_segment(&key) {
                *by_table.entry(table).or_insert(0u64) += 1;
            }
        }
        Ok(StoreMetrics {
            total_entries: count(&self.entries)?,
            by_table,
            index_sizes: IndexSizes {
                table: table_rows,
                row: count(&self.by_row)?,
                column: count(&self.by_column)?,
                aggregate: count(&self.by_aggregate)?,
            },
        })
    }

    /// Flush everything to disk.
    pub fn close(&self) -> Result<()> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    /// Enumerate candidate fingerprints from the indexes and run the
    /// decider over each candidate's stored key.
    fn decide(&self, write: &WriteInfo) -> Result<Vec<(String, CacheKey)>> {
        let mut candidates = BTreeSet::new();

        let table = write.table.as_str();
        if !write.affected_rows.is_empty() {
            for row in &write.affected_rows {
                self.collect(&self.by_row, &[table, row.as_str()], &mut candidates)?;
            }
            for column in &write.modified_columns {
                self.collect(&self.by_column, &[table, column.as_str()], &mut candidates)?;
            }
        }
        // Entries without row-level conditions (or with `SELECT *`) only
        // appear in the table index, so it is always unioned in.
        self.collect(&self.by_table, &[table], &mut candidates)?;

        if matches!(write.operation, WriteOp::Insert | WriteOp::Delete) {
            self.collect(&self.by_aggregate, &[table], &mut candidates)?;
        }

        let mut doomed = Vec::new();
        for fingerprint in candidates {
            if let Some((_, cache_key)) = self.load_key(&fingerprint)? {
                if decider::should_invalidate(&cache_key, write) {
                    doomed.push((fingerprint, cache_key));
                }
            }
        }
        Ok(doomed)
    }

    /// Collect fingerprints from one index under a composite-key prefix.
    fn collect(
        &self,
        partition: &PartitionHandle,
        segments: &[&str],
        out: &mut BTreeSet<String>,
    ) -> Result<()> {
        for item in partition.prefix(prefix_key(segments)) {
            let (key, _) = item?;
            if let Some(fingerprint) = fingerprint_from_key(&key) {
                out.insert(fingerprint);
            }
        }
        Ok(())
    }

    /// Load and decode a stored entry's cache key.
    fn load_key(&self, fingerprint: &str) -> Result<Option<(StoredEntry, CacheKey)>> {
        let Some(raw) = self.entries.get(fingerprint)? else {
            return Ok(None);
        };
        let entry: StoredEntry = bincode::deserialize(&raw)?;
        let cache_key: CacheKey = serde_json::from_str(&entry.cache_key)?;
        Ok(Some((entry, cache_key)))
    }

    /// Delete entries plus their index rows in one batch, then evict the
    /// same fingerprints from the LRU before returning.
    fn delete_entries(&self, doomed: &[(String, CacheKey)]) -> Result<usize> {
        if doomed.is_empty() {
            return Ok(0);
        }
        let mut batch = self.keyspace.batch();
        for (fingerprint, cache_key) in doomed {
            batch.remove(&self.entries, fingerprint.as_str());
            for row in index_rows(fingerprint, cache_key) {
                batch.remove(self.partition(row.family), row.key);
            }
        }
        batch.commit()?;
        self.keyspace.persist(self.persist_mode)?;

        let mut lru = self.lru.lock();
        for (fingerprint, _) in doomed {
            lru.pop(fingerprint);
        }
        Ok(doomed.len())
    }

    fn partition(&self, family: IndexFamily) -> &PartitionHandle {
        match family {
            IndexFamily::Table => &self.by_table,
            IndexFamily::Row => &self.by_row,
            IndexFamily::Column => &self.by_column,
            IndexFamily::Aggregate => &self.by_aggregate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexFamily {
    Table,
    Row,
    Column,
    Aggregate,
}

struct IndexRow {
    family: IndexFamily,
    key: String,
}

/// The full set of index rows for a fingerprint, computed from its cache
/// key. Register inserts exactly these; deletion removes exactly these,
/// so the two stay symmetric by construction.
fn index_rows(fingerprint: &str, key: &CacheKey) -> Vec<IndexRow> {
    let mut rows = Vec::new();
    for table in &key.tables {
        let name = table.table.as_str();
        rows.push(IndexRow {
            family: IndexFamily::Table,
            key: composite_key(&[name], fingerprint),
        });

        for cond in &table.conditions {
            if !cond.is_equality_or_in() || !is_primary_key_column(&cond.column) {
                continue;
            }
            match &cond.value {
                Some(Value::List(items)) => {
                    for item in items {
                        rows.push(IndexRow {
                            family: IndexFamily::Row,
                            key: composite_key(&[name, item.repr().as_str()], fingerprint),
                        });
                    }
                }
                Some(value) => rows.push(IndexRow {
                    family: IndexFamily::Row,
                    key: composite_key(&[name, value.repr().as_str()], fingerprint),
                }),
                None => {}
            }
        }

        for column in &table.columns {
            let stripped = strip_aggregate(column);
            if stripped == "*" || stripped.is_empty() {
                continue;
            }
            rows.push(IndexRow {
                family: IndexFamily::Column,
                key: composite_key(&[name, stripped], fingerprint),
            });
        }

        if key.classification == Classification::Aggregate {
            rows.push(IndexRow {
                family: IndexFamily::Aggregate,
                key: composite_key(&[name], fingerprint),
            });
        }
    }
    rows
}

/// `FUNC(col)` → `col`, mirroring the decider's column-overlap view.
fn strip_aggregate(column: &str) -> &str {
    match (column.find('('), column.ends_with(')')) {
        (Some(open), true) => column[open + 1..column.len() - 1].trim(),
        _ => column,
    }
}

fn composite_key(segments: &[&str], fingerprint: &str) -> String {
    let mut key = String::new();
    for segment in segments {
        key.push_str(segment);
        key.push('\0');
    }
    key.push_str(fingerprint);
    key
}

fn prefix_key(segments: &[&str]) -> String {
    let mut key = String::new();
    for segment in segments {
        key.push_str(segment);
        key.push('\0');
    }
    key
}

fn fingerprint_from_key(key: &[u8]) -> Option<String> {
    let pos = key.iter().rposition(|b| *b == 0)?;
    std::str::from_utf8(&key[pos + 1..]).ok().map(String::from)
}

fn first_segment(key: &[u8]) -> Option<String> {
    let pos = key.iter().position(|b| *b == 0)?;
    std::str::from_utf8(&key[..pos]).ok().map(String::from)
}

fn count(partition: &PartitionHandle) -> Result<u64> {
    let mut n = 0u64;
    for item in partition.iter() {
        item?;
        n += 1;
    }
    Ok(n)
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_select;

    #[test]
    fn test_index_rows_for_row_lookup() {
        let key = analyze_select("SELECT name, email FROM users WHERE id = 10", None).unwrap();
        let rows = index_rows(&key.fingerprint, &key);

        let tables: Vec<_> = rows
            .iter()
            .filter(|r| r.family == IndexFamily::Table)
            .collect();
        assert_eq!(tables.len(), 1);
        assert!(tables[0].key.starts_with("users\0"));

        let row_keys: Vec<_> = rows
            .iter()
            .filter(|r| r.family == IndexFamily::Row)
            .collect();
        assert_eq!(row_keys.len(), 1);
        assert!(row_keys[0].key.starts_with("users\010\0"));

        let columns: Vec<_> = rows
            .iter()
            .filter(|r| r.family == IndexFamily::Column)
            .map(|r| r.key.as_str())
            .collect();
        assert_eq!(columns.len(), 2);
    }

    #[test]
    fn test_index_rows_for_aggregate() {
        let key = analyze_select("SELECT COUNT(*) FROM users", None).unwrap();
        let rows = index_rows(&key.fingerprint, &key);
        assert!(rows.iter().any(|r| r.family == IndexFamily::Aggregate));
        // COUNT(*) strips to `*`, which never lands in the column index.
        assert!(!rows.iter().any(|r| r.family == IndexFamily::Column));
    }

    #[test]
    fn test_fingerprint_round_trips_composite_keys() {
        let key = composite_key(&["users", "10"], "abc123");
        assert_eq!(fingerprint_from_key(key.as_bytes()).unwrap(), "abc123");
        assert_eq!(first_segment(key.as_bytes()).unwrap(), "users");
    }
}
