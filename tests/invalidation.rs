//! End-to-end invalidation behavior through the public façades, against
//! a real store.

use cadabra::cache::CacheConfig;
use cadabra::{analyze_select, analyze_write, Cache, CacheKey, Params, Value, WriteInfo};

fn cache() -> Cache {
    Cache::open(CacheConfig::for_testing()).unwrap()
}

fn key(sql: &str) -> CacheKey {
    analyze_select(sql, None).unwrap()
}

fn key_with(sql: &str, params: Vec<Value>) -> CacheKey {
    analyze_select(sql, Some(&Params::Positional(params))).unwrap()
}

fn write(sql: &str) -> WriteInfo {
    analyze_write(sql, None).unwrap()
}

fn write_with(sql: &str, params: Vec<Value>) -> WriteInfo {
    analyze_write(sql, Some(&Params::Positional(params))).unwrap()
}

#[test]
fn register_get_round_trip() {
    let cache = cache();
    let k = key("SELECT * FROM users WHERE id = 1");
    cache.register(&k.fingerprint, b"result-bytes", &k).unwrap();

    let got = cache.get(&k.fingerprint).unwrap().unwrap();
    assert_eq!(got.as_slice(), b"result-bytes");

    // Second read comes from the LRU and matches too.
    let again = cache.get(&k.fingerprint).unwrap().unwrap();
    assert_eq!(again.as_slice(), b"result-bytes");
}

#[test]
fn miss_is_absent_not_error() {
    let cache = cache();
    assert!(cache.get("no-such-fingerprint").unwrap().is_none());
}

#[test]
fn register_overwrites_on_same_fingerprint() {
    let cache = cache();
    let k = key("SELECT * FROM users WHERE id = 1");
    cache.register(&k.fingerprint, b"old", &k).unwrap();
    // Prime the LRU with the old value, then overwrite.
    assert_eq!(cache.get(&k.fingerprint).unwrap().unwrap().as_slice(), b"old");
    cache.register(&k.fingerprint, b"new", &k).unwrap();
    assert_eq!(cache.get(&k.fingerprint).unwrap().unwrap().as_slice(), b"new");
}

#[test]
fn column_overlap_precision() {
    // Scenario: a cached name projection survives an email update of the
    // same row.
    let cache = cache();
    let k = key_with("SELECT name FROM users WHERE id = ?", vec![Value::Int(10)]);
    cache.register(&k.fingerprint, b"cached-name", &k).unwrap();

    let before = cache.metrics().unwrap();
    let w = write_with(
        "UPDATE users SET email = ? WHERE id = ?",
        vec![Value::Str("x@y".into()), Value::Int(10)],
    );
    assert_eq!(cache.invalidate(&w).unwrap(), 0);
    assert_eq!(
        cache.get(&k.fingerprint).unwrap().unwrap().as_slice(),
        b"cached-name"
    );
    // No index row keyed by the fingerprint was removed.
    assert_eq!(cache.metrics().unwrap(), before);

    // The same update touching the projected column deletes the entry.
    let w = write_with(
        "UPDATE users SET name = ? WHERE id = ?",
        vec![Value::Str("X".into()), Value::Int(10)],
    );
    assert_eq!(cache.invalidate(&w).unwrap(), 1);
    assert!(cache.get(&k.fingerprint).unwrap().is_none());
}

#[test]
fn row_non_overlap_for_in_cache() {
    let cache = cache();
    let k = key_with(
        "SELECT * FROM users WHERE id IN (?)",
        vec![Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])],
    );
    cache.register(&k.fingerprint, b"three-rows", &k).unwrap();

    let miss = write_with(
        "UPDATE users SET name = ? WHERE id = ?",
        vec![Value::Str("X".into()), Value::Int(99)],
    );
    assert_eq!(cache.invalidate(&miss).unwrap(), 0);
    assert!(cache.get(&k.fingerprint).unwrap().is_some());

    let hit = write_with(
        "UPDATE users SET name = ? WHERE id = ?",
        vec![Value::Str("X".into()), Value::Int(2)],
    );
    assert_eq!(cache.invalidate(&hit).unwrap(), 1);
    assert!(cache.get(&k.fingerprint).unwrap().is_none());
}

#[test]
fn insert_always_invalidates() {
    let cache = cache();
    let k = key("SELECT name FROM users WHERE age > 30");
    cache.register(&k.fingerprint, b"adults", &k).unwrap();

    let w = write_with(
        "INSERT INTO users (id, name) VALUES (?, ?)",
        vec![Value::Int(99), Value::Str("New".into())],
    );
    assert!(cache.invalidate(&w).unwrap() >= 1);
    assert!(cache.get(&k.fingerprint).unwrap().is_none());
}

#[test]
fn range_non_overlap_preserves_aggregates() {
    let cache = cache();
    let k = key("SELECT COUNT(*) FROM users WHERE created_at >= '2024-01-01'");
    cache.register(&k.fingerprint, b"42", &k).unwrap();

    let disjoint = write("UPDATE users SET name = 'X' WHERE created_at < '2023-01-01'");
    assert_eq!(cache.invalidate(&disjoint).unwrap(), 0);
    assert_eq!(cache.get(&k.fingerprint).unwrap().unwrap().as_slice(), b"42");

    let overlapping = write("UPDATE users SET name = 'X' WHERE created_at > '2024-06-01'");
    assert_eq!(cache.invalidate(&overlapping).unwrap(), 1);
    assert!(cache.get(&k.fingerprint).unwrap().is_none());
}

#[test]
fn delete_hits_aggregates_through_the_index() {
    let cache = cache();
    let k = key("SELECT COUNT(*) FROM users WHERE created_at >= '2024-01-01'");
    cache.register(&k.fingerprint, b"42", &k).unwrap();

    let w = write("DELETE FROM users WHERE created_at < '2000-01-01'");
    assert_eq!(cache.invalidate(&w).unwrap(), 1);
    assert!(cache.get(&k.fingerprint).unwrap().is_none());
}

#[test]
fn unrelated_table_is_untouched() {
    let cache = cache();
    let k = key("SELECT * FROM users WHERE id = 1");
    cache.register(&k.fingerprint, b"user-1", &k).unwrap();

    let w = write("DELETE FROM orders WHERE id = 1");
    assert_eq!(cache.invalidate(&w).unwrap(), 0);
    assert!(cache.get(&k.fingerprint).unwrap().is_some());
}

#[test]
fn join_cache_invalidated_from_either_table() {
    let cache = cache();
    let k = key("SELECT u.name, o.total FROM users u JOIN orders o ON u.id = o.user_id");
    cache.register(&k.fingerprint, b"joined", &k).unwrap();

    let w = write("INSERT INTO orders (id, user_id, total) VALUES (1, 2, 30)");
    assert_eq!(cache.invalidate(&w).unwrap(), 1);
    assert!(cache.get(&k.fingerprint).unwrap().is_none());
}

#[test]
fn union_branches_are_indexed() {
    let cache = cache();
    let k = key("SELECT id FROM archived UNION SELECT id FROM active");
    cache.register(&k.fingerprint, b"union", &k).unwrap();

    let w = write("INSERT INTO active (id) VALUES (7)");
    assert_eq!(cache.invalidate(&w).unwrap(), 1);
    assert!(cache.get(&k.fingerprint).unwrap().is_none());
}

#[test]
fn clear_table_is_idempotent() {
    let cache = cache();
    let a = key("SELECT * FROM users WHERE id = 1");
    let b = key("SELECT name FROM users WHERE age > 3");
    let other = key("SELECT * FROM orders WHERE id = 9");
    cache.register(&a.fingerprint, b"a", &a).unwrap();
    cache.register(&b.fingerprint, b"b", &b).unwrap();
    cache.register(&other.fingerprint, b"o", &other).unwrap();

    assert_eq!(cache.clear_table("users").unwrap(), 2);
    assert_eq!(cache.clear_table("users").unwrap(), 0);
    assert!(cache.get(&a.fingerprint).unwrap().is_none());
    assert!(cache.get(&b.fingerprint).unwrap().is_none());
    assert!(cache.get(&other.fingerprint).unwrap().is_some());
}

#[test]
fn preview_does_not_delete() {
    let cache = cache();
    let k = key("SELECT * FROM users WHERE id = 1");
    cache.register(&k.fingerprint, b"x", &k).unwrap();

    let w = write("INSERT INTO users (id) VALUES (5)");
    assert_eq!(cache.preview_invalidate(&w).unwrap(), 1);
    assert!(cache.get(&k.fingerprint).unwrap().is_some());
}

#[test]
fn metrics_reflect_registrations() {
    let cache = cache();
    let a = key("SELECT name FROM users WHERE id = 1");
    let b = key("SELECT * FROM orders WHERE id = 2");
    cache.register(&a.fingerprint, b"a", &a).unwrap();
    cache.register(&b.fingerprint, b"b", &b).unwrap();

    let metrics = cache.metrics().unwrap();
    assert_eq!(metrics.total_entries, 2);
    assert_eq!(metrics.by_table.get("users"), Some(&1));
    assert_eq!(metrics.by_table.get("orders"), Some(&1));
    assert_eq!(metrics.index_sizes.table, 2);
    assert_eq!(metrics.index_sizes.row, 2);
    // Only the name projection lands in the column index.
    assert_eq!(metrics.index_sizes.column, 1);
    assert_eq!(metrics.index_sizes.aggregate, 0);
}

#[test]
fn persistence_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let k = key("SELECT * FROM users WHERE id = 1");
    {
        let mut config = CacheConfig::at_path(dir.path());
        config.persist_mode = fjall::PersistMode::SyncAll;
        let cache = Cache::open(config).unwrap();
        cache.register(&k.fingerprint, b"durable", &k).unwrap();
        cache.close().unwrap();
    }
    {
        let cache = Cache::open(CacheConfig::at_path(dir.path())).unwrap();
        assert_eq!(
            cache.get(&k.fingerprint).unwrap().unwrap().as_slice(),
            b"durable"
        );
    }
}
