//! Invalidation decision procedure
//!
//! `should_invalidate` decides whether a write can affect a cached
//! query's result. It returns true unless non-overlap can be proven;
//! every sub-analysis that cannot reach a positive proof falls through
//! to invalidation. Four analyses combine: a table gate, column overlap
//! (with aggregate wrappers stripped), row overlap of equality/IN values
//! against the write's affected rows, and per-column range analysis over
//! merged bounds.

use crate::analysis::key::{CacheKey, Classification, CondOp, Condition, WriteInfo, WriteOp};
use crate::types::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// Decide whether the cached entry described by `key` must be dropped
/// when `write` executes. Never errors; unprovable means true.
pub fn should_invalidate(key: &CacheKey, write: &WriteInfo) -> bool {
    if !key.tables.iter().any(|t| t.table == write.table) {
        return false;
    }
    let anchor = match key.anchor() {
        Some(anchor) => anchor,
        None => return true,
    };

    match write.operation {
        // INSERT analysis would need the inserted row values against the
        // cached WHERE, which are not extracted.
        WriteOp::Insert => true,

        WriteOp::Delete => {
            if matches!(
                key.classification,
                Classification::Aggregate | Classification::Join
            ) {
                return true;
            }
            if !write.conditions.is_empty()
                && !anchor.conditions.is_empty()
                && conditions_disjoint(&anchor.conditions, &write.conditions)
            {
                return false;
            }
            if !write.affected_rows.is_empty()
                && anchor.conditions.iter().any(|c| c.is_equality_or_in())
            {
                return rows_overlap(&anchor.conditions, &write.affected_rows);
            }
            true
        }

        WriteOp::Update => {
            if write.modified_columns.is_empty() {
                // No SET columns recovered: only range and row overlap
                // can prove anything.
                if !write.conditions.is_empty()
                    && !anchor.conditions.is_empty()
                    && conditions_disjoint(&anchor.conditions, &write.conditions)
                {
                    return false;
                }
                if !write.affected_rows.is_empty() && !anchor.conditions.is_empty() {
                    return rows_overlap(&anchor.conditions, &write.affected_rows);
                }
                return true;
            }

            let column_overlap = columns_overlap(&anchor.columns, &write.modified_columns);
            let is_join = key.classification == Classification::Join;
            if !column_overlap && !is_join {
                return false;
            }
            let join_overlap = is_join && join_columns_overlap(key, write);
            if !column_overlap && !join_overlap {
                return false;
            }
            if !write.conditions.is_empty()
                && !anchor.conditions.is_empty()
                && conditions_disjoint(&anchor.conditions, &write.conditions)
            {
                return false;
            }
            if is_join {
                if !write.affected_rows.is_empty()
                    && !anchor.conditions.is_empty()
                    && !rows_overlap(&anchor.conditions, &write.affected_rows)
                {
                    return false;
                }
                return true;
            }
            if !write.affected_rows.is_empty() && !anchor.conditions.is_empty() {
                return rows_overlap(&anchor.conditions, &write.affected_rows);
            }
            true
        }
    }
}

/// Column overlap: the cached projection touches a modified column, or
/// projects `*`. Aggregate wrappers are stripped first, so `SUM(price)`
/// overlaps a write to `price` and `COUNT(*)` overlaps everything.
fn columns_overlap(selected: &[String], modified: &[String]) -> bool {
    selected.iter().any(|col| {
        let name = strip_aggregate(col);
        name == "*" || modified.iter().any(|m| m == name)
    })
}

/// `FUNC(col)` → `col`; anything else is returned unchanged.
fn strip_aggregate(column: &str) -> &str {
    match (column.find('('), column.ends_with(')')) {
        (Some(open), true) => column[open + 1..column.len() - 1].trim(),
        _ => column,
    }
}

/// Join-column overlap: a modified column participates in a join
/// condition on the side that resolves to the written table.
fn join_columns_overlap(key: &CacheKey, write: &WriteInfo) -> bool {
    let mut alias_map: BTreeMap<&str, &str> = BTreeMap::new();
    for table in &key.tables {
        alias_map.insert(table.table.as_str(), table.table.as_str());
        if let Some(alias) = &table.alias {
            alias_map.insert(alias.as_str(), table.table.as_str());
        }
    }
    let anchor = match key.anchor() {
        Some(anchor) => anchor,
        None => return false,
    };
    anchor.join_conditions.iter().any(|jc| {
        let left = alias_map
            .get(jc.left_table.as_str())
            .copied()
            .unwrap_or(jc.left_table.as_str());
        let right = alias_map
            .get(jc.right_table.as_str())
            .copied()
            .unwrap_or(jc.right_table.as_str());
        write.modified_columns.iter().any(|m| {
            (left == write.table && jc.left_column == *m)
                || (right == write.table && jc.right_column == *m)
        })
    })
}

/// Row overlap of the cached equality/IN conditions against the write's
/// affected row identifiers. A cached table without any equality/IN
/// condition is assumed to overlap.
fn rows_overlap(conditions: &[Condition], affected: &[String]) -> bool {
    let affected: BTreeSet<&str> = affected.iter().map(|s| s.as_str()).collect();
    let mut has_row_conditions = false;
    for cond in conditions {
        match (&cond.operator, &cond.value) {
            (CondOp::Eq, Some(value)) => {
                has_row_conditions = true;
                if affected.contains(value.repr().as_str()) {
                    return true;
                }
            }
            (CondOp::In, Some(Value::List(items))) => {
                has_row_conditions = true;
                if items.iter().any(|v| affected.contains(v.repr().as_str())) {
                    return true;
                }
            }
            (CondOp::In, Some(value)) => {
                has_row_conditions = true;
                if affected.contains(value.repr().as_str()) {
                    return true;
                }
            }
            _ => {}
        }
    }
    !has_row_conditions
}

/// Everything range analysis knows about one column on one side.
struct ColumnSide {
    /// Values from equality/IN conditions.
    values: Vec<Value>,
    /// Merged interval from `=`, comparisons, BETWEEN, and IN min/max.
    lower: Bound<Value>,
    upper: Bound<Value>,
    /// Set when bounds could not be merged soundly.
    tainted: bool,
    /// Whether any condition contributed to the interval.
    bounded: bool,
}

impl ColumnSide {
    fn new() -> Self {
        ColumnSide {
            values: Vec::new(),
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
            tainted: false,
            bounded: false,
        }
    }
}

/// Range analysis: group both sides' conditions by column; if any column
/// constrained on both sides is provably disjoint, the condition sets
/// cannot share rows.
fn conditions_disjoint(cached: &[Condition], write: &[Condition]) -> bool {
    let cached_sides = column_sides(cached);
    let write_sides = column_sides(write);
    for (column, cached_side) in &cached_sides {
        let Some(write_side) = write_sides.get(column) else {
            continue;
        };
        if column_disjoint(cached_side, write_side) {
            return true;
        }
    }
    false
}

fn column_sides(conditions: &[Condition]) -> BTreeMap<String, ColumnSide> {
    let mut sides: BTreeMap<String, ColumnSide> = BTreeMap::new();
    for cond in conditions {
        let side = sides
            .entry(cond.column.clone())
            .or_insert_with(ColumnSide::new);
        match (&cond.operator, &cond.value) {
            (CondOp::Eq, Some(value)) => {
                side.values.push(value.clone());
                if value.is_orderable() {
                    tighten_lower(side, Bound::Included(value.clone()));
                    tighten_upper(side, Bound::Included(value.clone()));
                }
            }
            (CondOp::In, Some(Value::List(items))) => {
                side.values.extend(items.iter().cloned());
                if !items.is_empty() && items.iter().all(|v| v.is_orderable()) {
                    if let (Some(min), Some(max)) = (extremum(items, Ordering::Less), extremum(items, Ordering::Greater)) {
                        tighten_lower(side, Bound::Included(min));
                        tighten_upper(side, Bound::Included(max));
                    } else {
                        side.tainted = true;
                    }
                }
            }
            (CondOp::Gt, Some(value)) if value.is_orderable() => {
                tighten_lower(side, Bound::Excluded(value.clone()));
            }
            (CondOp::Ge, Some(value)) if value.is_orderable() => {
                tighten_lower(side, Bound::Included(value.clone()));
            }
            (CondOp::Lt, Some(value)) if value.is_orderable() => {
                tighten_upper(side, Bound::Excluded(value.clone()));
            }
            (CondOp::Le, Some(value)) if value.is_orderable() => {
                tighten_upper(side, Bound::Included(value.clone()));
            }
            (CondOp::Between, Some(Value::List(items))) if items.len() == 2 => {
                if items[0].is_orderable() && items[1].is_orderable() {
                    tighten_lower(side, Bound::Included(items[0].clone()));
                    tighten_upper(side, Bound::Included(items[1].clone()));
                }
            }
            _ => {}
        }
    }
    sides
}

/// The min or max of a value list under the SQL ordering, None when any
/// pair is incomparable.
fn extremum(items: &[Value], keep: Ordering) -> Option<Value> {
    let mut best = items.first()?.clone();
    for item in &items[1..] {
        match item.sql_cmp(&best) {
            Some(ordering) if ordering == keep => best = item.clone(),
            Some(_) => {}
            None => return None,
        }
    }
    Some(best)
}

fn tighten_lower(side: &mut ColumnSide, bound: Bound<Value>) {
    side.bounded = true;
    let current = std::mem::replace(&mut side.lower, Bound::Unbounded);
    side.lower = match merge_lower(current, bound) {
        Some(merged) => merged,
        None => {
            side.tainted = true;
            Bound::Unbounded
        }
    };
}

fn tighten_upper(side: &mut ColumnSide, bound: Bound<Value>) {
    side.bounded = true;
    let current = std::mem::replace(&mut side.upper, Bound::Unbounded);
    side.upper = match merge_upper(current, bound) {
        Some(merged) => merged,
        None => {
            side.tainted = true;
            Bound::Unbounded
        }
    };
}

/// The tighter (greater) of two lower bounds; None when incomparable.
fn merge_lower(a: Bound<Value>, b: Bound<Value>) -> Option<Bound<Value>> {
    let (av, bv) = match (bound_value(&a), bound_value(&b)) {
        (None, _) => return Some(b),
        (_, None) => return Some(a),
        (Some(av), Some(bv)) => (av, bv),
    };
    match av.sql_cmp(bv)? {
        Ordering::Greater => Some(a),
        Ordering::Less => Some(b),
        // At the same value, exclusion is tighter.
        Ordering::Equal => Some(if matches!(a, Bound::Excluded(_)) { a } else { b }),
    }
}

/// The tighter (lesser) of two upper bounds; None when incomparable.
fn merge_upper(a: Bound<Value>, b: Bound<Value>) -> Option<Bound<Value>> {
    let (av, bv) = match (bound_value(&a), bound_value(&b)) {
        (None, _) => return Some(b),
        (_, None) => return Some(a),
        (Some(av), Some(bv)) => (av, bv),
    };
    match av.sql_cmp(bv)? {
        Ordering::Less => Some(a),
        Ordering::Greater => Some(b),
        Ordering::Equal => Some(if matches!(a, Bound::Excluded(_)) { a } else { b }),
    }
}

fn bound_value(bound: &Bound<Value>) -> Option<&Value> {
    match bound {
        Bound::Included(v) | Bound::Excluded(v) => Some(v),
        Bound::Unbounded => None,
    }
}

/// Provable disjointness of one column's two sides. Equality/IN value
/// sets are compared first; otherwise the merged intervals must be
/// provably non-overlapping.
fn column_disjoint(cached: &ColumnSide, write: &ColumnSide) -> bool {
    if !cached.values.is_empty() && !write.values.is_empty() {
        let overlapping = cached
            .values
            .iter()
            .any(|a| write.values.iter().any(|b| values_maybe_equal(a, b)));
        if !overlapping {
            return true;
        }
    }
    if cached.tainted || write.tainted || !cached.bounded || !write.bounded {
        return false;
    }
    !ranges_overlap(&cached.lower, &cached.upper, &write.lower, &write.upper)
}

/// Whether two values could denote the same row value. When no SQL
/// ordering relates them, equal raw renderings (coercion territory) and
/// nulls/lists stay "maybe equal".
fn values_maybe_equal(a: &Value, b: &Value) -> bool {
    match a.sql_cmp(b) {
        Some(ordering) => ordering == Ordering::Equal,
        None => {
            a.repr() == b.repr()
                || matches!(a, Value::Null | Value::List(_))
                || matches!(b, Value::Null | Value::List(_))
        }
    }
}

/// Interval overlap with conservative treatment of incomparable bounds.
fn ranges_overlap(
    s1: &Bound<Value>,
    e1: &Bound<Value>,
    s2: &Bound<Value>,
    e2: &Bound<Value>,
) -> bool {
    start_before_end(s1, e2) && start_before_end(s2, e1)
}

fn start_before_end(start: &Bound<Value>, end: &Bound<Value>) -> bool {
    match (start, end) {
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
        (Bound::Included(s), Bound::Included(e)) => {
            !matches!(s.sql_cmp(e), Some(Ordering::Greater))
        }
        (Bound::Included(s), Bound::Excluded(e))
        | (Bound::Excluded(s), Bound::Included(e))
        | (Bound::Excluded(s), Bound::Excluded(e)) => {
            !matches!(s.sql_cmp(e), Some(Ordering::Greater) | Some(Ordering::Equal))
        }
    }
}
