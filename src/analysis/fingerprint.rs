//! Deterministic cache-key fingerprints
//!
//! Two shapes: a human-readable form for plain primary-key lookups, and
//! a structural hash for everything else. The structural form serializes
//! a canonical record (sorted keys, sorted column lists, conditions
//! sorted by column, sorted list values, join conditions sorted by left
//! table) and takes the first 16 hex characters of its SHA-256.
//!
//! Equivalent queries must hash identically, so everything order-
//! sensitive is sorted here rather than trusting extraction order.

use crate::analysis::key::{
    Classification, CondOp, Condition, JoinType, OrderBy, SetOperation, SortOrder, TableAccess,
};
use crate::types::value::{sort_values, Value};
use serde_json::{json, Map};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest. 64 bits is
/// plenty for typical working sets; collisions are re-checked against
/// the full stored key by the invalidation decider.
const FINGERPRINT_HEX_LEN: usize = 16;

/// Compute the fingerprint for a frozen cache-key record.
#[allow(clippy::too_many_arguments)]
pub fn compute(
    tables: &[TableAccess],
    classification: Classification,
    order_by: &[OrderBy],
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
    has_subquery: bool,
    set_operation: Option<SetOperation>,
) -> String {
    let plain_shape = order_by.is_empty()
        && limit.is_none()
        && offset.is_none()
        && !distinct
        && !has_subquery
        && set_operation.is_none();

    if classification == Classification::RowLookup && tables.len() == 1 && plain_shape {
        if let Some(fp) = row_lookup_fingerprint(&tables[0]) {
            return fp;
        }
    }

    let record = json!({
        "tables": tables.iter().map(canonical_table).collect::<Vec<_>>(),
        "classification": classification_str(classification),
        "orderBy": order_by
            .iter()
            .map(|o| json!({"column": o.column, "order": order_str(o.order)}))
            .collect::<Vec<_>>(),
        "limit": limit,
        "offset": offset,
        "distinct": distinct,
        "hasSubquery": has_subquery,
        "setOperation": set_operation.map(set_operation_str),
    });

    let digest = Sha256::digest(record.to_string().as_bytes());
    let mut hex = String::with_capacity(FINGERPRINT_HEX_LEN);
    for byte in digest.iter().take(FINGERPRINT_HEX_LEN / 2) {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// The human-readable `{table}:{col}={value}:row-lookup` form, available
/// when the table carries exactly one condition and it is a primary-key
/// equality or IN.
fn row_lookup_fingerprint(table: &TableAccess) -> Option<String> {
    if table.conditions.len() != 1 || !table.join_conditions.is_empty() {
        return None;
    }
    let cond = &table.conditions[0];
    if !is_primary_key_column(&cond.column) {
        return None;
    }
    let value = cond.value.as_ref()?;
    let rendered = match (cond.operator, value) {
        (CondOp::Eq, v) => v.repr(),
        (CondOp::In, Value::List(items)) => {
            let mut items = items.clone();
            sort_values(&mut items);
            items
                .iter()
                .map(|v| v.repr())
                .collect::<Vec<_>>()
                .join(",")
        }
        _ => return None,
    };
    Some(format!(
        "{}:{}={}:row-lookup",
        table.table, cond.column, rendered
    ))
}

/// Row-lookup eligible column names.
pub fn is_primary_key_column(column: &str) -> bool {
    column.eq_ignore_ascii_case("id") || column.eq_ignore_ascii_case("uuid")
}

/// Canonical form of one table access: sorted columns, conditions sorted
/// by column with sorted list values, join conditions sorted by left
/// table. The alias is deliberately absent so aliasing never changes the
/// fingerprint.
fn canonical_table(table: &TableAccess) -> serde_json::Value {
    let mut columns = table.columns.clone();
    columns.sort();

    let mut conditions = table.conditions.clone();
    for cond in &mut conditions {
        if let Some(Value::List(items)) = &mut cond.value {
            sort_values(items);
        }
    }
    conditions.sort_by(|a, b| a.column.cmp(&b.column));

    let mut joins = table.join_conditions.clone();
    joins.sort_by(|a, b| a.left_table.cmp(&b.left_table));

    json!({
        "table": table.table,
        "columns": columns,
        "conditions": conditions.iter().map(canonical_condition).collect::<Vec<_>>(),
        "joinConditions": joins
            .iter()
            .map(|j| json!({
                "leftTable": j.left_table,
                "leftColumn": j.left_column,
                "rightTable": j.right_table,
                "rightColumn": j.right_column,
                "joinType": join_type_str(j.join_type),
            }))
            .collect::<Vec<_>>(),
    })
}

fn canonical_condition(cond: &Condition) -> serde_json::Value {
    let mut record = Map::new();
    record.insert("column".into(), json!(cond.column));
    record.insert("operator".into(), json!(op_str(cond.operator)));
    record.insert(
        "value".into(),
        cond.value.as_ref().map(value_to_json).unwrap_or(json!(null)),
    );
    serde_json::Value::Object(record)
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => json!(null),
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::Str(s) => json!(s),
        Value::List(items) => {
            serde_json::Value::Array(items.iter().map(value_to_json).collect())
        }
    }
}

fn classification_str(c: Classification) -> &'static str {
    match c {
        Classification::RowLookup => "row-lookup",
        Classification::Aggregate => "aggregate",
        Classification::Join => "join",
        Classification::Complex => "complex",
    }
}

fn set_operation_str(op: SetOperation) -> &'static str {
    match op {
        SetOperation::Union => "UNION",
        SetOperation::UnionAll => "UNION_ALL",
        SetOperation::Intersect => "INTERSECT",
        SetOperation::Except => "EXCEPT",
    }
}

fn order_str(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    }
}

fn join_type_str(join_type: JoinType) -> &'static str {
    match join_type {
        JoinType::Inner => "INNER",
        JoinType::Left => "LEFT",
        JoinType::Right => "RIGHT",
        JoinType::Full => "FULL",
        JoinType::Cross => "CROSS",
    }
}

fn op_str(op: CondOp) -> &'static str {
    match op {
        CondOp::Eq => "=",
        CondOp::Ne => "!=",
        CondOp::Gt => ">",
        CondOp::Lt => "<",
        CondOp::Ge => ">=",
        CondOp::Le => "<=",
        CondOp::In => "IN",
        CondOp::NotIn => "NOT IN",
        CondOp::Like => "LIKE",
        CondOp::NotLike => "NOT LIKE",
        CondOp::Between => "BETWEEN",
        CondOp::NotBetween => "NOT BETWEEN",
        CondOp::IsNull => "IS NULL",
        CondOp::IsNotNull => "IS NOT NULL",
        CondOp::Exists => "EXISTS",
        CondOp::NotExists => "NOT EXISTS",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_table(op: CondOp, value: Value) -> TableAccess {
        let mut table = TableAccess::new("users", None);
        table.columns.push("*".into());
        table.conditions.push(Condition::new("id", op, Some(value)));
        table
    }

    #[test]
    fn test_row_lookup_form() {
        let fp = compute(
            &[lookup_table(CondOp::Eq, Value::Int(10))],
            Classification::RowLookup,
            &[],
            None,
            None,
            false,
            false,
            None,
        );
        assert_eq!(fp, "users:id=10:row-lookup");
    }

    #[test]
    fn test_row_lookup_in_sorts_values() {
        let fp = compute(
            &[lookup_table(
                CondOp::In,
                Value::List(vec![Value::Int(3), Value::Int(1), Value::Int(2)]),
            )],
            Classification::RowLookup,
            &[],
            None,
            None,
            false,
            false,
            None,
        );
        assert_eq!(fp, "users:id=1,2,3:row-lookup");
    }

    #[test]
    fn test_structural_hash_is_order_insensitive() {
        let mut a = TableAccess::new("users", None);
        a.columns = vec!["name".into(), "email".into()];
        a.conditions = vec![
            Condition::new("b", CondOp::Eq, Some(Value::Int(2))),
            Condition::new("a", CondOp::Eq, Some(Value::Int(1))),
        ];
        let mut b = TableAccess::new("users", None);
        b.columns = vec!["email".into(), "name".into()];
        b.conditions = vec![
            Condition::new("a", CondOp::Eq, Some(Value::Int(1))),
            Condition::new("b", CondOp::Eq, Some(Value::Int(2))),
        ];
        let args = |t: TableAccess| {
            compute(
                &[t],
                Classification::Complex,
                &[],
                None,
                None,
                false,
                false,
                None,
            )
        };
        assert_eq!(args(a), args(b));
    }

    #[test]
    fn test_structural_hash_distinguishes_limit() {
        let table = || lookup_table(CondOp::Eq, Value::Int(1));
        let without = compute(
            &[table()],
            Classification::Complex,
            &[],
            None,
            None,
            false,
            false,
            None,
        );
        let with = compute(
            &[table()],
            Classification::Complex,
            &[],
            Some(10),
            None,
            false,
            false,
            None,
        );
        assert_ne!(without, with);
        assert_eq!(with.len(), 16);
    }

    #[test]
    fn test_alias_does_not_change_hash() {
        let plain = TableAccess::new("users", None);
        let aliased = TableAccess::new("users", Some("t0".into()));
        let hash = |t: TableAccess| {
            compute(
                &[t],
                Classification::Complex,
                &[],
                None,
                None,
                false,
                false,
                None,
            )
        };
        assert_eq!(hash(plain), hash(aliased));
    }
}
