//! Analysis-level properties: determinism, equivalence invariance, and
//! distinguishability of fingerprints.

use cadabra::{analyze_select, analyze_write, Classification, CondOp, Params, Value, WriteOp};

fn positional(values: Vec<Value>) -> Params {
    Params::Positional(values)
}

#[test]
fn analyze_select_is_pure() {
    let params = positional(vec![Value::Int(42)]);
    let a = analyze_select("SELECT * FROM users WHERE id = ?", Some(&params)).unwrap();
    let b = analyze_select("SELECT * FROM users WHERE id = ?", Some(&params)).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.fingerprint, b.fingerprint);
}

#[test]
fn row_lookup_fingerprint_format() {
    let key = analyze_select(
        "SELECT * FROM users WHERE id = ?",
        Some(&positional(vec![Value::Int(10)])),
    )
    .unwrap();
    assert_eq!(key.classification, Classification::RowLookup);
    assert_eq!(key.fingerprint, "users:id=10:row-lookup");
}

#[test]
fn binding_expands_in_lists() {
    let key = analyze_select(
        "SELECT * FROM users WHERE id IN (?)",
        Some(&positional(vec![Value::List(vec![
            Value::Int(3),
            Value::Int(1),
            Value::Int(2),
        ])])),
    )
    .unwrap();

    let cond = &key.tables[0].conditions[0];
    assert_eq!(cond.column, "id");
    assert_eq!(cond.operator, CondOp::In);
    match cond.value.as_ref().unwrap() {
        Value::List(items) => {
            let mut sorted: Vec<i64> = items
                .iter()
                .map(|v| match v {
                    Value::Int(i) => *i,
                    other => panic!("unexpected member {:?}", other),
                })
                .collect();
            sorted.sort();
            assert_eq!(sorted, vec![1, 2, 3]);
        }
        other => panic!("expected list, got {:?}", other),
    }

    let literal = analyze_select("SELECT * FROM users WHERE id IN (1, 2, 3)", None).unwrap();
    assert_eq!(key.fingerprint, literal.fingerprint);
}

#[test]
fn whitespace_and_keyword_case_are_equivalent() {
    let a = analyze_select("SELECT name FROM users WHERE age > 21", None).unwrap();
    let b = analyze_select("select   name\n from users\twhere age > 21", None).unwrap();
    assert_eq!(a.fingerprint, b.fingerprint);
}

#[test]
fn backticks_are_equivalent() {
    let a = analyze_select("SELECT `name` FROM `users` WHERE `id` = 5", None).unwrap();
    let b = analyze_select("SELECT name FROM users WHERE id = 5", None).unwrap();
    assert_eq!(a.fingerprint, b.fingerprint);
}

#[test]
fn orm_aliases_are_equivalent() {
    let aliased = analyze_select(
        "SELECT t0.name FROM users t0 WHERE t0.id = 1",
        None,
    )
    .unwrap();
    let plain = analyze_select("SELECT name FROM users WHERE id = 1", None).unwrap();
    assert_eq!(aliased.fingerprint, plain.fingerprint);
    assert!(!aliased.normalized_sql.contains("t0"));
}

#[test]
fn in_permutations_are_equivalent() {
    let a = analyze_select("SELECT * FROM t WHERE age IN (1, 2, 3)", None).unwrap();
    let b = analyze_select("SELECT * FROM t WHERE age IN (3, 1, 2)", None).unwrap();
    assert_eq!(a.fingerprint, b.fingerprint);
}

#[test]
fn distinct_values_produce_distinct_fingerprints() {
    let sql = "SELECT * FROM users WHERE id = ?";
    let ten = analyze_select(sql, Some(&positional(vec![Value::Int(10)]))).unwrap();
    let eleven = analyze_select(sql, Some(&positional(vec![Value::Int(11)]))).unwrap();
    assert_ne!(ten.fingerprint, eleven.fingerprint);
}

#[test]
fn shape_changes_produce_distinct_fingerprints() {
    let base = analyze_select("SELECT name FROM users WHERE age > 5", None).unwrap();

    let ordered =
        analyze_select("SELECT name FROM users WHERE age > 5 ORDER BY name", None).unwrap();
    assert_ne!(base.fingerprint, ordered.fingerprint);

    let desc = analyze_select(
        "SELECT name FROM users WHERE age > 5 ORDER BY name DESC",
        None,
    )
    .unwrap();
    assert_ne!(ordered.fingerprint, desc.fingerprint);

    let limited =
        analyze_select("SELECT name FROM users WHERE age > 5 LIMIT 10", None).unwrap();
    assert_ne!(base.fingerprint, limited.fingerprint);

    let offset = analyze_select(
        "SELECT name FROM users WHERE age > 5 LIMIT 10 OFFSET 5",
        None,
    )
    .unwrap();
    assert_ne!(limited.fingerprint, offset.fingerprint);

    let distinct =
        analyze_select("SELECT DISTINCT name FROM users WHERE age > 5", None).unwrap();
    assert_ne!(base.fingerprint, distinct.fingerprint);
}

#[test]
fn set_operations_are_distinguished() {
    let union = analyze_select("SELECT id FROM a UNION SELECT id FROM b", None).unwrap();
    let union_all = analyze_select("SELECT id FROM a UNION ALL SELECT id FROM b", None).unwrap();
    let except = analyze_select("SELECT id FROM a EXCEPT SELECT id FROM b", None).unwrap();
    assert_eq!(union.classification, Classification::Complex);
    assert_ne!(union.fingerprint, union_all.fingerprint);
    assert_ne!(union.fingerprint, except.fingerprint);
    assert_eq!(union.tables.len(), 2);
}

#[test]
fn subqueries_flag_and_distinguish() {
    let plain = analyze_select("SELECT * FROM users WHERE name = 'x'", None).unwrap();
    let nested = analyze_select(
        "SELECT * FROM users WHERE name = 'x' AND id IN (SELECT user_id FROM banned)",
        None,
    )
    .unwrap();
    assert!(!plain.has_subquery);
    assert!(nested.has_subquery);
    assert_eq!(nested.classification, Classification::Complex);
    assert_ne!(plain.fingerprint, nested.fingerprint);
}

#[test]
fn write_analysis_recovers_semantics() {
    let update = analyze_write(
        "UPDATE users SET email = ?, name = ? WHERE id = ?",
        Some(&positional(vec![
            Value::Str("x@y".into()),
            Value::Str("X".into()),
            Value::Int(10),
        ])),
    )
    .unwrap();
    assert_eq!(update.operation, WriteOp::Update);
    assert_eq!(update.table, "users");
    assert_eq!(update.modified_columns, vec!["email", "name"]);
    assert_eq!(update.affected_rows, vec!["10"]);

    let delete = analyze_write("DELETE FROM users WHERE id IN (4, 5)", None).unwrap();
    assert_eq!(delete.operation, WriteOp::Delete);
    assert_eq!(delete.affected_rows, vec!["4", "5"]);

    let insert = analyze_write("INSERT INTO users (id) VALUES (1)", None).unwrap();
    assert_eq!(insert.operation, WriteOp::Insert);
    assert!(insert.modified_columns.is_empty());
}

#[test]
fn named_parameters_bind() {
    let mut map = std::collections::BTreeMap::new();
    map.insert("min_age".to_string(), Value::Int(18));
    let key = analyze_select(
        "SELECT name FROM users WHERE age >= :min_age",
        Some(&Params::Named(map)),
    )
    .unwrap();
    let cond = &key.tables[0].conditions[0];
    assert_eq!(cond.operator, CondOp::Ge);
    assert_eq!(cond.value, Some(Value::Int(18)));
}
