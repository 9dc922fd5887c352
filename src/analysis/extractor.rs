//! AST extraction
//!
//! Turns a parsed statement into the structured descriptors the cache
//! operates on: table accesses with attributed columns, a flattened
//! condition list, structural join conditions, ORDER BY/LIMIT/OFFSET/
//! DISTINCT facts, and the aggregate/subquery/set-operation flags.
//!
//! AND/OR chains are flattened into one list treated as conjunctive by
//! the decider; this loses disjunction structure, which is acceptable
//! because conditions are only ever used to prove non-overlap. For
//! multi-table queries the first table owns the aggregated condition and
//! join-condition sets, giving downstream analysis a single anchor.

use crate::analysis::key::{
    CondOp, Condition, JoinCondition, JoinType, OrderBy, SetOperation, SortOrder, TableAccess,
    WriteInfo, WriteOp,
};
use crate::error::{Error, Result};
use crate::parsing::ast::{
    Direction, Expression, FromClause, Literal, Operator, SelectStatement, SetOperator, Statement,
};
use crate::parsing::ast::JoinType as AstJoinType;
use crate::types::Value;
use std::collections::BTreeMap;

/// Everything extraction recovers from a SELECT statement.
#[derive(Debug, Default)]
pub struct SelectFacts {
    pub tables: Vec<TableAccess>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: bool,
    pub has_aggregate: bool,
    pub has_subquery: bool,
    pub set_operation: Option<SetOperation>,
    /// alias → table for every FROM alias seen, used by the normalizer
    /// to rewrite ORM-style aliases.
    pub alias_map: BTreeMap<String, String>,
}

/// Extracts facts from a SELECT statement, including every branch of a
/// set-operation chain.
pub fn extract_select(stmt: &SelectStatement) -> Result<SelectFacts> {
    let mut ex = Extractor::default();

    // Walk the set-operation chain; the first branch anchors everything.
    let mut branches = vec![stmt];
    let mut cursor = stmt;
    while let Some((op, tail)) = &cursor.set_op {
        if ex.facts.set_operation.is_none() {
            ex.facts.set_operation = Some(match op {
                SetOperator::Union => SetOperation::Union,
                SetOperator::UnionAll => SetOperation::UnionAll,
                SetOperator::Intersect => SetOperation::Intersect,
                SetOperator::Except => SetOperation::Except,
            });
        }
        branches.push(tail);
        cursor = tail;
    }

    for branch in &branches {
        ex.extract_branch(branch)?;
    }

    if ex.facts.tables.is_empty() {
        return Err(Error::Unsupported(
            "SELECT without any base table".into(),
        ));
    }

    // ORDER BY / LIMIT / OFFSET / DISTINCT come from the first branch;
    // for compound queries the trailing tail supplies whatever the first
    // branch lacks.
    let first = branches[0];
    let tail = *branches.last().unwrap_or(&first);
    ex.facts.distinct = first.distinct || (branches.len() > 1 && tail.distinct);
    ex.facts.order_by = extract_order_by(&first.order_by);
    if ex.facts.order_by.is_empty() && branches.len() > 1 {
        ex.facts.order_by = extract_order_by(&tail.order_by);
    }
    ex.facts.limit = literal_u64(&first.limit).or_else(|| literal_u64(&tail.limit));
    ex.facts.offset = literal_u64(&first.offset).or_else(|| literal_u64(&tail.offset));

    // Resolve raw join captures now that every alias is known, and hand
    // the aggregated condition and join sets to the anchor table.
    let joins: Vec<JoinCondition> = ex
        .raw_joins
        .iter()
        .map(|j| JoinCondition {
            left_table: ex.resolve(&j.left_qualifier),
            left_column: j.left_column.clone(),
            right_table: ex.resolve(&j.right_qualifier),
            right_column: j.right_column.clone(),
            join_type: j.join_type,
        })
        .collect();
    let pool = std::mem::take(&mut ex.pool);
    let anchor = &mut ex.facts.tables[0];
    anchor.conditions = pool;
    anchor.join_conditions = joins;

    Ok(ex.facts)
}

/// Extracts a `WriteInfo` from an INSERT/UPDATE/DELETE statement.
pub fn extract_write(stmt: &Statement) -> Result<WriteInfo> {
    match stmt {
        Statement::Insert { table, .. } => Ok(WriteInfo {
            table: table.clone(),
            operation: WriteOp::Insert,
            affected_rows: Vec::new(),
            modified_columns: Vec::new(),
            conditions: Vec::new(),
        }),
        Statement::Update {
            table,
            set,
            r#where,
        } => {
            let mut subquery = false;
            let mut conditions = Vec::new();
            if let Some(expr) = r#where {
                flatten_conditions(expr, &mut conditions, &mut subquery);
            }
            Ok(WriteInfo {
                table: table.clone(),
                operation: WriteOp::Update,
                affected_rows: affected_rows(&conditions),
                modified_columns: set.keys().cloned().collect(),
                conditions,
            })
        }
        Statement::Delete { table, r#where } => {
            let mut subquery = false;
            let mut conditions = Vec::new();
            if let Some(expr) = r#where {
                flatten_conditions(expr, &mut conditions, &mut subquery);
            }
            Ok(WriteInfo {
                table: table.clone(),
                operation: WriteOp::Delete,
                affected_rows: affected_rows(&conditions),
                modified_columns: Vec::new(),
                conditions,
            })
        }
        Statement::Select(_) => Err(Error::Unsupported("not a write statement".into())),
    }
}

/// Row identifiers recoverable from equality/IN conditions on an id or
/// uuid column.
fn affected_rows(conditions: &[Condition]) -> Vec<String> {
    let mut rows = Vec::new();
    for cond in conditions {
        if !crate::analysis::fingerprint::is_primary_key_column(&cond.column) {
            continue;
        }
        match (&cond.operator, &cond.value) {
            (CondOp::Eq, Some(value)) => rows.push(value.repr()),
            (CondOp::In, Some(Value::List(items))) => {
                rows.extend(items.iter().map(|v| v.repr()))
            }
            _ => {}
        }
    }
    rows.dedup();
    rows
}

/// A join predicate captured before alias resolution.
struct RawJoin {
    left_qualifier: String,
    left_column: String,
    right_qualifier: String,
    right_column: String,
    join_type: JoinType,
}

#[derive(Default)]
struct Extractor {
    facts: SelectFacts,
    pool: Vec<Condition>,
    raw_joins: Vec<RawJoin>,
}

impl Extractor {
    fn extract_branch(&mut self, branch: &SelectStatement) -> Result<()> {
        for item in &branch.from {
            self.collect_from(item)?;
        }
        if let Some(expr) = &branch.r#where {
            let mut subquery = false;
            flatten_conditions(expr, &mut self.pool, &mut subquery);
            self.facts.has_subquery |= subquery || expr.contains_subquery();
        }
        self.attribute_columns(branch);
        Ok(())
    }

    /// Registers a table, deduplicating by name across branches.
    fn add_table(&mut self, name: &str, alias: Option<&str>) {
        self.facts
            .alias_map
            .entry(name.to_string())
            .or_insert_with(|| name.to_string());
        if let Some(alias) = alias {
            self.facts
                .alias_map
                .insert(alias.to_string(), name.to_string());
        }
        if !self.facts.tables.iter().any(|t| t.table == name) {
            let alias = alias
                .filter(|a| *a != name)
                .map(|a| a.to_string());
            self.facts.tables.push(TableAccess::new(name, alias));
        }
    }

    fn resolve(&self, qualifier: &str) -> String {
        self.facts
            .alias_map
            .get(qualifier)
            .cloned()
            .unwrap_or_else(|| qualifier.to_string())
    }

    /// Walks a FROM item, registering tables, join conditions, and
    /// opaque ON conditions. Derived tables raise the subquery flag and
    /// contribute their inner base tables so the table gate sees them.
    fn collect_from(&mut self, item: &FromClause) -> Result<()> {
        match item {
            FromClause::Table { name, alias } => {
                self.add_table(name, alias.as_deref());
            }
            FromClause::Subquery { select, .. } => {
                self.facts.has_subquery = true;
                let mut cursor = select.as_ref();
                loop {
                    for inner in &cursor.from {
                        self.collect_from(inner)?;
                    }
                    match &cursor.set_op {
                        Some((_, tail)) => cursor = tail,
                        None => break,
                    }
                }
            }
            FromClause::Join {
                left,
                right,
                join_type,
                predicate,
            } => {
                self.collect_from(left)?;
                self.collect_from(right)?;
                let join_type = match join_type {
                    AstJoinType::Inner => JoinType::Inner,
                    AstJoinType::Left => JoinType::Left,
                    AstJoinType::Right => JoinType::Right,
                    AstJoinType::Full => JoinType::Full,
                    AstJoinType::Cross => JoinType::Cross,
                };
                match predicate {
                    Some(Expression::Operator(Operator::Equal(lhs, rhs))) => {
                        match (lhs.as_ref(), rhs.as_ref()) {
                            (
                                Expression::Column(Some(lq), lc),
                                Expression::Column(Some(rq), rc),
                            ) => self.raw_joins.push(RawJoin {
                                left_qualifier: lq.clone(),
                                left_column: lc.clone(),
                                right_qualifier: rq.clone(),
                                right_column: rc.clone(),
                                join_type,
                            }),
                            // A non-structural equality contributes its
                            // leaf conditions to the anchor.
                            _ => {
                                let mut subquery = false;
                                if let Some(pred) = predicate {
                                    flatten_conditions(pred, &mut self.pool, &mut subquery);
                                }
                                self.facts.has_subquery |= subquery;
                            }
                        }
                    }
                    Some(pred) => {
                        let mut subquery = false;
                        flatten_conditions(pred, &mut self.pool, &mut subquery);
                        self.facts.has_subquery |= subquery || pred.contains_subquery();
                    }
                    None => {}
                }
            }
        }
        Ok(())
    }

    /// Attributes select-list columns to their tables. Unattributed
    /// columns land on the first table.
    fn attribute_columns(&mut self, branch: &SelectStatement) {
        for (expr, _alias) in &branch.select {
            let mut has_aggregate = false;
            expr.walk(&mut |e| {
                if let Expression::Function(name, _) = e {
                    has_aggregate |= is_aggregate_fn(name);
                }
                true
            });
            self.facts.has_aggregate |= has_aggregate;

            let (column, qualifier) = match expr {
                Expression::All => ("*".to_string(), None),
                Expression::QualifiedWildcard(q) => ("*".to_string(), Some(q.clone())),
                Expression::Column(qualifier, name) => (name.clone(), qualifier.clone()),
                Expression::Function(name, args) => {
                    let qualifier = args.iter().find_map(|arg| match arg {
                        Expression::Column(Some(q), _) => Some(q.clone()),
                        _ => None,
                    });
                    (render_function(name, args), qualifier)
                }
                Expression::Literal(_) | Expression::Parameter(_) => continue,
                Expression::Subquery(_) => {
                    self.facts.has_subquery = true;
                    continue;
                }
                other => (render_expr(other), None),
            };

            let table_index = qualifier
                .map(|q| self.resolve(&q))
                .and_then(|t| self.facts.tables.iter().position(|ta| ta.table == t))
                .unwrap_or(0);
            if let Some(table) = self.facts.tables.get_mut(table_index) {
                if !table.columns.contains(&column) {
                    table.columns.push(column);
                }
            }
        }
    }
}

/// Flattens a WHERE subtree into the condition list. AND/OR branches are
/// concatenated; leaves convert 1-to-1; subquery operators raise the
/// flag instead of producing conditions; unrecognized leaves are dropped
/// (fewer cached conditions only ever make invalidation more eager).
fn flatten_conditions(expr: &Expression, out: &mut Vec<Condition>, has_subquery: &mut bool) {
    let op = match expr {
        Expression::Operator(op) => op,
        Expression::Subquery(_) => {
            *has_subquery = true;
            return;
        }
        _ => return,
    };

    match op {
        Operator::And(lhs, rhs) | Operator::Or(lhs, rhs) => {
            flatten_conditions(lhs, out, has_subquery);
            flatten_conditions(rhs, out, has_subquery);
        }

        Operator::Not(inner) => match inner.as_ref() {
            Expression::Operator(Operator::Is(expr, Literal::Null)) => {
                if let Some(column) = column_name(expr) {
                    out.push(Condition::new(column, CondOp::IsNotNull, None));
                }
            }
            Expression::Operator(Operator::Exists { .. }) => {
                *has_subquery = true;
                out.push(Condition::new("EXISTS", CondOp::NotExists, None));
            }
            _ => {}
        },

        Operator::Equal(lhs, rhs) => {
            if let Some((column, value)) = column_and_literal(lhs, rhs) {
                // `col = NULL` is canonicalized with the IS NULL form.
                if value.is_null() {
                    out.push(Condition::new(column, CondOp::IsNull, None));
                } else {
                    out.push(Condition::new(column, CondOp::Eq, Some(value)));
                }
            } else if lhs.contains_subquery() || rhs.contains_subquery() {
                *has_subquery = true;
            }
        }
        Operator::NotEqual(lhs, rhs) => {
            if let Some((column, value)) = column_and_literal(lhs, rhs) {
                if value.is_null() {
                    out.push(Condition::new(column, CondOp::IsNotNull, None));
                } else {
                    out.push(Condition::new(column, CondOp::Ne, Some(value)));
                }
            } else if lhs.contains_subquery() || rhs.contains_subquery() {
                *has_subquery = true;
            }
        }
        Operator::GreaterThan(lhs, rhs) => {
            push_comparison(lhs, rhs, CondOp::Gt, CondOp::Lt, out, has_subquery)
        }
        Operator::GreaterThanOrEqual(lhs, rhs) => {
            push_comparison(lhs, rhs, CondOp::Ge, CondOp::Le, out, has_subquery)
        }
        Operator::LessThan(lhs, rhs) => {
            push_comparison(lhs, rhs, CondOp::Lt, CondOp::Gt, out, has_subquery)
        }
        Operator::LessThanOrEqual(lhs, rhs) => {
            push_comparison(lhs, rhs, CondOp::Le, CondOp::Ge, out, has_subquery)
        }

        Operator::Is(expr, Literal::Null) => {
            if let Some(column) = column_name(expr) {
                out.push(Condition::new(column, CondOp::IsNull, None));
            }
        }
        Operator::Is(_, _) => {}

        Operator::Like {
            expr,
            pattern,
            negated,
        } => {
            if let Some(column) = column_name(expr) {
                let op = if *negated { CondOp::NotLike } else { CondOp::Like };
                out.push(Condition::new(column, op, literal_value(pattern)));
            }
        }

        Operator::InList {
            expr,
            list,
            negated,
        } => {
            if let Some(column) = column_name(expr) {
                let values: Vec<Value> = list.iter().filter_map(literal_value).collect();
                let op = if *negated { CondOp::NotIn } else { CondOp::In };
                out.push(Condition::new(column, op, Some(Value::List(values))));
            }
        }

        Operator::InSubquery { .. } => {
            *has_subquery = true;
        }

        Operator::Between {
            expr,
            low,
            high,
            negated,
        } => {
            if let (Some(column), Some(low), Some(high)) =
                (column_name(expr), literal_value(low), literal_value(high))
            {
                let op = if *negated {
                    CondOp::NotBetween
                } else {
                    CondOp::Between
                };
                out.push(Condition::new(column, op, Some(Value::List(vec![low, high]))));
            }
        }

        Operator::Exists { negated, .. } => {
            *has_subquery = true;
            let op = if *negated {
                CondOp::NotExists
            } else {
                CondOp::Exists
            };
            out.push(Condition::new("EXISTS", op, None));
        }

        _ => {
            if expr.contains_subquery() {
                *has_subquery = true;
            }
        }
    }
}

/// Pushes a comparison condition, flipping the operator when the literal
/// is on the left (`5 < price` means `price > 5`).
fn push_comparison(
    lhs: &Expression,
    rhs: &Expression,
    op: CondOp,
    flipped: CondOp,
    out: &mut Vec<Condition>,
    has_subquery: &mut bool,
) {
    if let (Some(column), Some(value)) = (column_name(lhs), literal_value(rhs)) {
        out.push(Condition::new(column, op, Some(value)));
    } else if let (Some(value), Some(column)) = (literal_value(lhs), column_name(rhs)) {
        out.push(Condition::new(column, flipped, Some(value)));
    } else if lhs.contains_subquery() || rhs.contains_subquery() {
        *has_subquery = true;
    }
}

/// The column name of a reference, qualifier dropped.
fn column_name(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Column(_, name) => Some(name.clone()),
        _ => None,
    }
}

/// Extracts (column, literal) from either orientation of a binary
/// comparison.
fn column_and_literal(lhs: &Expression, rhs: &Expression) -> Option<(String, Value)> {
    if let (Some(column), Some(value)) = (column_name(lhs), literal_value(rhs)) {
        return Some((column, value));
    }
    if let (Some(column), Some(value)) = (column_name(rhs), literal_value(lhs)) {
        return Some((column, value));
    }
    None
}

fn literal_value(expr: &Expression) -> Option<Value> {
    match expr {
        Expression::Literal(lit) => Some(literal_to_value(lit)),
        // Negated numeric literals arrive as a Negate node.
        Expression::Operator(Operator::Negate(inner)) => match inner.as_ref() {
            Expression::Literal(Literal::Integer(i)) => Some(Value::Int(-i)),
            Expression::Literal(Literal::Float(f)) => Some(Value::Float(-f)),
            _ => None,
        },
        _ => None,
    }
}

fn literal_to_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Boolean(b) => Value::Bool(*b),
        Literal::Integer(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::Str(s.clone()),
    }
}

fn extract_order_by(order_by: &[(Expression, Direction)]) -> Vec<OrderBy> {
    order_by
        .iter()
        .map(|(expr, direction)| OrderBy {
            column: match expr {
                Expression::Column(_, name) => name.clone(),
                other => render_expr(other),
            },
            order: match direction {
                Direction::Asc => SortOrder::Asc,
                Direction::Desc => SortOrder::Desc,
            },
        })
        .collect()
}

fn literal_u64(expr: &Option<Expression>) -> Option<u64> {
    match expr {
        Some(Expression::Literal(Literal::Integer(i))) if *i >= 0 => Some(*i as u64),
        _ => None,
    }
}

/// Aggregate function names, including the `_DISTINCT` forms the parser
/// synthesizes for `COUNT(DISTINCT x)`.
fn is_aggregate_fn(name: &str) -> bool {
    let upper = name.to_uppercase();
    let base = upper.strip_suffix("_DISTINCT").unwrap_or(&upper);
    matches!(base, "COUNT" | "SUM" | "AVG" | "MIN" | "MAX")
}

/// Renders a select-list function as a stable string, e.g. `COUNT(*)`
/// or `SUM(price)`.
fn render_function(name: &str, args: &[Expression]) -> String {
    let args: Vec<String> = args.iter().map(render_expr).collect();
    format!("{}({})", name.to_uppercase(), args.join(","))
}

/// Compact rendering of a select-list expression.
fn render_expr(expr: &Expression) -> String {
    match expr {
        Expression::All | Expression::QualifiedWildcard(_) => "*".to_string(),
        Expression::Column(_, name) => name.clone(),
        Expression::Literal(lit) => literal_to_value(lit).repr(),
        Expression::Function(name, args) => render_function(name, args),
        Expression::Parameter(_) => "?".to_string(),
        Expression::Subquery(_) => "(subquery)".to_string(),
        Expression::Operator(op) => match op {
            Operator::Add(l, r) => format!("{}+{}", render_expr(l), render_expr(r)),
            Operator::Subtract(l, r) => format!("{}-{}", render_expr(l), render_expr(r)),
            Operator::Multiply(l, r) => format!("{}*{}", render_expr(l), render_expr(r)),
            Operator::Divide(l, r) => format!("{}/{}", render_expr(l), render_expr(r)),
            Operator::Remainder(l, r) => format!("{}%{}", render_expr(l), render_expr(r)),
            Operator::Negate(e) => format!("-{}", render_expr(e)),
            Operator::Identity(e) => render_expr(e),
            _ => "expr".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::parse_sql;

    fn facts(sql: &str) -> SelectFacts {
        match parse_sql(sql).unwrap() {
            Statement::Select(select) => extract_select(&select).unwrap(),
            other => panic!("expected SELECT, got {:?}", other),
        }
    }

    fn write(sql: &str) -> WriteInfo {
        extract_write(&parse_sql(sql).unwrap()).unwrap()
    }

    #[test]
    fn test_extract_single_table() {
        let facts = facts("SELECT name, email FROM users WHERE id = 10 AND age > 21");
        assert_eq!(facts.tables.len(), 1);
        let table = &facts.tables[0];
        assert_eq!(table.table, "users");
        assert_eq!(table.columns, vec!["name", "email"]);
        assert_eq!(table.conditions.len(), 2);
        assert_eq!(table.conditions[0], Condition::new("id", CondOp::Eq, Some(Value::Int(10))));
        assert_eq!(
            table.conditions[1],
            Condition::new("age", CondOp::Gt, Some(Value::Int(21)))
        );
    }

    #[test]
    fn test_extract_join() {
        let facts = facts(
            "SELECT u.name, o.total FROM users u JOIN orders o ON u.id = o.user_id \
             WHERE o.status = 'open'",
        );
        assert_eq!(facts.tables.len(), 2);
        assert_eq!(facts.tables[0].table, "users");
        assert_eq!(facts.tables[1].table, "orders");
        // Columns are attributed per table; conditions pool on the anchor.
        assert_eq!(facts.tables[0].columns, vec!["name"]);
        assert_eq!(facts.tables[1].columns, vec!["total"]);
        assert_eq!(facts.tables[0].join_conditions.len(), 1);
        let join = &facts.tables[0].join_conditions[0];
        assert_eq!(join.left_table, "users");
        assert_eq!(join.right_table, "orders");
        assert_eq!(join.right_column, "user_id");
        assert_eq!(facts.tables[0].conditions.len(), 1);
        assert_eq!(facts.tables[0].conditions[0].column, "status");
        assert!(facts.tables[1].conditions.is_empty());
    }

    #[test]
    fn test_extract_between_and_in() {
        let facts =
            facts("SELECT * FROM t WHERE a BETWEEN 1 AND 5 AND b IN (1, 2, 3) AND c IS NULL");
        let conds = &facts.tables[0].conditions;
        assert_eq!(conds[0].operator, CondOp::Between);
        assert_eq!(
            conds[0].value,
            Some(Value::List(vec![Value::Int(1), Value::Int(5)]))
        );
        assert_eq!(conds[1].operator, CondOp::In);
        assert_eq!(conds[2].operator, CondOp::IsNull);
        assert_eq!(conds[2].value, None);
    }

    #[test]
    fn test_extract_subquery_flags() {
        let in_subquery = facts("SELECT * FROM users WHERE id IN (SELECT user_id FROM orders)");
        assert!(in_subquery.has_subquery);

        let exists = facts("SELECT * FROM users WHERE EXISTS (SELECT 1 FROM orders)");
        assert!(exists.has_subquery);
        assert_eq!(exists.tables[0].conditions[0].column, "EXISTS");
    }

    #[test]
    fn test_extract_set_operation_tail_clauses() {
        let facts =
            facts("SELECT id FROM a UNION SELECT id FROM b ORDER BY id DESC LIMIT 10 OFFSET 2");
        assert_eq!(facts.set_operation, Some(SetOperation::Union));
        assert_eq!(facts.tables.len(), 2);
        assert_eq!(facts.order_by.len(), 1);
        assert_eq!(facts.order_by[0].order, SortOrder::Desc);
        assert_eq!(facts.limit, Some(10));
        assert_eq!(facts.offset, Some(2));
    }

    #[test]
    fn test_extract_aggregate_flag() {
        let facts = facts("SELECT COUNT(*) FROM users WHERE created_at >= '2024-01-01'");
        assert!(facts.has_aggregate);
        assert_eq!(facts.tables[0].columns, vec!["COUNT(*)"]);
    }

    #[test]
    fn test_extract_update_write() {
        let info = write("UPDATE users SET email = 'x@y', name = 'X' WHERE id = 10");
        assert_eq!(info.operation, WriteOp::Update);
        assert_eq!(info.table, "users");
        assert_eq!(info.modified_columns, vec!["email", "name"]);
        assert_eq!(info.affected_rows, vec!["10"]);
        assert_eq!(info.conditions.len(), 1);
    }

    #[test]
    fn test_extract_delete_write_in_rows() {
        let info = write("DELETE FROM users WHERE id IN (1, 2, 3)");
        assert_eq!(info.operation, WriteOp::Delete);
        assert_eq!(info.affected_rows, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_extract_insert_write() {
        let info = write("INSERT INTO users (id, name) VALUES (99, 'New')");
        assert_eq!(info.operation, WriteOp::Insert);
        assert!(info.affected_rows.is_empty());
        assert!(info.modified_columns.is_empty());
    }

    #[test]
    fn test_flipped_comparison() {
        let facts = facts("SELECT * FROM t WHERE 5 < price");
        let cond = &facts.tables[0].conditions[0];
        assert_eq!(cond.column, "price");
        assert_eq!(cond.operator, CondOp::Gt);
        assert_eq!(cond.value, Some(Value::Int(5)));
    }

    #[test]
    fn test_derived_table_contributes_base_tables() {
        let facts = facts("SELECT * FROM (SELECT id FROM orders) o WHERE id = 1");
        assert!(facts.has_subquery);
        assert_eq!(facts.tables[0].table, "orders");
    }
}
