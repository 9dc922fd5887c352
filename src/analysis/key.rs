//! The semantic descriptors the cache operates on
//!
//! A `CacheKey` is the full semantic description of a cacheable SELECT,
//! used both for keying and for precise invalidation. A `WriteInfo` is
//! the corresponding description of an INSERT/UPDATE/DELETE. Serde names
//! are camelCase so the stored `cacheKeyJson` and the HTTP responses use
//! one vocabulary.

use crate::analysis::fingerprint;
use crate::types::Value;
use serde::{Deserialize, Serialize};

/// Condition operators recovered from WHERE clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CondOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "NOT LIKE")]
    NotLike,
    #[serde(rename = "BETWEEN")]
    Between,
    #[serde(rename = "NOT BETWEEN")]
    NotBetween,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
    #[serde(rename = "EXISTS")]
    Exists,
    #[serde(rename = "NOT EXISTS")]
    NotExists,
}

/// A single predicate on a column. `value` is a scalar, a list (IN), a
/// two-element list (BETWEEN), or absent (null-tests, EXISTS).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub column: String,
    pub operator: CondOp,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<Value>,
}

impl Condition {
    pub fn new(column: impl Into<String>, operator: CondOp, value: Option<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
        }
    }

    /// True for the operators row overlap understands.
    pub fn is_equality_or_in(&self) -> bool {
        matches!(self.operator, CondOp::Eq | CondOp::In)
    }
}

/// Join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// A structurally captured equi-join `a.x = b.y`. Table names are
/// resolved from aliases at extraction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinCondition {
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
    pub join_type: JoinType,
}

/// One table referenced by a SELECT, with the columns it projects. For
/// multi-table queries, the first table owns the aggregated condition
/// and join-condition sets so downstream analysis has a single anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableAccess {
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub alias: Option<String>,
    pub columns: Vec<String>,
    pub conditions: Vec<Condition>,
    pub join_conditions: Vec<JoinCondition>,
}

impl TableAccess {
    pub fn new(table: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            table: table.into(),
            alias,
            columns: Vec::new(),
            conditions: Vec::new(),
            join_conditions: Vec::new(),
        }
    }
}

/// Query classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "row-lookup")]
    RowLookup,
    #[serde(rename = "aggregate")]
    Aggregate,
    #[serde(rename = "join")]
    Join,
    #[serde(rename = "complex")]
    Complex,
}

/// Set operations combining SELECT branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOperation {
    #[serde(rename = "UNION")]
    Union,
    #[serde(rename = "UNION_ALL")]
    UnionAll,
    #[serde(rename = "INTERSECT")]
    Intersect,
    #[serde(rename = "EXCEPT")]
    Except,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub order: SortOrder,
}

/// The full semantic descriptor of a cacheable SELECT. Immutable once
/// built; the fingerprint is computed from the frozen builder state, so
/// nothing can mutate between fingerprinting and storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub tables: Vec<TableAccess>,
    pub classification: Classification,
    pub normalized_sql: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub order_by: Vec<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub has_subquery: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub set_operation: Option<SetOperation>,
    pub fingerprint: String,
}

impl CacheKey {
    /// The anchor table owning the aggregated condition sets.
    pub fn anchor(&self) -> Option<&TableAccess> {
        self.tables.first()
    }
}

/// Builder that freezes all key fields before the fingerprint is
/// computed.
#[derive(Debug, Default)]
pub struct CacheKeyBuilder {
    pub tables: Vec<TableAccess>,
    pub classification: Option<Classification>,
    pub normalized_sql: String,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub distinct: bool,
    pub has_subquery: bool,
    pub set_operation: Option<SetOperation>,
}

impl CacheKeyBuilder {
    /// Finalizes the key, computing the fingerprint from the frozen
    /// fields.
    pub fn finish(self) -> CacheKey {
        let classification = self.classification.unwrap_or(Classification::Complex);
        let fingerprint = fingerprint::compute(
            &self.tables,
            classification,
            &self.order_by,
            self.limit,
            self.offset,
            self.distinct,
            self.has_subquery,
            self.set_operation,
        );
        CacheKey {
            tables: self.tables,
            classification,
            normalized_sql: self.normalized_sql,
            order_by: self.order_by,
            limit: self.limit,
            offset: self.offset,
            distinct: self.distinct,
            has_subquery: self.has_subquery,
            set_operation: self.set_operation,
            fingerprint,
        }
    }
}

/// Write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteOp {
    Insert,
    Update,
    Delete,
}

/// The semantic descriptor of a write statement. `affected_rows` is
/// populated only when row identifiers are recoverable from equality or
/// IN conditions on an id/uuid column; `modified_columns` only for
/// UPDATE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteInfo {
    pub table: String,
    pub operation: WriteOp,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub affected_rows: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub modified_columns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub conditions: Vec<Condition>,
}
