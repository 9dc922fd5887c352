//! Abstract Syntax Tree for the DML subset the analyzer understands
//!
//! The statement is the root node, describing the syntactic structure of
//! a SQL statement. The parser only ensures the syntax is well-formed;
//! attributing columns to tables and deriving cache semantics is the
//! extractor's job.

use std::collections::BTreeMap;

/// SQL statements. DDL and transaction-control statements are rejected
/// by the parser: the cache only analyzes reads and row writes.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Box<SelectStatement>),
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        source: InsertSource,
    },
    Update {
        table: String,
        set: BTreeMap<String, Option<Expression>>,
        r#where: Option<Expression>,
    },
    Delete {
        table: String,
        r#where: Option<Expression>,
    },
}

/// Source of data for INSERT statements.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    /// VALUES: explicit rows to insert.
    Values(Vec<Vec<Expression>>),
    /// INSERT ... SELECT.
    Select(Box<SelectStatement>),
    /// DEFAULT VALUES.
    DefaultValues,
}

/// A SELECT statement. A set-operation tail chains the next branch of a
/// compound query, so `A UNION B UNION C` nests rightward.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub distinct: bool,
    /// Expressions to select, with an optional column alias.
    pub select: Vec<(Expression, Option<String>)>,
    pub from: Vec<FromClause>,
    pub r#where: Option<Expression>,
    pub group_by: Vec<Expression>,
    pub having: Option<Expression>,
    pub order_by: Vec<(Expression, Direction)>,
    pub offset: Option<Expression>,
    pub limit: Option<Expression>,
    pub set_op: Option<(SetOperator, Box<SelectStatement>)>,
}

/// Set operators chaining SELECT branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    Except,
}

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Cross,
    Inner,
    Left,
    Right,
    Full,
}

/// A FROM item.
#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    /// A table, optionally aliased.
    Table { name: String, alias: Option<String> },
    /// A derived table; the alias is required.
    Subquery {
        select: Box<SelectStatement>,
        alias: String,
    },
    /// A join of two FROM items, possibly nested.
    Join {
        left: Box<FromClause>,
        right: Box<FromClause>,
        join_type: JoinType,
        /// The ON condition. None for CROSS JOIN.
        predicate: Option<Expression>,
    },
}

/// SQL expressions, e.g. `a + 7 > b`. Can be nested.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// All columns, i.e. `*`.
    All,
    /// All columns of one table, i.e. `t.*`.
    QualifiedWildcard(String),
    /// A column reference, optionally qualified with a table name.
    Column(Option<String>, String),
    /// A literal value.
    Literal(Literal),
    /// A function call (name and arguments).
    Function(String, Vec<Expression>),
    /// An operator.
    Operator(Operator),
    /// A parameter placeholder (`?`), with its 0-indexed position.
    Parameter(usize),
    /// A scalar subquery.
    Subquery(Box<SelectStatement>),
}

/// Expression literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Expression operators.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),

    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterThanOrEqual(Box<Expression>, Box<Expression>),
    LessThan(Box<Expression>, Box<Expression>),
    LessThanOrEqual(Box<Expression>, Box<Expression>),

    /// `a IS NULL`; `IS NOT NULL` is `Not(Is(..))`.
    Is(Box<Expression>, Literal),

    Like {
        expr: Box<Expression>,
        pattern: Box<Expression>,
        negated: bool,
    },
    InList {
        expr: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expression>,
        subquery: Box<SelectStatement>,
        negated: bool,
    },
    Between {
        expr: Box<Expression>,
        low: Box<Expression>,
        high: Box<Expression>,
        negated: bool,
    },
    Exists {
        subquery: Box<SelectStatement>,
        negated: bool,
    },

    Add(Box<Expression>, Box<Expression>),
    Subtract(Box<Expression>, Box<Expression>),
    Multiply(Box<Expression>, Box<Expression>),
    Divide(Box<Expression>, Box<Expression>),
    Remainder(Box<Expression>, Box<Expression>),
    Negate(Box<Expression>),
    Identity(Box<Expression>),
}

impl From<Literal> for Expression {
    fn from(literal: Literal) -> Self {
        Expression::Literal(literal)
    }
}

impl From<Operator> for Expression {
    fn from(operator: Operator) -> Self {
        Expression::Operator(operator)
    }
}

impl Expression {
    /// Walks the expression tree depth-first, calling a closure for every
    /// node. Halts and returns false if the closure returns false.
    /// Subquery nodes are visited but not descended into; callers that
    /// care about subqueries inspect the node itself.
    pub fn walk(&self, visitor: &mut impl FnMut(&Expression) -> bool) -> bool {
        use Operator::*;

        if !visitor(self) {
            return false;
        }

        match self {
            Self::Operator(op) => match op {
                Add(lhs, rhs)
                | And(lhs, rhs)
                | Divide(lhs, rhs)
                | Equal(lhs, rhs)
                | GreaterThan(lhs, rhs)
                | GreaterThanOrEqual(lhs, rhs)
                | LessThan(lhs, rhs)
                | LessThanOrEqual(lhs, rhs)
                | Multiply(lhs, rhs)
                | NotEqual(lhs, rhs)
                | Or(lhs, rhs)
                | Remainder(lhs, rhs)
                | Subtract(lhs, rhs) => lhs.walk(visitor) && rhs.walk(visitor),

                Identity(expr) | Is(expr, _) | Negate(expr) | Not(expr) => expr.walk(visitor),

                Like { expr, pattern, .. } => expr.walk(visitor) && pattern.walk(visitor),

                InList { expr, list, .. } => {
                    expr.walk(visitor) && list.iter().all(|e| e.walk(visitor))
                }

                InSubquery { expr, .. } => expr.walk(visitor),

                Between {
                    expr, low, high, ..
                } => expr.walk(visitor) && low.walk(visitor) && high.walk(visitor),

                Exists { .. } => true,
            },

            Self::Function(_, exprs) => exprs.iter().all(|expr| expr.walk(visitor)),

            _ => true,
        }
    }

    /// True if this expression contains a subquery anywhere: a scalar
    /// subquery, `IN (SELECT ...)`, or `EXISTS (SELECT ...)`.
    pub fn contains_subquery(&self) -> bool {
        !self.walk(&mut |expr| {
            !matches!(
                expr,
                Expression::Subquery(_)
                    | Expression::Operator(Operator::InSubquery { .. })
                    | Expression::Operator(Operator::Exists { .. })
            )
        })
    }
}
