//! SQL parsing
//!
//! Parses raw SQL strings into a structured Abstract Syntax Tree. The
//! dialect is MySQL-compatible (backtick identifier quoting, `LIMIT n`
//! and `LIMIT offset, n`). Only the statements the cache analyzes are
//! accepted: SELECT, INSERT, UPDATE, and DELETE.

pub mod ast;
mod lexer;
mod parser;

use crate::error::Result;

pub use ast::{
    Direction, Expression, FromClause, InsertSource, JoinType, Literal, Operator,
    SelectStatement, SetOperator, Statement,
};
pub use lexer::{Keyword, Lexer, Token};
pub use parser::Parser;

/// Parse a SQL string into a statement AST. When the input contains a
/// statement batch, the first statement is taken.
pub fn parse_sql(sql: &str) -> Result<Statement> {
    Parser::parse(sql)
}
