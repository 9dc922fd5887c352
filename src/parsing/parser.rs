//! SQL parser
//!
//! A recursive-descent parser over the lexer's tokens, producing the AST
//! in `ast`. Only the DML subset the cache analyzes is accepted: SELECT
//! (with joins, subqueries, and set operations), INSERT, UPDATE, and
//! DELETE. Expressions are parsed with precedence climbing.

use super::ast::{
    Direction, Expression, FromClause, InsertSource, JoinType, Literal, Operator,
    SelectStatement, SetOperator, Statement,
};
use super::lexer::{Keyword, Lexer, Token};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::iter::Peekable;

/// Operator precedence.
type Precedence = u8;

/// Operator associativity. Left-associative operators bind tighter to
/// their left-hand side, so they bump the minimum precedence by one.
enum Associativity {
    Left,
    Right,
}

impl Associativity {
    fn next_precedence(&self, precedence: Precedence) -> Precedence {
        match self {
            Associativity::Left => precedence + 1,
            Associativity::Right => precedence,
        }
    }
}

/// Prefix operators.
enum PrefixOperator {
    Minus,
    Not,
    Plus,
}

impl PrefixOperator {
    fn precedence(&self) -> Precedence {
        match self {
            Self::Not => 3,
            Self::Minus | Self::Plus => 10,
        }
    }

    fn into_expression(self, rhs: Expression) -> Expression {
        let rhs = Box::new(rhs);
        match self {
            Self::Plus => Operator::Identity(rhs).into(),
            Self::Minus => Operator::Negate(rhs).into(),
            Self::Not => Operator::Not(rhs).into(),
        }
    }
}

/// Infix operators.
enum InfixOperator {
    Add,
    And,
    Divide,
    Equal,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    Multiply,
    NotEqual,
    Or,
    Remainder,
    Subtract,
}

impl InfixOperator {
    /// Mostly follows Postgres, with IS and LIKE at the same precedence
    /// as `=`, similar to SQLite and MySQL.
    fn precedence(&self) -> Precedence {
        match self {
            Self::Or => 1,
            Self::And => 2,
            // NOT is 3
            Self::Equal | Self::NotEqual | Self::Like => 4,
            Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual => 5,
            Self::Add | Self::Subtract => 6,
            Self::Multiply | Self::Divide | Self::Remainder => 7,
        }
    }

    fn associativity(&self) -> Associativity {
        Associativity::Left
    }

    fn into_expression(self, lhs: Expression, rhs: Expression) -> Expression {
        let (lhs, rhs) = (Box::new(lhs), Box::new(rhs));
        match self {
            Self::Add => Operator::Add(lhs, rhs).into(),
            Self::And => Operator::And(lhs, rhs).into(),
            Self::Divide => Operator::Divide(lhs, rhs).into(),
            Self::Equal => Operator::Equal(lhs, rhs).into(),
            Self::GreaterThan => Operator::GreaterThan(lhs, rhs).into(),
            Self::GreaterThanOrEqual => Operator::GreaterThanOrEqual(lhs, rhs).into(),
            Self::LessThan => Operator::LessThan(lhs, rhs).into(),
            Self::LessThanOrEqual => Operator::LessThanOrEqual(lhs, rhs).into(),
            Self::Like => Operator::Like {
                expr: lhs,
                pattern: rhs,
                negated: false,
            }
            .into(),
            Self::Multiply => Operator::Multiply(lhs, rhs).into(),
            Self::NotEqual => Operator::NotEqual(lhs, rhs).into(),
            Self::Or => Operator::Or(lhs, rhs).into(),
            Self::Remainder => Operator::Remainder(lhs, rhs).into(),
            Self::Subtract => Operator::Subtract(lhs, rhs).into(),
        }
    }
}

/// Postfix operators: IS [NOT] NULL, [NOT] IN, [NOT] BETWEEN, NOT LIKE.
/// They all share the `=` precedence level.
const POSTFIX_PRECEDENCE: Precedence = 4;

/// The SQL parser takes tokens from the lexer and builds the AST.
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
    /// Counter for parameter placeholders (`?`).
    param_count: usize,
}

impl Parser<'_> {
    /// Parses the input into a statement AST. When the input is a batch,
    /// the first statement is taken and the remainder is ignored; the
    /// statement must still end at a semicolon or the end of input.
    pub fn parse(statement: &str) -> Result<Statement> {
        let mut parser = Parser::new(statement);
        let statement = parser.parse_statement()?;
        match parser.peek()? {
            None | Some(Token::Semicolon) => Ok(statement),
            Some(token) => Err(Error::ParseFailed(format!("unexpected token {}", token))),
        }
    }

    fn new(input: &str) -> Parser<'_> {
        Parser {
            lexer: Lexer::new(input).peekable(),
            param_count: 0,
        }
    }

    /// Fetches the next lexer token, or errors if none is found.
    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .transpose()?
            .ok_or_else(|| Error::ParseFailed("unexpected end of input".into()))
    }

    /// Returns the next identifier, or errors if not found.
    fn next_ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) => Ok(ident),
            token => Err(Error::ParseFailed(format!(
                "expected identifier, found {}",
                token
            ))),
        }
    }

    /// Returns the next lexer token if it satisfies the predicate.
    fn next_if(&mut self, predicate: impl Fn(&Token) -> bool) -> Option<Token> {
        self.peek().ok()?.filter(|&t| predicate(t))?;
        self.next().ok()
    }

    /// Passes the next lexer token through the closure, consuming it if
    /// the closure returns Some.
    fn next_if_map<T>(&mut self, f: impl Fn(&Token) -> Option<T>) -> Option<T> {
        let value = f(self.peek().ok()??)?;
        self.next().ok()?;
        Some(value)
    }

    /// Consumes the next lexer token if it is the given token.
    fn next_is(&mut self, token: Token) -> bool {
        self.next_if(|t| t == &token).is_some()
    }

    /// Consumes the next lexer token if it's the expected token, or errors.
    fn expect(&mut self, expect: Token) -> Result<()> {
        let token = self.next()?;
        if token != expect {
            return Err(Error::ParseFailed(format!(
                "expected {}, found {}",
                expect, token
            )));
        }
        Ok(())
    }

    /// Peeks the next lexer token if any, without consuming it.
    fn peek(&mut self) -> Result<Option<&Token>> {
        self.lexer
            .peek()
            .map(|result| result.as_ref().map(Some).map_err(|e| e.clone()))
            .unwrap_or(Ok(None))
    }

    /// Parses a SQL statement.
    fn parse_statement(&mut self) -> Result<Statement> {
        match self.peek()?.cloned() {
            Some(Token::Keyword(Keyword::Select)) => {
                Ok(Statement::Select(Box::new(self.parse_select_statement()?)))
            }
            Some(Token::Keyword(Keyword::Insert)) => self.parse_insert(),
            Some(Token::Keyword(Keyword::Update)) => self.parse_update(),
            Some(Token::Keyword(Keyword::Delete)) => self.parse_delete(),
            Some(token) => Err(Error::Unsupported(format!(
                "statement starting with {}",
                token
            ))),
            None => Err(Error::ParseFailed("empty statement".into())),
        }
    }

    /// Parses a SELECT statement, including any set-operation tail.
    /// ORDER BY / LIMIT / OFFSET trailing a compound query attach to the
    /// final branch.
    fn parse_select_statement(&mut self) -> Result<SelectStatement> {
        let (distinct, select) = self.parse_select_clause()?;
        let from = self.parse_from_clause()?;
        let r#where = self.parse_where_clause()?;
        let group_by = self.parse_group_by_clause()?;
        let having = self.parse_having_clause()?;

        let mut statement = SelectStatement {
            distinct,
            select,
            from,
            r#where,
            group_by,
            having,
            order_by: Vec::new(),
            offset: None,
            limit: None,
            set_op: None,
        };

        if let Some(op) = self.parse_set_operator() {
            statement.set_op = Some((op, Box::new(self.parse_select_statement()?)));
        } else {
            statement.order_by = self.parse_order_by_clause()?;
            let (offset, limit) = self.parse_limit_offset_clause()?;
            statement.offset = offset;
            statement.limit = limit;
        }
        Ok(statement)
    }

    /// Parses a set operator, if present.
    fn parse_set_operator(&mut self) -> Option<SetOperator> {
        if self.next_is(Keyword::Union.into()) {
            if self.next_is(Keyword::All.into()) {
                return Some(SetOperator::UnionAll);
            }
            return Some(SetOperator::Union);
        }
        if self.next_is(Keyword::Intersect.into()) {
            return Some(SetOperator::Intersect);
        }
        if self.next_is(Keyword::Except.into()) {
            return Some(SetOperator::Except);
        }
        None
    }

    /// Parses a SELECT clause: the keyword, an optional DISTINCT, and the
    /// select expressions with their aliases.
    fn parse_select_clause(&mut self) -> Result<(bool, Vec<(Expression, Option<String>)>)> {
        self.expect(Keyword::Select.into())?;
        let distinct = if self.next_is(Keyword::Distinct.into()) {
            true
        } else {
            self.next_is(Keyword::All.into());
            false
        };

        let mut select = Vec::new();
        loop {
            let expr = self.parse_expression()?;
            let mut alias = None;
            if self.next_is(Keyword::As.into()) || matches!(self.peek()?, Some(Token::Ident(_))) {
                if expr == Expression::All {
                    return Err(Error::ParseFailed("can't alias *".into()));
                }
                alias = Some(self.next_ident()?);
            }
            select.push((expr, alias));
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        Ok((distinct, select))
    }

    /// Parses a FROM clause, if present. Comma-separated tables become
    /// cross joins.
    fn parse_from_clause(&mut self) -> Result<Vec<FromClause>> {
        if !self.next_is(Keyword::From.into()) {
            return Ok(Vec::new());
        }
        let mut from_item = self.parse_from_table()?;
        loop {
            if let Some(join_type) = self.parse_from_join()? {
                let left = Box::new(from_item);
                let right = Box::new(self.parse_from_table()?);
                let mut predicate = None;
                if join_type != JoinType::Cross && self.next_is(Keyword::On.into()) {
                    predicate = Some(self.parse_expression()?);
                }
                from_item = FromClause::Join {
                    left,
                    right,
                    join_type,
                    predicate,
                };
            } else if self.next_is(Token::Comma) {
                let left = Box::new(from_item);
                let right = Box::new(self.parse_from_table()?);
                from_item = FromClause::Join {
                    left,
                    right,
                    join_type: JoinType::Cross,
                    predicate: None,
                };
            } else {
                break;
            }
        }
        Ok(vec![from_item])
    }

    /// Parses a FROM table or derived table.
    fn parse_from_table(&mut self) -> Result<FromClause> {
        if self.next_is(Token::OpenParen) {
            if self.peek()? != Some(&Token::Keyword(Keyword::Select)) {
                return Err(Error::ParseFailed(
                    "expected SELECT after ( in FROM clause".into(),
                ));
            }
            let select = Box::new(self.parse_select_statement()?);
            self.expect(Token::CloseParen)?;
            self.next_is(Keyword::As.into());
            let alias = self.next_ident().map_err(|_| {
                Error::ParseFailed("derived table requires an alias".into())
            })?;
            return Ok(FromClause::Subquery { select, alias });
        }

        let name = self.next_ident()?;
        if self.next_is(Token::Period) {
            return Err(Error::Unsupported("qualified table names".into()));
        }
        let mut alias = None;
        if self.next_is(Keyword::As.into()) || matches!(self.peek()?, Some(Token::Ident(_))) {
            alias = Some(self.next_ident()?);
        }
        Ok(FromClause::Table { name, alias })
    }

    /// Parses a FROM JOIN type, if present.
    fn parse_from_join(&mut self) -> Result<Option<JoinType>> {
        if self.next_is(Keyword::Join.into()) {
            return Ok(Some(JoinType::Inner));
        }
        if self.next_is(Keyword::Cross.into()) {
            self.expect(Keyword::Join.into())?;
            return Ok(Some(JoinType::Cross));
        }
        if self.next_is(Keyword::Inner.into()) {
            self.expect(Keyword::Join.into())?;
            return Ok(Some(JoinType::Inner));
        }
        if self.next_is(Keyword::Left.into()) {
            self.next_is(Keyword::Outer.into());
            self.expect(Keyword::Join.into())?;
            return Ok(Some(JoinType::Left));
        }
        if self.next_is(Keyword::Right.into()) {
            self.next_is(Keyword::Outer.into());
            self.expect(Keyword::Join.into())?;
            return Ok(Some(JoinType::Right));
        }
        if self.next_is(Keyword::Full.into()) {
            self.next_is(Keyword::Outer.into());
            self.expect(Keyword::Join.into())?;
            return Ok(Some(JoinType::Full));
        }
        Ok(None)
    }

    /// Parses a WHERE clause, if present.
    fn parse_where_clause(&mut self) -> Result<Option<Expression>> {
        if !self.next_is(Keyword::Where.into()) {
            return Ok(None);
        }
        Ok(Some(self.parse_expression()?))
    }

    /// Parses a GROUP BY clause, if present.
    fn parse_group_by_clause(&mut self) -> Result<Vec<Expression>> {
        if !self.next_is(Keyword::Group.into()) {
            return Ok(Vec::new());
        }
        self.expect(Keyword::By.into())?;
        let mut group_by = Vec::new();
        loop {
            group_by.push(self.parse_expression()?);
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        Ok(group_by)
    }

    /// Parses a HAVING clause, if present.
    fn parse_having_clause(&mut self) -> Result<Option<Expression>> {
        if !self.next_is(Keyword::Having.into()) {
            return Ok(None);
        }
        Ok(Some(self.parse_expression()?))
    }

    /// Parses an ORDER BY clause, if present.
    fn parse_order_by_clause(&mut self) -> Result<Vec<(Expression, Direction)>> {
        if !self.next_is(Keyword::Order.into()) {
            return Ok(Vec::new());
        }
        self.expect(Keyword::By.into())?;
        let mut order_by = Vec::new();
        loop {
            let expr = self.parse_expression()?;
            let direction = self
                .next_if_map(|token| match token {
                    Token::Keyword(Keyword::Asc) => Some(Direction::Asc),
                    Token::Keyword(Keyword::Desc) => Some(Direction::Desc),
                    _ => None,
                })
                .unwrap_or(Direction::Asc);
            order_by.push((expr, direction));
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        Ok(order_by)
    }

    /// Parses LIMIT and OFFSET clauses, if present, in either order.
    /// Also accepts the MySQL `LIMIT offset, count` form.
    /// Returns (offset, limit).
    fn parse_limit_offset_clause(
        &mut self,
    ) -> Result<(Option<Expression>, Option<Expression>)> {
        let mut offset = None;
        let mut limit = None;

        if self.next_is(Keyword::Limit.into()) {
            let first = self.parse_expression()?;
            if self.next_is(Token::Comma) {
                offset = Some(first);
                limit = Some(self.parse_expression()?);
            } else {
                limit = Some(first);
                if self.next_is(Keyword::Offset.into()) {
                    offset = Some(self.parse_expression()?);
                }
            }
            return Ok((offset, limit));
        }

        if self.next_is(Keyword::Offset.into()) {
            offset = Some(self.parse_expression()?);
            if self.next_is(Keyword::Limit.into()) {
                limit = Some(self.parse_expression()?);
            }
        }
        Ok((offset, limit))
    }

    /// Parses an INSERT statement.
    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect(Keyword::Insert.into())?;
        self.expect(Keyword::Into.into())?;
        let table = self.next_ident()?;

        let mut columns = None;
        if self.next_is(Token::OpenParen) {
            let columns = columns.insert(Vec::new());
            loop {
                columns.push(self.next_ident()?);
                if !self.next_is(Token::Comma) {
                    break;
                }
            }
            self.expect(Token::CloseParen)?;
        }

        let source = if self.next_is(Keyword::Default.into()) {
            self.expect(Keyword::Values.into())?;
            InsertSource::DefaultValues
        } else if self.next_is(Keyword::Values.into()) {
            InsertSource::Values(self.parse_values_rows()?)
        } else if matches!(self.peek()?, Some(Token::Keyword(Keyword::Select))) {
            InsertSource::Select(Box::new(self.parse_select_statement()?))
        } else {
            return Err(Error::ParseFailed(
                "expected VALUES or SELECT after INSERT INTO".into(),
            ));
        };

        Ok(Statement::Insert {
            table,
            columns,
            source,
        })
    }

    /// Parses VALUES rows.
    fn parse_values_rows(&mut self) -> Result<Vec<Vec<Expression>>> {
        let mut rows = Vec::new();
        loop {
            let mut row = Vec::new();
            self.expect(Token::OpenParen)?;
            loop {
                row.push(self.parse_expression()?);
                if !self.next_is(Token::Comma) {
                    break;
                }
            }
            self.expect(Token::CloseParen)?;
            rows.push(row);
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        Ok(rows)
    }

    /// Parses an UPDATE statement.
    fn parse_update(&mut self) -> Result<Statement> {
        self.expect(Keyword::Update.into())?;
        let table = self.next_ident()?;
        self.expect(Keyword::Set.into())?;
        let mut set = BTreeMap::new();
        loop {
            let column = self.next_ident()?;
            self.expect(Token::Equal)?;
            let expr = if self.next_is(Keyword::Default.into()) {
                None
            } else {
                Some(self.parse_expression()?)
            };
            if set.contains_key(&column) {
                return Err(Error::ParseFailed(format!(
                    "column {} set multiple times",
                    column
                )));
            }
            set.insert(column, expr);
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        Ok(Statement::Update {
            table,
            set,
            r#where: self.parse_where_clause()?,
        })
    }

    /// Parses a DELETE statement.
    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect(Keyword::Delete.into())?;
        self.expect(Keyword::From.into())?;
        let table = self.next_ident()?;
        Ok(Statement::Delete {
            table,
            r#where: self.parse_where_clause()?,
        })
    }

    /// Parses an expression using precedence climbing.
    fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_expression_at(0)
    }

    /// Parses an expression at the given minimum precedence.
    fn parse_expression_at(&mut self, min_precedence: Precedence) -> Result<Expression> {
        let mut lhs = if let Some(prefix) = self.parse_prefix_operator_at(min_precedence) {
            let rhs = self.parse_expression_at(prefix.precedence())?;
            prefix.into_expression(rhs)
        } else {
            self.parse_expression_atom()?
        };

        while let Some(postfix) = self.parse_postfix_operator_at(min_precedence)? {
            lhs = postfix(lhs);
        }

        while let Some(infix) = self.parse_infix_operator_at(min_precedence) {
            let next_precedence = infix.associativity().next_precedence(infix.precedence());
            let rhs = self.parse_expression_at(next_precedence)?;
            lhs = infix.into_expression(lhs, rhs);
        }

        // Postfix operators can also follow an infix chain, e.g.
        // `1 + x IS NULL`.
        while let Some(postfix) = self.parse_postfix_operator_at(min_precedence)? {
            lhs = postfix(lhs);
        }

        Ok(lhs)
    }

    /// Parses an expression atom.
    fn parse_expression_atom(&mut self) -> Result<Expression> {
        let token = self.next()?;
        Ok(match token {
            Token::Number(n) => {
                if n.contains('.') {
                    let f = n
                        .parse::<f64>()
                        .map_err(|_| Error::ParseFailed(format!("invalid number {}", n)))?;
                    Literal::Float(f).into()
                } else {
                    match n.parse::<i64>() {
                        Ok(i) => Literal::Integer(i).into(),
                        Err(_) => Literal::Float(
                            n.parse::<f64>()
                                .map_err(|_| Error::ParseFailed(format!("invalid number {}", n)))?,
                        )
                        .into(),
                    }
                }
            }
            Token::String(s) => Literal::String(s).into(),
            Token::Keyword(Keyword::True) => Literal::Boolean(true).into(),
            Token::Keyword(Keyword::False) => Literal::Boolean(false).into(),
            Token::Keyword(Keyword::Null) => Literal::Null.into(),

            // All columns.
            Token::Asterisk => Expression::All,

            // EXISTS (SELECT ...); NOT EXISTS arrives as Not(Exists).
            Token::Keyword(Keyword::Exists) => {
                self.expect(Token::OpenParen)?;
                if self.peek()? != Some(&Token::Keyword(Keyword::Select)) {
                    return Err(Error::ParseFailed(
                        "EXISTS must be followed by a subquery".into(),
                    ));
                }
                let subquery = Box::new(self.parse_select_statement()?);
                self.expect(Token::CloseParen)?;
                Operator::Exists {
                    subquery,
                    negated: false,
                }
                .into()
            }

            // Function call.
            Token::Ident(name) if self.next_is(Token::OpenParen) => {
                // COUNT(DISTINCT x) and friends get a suffixed name so the
                // aggregate survives as a single function string.
                let distinct = matches!(
                    name.to_uppercase().as_str(),
                    "COUNT" | "SUM" | "AVG" | "MIN" | "MAX"
                ) && self.next_is(Keyword::Distinct.into());

                let mut args = Vec::new();
                while !self.next_is(Token::CloseParen) {
                    if !args.is_empty() {
                        self.expect(Token::Comma)?;
                    }
                    args.push(self.parse_expression()?);
                }
                if distinct {
                    Expression::Function(format!("{}_DISTINCT", name.to_uppercase()), args)
                } else {
                    Expression::Function(name, args)
                }
            }

            // Column reference, qualified as table.column or table.*.
            Token::Ident(table) if self.next_is(Token::Period) => {
                if self.next_is(Token::Asterisk) {
                    Expression::QualifiedWildcard(table)
                } else {
                    Expression::Column(Some(table), self.next_ident()?)
                }
            }
            Token::Ident(column) => Expression::Column(None, column),

            // Parameter placeholder.
            Token::Question => {
                let index = self.param_count;
                self.param_count += 1;
                Expression::Parameter(index)
            }

            // Nested expression or subquery.
            Token::OpenParen => {
                if self.peek()? == Some(&Token::Keyword(Keyword::Select)) {
                    let select = Box::new(self.parse_select_statement()?);
                    self.expect(Token::CloseParen)?;
                    Expression::Subquery(select)
                } else {
                    let expr = self.parse_expression()?;
                    self.expect(Token::CloseParen)?;
                    expr
                }
            }

            token => {
                return Err(Error::ParseFailed(format!(
                    "expected expression atom, found {}",
                    token
                )));
            }
        })
    }

    /// Parses a prefix operator at or above the minimum precedence.
    fn parse_prefix_operator_at(&mut self, min_precedence: Precedence) -> Option<PrefixOperator> {
        self.next_if_map(|token| {
            let operator = match token {
                Token::Keyword(Keyword::Not) => PrefixOperator::Not,
                Token::Minus => PrefixOperator::Minus,
                Token::Plus => PrefixOperator::Plus,
                _ => return None,
            };
            Some(operator).filter(|op| op.precedence() >= min_precedence)
        })
    }

    /// Parses an infix operator at or above the minimum precedence.
    fn parse_infix_operator_at(&mut self, min_precedence: Precedence) -> Option<InfixOperator> {
        self.next_if_map(|token| {
            let operator = match token {
                Token::Plus => InfixOperator::Add,
                Token::Minus => InfixOperator::Subtract,
                Token::Asterisk => InfixOperator::Multiply,
                Token::Slash => InfixOperator::Divide,
                Token::Percent => InfixOperator::Remainder,
                Token::Equal => InfixOperator::Equal,
                Token::NotEqual | Token::LessOrGreaterThan => InfixOperator::NotEqual,
                Token::GreaterThan => InfixOperator::GreaterThan,
                Token::GreaterThanOrEqual => InfixOperator::GreaterThanOrEqual,
                Token::LessThan => InfixOperator::LessThan,
                Token::LessThanOrEqual => InfixOperator::LessThanOrEqual,
                Token::Keyword(Keyword::And) => InfixOperator::And,
                Token::Keyword(Keyword::Or) => InfixOperator::Or,
                Token::Keyword(Keyword::Like) => InfixOperator::Like,
                _ => return None,
            };
            Some(operator).filter(|op| op.precedence() >= min_precedence)
        })
    }

    /// Parses a postfix operator at or above the minimum precedence,
    /// returning a closure that wraps the left-hand side. These span
    /// multiple tokens (IS NOT NULL, NOT IN, ...), so the precedence is
    /// checked before anything is consumed.
    #[allow(clippy::type_complexity)]
    fn parse_postfix_operator_at(
        &mut self,
        min_precedence: Precedence,
    ) -> Result<Option<Box<dyn FnOnce(Expression) -> Expression>>> {
        if POSTFIX_PRECEDENCE < min_precedence {
            return Ok(None);
        }

        // IS [NOT] NULL.
        if self.peek()? == Some(&Token::Keyword(Keyword::Is)) {
            self.next()?;
            let not = self.next_is(Keyword::Not.into());
            self.expect(Keyword::Null.into())?;
            return Ok(Some(Box::new(move |lhs| {
                let is: Expression = Operator::Is(Box::new(lhs), Literal::Null).into();
                if not {
                    Operator::Not(Box::new(is)).into()
                } else {
                    is
                }
            })));
        }

        // NOT IN / NOT BETWEEN / NOT LIKE.
        let negated = if self.peek()? == Some(&Token::Keyword(Keyword::Not)) {
            self.next()?;
            match self.peek()? {
                Some(&Token::Keyword(Keyword::In))
                | Some(&Token::Keyword(Keyword::Between))
                | Some(&Token::Keyword(Keyword::Like)) => true,
                _ => {
                    return Err(Error::ParseFailed(
                        "expected IN, BETWEEN or LIKE after NOT".into(),
                    ))
                }
            }
        } else {
            false
        };

        if self.next_is(Keyword::In.into()) {
            self.expect(Token::OpenParen)?;
            if self.peek()? == Some(&Token::Keyword(Keyword::Select)) {
                let subquery = Box::new(self.parse_select_statement()?);
                self.expect(Token::CloseParen)?;
                return Ok(Some(Box::new(move |lhs| {
                    Operator::InSubquery {
                        expr: Box::new(lhs),
                        subquery,
                        negated,
                    }
                    .into()
                })));
            }
            let mut list = Vec::new();
            if self.peek()? != Some(&Token::CloseParen) {
                list.push(self.parse_expression()?);
                while self.next_is(Token::Comma) {
                    list.push(self.parse_expression()?);
                }
            }
            self.expect(Token::CloseParen)?;
            return Ok(Some(Box::new(move |lhs| {
                Operator::InList {
                    expr: Box::new(lhs),
                    list,
                    negated,
                }
                .into()
            })));
        }

        if self.next_is(Keyword::Between.into()) {
            // Bound expressions stop before the separating AND.
            let low = self.parse_expression_at(3)?;
            self.expect(Keyword::And.into())?;
            let high = self.parse_expression_at(3)?;
            return Ok(Some(Box::new(move |lhs| {
                Operator::Between {
                    expr: Box::new(lhs),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated,
                }
                .into()
            })));
        }

        if negated && self.next_is(Keyword::Like.into()) {
            let pattern = self.parse_expression_at(POSTFIX_PRECEDENCE + 1)?;
            return Ok(Some(Box::new(move |lhs| {
                Operator::Like {
                    expr: Box::new(lhs),
                    pattern: Box::new(pattern),
                    negated: true,
                }
                .into()
            })));
        }

        Ok(None)
    }
}
