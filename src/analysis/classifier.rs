//! Query classification
//!
//! Assigns each SELECT one of `row-lookup | aggregate | join | complex`.
//! The order matters: set operations and subqueries trump everything,
//! aggregates trump joins, and a row lookup requires a single table with
//! an equality or IN on an id/uuid column.

use crate::analysis::extractor::SelectFacts;
use crate::analysis::fingerprint::is_primary_key_column;
use crate::analysis::key::Classification;

pub fn classify(facts: &SelectFacts) -> Classification {
    if facts.set_operation.is_some() || facts.has_subquery {
        return Classification::Complex;
    }
    if facts.has_aggregate {
        return Classification::Aggregate;
    }
    if facts.tables.len() > 1 {
        return Classification::Join;
    }
    let row_lookup = facts.tables.first().is_some_and(|table| {
        table
            .conditions
            .iter()
            .any(|cond| cond.is_equality_or_in() && is_primary_key_column(&cond.column))
    });
    if row_lookup {
        return Classification::RowLookup;
    }
    Classification::Complex
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::extractor::extract_select;
    use crate::parsing::{parse_sql, Statement};

    fn classify_sql(sql: &str) -> Classification {
        let facts = match parse_sql(sql).unwrap() {
            Statement::Select(select) => extract_select(&select).unwrap(),
            other => panic!("expected SELECT, got {:?}", other),
        };
        classify(&facts)
    }

    #[test]
    fn test_classify_row_lookup() {
        assert_eq!(
            classify_sql("SELECT * FROM users WHERE id = 1"),
            Classification::RowLookup
        );
        assert_eq!(
            classify_sql("SELECT * FROM users WHERE UUID IN (1, 2)"),
            Classification::RowLookup
        );
    }

    #[test]
    fn test_classify_aggregate() {
        assert_eq!(
            classify_sql("SELECT COUNT(*) FROM users WHERE id = 1"),
            Classification::Aggregate
        );
    }

    #[test]
    fn test_classify_join() {
        assert_eq!(
            classify_sql("SELECT u.name FROM users u JOIN orders o ON u.id = o.user_id"),
            Classification::Join
        );
    }

    #[test]
    fn test_classify_complex() {
        assert_eq!(
            classify_sql("SELECT * FROM users WHERE name = 'x'"),
            Classification::Complex
        );
        assert_eq!(
            classify_sql("SELECT id FROM a UNION SELECT id FROM b"),
            Classification::Complex
        );
        assert_eq!(
            classify_sql("SELECT * FROM users WHERE id IN (SELECT id FROM banned)"),
            Classification::Complex
        );
    }
}
