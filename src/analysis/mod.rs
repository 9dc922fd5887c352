//! SQL analysis
//!
//! Two entry points: `analyze_select` reduces a SELECT to the `CacheKey`
//! it is cached under, and `analyze_write` reduces an INSERT/UPDATE/
//! DELETE to the `WriteInfo` that drives invalidation. Both are pure
//! functions of (sql, params).

pub mod binder;
pub mod classifier;
pub mod decider;
pub mod extractor;
pub mod fingerprint;
pub mod key;
pub mod normalizer;

use crate::error::{Error, Result};
use crate::parsing::{self, Statement};
use crate::types::Params;

pub use decider::should_invalidate;
pub use key::{
    CacheKey, Classification, CondOp, Condition, JoinCondition, JoinType, OrderBy, SetOperation,
    SortOrder, TableAccess, WriteInfo, WriteOp,
};

use key::CacheKeyBuilder;

/// Analyze a SELECT statement into its cache key: bind parameters,
/// parse, extract, normalize, classify, fingerprint.
pub fn analyze_select(sql: &str, params: Option<&Params>) -> Result<CacheKey> {
    let bound = binder::bind_parameters(sql, params);
    let statement = parsing::parse_sql(&bound)?;
    let select = match statement {
        Statement::Select(select) => select,
        _ => return Err(Error::Unsupported("expected a SELECT statement".into())),
    };
    let facts = extractor::extract_select(&select)?;
    let normalized_sql = normalizer::normalize_sql(&bound, &facts.alias_map);
    let classification = classifier::classify(&facts);
    let builder = CacheKeyBuilder {
        tables: facts.tables,
        classification: Some(classification),
        normalized_sql,
        order_by: facts.order_by,
        limit: facts.limit,
        offset: facts.offset,
        distinct: facts.distinct,
        has_subquery: facts.has_subquery,
        set_operation: facts.set_operation,
    };
    Ok(builder.finish())
}

/// Analyze a write statement into the descriptor invalidation runs on.
pub fn analyze_write(sql: &str, params: Option<&Params>) -> Result<WriteInfo> {
    let bound = binder::bind_parameters(sql, params);
    let statement = parsing::parse_sql(&bound)?;
    extractor::extract_write(&statement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    #[test]
    fn test_analyze_select_row_lookup() {
        let key = analyze_select(
            "SELECT * FROM users WHERE id = ?",
            Some(&Params::Positional(vec![Value::Int(10)])),
        )
        .unwrap();
        assert_eq!(key.classification, Classification::RowLookup);
        assert_eq!(key.fingerprint, "users:id=10:row-lookup");
    }

    #[test]
    fn test_analyze_select_is_deterministic() {
        let sql = "SELECT name FROM users WHERE id = 3 ORDER BY name LIMIT 5";
        let a = analyze_select(sql, None).unwrap();
        let b = analyze_select(sql, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_analyze_write_rejects_select() {
        assert!(matches!(
            analyze_write("SELECT * FROM users", None),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_analyze_select_rejects_write() {
        assert!(matches!(
            analyze_select("DELETE FROM users", None),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_analyze_select_parse_error() {
        assert!(matches!(
            analyze_select("SELECT FROM WHERE", None),
            Err(Error::ParseFailed(_))
        ));
    }
}
