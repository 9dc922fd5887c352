//! Parameter binder
//!
//! Inlines bound parameters into the SQL text before parsing, so every
//! later stage sees literal values and the fingerprint is keyed per
//! distinct value set. Three placeholder styles are recognized: `?`
//! (positional), `$N` (1-indexed), and `:name` (named). The scan is
//! quote-aware, so placeholder characters inside string literals or
//! quoted identifiers are left alone. Placeholders without a matching
//! value remain verbatim.

use crate::types::{Params, Value};

/// Placeholder styles, detected in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Question,
    Dollar,
    Named,
}

/// Inline `params` into `sql`. Returns the input unchanged when there
/// are no parameters or no placeholders.
pub fn bind_parameters(sql: &str, params: Option<&Params>) -> String {
    let params = match params {
        Some(p) if !p.is_empty() => p,
        _ => return sql.to_string(),
    };
    let style = match detect_style(sql) {
        Some(style) => style,
        None => return sql.to_string(),
    };

    match (style, params) {
        (Style::Question, Params::Positional(values)) => bind_question(sql, values),
        (Style::Dollar, Params::Positional(values)) => bind_dollar(sql, values),
        (Style::Named, Params::Named(map)) => {
            bind_named(sql, |name| map.get(name))
        }
        // A style/params mismatch leaves the text untouched; the parser
        // will reject leftover placeholders it cannot represent.
        _ => sql.to_string(),
    }
}

/// Scans outside quotes for the placeholder style in use.
fn detect_style(sql: &str) -> Option<Style> {
    let mut question = false;
    let mut dollar = false;
    let mut named = false;
    scan(sql, |chars, i, out_of_quotes| {
        if !out_of_quotes {
            return;
        }
        match chars[i] {
            '?' => question = true,
            '$' if next_is(chars, i, |c| c.is_ascii_digit()) => dollar = true,
            ':' if next_is(chars, i, |c| c.is_alphabetic() || c == '_') => named = true,
            _ => {}
        }
    });
    if question {
        Some(Style::Question)
    } else if dollar {
        Some(Style::Dollar)
    } else if named {
        Some(Style::Named)
    } else {
        None
    }
}

fn next_is(chars: &[char], i: usize, predicate: impl Fn(char) -> bool) -> bool {
    chars.get(i + 1).copied().is_some_and(predicate)
}

/// Drives a callback over every character with a flag for whether the
/// position is outside string literals and quoted identifiers.
fn scan(sql: &str, mut visit: impl FnMut(&[char], usize, bool)) {
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\'' => {
                visit(&chars, i, false);
                i += 1;
                while i < chars.len() {
                    visit(&chars, i, false);
                    if chars[i] == '\'' {
                        // Doubled quote stays inside the literal.
                        if chars.get(i + 1) == Some(&'\'') {
                            visit(&chars, i + 1, false);
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            quote @ ('`' | '"') => {
                visit(&chars, i, false);
                i += 1;
                while i < chars.len() {
                    visit(&chars, i, false);
                    i += 1;
                    if chars[i - 1] == quote {
                        break;
                    }
                }
            }
            _ => {
                visit(&chars, i, true);
                i += 1;
            }
        }
    }
}

/// True when the emitted output so far ends with `IN (`, meaning the
/// placeholder's parentheses can be reused for a list value.
fn after_in_open_paren(out: &str) -> bool {
    let trimmed = out.trim_end();
    let Some(rest) = trimmed.strip_suffix('(') else {
        return false;
    };
    let rest = rest.trim_end();
    let word_start = rest
        .rfind(|c: char| !c.is_alphanumeric() && c != '_')
        .map(|p| p + 1)
        .unwrap_or(0);
    rest[word_start..].eq_ignore_ascii_case("in")
}

/// True when the next non-whitespace input character closes the
/// placeholder's parentheses.
fn closes_paren(chars: &[char], from: usize) -> bool {
    chars[from..]
        .iter()
        .find(|c| !c.is_whitespace())
        .is_some_and(|c| *c == ')')
}

/// Renders one bound value, reusing `IN (...)` parentheses for lists.
fn render(value: &Value, out: &str, chars: &[char], next: usize) -> String {
    match value {
        Value::List(items) if after_in_open_paren(out) && closes_paren(chars, next) => items
            .iter()
            .map(|v| v.to_sql_literal())
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_sql_literal(),
    }
}

fn bind_question(sql: &str, values: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut index = 0;
    scan(sql, |chars, i, out_of_quotes| {
        if out_of_quotes && chars[i] == '?' {
            match values.get(index) {
                Some(value) => {
                    index += 1;
                    let text = render(value, &out, chars, i + 1);
                    out.push_str(&text);
                }
                None => out.push('?'),
            }
            return;
        }
        out.push(chars[i]);
    });
    out
}

fn bind_dollar(sql: &str, values: &[Value]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut skip = 0usize;
    scan(sql, |chars, i, out_of_quotes| {
        if skip > 0 {
            skip -= 1;
            return;
        }
        if out_of_quotes && chars[i] == '$' && next_is(chars, i, |c| c.is_ascii_digit()) {
            let mut end = i + 1;
            while end < chars.len() && chars[end].is_ascii_digit() {
                end += 1;
            }
            let digits: String = chars[i + 1..end].iter().collect();
            skip = end - i - 1;
            match digits.parse::<usize>().ok().filter(|n| *n >= 1).and_then(|n| values.get(n - 1))
            {
                Some(value) => out.push_str(&render(value, &out, chars, end)),
                None => {
                    out.push('$');
                    out.push_str(&digits);
                }
            }
            return;
        }
        out.push(chars[i]);
    });
    out
}

fn bind_named<'a>(sql: &str, lookup: impl Fn(&str) -> Option<&'a Value>) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut skip = 0usize;
    scan(sql, |chars, i, out_of_quotes| {
        if skip > 0 {
            skip -= 1;
            return;
        }
        if out_of_quotes && chars[i] == ':' && next_is(chars, i, |c| c.is_alphabetic() || c == '_')
        {
            let mut end = i + 1;
            while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            let name: String = chars[i + 1..end].iter().collect();
            skip = end - i - 1;
            match lookup(&name) {
                Some(value) => out.push_str(&render(value, &out, chars, end)),
                None => {
                    out.push(':');
                    out.push_str(&name);
                }
            }
            return;
        }
        out.push(chars[i]);
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn positional(values: Vec<Value>) -> Params {
        Params::Positional(values)
    }

    #[test]
    fn test_bind_question_scalars() {
        let sql = bind_parameters(
            "SELECT * FROM users WHERE id = ? AND name = ?",
            Some(&positional(vec![Value::Int(10), Value::Str("Bob".into())])),
        );
        assert_eq!(sql, "SELECT * FROM users WHERE id = 10 AND name = 'Bob'");
    }

    #[test]
    fn test_bind_in_list_reuses_parens() {
        let sql = bind_parameters(
            "SELECT * FROM users WHERE id IN (?)",
            Some(&positional(vec![Value::List(vec![
                Value::Int(3),
                Value::Int(1),
                Value::Int(2),
            ])])),
        );
        assert_eq!(sql, "SELECT * FROM users WHERE id IN (3,1,2)");
    }

    #[test]
    fn test_bind_list_outside_in_keeps_parens() {
        let sql = bind_parameters(
            "SELECT * FROM t WHERE point = ?",
            Some(&positional(vec![Value::List(vec![
                Value::Int(1),
                Value::Int(2),
            ])])),
        );
        assert_eq!(sql, "SELECT * FROM t WHERE point = (1,2)");
    }

    #[test]
    fn test_bind_question_inside_string_untouched() {
        let sql = bind_parameters(
            "SELECT * FROM t WHERE name = 'what?' AND id = ?",
            Some(&positional(vec![Value::Int(7)])),
        );
        assert_eq!(sql, "SELECT * FROM t WHERE name = 'what?' AND id = 7");
    }

    #[test]
    fn test_bind_question_exhausted_left_verbatim() {
        let sql = bind_parameters(
            "SELECT * FROM t WHERE a = ? AND b = ?",
            Some(&positional(vec![Value::Int(1)])),
        );
        assert_eq!(sql, "SELECT * FROM t WHERE a = 1 AND b = ?");
    }

    #[test]
    fn test_bind_dollar() {
        let sql = bind_parameters(
            "SELECT * FROM t WHERE a = $2 AND b = $1 AND c = $3",
            Some(&positional(vec![Value::Int(1), Value::Int(2)])),
        );
        assert_eq!(sql, "SELECT * FROM t WHERE a = 2 AND b = 1 AND c = $3");
    }

    #[test]
    fn test_bind_named() {
        let mut map = BTreeMap::new();
        map.insert("user_id".to_string(), Value::Int(42));
        let sql = bind_parameters(
            "SELECT * FROM t WHERE id = :user_id AND x = :missing",
            Some(&Params::Named(map)),
        );
        assert_eq!(sql, "SELECT * FROM t WHERE id = 42 AND x = :missing");
    }

    #[test]
    fn test_bind_null_and_string_escaping() {
        let sql = bind_parameters(
            "UPDATE t SET a = ?, b = ? WHERE id = ?",
            Some(&positional(vec![
                Value::Null,
                Value::Str("O'Brien".into()),
                Value::Int(1),
            ])),
        );
        assert_eq!(sql, "UPDATE t SET a = NULL, b = 'O''Brien' WHERE id = 1");
    }

    #[test]
    fn test_no_params_returns_input() {
        assert_eq!(
            bind_parameters("SELECT 1", None),
            "SELECT 1".to_string()
        );
        assert_eq!(
            bind_parameters("SELECT 1", Some(&positional(vec![]))),
            "SELECT 1".to_string()
        );
    }
}
