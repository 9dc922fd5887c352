//! SQL text normalization
//!
//! Produces the diagnostics-only `normalized_sql` carried on the cache
//! key: whitespace collapsed, commas and parentheses tightened, backtick
//! quoting stripped, ORM-style `t0..tN` aliases rewritten back to their
//! table names, and `IN (...)` literal lists reordered (numeric
//! ascending when every member is numeric, lexicographic otherwise).
//! Fingerprinting uses the structured key, never this text.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn backtick_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([A-Za-z_][A-Za-z0-9_]*)`").expect("static regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

fn comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*,\s*").expect("static regex"))
}

fn open_paren_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\(\s*").expect("static regex"))
}

fn close_paren_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\)").expect("static regex"))
}

fn in_list_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(IN)\(([^()]*)\)").expect("static regex"))
}

fn orm_alias(alias: &str) -> bool {
    let mut chars = alias.chars();
    chars.next() == Some('t') && {
        let rest = chars.as_str();
        !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
    }
}

/// Normalize a bound SQL string. `alias_map` maps every FROM alias to
/// its table name; only `t<digits>` aliases are rewritten.
pub fn normalize_sql(sql: &str, alias_map: &BTreeMap<String, String>) -> String {
    let mut text = backtick_re().replace_all(sql, "$1").into_owned();
    text = whitespace_re().replace_all(&text, " ").trim().to_string();
    text = comma_re().replace_all(&text, ",").into_owned();
    text = open_paren_re().replace_all(&text, "(").into_owned();
    text = close_paren_re().replace_all(&text, ")").into_owned();

    for (alias, table) in alias_map {
        if !orm_alias(alias) || alias == table {
            continue;
        }
        // Drop the alias declaration, then rewrite remaining references.
        let declaration = Regex::new(&format!(
            r"(?i)\b{}( +AS)? +{}\b",
            regex::escape(table),
            regex::escape(alias)
        ));
        if let Ok(re) = declaration {
            text = re.replace_all(&text, table.as_str()).into_owned();
        }
        if let Ok(re) = Regex::new(&format!(r"\b{}\b", regex::escape(alias))) {
            text = re.replace_all(&text, table.as_str()).into_owned();
        }
    }

    in_list_re()
        .replace_all(&text, |caps: &Captures| {
            let content = &caps[2];
            if content.trim_start().to_uppercase().starts_with("SELECT") {
                return caps[0].to_string();
            }
            let mut items = split_list(content);
            sort_items(&mut items);
            format!("{}({})", &caps[1], items.join(","))
        })
        .into_owned()
}

/// Splits an IN-list body on commas, respecting string literals.
fn split_list(content: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                current.push(c);
                if in_string {
                    if let Some(escaped) = chars.next_if_eq(&'\'') {
                        current.push(escaped);
                    } else {
                        in_string = false;
                    }
                } else {
                    in_string = true;
                }
            }
            ',' if !in_string => {
                items.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let last = current.trim();
    if !last.is_empty() {
        items.push(last.to_string());
    }
    items
}

fn sort_items(items: &mut [String]) {
    let all_numeric = items.iter().all(|i| i.parse::<f64>().is_ok());
    if all_numeric {
        items.sort_by(|a, b| {
            let (a, b) = (a.parse::<f64>().unwrap(), b.parse::<f64>().unwrap());
            a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
        });
    } else {
        items.sort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(sql: &str) -> String {
        normalize_sql(sql, &BTreeMap::new())
    }

    #[test]
    fn test_whitespace_and_punctuation() {
        assert_eq!(
            normalize("SELECT  *   FROM users\n WHERE id IN ( 1 , 2 )"),
            "SELECT * FROM users WHERE id IN(1,2)"
        );
    }

    #[test]
    fn test_backticks_stripped() {
        assert_eq!(
            normalize("SELECT `name` FROM `users`"),
            "SELECT name FROM users"
        );
    }

    #[test]
    fn test_in_list_reordered_numeric() {
        assert_eq!(
            normalize("SELECT * FROM t WHERE id IN (3, 1, 10, 2)"),
            "SELECT * FROM t WHERE id IN(1,2,3,10)"
        );
    }

    #[test]
    fn test_in_list_reordered_lexicographic() {
        assert_eq!(
            normalize("SELECT * FROM t WHERE name IN ('b', 'a')"),
            "SELECT * FROM t WHERE name IN('a','b')"
        );
    }

    #[test]
    fn test_in_subquery_untouched() {
        assert_eq!(
            normalize("SELECT * FROM t WHERE id IN (SELECT id FROM u)"),
            "SELECT * FROM t WHERE id IN(SELECT id FROM u)"
        );
    }

    #[test]
    fn test_orm_alias_rewritten() {
        let mut aliases = BTreeMap::new();
        aliases.insert("t0".to_string(), "users".to_string());
        assert_eq!(
            normalize_sql("SELECT t0.name FROM users t0 WHERE t0.id = 1", &aliases),
            "SELECT users.name FROM users WHERE users.id = 1"
        );
    }

    #[test]
    fn test_regular_alias_kept() {
        let mut aliases = BTreeMap::new();
        aliases.insert("u".to_string(), "users".to_string());
        assert_eq!(
            normalize_sql("SELECT u.name FROM users u", &aliases),
            "SELECT u.name FROM users u"
        );
    }
}
