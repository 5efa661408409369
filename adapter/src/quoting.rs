//! Identifier and literal quoting for DuckDB SQL.
//!
//! DuckDB follows the SQL standard: identifiers go in double quotes and string
//! literals in single quotes, and the quote character is escaped by doubling it.
//! Backslashes carry no special meaning.

use crate::db::Value;

/// Escape a string for use inside a quoted DuckDB token.
///
/// # Arguments
/// * `s` - The string to escape
/// * `quote_char` - The quote character to escape ('"' for identifiers, '\'' for literals)
pub fn escape_string_for_quote(s: &str, quote_char: char) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        if c == quote_char {
            result.push(c);
        }
        // NUL cannot appear in a DuckDB string literal
        if c != '\0' {
            result.push(c);
        }
    }
    result
}

/// Quote a single identifier: `users` -> `"users"`.
#[inline]
pub fn quote_column_name(name: &str) -> String {
    format!("\"{}\"", escape_string_for_quote(name, '"'))
}

/// Quote a possibly qualified table name: `lake.main.users` -> `"lake"."main"."users"`.
///
/// Parts that are already quoted are kept as they are.
pub fn quote_table_name(name: &str) -> String {
    split_qualified_name(name)
        .iter()
        .map(|part| quote_column_name(part))
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a string literal: `it's` -> `'it''s'`.
#[inline]
pub fn quote_string(s: &str) -> String {
    format!("'{}'", escape_string_for_quote(s, '\''))
}

/// Strip one layer of identifier quoting, if present.
pub fn unquote_identifier(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

/// Split `a."b.c".d` into `["a", "b.c", "d"]`, honouring double quotes.
pub fn split_qualified_name(name: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = name.trim().chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            '.' if !in_quotes => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Render a value as an inline SQL literal.
pub fn quote_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::HugeInt(h) => h.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Float(f) => format!("'{}'::DOUBLE", f),
        Value::Text(s) => quote_string(s),
        Value::Blob(bytes) => {
            let escaped: String = bytes.iter().map(|b| format!("\\x{:02X}", b)).collect();
            format!("'{}'::BLOB", escaped)
        }
        Value::Date(d) => format!("DATE '{}'", d.format("%Y-%m-%d")),
        Value::Time(t) => format!("TIME '{}'", t.format("%H:%M:%S%.f")),
        Value::Timestamp(ts) => format!("TIMESTAMPTZ '{}'", ts.format("%Y-%m-%d %H:%M:%S%.f%:z")),
        Value::Interval(i) => i.to_sql(),
        Value::List(items) => format!(
            "[{}]",
            items.iter().map(quote_value).collect::<Vec<_>>().join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;
    use chrono::NaiveDate;
    use rstest::rstest;

    #[rstest]
    fn test_quote_string_basic() {
        assert_eq!(quote_string("hello"), "'hello'");
    }

    #[rstest]
    fn test_quote_string_doubles_single_quotes() {
        assert_eq!(quote_string("it's"), "'it''s'");
    }

    #[rstest]
    fn test_quote_string_keeps_backslashes() {
        assert_eq!(quote_string(r"path\to\file"), r"'path\to\file'");
    }

    #[rstest]
    fn test_quote_column_name_doubles_double_quotes() {
        assert_eq!(quote_column_name(r#"say "hi""#), r#""say ""hi""""#);
    }

    #[rstest]
    #[case("users", r#""users""#)]
    #[case("main.users", r#""main"."users""#)]
    #[case(r#"lake."odd.name""#, r#""lake"."odd.name""#)]
    fn test_quote_table_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(quote_table_name(input), expected);
    }

    #[rstest]
    fn test_unquote_identifier() {
        assert_eq!(unquote_identifier(r#""user""id""#), r#"user"id"#);
        assert_eq!(unquote_identifier("plain"), "plain");
    }

    #[rstest]
    #[case(Value::Null, "NULL")]
    #[case(Value::Bool(true), "TRUE")]
    #[case(Value::Int(-5), "-5")]
    #[case(Value::Text("O'Brien".into()), "'O''Brien'")]
    #[case(Value::Blob(vec![0xde, 0xad]), r"'\xDE\xAD'::BLOB")]
    #[case(Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()), "DATE '2024-02-29'")]
    #[case(Value::Interval(Interval::new(0, 1, 0)), "INTERVAL '1 days'")]
    fn test_quote_value(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(quote_value(&value), expected);
    }
}
