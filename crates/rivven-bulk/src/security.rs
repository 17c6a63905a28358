//! Identifier validation for SQL text built by rivven-bulk.
//!
//! Provides:
//! - Identifier validation for table, schema and database names
//! - Multi-part table name parsing (`db.schema.table`, bracket-quoted parts, temp tables)
//! - T-SQL bracket quoting and string literal escaping
//!
//! Values are always bound as parameters. These helpers only cover names
//! that have to appear in the statement text itself.

use crate::error::Error;

/// Validate a SQL identifier (table, schema, database names).
///
/// Rules:
/// - Must not be empty
/// - Maximum 128 characters (T-SQL `sysname`)
/// - Must start with ASCII letter or underscore
/// - May only contain ASCII alphanumeric characters and underscores
///
/// # Examples
///
/// ```
/// use rivven_bulk::security::validate_sql_identifier;
///
/// assert!(validate_sql_identifier("users").is_ok());
/// assert!(validate_sql_identifier("my_table_123").is_ok());
/// assert!(validate_sql_identifier("_staging").is_ok());
///
/// assert!(validate_sql_identifier("x; DROP TABLE users--").is_err());
/// assert!(validate_sql_identifier("").is_err());
/// assert!(validate_sql_identifier("123abc").is_err());
/// ```
pub fn validate_sql_identifier(name: &str) -> crate::Result<()> {
    if name.is_empty() {
        return Err(Error::config("SQL identifier cannot be empty"));
    }

    if name.len() > 128 {
        return Err(Error::config(format!(
            "SQL identifier too long: {} chars (max 128)",
            name.len()
        )));
    }

    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => {
            return Err(Error::config(format!(
                "Invalid SQL identifier '{}': must start with a letter or underscore",
                name
            )));
        }
    }

    for c in chars {
        if !c.is_ascii_alphanumeric() && c != '_' {
            return Err(Error::config(format!(
                "Invalid SQL identifier '{}': contains invalid character '{}'",
                name, c
            )));
        }
    }

    Ok(())
}

/// Split and validate a table name of one to three dot-separated parts.
///
/// A part is either a plain identifier or a `[...]` bracket-quoted name.
/// Quoted parts may hold any printable character; a literal `]` is written
/// `]]` and the returned part is unescaped. The last plain part may carry a
/// `#` or `##` temp table prefix.
///
/// ```
/// use rivven_bulk::security::validate_table_name;
///
/// assert_eq!(validate_table_name("[dbo].[users]").unwrap(), vec!["dbo", "users"]);
/// assert_eq!(validate_table_name("[Order Details]").unwrap(), vec!["Order Details"]);
/// assert_eq!(validate_table_name("#staging").unwrap(), vec!["#staging"]);
/// assert!(validate_table_name("a.b.c.d").is_err());
/// ```
pub fn validate_table_name(name: &str) -> crate::Result<Vec<String>> {
    let parts = split_table_name(name)?;

    if parts.len() > 3 {
        return Err(invalid_table_name(name, "at most database.schema.table"));
    }

    let last = parts.len() - 1;
    parts
        .into_iter()
        .enumerate()
        .map(|(idx, part)| match part {
            NamePart::Quoted(part) => validate_quoted_part(name, part),
            NamePart::Plain(part) => {
                let bare = if idx == last {
                    part.strip_prefix("##")
                        .or_else(|| part.strip_prefix('#'))
                        .unwrap_or(part.as_str())
                } else {
                    part.as_str()
                };
                validate_sql_identifier(bare)?;
                Ok(part)
            }
        })
        .collect()
}

enum NamePart {
    Plain(String),
    Quoted(String),
}

fn invalid_table_name(name: &str, reason: impl std::fmt::Display) -> Error {
    Error::config(format!("Invalid table name '{}': {}", name, reason))
}

fn split_table_name(name: &str) -> crate::Result<Vec<NamePart>> {
    let mut parts = Vec::new();
    let mut chars = name.chars().peekable();

    loop {
        let mut part = String::new();
        if chars.peek() == Some(&'[') {
            chars.next();
            loop {
                match chars.next() {
                    Some(']') if chars.peek() == Some(&']') => {
                        chars.next();
                        part.push(']');
                    }
                    Some(']') => break,
                    Some(c) => part.push(c),
                    None => return Err(invalid_table_name(name, "unterminated '['")),
                }
            }
            parts.push(NamePart::Quoted(part));
        } else {
            while let Some(&c) = chars.peek() {
                if c == '.' {
                    break;
                }
                part.push(c);
                chars.next();
            }
            parts.push(NamePart::Plain(part));
        }

        match chars.next() {
            None => return Ok(parts),
            Some('.') => {}
            Some(c) => {
                return Err(invalid_table_name(
                    name,
                    format!("unexpected '{}' after ']'", c),
                ))
            }
        }
    }
}

fn validate_quoted_part(name: &str, part: String) -> crate::Result<String> {
    if part.is_empty() {
        return Err(invalid_table_name(name, "empty bracketed part"));
    }
    if part.chars().count() > 128 {
        return Err(invalid_table_name(name, "part longer than 128 chars"));
    }
    if part.chars().any(char::is_control) {
        return Err(invalid_table_name(name, "control character in part"));
    }
    Ok(part)
}

/// Bracket-quote one identifier, doubling any `]`.
///
/// ```
/// use rivven_bulk::security::quote_identifier;
///
/// assert_eq!(quote_identifier("Order Details"), "[Order Details]");
/// assert_eq!(quote_identifier("a]b"), "[a]]b]");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Validate a table name and render it with each part bracket-quoted.
///
/// ```
/// use rivven_bulk::security::quote_table_name;
///
/// assert_eq!(quote_table_name("dbo.users").unwrap(), "[dbo].[users]");
/// ```
pub fn quote_table_name(name: &str) -> crate::Result<String> {
    let parts = validate_table_name(name)?;
    Ok(parts
        .iter()
        .map(|p| quote_identifier(p))
        .collect::<Vec<_>>()
        .join("."))
}

/// Escape a string value for a single-quoted SQL literal (`'` becomes `''`).
///
/// ```
/// use rivven_bulk::security::escape_string_literal;
///
/// assert_eq!(escape_string_literal("users"), "users");
/// assert_eq!(escape_string_literal("don't"), "don''t");
/// ```
pub fn escape_string_literal(value: &str) -> String {
    if !value.contains('\'') {
        return value.to_string();
    }
    value.replace('\'', "''")
}
