//! Parsers for the comma-delimited lists shared by several verbs.
//!
//! Every splitter here is quote-aware: commas, spaces and `=` inside a
//! single-quoted string literal never split or terminate anything.

use std::collections::HashSet;

use crate::ast::{Assignment, ColumnsSelect};
use crate::error::{DbError, Result};
use crate::tokenizer::is_reserved;
use crate::value::Value;

/// The attribute every table starts with.
pub const ID_ATTRIBUTE: &str = "id";

/// Checks that a database, table or attribute name is usable.
///
/// A name is non-empty, ends in an ASCII letter or digit, and holds no
/// whitespace, quote, path separator or control character. Keywords and
/// condition operators are not names.
///
/// # Errors
/// Returns [DbError::ReservedName] for a reserved word and
/// [DbError::InvalidName] otherwise.
pub fn validate_name(name: &str) -> Result<()> {
    if is_reserved(name) {
        return Err(DbError::ReservedName(name.to_string()));
    }

    let ends_alphanumeric = name
        .chars()
        .last()
        .is_some_and(|c| c.is_ascii_alphanumeric());
    let forbidden = name
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '\'' | '/' | '\\'));

    if ends_alphanumeric && !forbidden {
        Ok(())
    } else {
        Err(DbError::InvalidName(name.to_string()))
    }
}

/// Returns the text between the outer parentheses of a list.
pub fn strip_parentheses(list: &str) -> Result<&str> {
    list.trim()
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| DbError::MalformedList(format!("{list} is not enclosed in parentheses")))
}

/// Removes whitespace that sits outside string literals.
pub fn remove_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_quote = false;
    for ch in text.chars() {
        if ch == '\'' {
            in_quote = !in_quote;
        }
        if in_quote || !ch.is_whitespace() {
            out.push(ch);
        }
    }
    out
}

/// Splits on commas outside string literals. Every item must be non-empty.
///
/// # Errors
/// Returns [DbError::MalformedList] on an empty item (`a,,b` or a trailing comma)
/// and [DbError::UnterminatedString] if a quote is left open.
pub fn split_values(text: &str) -> Result<Vec<String>> {
    let compact = remove_whitespace(text);
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;

    for ch in compact.chars() {
        match ch {
            '\'' => {
                in_quote = !in_quote;
                current.push(ch);
            }
            ',' if !in_quote => items.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if in_quote {
        return Err(DbError::UnterminatedString);
    }
    items.push(current);

    if items.iter().any(|item| item.is_empty()) {
        return Err(DbError::MalformedList(format!("empty item in {text:?}")));
    }
    Ok(items)
}

/// Parses `(attr, attr, ...)` for CREATE TABLE.
///
/// `id` is implicit, so naming it explicitly counts as a duplicate.
pub fn parse_attribute_list(list: &str) -> Result<Vec<String>> {
    let inner = strip_parentheses(list)?;
    if inner.trim().is_empty() {
        return Err(DbError::MalformedList("no attributes".to_string()));
    }

    let names = split_values(inner)?;
    let mut seen = HashSet::from([ID_ATTRIBUTE.to_string()]);
    for name in &names {
        validate_name(name)?;
        if !seen.insert(name.clone()) {
            return Err(DbError::DuplicateAttribute(name.clone()));
        }
    }
    Ok(names)
}

/// Parses the projection of a SELECT: `*` or `attr, attr, ...`.
pub fn parse_projection(text: &str) -> Result<ColumnsSelect> {
    if text.trim() == "*" {
        return Ok(ColumnsSelect::Star);
    }
    if text.trim().is_empty() {
        return Err(DbError::MalformedList("no attributes selected".to_string()));
    }

    let names = split_values(text)?;
    for name in &names {
        validate_name(name)?;
    }
    Ok(ColumnsSelect::ColumnsNames(names))
}

/// Parses `(v, v, ...)` for INSERT. Values are kept exactly as written.
pub fn parse_value_list(list: &str) -> Result<Vec<String>> {
    let inner = strip_parentheses(list)?;
    if inner.trim().is_empty() {
        return Err(DbError::MalformedList("no values".to_string()));
    }

    let values = split_values(inner)?;
    for value in &values {
        if !Value::is_literal(value) {
            return Err(DbError::InvalidLiteral(value.clone()));
        }
    }
    Ok(values)
}

/// Parses `attr=v, attr=v, ...` for UPDATE.
pub fn parse_assignments(text: &str) -> Result<Vec<Assignment>> {
    if text.trim().is_empty() {
        return Err(DbError::MalformedList("no assignments".to_string()));
    }

    let mut seen = HashSet::new();
    split_values(text)?
        .into_iter()
        .map(|pair| {
            let (attribute, value) = split_assignment(&pair)?;
            validate_name(attribute)?;
            if !Value::is_literal(value) {
                return Err(DbError::InvalidLiteral(value.to_string()));
            }
            if !seen.insert(attribute.to_string()) {
                return Err(DbError::DuplicateAttribute(attribute.to_string()));
            }
            Ok(Assignment {
                attribute: attribute.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// Splits `name=value` at the first `=` outside a string literal.
fn split_assignment(pair: &str) -> Result<(&str, &str)> {
    let mut in_quote = false;
    for (idx, ch) in pair.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '=' if !in_quote => return Ok((&pair[..idx], &pair[idx + 1..])),
            _ => {}
        }
    }
    Err(DbError::MalformedList(format!(
        "{pair} is not a name=value pair"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("students").is_ok());
        assert!(validate_name("class_2").is_ok());
        assert!(validate_name("x").is_ok());
        assert!(matches!(validate_name(""), Err(DbError::InvalidName(_))));
        assert!(validate_name("name_").is_err());
        assert!(validate_name("a b").is_err());
        assert!(validate_name("'a'").is_err());
        assert!(validate_name("../etc").is_err());
    }

    #[test]
    fn test_validate_name_rejects_reserved_words() {
        for word in ["on", "SET", "From", "values", "and", "or", "Like", "table"] {
            assert!(
                matches!(validate_name(word), Err(DbError::ReservedName(_))),
                "{word} should be reserved"
            );
        }
        assert!(validate_name("online").is_ok());
        assert!(validate_name("order").is_ok());
    }

    #[test]
    fn test_split_values_quote_aware() {
        let items = split_values(" 'Ann, Lee' , 20 ,true").unwrap();
        assert_eq!(items, vec!["'Ann, Lee'", "20", "true"]);
    }

    #[test]
    fn test_split_values_rejects_empty_items() {
        assert!(matches!(
            split_values("a,,b"),
            Err(DbError::MalformedList(_))
        ));
        assert!(split_values("a,b,").is_err());
        assert!(matches!(
            split_values("'open"),
            Err(DbError::UnterminatedString)
        ));
    }

    #[test]
    fn test_attribute_list() {
        assert_eq!(
            parse_attribute_list("(name, age)").unwrap(),
            vec!["name", "age"]
        );
        assert!(matches!(
            parse_attribute_list("()"),
            Err(DbError::MalformedList(_))
        ));
        assert!(matches!(
            parse_attribute_list("(name, name)"),
            Err(DbError::DuplicateAttribute(_))
        ));
        assert!(matches!(
            parse_attribute_list("(id, name)"),
            Err(DbError::DuplicateAttribute(_))
        ));
        assert!(matches!(
            parse_attribute_list("name, age"),
            Err(DbError::MalformedList(_))
        ));
    }

    #[test]
    fn test_projection() {
        assert_eq!(parse_projection(" * ").unwrap(), ColumnsSelect::Star);
        assert_eq!(
            parse_projection("name, age").unwrap(),
            ColumnsSelect::ColumnsNames(vec!["name".into(), "age".into()])
        );
        assert!(parse_projection("").is_err());
    }

    #[test]
    fn test_value_list() {
        assert_eq!(
            parse_value_list("('Ann Lee', 20, 1.5, FALSE)").unwrap(),
            vec!["'Ann Lee'", "20", "1.5", "FALSE"]
        );
        assert!(matches!(
            parse_value_list("(Ann, 20)"),
            Err(DbError::InvalidLiteral(_))
        ));
        assert!(parse_value_list("()").is_err());
    }

    #[test]
    fn test_assignments() {
        let assignments = parse_assignments("age = 22, name='a=b'").unwrap();
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].attribute, "age");
        assert_eq!(assignments[0].value, "22");
        assert_eq!(assignments[1].attribute, "name");
        assert_eq!(assignments[1].value, "'a=b'");

        assert!(matches!(
            parse_assignments("age"),
            Err(DbError::MalformedList(_))
        ));
        assert!(matches!(
            parse_assignments("age=old"),
            Err(DbError::InvalidLiteral(_))
        ));
        assert!(matches!(
            parse_assignments("age=1, age=2"),
            Err(DbError::DuplicateAttribute(_))
        ));
    }
}
