use std::sync::Arc;

use crate::data_type::DataType;
use crate::error::{DbError, Result};

/// A typed view over a stored cell or a condition literal.
///
/// Cells are persisted exactly as written; a `Value` is built on demand when
/// a comparison needs to know what the text means.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A 64-bit signed integer value.
    Int(i64),
    /// A 64-bit floating-point value.
    Float(f64),
    /// The contents of a string literal, without its surrounding quotes.
    Text(Arc<str>),
    /// A boolean value.
    Bool(bool),
}

impl Value {
    /// Interprets a raw token as one of the four literal shapes.
    ///
    /// # Errors
    /// Returns [DbError::InvalidLiteral] if the token matches none of them.
    pub fn parse(raw: &str) -> Result<Self> {
        let data_type =
            DataType::classify(raw).ok_or_else(|| DbError::InvalidLiteral(raw.to_string()))?;

        let value = match data_type {
            DataType::Text => Self::Text(raw[1..raw.len() - 1].into()),
            DataType::Bool => Self::Bool(raw.eq_ignore_ascii_case("true")),
            DataType::Int => Self::Int(
                raw.parse()
                    .map_err(|_| DbError::InvalidLiteral(raw.to_string()))?,
            ),
            DataType::Float => Self::Float(
                raw.parse()
                    .map_err(|_| DbError::InvalidLiteral(raw.to_string()))?,
            ),
        };
        Ok(value)
    }

    /// Returns `true` if `raw` has one of the four literal shapes.
    pub fn is_literal(raw: &str) -> bool {
        DataType::classify(raw).is_some()
    }

    /// Returns the numeric view of this value, widening integers to `f64`.
    /// Otherwise, returns `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the unquoted contents if this is a [Value::Text].
    /// Otherwise, returns `None`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner boolean value if this is a [Value::Bool].
    /// Otherwise, returns `None`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int(_) => DataType::Int,
            Self::Float(_) => DataType::Float,
            Self::Text(_) => DataType::Text,
            Self::Bool(_) => DataType::Bool,
        }
    }
}

/// Equality used by `=`/`!=` conditions and by JOIN matching.
///
/// Two numbers compare numerically, two booleans ignore case, anything else
/// compares the stored text exactly.
pub fn cells_equal(left: &str, right: &str) -> bool {
    match (Value::parse(left), Value::parse(right)) {
        (Ok(l), Ok(r)) if l.data_type().is_numeric() && r.data_type().is_numeric() => {
            l.as_f64() == r.as_f64()
        }
        (Ok(Value::Bool(a)), Ok(Value::Bool(b))) => a == b,
        _ => left == right,
    }
}
