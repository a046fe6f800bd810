/// The literal shapes a stored cell or a condition operand can take.
///
/// Attributes carry no declared type: a cell is classified by its text each
/// time it is compared or inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// Optional leading `-` followed by digits, fitting a 64-bit signed integer.
    Int,
    /// An integer, a `.`, then digits.
    Float,
    /// Single-quoted text with no embedded quote, tab or line break.
    Text,
    /// `true` or `false`, any case.
    Bool,
}

impl DataType {
    /// Classifies a raw token by its shape, or `None` if it is not a literal.
    pub fn classify(raw: &str) -> Option<Self> {
        if is_string_literal(raw) {
            Some(Self::Text)
        } else if raw.eq_ignore_ascii_case("true") || raw.eq_ignore_ascii_case("false") {
            Some(Self::Bool)
        } else if is_integer(raw) {
            Some(Self::Int)
        } else if is_float(raw) {
            Some(Self::Float)
        } else {
            None
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }
}

fn is_string_literal(raw: &str) -> bool {
    raw.len() >= 2
        && raw.starts_with('\'')
        && raw.ends_with('\'')
        && !raw[1..raw.len() - 1]
            .chars()
            .any(|c| matches!(c, '\'' | '\t' | '\r' | '\n'))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    is_digits(digits) && raw.parse::<i64>().is_ok()
}

fn is_float(raw: &str) -> bool {
    match raw.split_once('.') {
        Some((whole, fraction)) => {
            let whole_digits = whole.strip_prefix('-').unwrap_or(whole);
            is_digits(whole_digits) && is_digits(fraction)
        }
        None => false,
    }
}
