//! Row filters for WHERE clauses.
//!
//! A condition is compiled once per statement into a postfix sequence and then
//! evaluated against every row of the target table.

use std::fmt;

use bitvec::prelude::*;
use tracing::debug;

use crate::error::{DbError, Result};
use crate::list::validate_name;
use crate::row::Row;
use crate::table::Table;
use crate::value::{Value, cells_equal};

/// Comparison and boolean operators, each with a one-character internal code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Less,
    Greater,
    GreaterEqual,
    LessEqual,
    Like,
    And,
    Or,
}

impl Operator {
    pub fn code(self) -> char {
        match self {
            Self::Equal => '=',
            Self::NotEqual => '!',
            Self::Less => '<',
            Self::Greater => '>',
            Self::GreaterEqual => '@',
            Self::LessEqual => '£',
            Self::Like => '~',
            Self::And => '&',
            Self::Or => '+',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        let op = match code {
            '=' => Self::Equal,
            '!' => Self::NotEqual,
            '<' => Self::Less,
            '>' => Self::Greater,
            '@' => Self::GreaterEqual,
            '£' => Self::LessEqual,
            '~' => Self::Like,
            '&' => Self::And,
            '+' => Self::Or,
            _ => return None,
        };
        Some(op)
    }

    /// `AND` and `OR` combine results; every other operator compares an
    /// attribute with a literal.
    pub fn is_boolean(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

/// One element of a compiled condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// An attribute name or a literal, exactly as written.
    Operand(String),
    Operator(Operator),
}

/// A compiled WHERE clause in postfix order, first term evaluated first.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    postfix: Vec<Term>,
}

/// Rewrites multi-character and word operators into their internal codes.
///
/// String literals are copied untouched. The codes themselves are reserved:
/// finding one in the input outside a literal is an error.
///
/// # Errors
/// Returns [DbError::ReservedCharacter] or [DbError::UnterminatedString].
pub fn canonicalize(text: &str) -> Result<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let next = chars.get(i + 1).copied();
        match ch {
            '\'' => {
                let close = chars[i + 1..]
                    .iter()
                    .position(|&c| c == '\'')
                    .ok_or(DbError::UnterminatedString)?;
                let end = i + 1 + close;
                out.extend(&chars[i..=end]);
                i = end + 1;
            }
            '=' if next == Some('=') => {
                out.push('=');
                i += 2;
            }
            '!' if next == Some('=') => {
                out.push(Operator::NotEqual.code());
                i += 2;
            }
            '>' if next == Some('=') => {
                out.push(Operator::GreaterEqual.code());
                i += 2;
            }
            '<' if next == Some('=') => {
                out.push(Operator::LessEqual.code());
                i += 2;
            }
            '!' | '@' | '£' | '~' | '&' | '+' => return Err(DbError::ReservedCharacter(ch)),
            c if c.is_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.to_uppercase().as_str() {
                    "AND" => out.push(Operator::And.code()),
                    "OR" => out.push(Operator::Or.code()),
                    "LIKE" => out.push(Operator::Like.code()),
                    _ => out.push_str(&word),
                }
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }
    Ok(out)
}

/// Entries of the operator stack used while compiling.
enum Frame {
    Open,
    Op(Operator),
}

/// What the type-check pass knows about each stack slot.
enum Shape<'a> {
    Operand(&'a str),
    Outcome,
}

/// Runtime stack slot: an unevaluated token or an evaluated sub-result.
enum Slot<'a> {
    Token(&'a str),
    Outcome(bool),
}

impl Condition {
    /// Compiles an infix condition into postfix form.
    ///
    /// Every sub-expression that combines others must be parenthesized:
    /// `(a=1) AND (b>2)` works, `a=1 AND b>2` does not.
    ///
    /// # Errors
    /// Fails with a syntax error on reserved characters, unbalanced
    /// parentheses, an empty condition, or an operator that lacks operands of
    /// the right kind.
    ///
    /// # Example
    /// ```
    /// # use tsvdb::condition::Condition;
    /// let condition = Condition::compile("(age >= 18) AND (name LIKE 'An')").unwrap();
    /// assert_eq!(condition.to_string(), "age 18 @ name 'An' ~ &");
    /// ```
    pub fn compile(text: &str) -> Result<Self> {
        let canonical = canonicalize(text)?;
        let chars: Vec<char> = canonical.chars().collect();
        let mut stack: Vec<Frame> = Vec::new();
        let mut postfix = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];
            if ch.is_whitespace() {
                i += 1;
                continue;
            }
            match ch {
                '(' => {
                    stack.push(Frame::Open);
                    i += 1;
                }
                ')' => {
                    if let Some(Frame::Op(op)) = stack.last() {
                        postfix.push(Term::Operator(*op));
                        stack.pop();
                    }
                    match stack.pop() {
                        Some(Frame::Open) => {}
                        Some(Frame::Op(_)) => {
                            return Err(DbError::MalformedCondition(
                                "each operator needs its own parentheses".to_string(),
                            ));
                        }
                        None => {
                            return Err(DbError::MalformedCondition(
                                "unbalanced parentheses".to_string(),
                            ));
                        }
                    }
                    i += 1;
                }
                '\'' => {
                    let close = chars[i + 1..]
                        .iter()
                        .position(|&c| c == '\'')
                        .ok_or(DbError::UnterminatedString)?;
                    let end = i + 1 + close;
                    postfix.push(Term::Operand(chars[i..=end].iter().collect()));
                    i = end + 1;
                }
                c => match Operator::from_code(c) {
                    Some(op) => {
                        stack.push(Frame::Op(op));
                        i += 1;
                    }
                    None => {
                        let start = i;
                        while i < chars.len() && !is_boundary(chars[i]) {
                            i += 1;
                        }
                        postfix.push(Term::Operand(chars[start..i].iter().collect()));
                    }
                },
            }
        }

        let top_level = stack
            .iter()
            .filter(|frame| matches!(frame, Frame::Op(_)))
            .count();
        if top_level > 1 {
            return Err(DbError::MalformedCondition(
                "each operator needs its own parentheses".to_string(),
            ));
        }

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Op(op) => postfix.push(Term::Operator(op)),
                Frame::Open => {
                    return Err(DbError::MalformedCondition(
                        "unclosed parenthesis".to_string(),
                    ));
                }
            }
        }

        if postfix.is_empty() {
            return Err(DbError::MalformedCondition("empty condition".to_string()));
        }

        let condition = Self { postfix };
        condition.check()?;
        debug!(postfix = %condition, "condition compiled");
        Ok(condition)
    }

    pub fn postfix(&self) -> &[Term] {
        &self.postfix
    }

    /// Attribute names compared by this condition, in order of appearance.
    pub fn referenced_attributes(&self) -> Vec<&str> {
        let mut names = Vec::new();
        let mut operands: Vec<Option<&str>> = Vec::new();
        for term in &self.postfix {
            match term {
                Term::Operand(text) => operands.push(Some(text.as_str())),
                Term::Operator(op) => {
                    operands.pop();
                    let left = operands.pop().flatten();
                    if !op.is_boolean() {
                        if let Some(name) = left {
                            if !names.contains(&name) {
                                names.push(name);
                            }
                        }
                    }
                    operands.push(None);
                }
            }
        }
        names
    }

    /// Simulates evaluation on shapes only, so a bad condition is rejected
    /// before any row is read.
    fn check(&self) -> Result<()> {
        let mut stack: Vec<Shape<'_>> = Vec::new();

        for term in &self.postfix {
            match term {
                Term::Operand(text) => stack.push(Shape::Operand(text)),
                Term::Operator(op) => {
                    let (Some(right), Some(left)) = (stack.pop(), stack.pop()) else {
                        return Err(DbError::MalformedCondition(format!(
                            "operator {} is missing an operand",
                            op.code()
                        )));
                    };
                    match (op.is_boolean(), left, right) {
                        (true, Shape::Outcome, Shape::Outcome) => {}
                        (true, _, _) => {
                            return Err(DbError::MalformedCondition(format!(
                                "operator {} must combine two comparisons",
                                op.code()
                            )));
                        }
                        (false, Shape::Operand(name), Shape::Operand(literal)) => {
                            validate_name(name)?;
                            if !Value::is_literal(literal) {
                                return Err(DbError::InvalidLiteral(literal.to_string()));
                            }
                        }
                        (false, _, _) => {
                            return Err(DbError::MalformedCondition(format!(
                                "operator {} must compare an attribute with a literal",
                                op.code()
                            )));
                        }
                    }
                    stack.push(Shape::Outcome);
                }
            }
        }

        match stack.as_slice() {
            [Shape::Outcome] => Ok(()),
            _ => Err(DbError::MalformedCondition(
                "condition does not reduce to a single comparison".to_string(),
            )),
        }
    }

    /// Evaluates the condition against one row of `table`.
    ///
    /// Operands are popped right first, then left: `age > 20` compares the
    /// row's `age` cell on the left with `20` on the right.
    ///
    /// # Errors
    /// Returns an evaluation error when an operand has the wrong shape for
    /// its operator, and [DbError::AttributeNotFound] for unknown attributes.
    pub fn evaluate(&self, table: &Table, row: &Row) -> Result<bool> {
        let mut stack: Vec<Slot<'_>> = Vec::new();

        for term in &self.postfix {
            match term {
                Term::Operand(text) => stack.push(Slot::Token(text)),
                Term::Operator(op) => {
                    let right = stack.pop().ok_or(DbError::StackUnderflow(op.code()))?;
                    let left = stack.pop().ok_or(DbError::StackUnderflow(op.code()))?;
                    let outcome = match (left, right) {
                        (Slot::Outcome(l), Slot::Outcome(r)) if op.is_boolean() => match op {
                            Operator::And => l && r,
                            _ => l || r,
                        },
                        (Slot::Token(token), _) | (_, Slot::Token(token)) if op.is_boolean() => {
                            return Err(DbError::NonBooleanOperand(token.to_string()));
                        }
                        (Slot::Token(name), Slot::Token(literal)) => {
                            let index = table.attribute_index(name)?;
                            let cell = row.cell(index).ok_or_else(|| DbError::CorruptTable {
                                path: table.rows_path().to_path_buf(),
                                reason: format!("row {} has no cell for {name}", row.id()),
                            })?;
                            compare(*op, cell, literal)?
                        }
                        _ => {
                            return Err(DbError::MalformedCondition(format!(
                                "operator {} applied to an evaluated result",
                                op.code()
                            )));
                        }
                    };
                    stack.push(Slot::Outcome(outcome));
                }
            }
        }

        match stack.as_slice() {
            [Slot::Outcome(keep)] => Ok(*keep),
            _ => Err(DbError::UnresolvedCondition),
        }
    }

    /// Builds a selection mask over the rows of `table`: bit `i` is set when
    /// row `i` satisfies the condition.
    ///
    /// # Errors
    /// Returns [DbError::AttributeNotFound] if the condition names an
    /// attribute the table lacks, even when the table has no rows.
    pub fn filter(&self, table: &Table) -> Result<BitVec> {
        for name in self.referenced_attributes() {
            table.attribute_index(name)?;
        }

        let mut mask = bitvec![0; table.rows.len()];
        for (i, row) in table.rows.iter().enumerate() {
            if self.evaluate(table, row)? {
                mask.set(i, true);
            }
        }
        debug!(
            table = %table.name,
            matched = mask.count_ones(),
            scanned = mask.len(),
            "condition applied"
        );
        Ok(mask)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.postfix.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match term {
                Term::Operand(text) => f.write_str(text)?,
                Term::Operator(op) => write!(f, "{}", op.code())?,
            }
        }
        Ok(())
    }
}

fn is_boundary(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, '(' | ')' | '\'') || Operator::from_code(ch).is_some()
}

/// Applies a comparison operator to a stored cell and a literal.
fn compare(op: Operator, cell: &str, literal: &str) -> Result<bool> {
    let outcome = match op {
        Operator::Equal => cells_equal(cell, literal),
        Operator::NotEqual => !cells_equal(cell, literal),
        Operator::Less | Operator::Greater | Operator::GreaterEqual | Operator::LessEqual => {
            let left = numeric(cell)?;
            let right = numeric(literal)?;
            match op {
                Operator::Less => left < right,
                Operator::Greater => left > right,
                Operator::GreaterEqual => left >= right,
                _ => left <= right,
            }
        }
        Operator::Like => {
            let haystack = text(cell)?;
            let needle = text(literal)?;
            haystack.contains(needle.as_ref())
        }
        Operator::And | Operator::Or => {
            return Err(DbError::NonBooleanOperand(cell.to_string()));
        }
    };
    Ok(outcome)
}

fn numeric(raw: &str) -> Result<f64> {
    Value::parse(raw)
        .ok()
        .and_then(|v| v.as_f64())
        .ok_or_else(|| DbError::NonNumericOperand(raw.to_string()))
}

fn text(raw: &str) -> Result<std::sync::Arc<str>> {
    match Value::parse(raw) {
        Ok(Value::Text(s)) => Ok(s),
        _ => Err(DbError::NonStringOperand(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn students() -> Table {
        let mut table = Table::new(Path::new("unused"), "students");
        table.append_attribute("name").unwrap();
        table.append_attribute("age").unwrap();
        table.append_attribute("active").unwrap();
        table
            .insert(vec!["'Ann'".into(), "20".into(), "true".into()])
            .unwrap();
        table
            .insert(vec!["'Bo'".into(), "21".into(), "FALSE".into()])
            .unwrap();
        table
            .insert(vec!["'Anna'".into(), "19.5".into(), "true".into()])
            .unwrap();
        table
    }

    fn selected(condition: &str) -> Vec<usize> {
        let table = students();
        let mask = Condition::compile(condition)
            .unwrap()
            .filter(&table)
            .unwrap();
        mask.iter_ones().collect()
    }

    // ─── Test 1 : canonicalization ───
    #[test]
    fn test_canonicalize_operators() {
        assert_eq!(canonicalize("a==1").unwrap(), "a=1");
        assert_eq!(canonicalize("a!=1").unwrap(), "a!1");
        assert_eq!(canonicalize("a>=1").unwrap(), "a@1");
        assert_eq!(canonicalize("a<=1").unwrap(), "a£1");
        assert_eq!(
            canonicalize("(a=1) and (b like 'x') OR (c<2)").unwrap(),
            "(a=1) & (b ~ 'x') + (c<2)"
        );
    }

    #[test]
    fn test_canonicalize_leaves_literals_alone() {
        assert_eq!(
            canonicalize("name='Tom & Jerry or >= 3'").unwrap(),
            "name='Tom & Jerry or >= 3'"
        );
        assert_eq!(canonicalize("brand=1").unwrap(), "brand=1");
    }

    #[test]
    fn test_canonicalize_rejects_reserved() {
        for (input, ch) in [("a&b", '&'), ("a+1", '+'), ("a~'x'", '~'), ("a@1", '@'), ("a!b", '!')] {
            assert!(
                matches!(canonicalize(input), Err(DbError::ReservedCharacter(c)) if c == ch),
                "{input}"
            );
        }
        assert!(matches!(
            canonicalize("a='open"),
            Err(DbError::UnterminatedString)
        ));
    }

    // ─── Test 2 : compilation ───
    #[test]
    fn test_compile_simple() {
        let condition = Condition::compile("(age>19)").unwrap();
        assert_eq!(
            condition.postfix(),
            &[
                Term::Operand("age".into()),
                Term::Operand("19".into()),
                Term::Operator(Operator::Greater),
            ]
        );
        assert_eq!(Condition::compile("age>19").unwrap(), condition);
    }

    #[test]
    fn test_compile_nested() {
        let condition =
            Condition::compile("((age >= 20) AND (name = 'Bo')) OR (active == false)").unwrap();
        assert_eq!(
            condition.to_string(),
            "age 20 @ name 'Bo' = & active false = +"
        );
        assert_eq!(
            condition.referenced_attributes(),
            vec!["age", "name", "active"]
        );
    }

    #[test]
    fn test_compile_quoted_operand_keeps_spaces() {
        let condition = Condition::compile("(name = 'Ann Lee')").unwrap();
        assert_eq!(condition.postfix()[1], Term::Operand("'Ann Lee'".into()));
    }

    #[test]
    fn test_compile_rejects_malformed() {
        for input in [
            "",
            "   ",
            "(age>19",
            "age>19)",
            "(age>19) AND",
            "age>19 AND name='Bo'",
            "(age>19 AND name='Bo')",
            "(age>20) AND (name='Bo') OR (name='Ann')",
            "(age>20) OR (name='Bo') OR (name='Ann')",
            "(age)",
            "((age>19) > 3)",
        ] {
            assert!(
                matches!(
                    Condition::compile(input),
                    Err(DbError::MalformedCondition(_))
                ),
                "{input:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_compile_checks_operand_shapes() {
        assert!(matches!(
            Condition::compile("(age>old)"),
            Err(DbError::InvalidLiteral(_))
        ));
        assert!(matches!(
            Condition::compile("('age'=1)"),
            Err(DbError::InvalidName(_))
        ));
    }

    // ─── Test 3 : evaluation ───
    #[test]
    fn test_filter_comparisons() {
        assert_eq!(selected("(age>19)"), vec![0, 1, 2]);
        assert_eq!(selected("(age>20)"), vec![1]);
        assert_eq!(selected("(age<=20)"), vec![0, 2]);
        assert_eq!(selected("(age>=21)"), vec![1]);
        assert_eq!(selected("(age<20)"), vec![2]);
        assert_eq!(selected("(age=20.0)"), vec![0]);
        assert_eq!(selected("(age!=20)"), vec![1, 2]);
    }

    #[test]
    fn test_filter_text_and_bool() {
        assert_eq!(selected("(name='Bo')"), vec![1]);
        assert_eq!(selected("(name=='bo')"), Vec::<usize>::new());
        assert_eq!(selected("(name LIKE 'An')"), vec![0, 2]);
        assert_eq!(selected("(name LIKE 'nn')"), vec![0, 2]);
        assert_eq!(selected("(active=TRUE)"), vec![0, 2]);
        assert_eq!(selected("(active=false)"), vec![1]);
    }

    #[test]
    fn test_filter_boolean_operators() {
        assert_eq!(selected("(age>19) AND (name LIKE 'Ann')"), vec![0, 2]);
        assert_eq!(selected("((age>19) AND (name LIKE 'Ann')) AND (age<20)"), vec![2]);
        assert_eq!(selected("(name='Bo') OR (age<20)"), vec![1, 2]);
    }

    #[test]
    fn test_operand_order_is_preserved() {
        // left operand is the attribute, right operand is the literal
        assert_eq!(selected("(age<21)"), vec![0, 2]);
        assert_eq!(selected("(age>21)"), Vec::<usize>::new());
    }

    #[test]
    fn test_evaluation_errors() {
        let table = students();

        let condition = Condition::compile("(name>3)").unwrap();
        assert!(matches!(
            condition.filter(&table),
            Err(DbError::NonNumericOperand(_))
        ));

        let condition = Condition::compile("(age LIKE '2')").unwrap();
        assert!(matches!(
            condition.filter(&table),
            Err(DbError::NonStringOperand(_))
        ));

        let condition = Condition::compile("(name LIKE 2)").unwrap();
        assert!(matches!(
            condition.filter(&table),
            Err(DbError::NonStringOperand(_))
        ));
    }

    #[test]
    fn test_unknown_attribute_on_empty_table() {
        let table = Table::new(Path::new("unused"), "empty");
        let condition = Condition::compile("(height>3)").unwrap();
        assert!(matches!(
            condition.filter(&table),
            Err(DbError::AttributeNotFound { .. })
        ));
    }

    #[test]
    fn test_top_level_chain_needs_grouping() {
        assert_eq!(
            selected("((age>20) AND (name='Bo')) OR (name='Ann')"),
            vec![0, 1]
        );
        assert_eq!(
            selected("(age>20) AND ((name='Bo') OR (name='Ann'))"),
            vec![1]
        );
    }

    // ─── Test 4 : evaluation of unchecked postfix ───
    fn unchecked(terms: Vec<Term>) -> Condition {
        Condition { postfix: terms }
    }

    #[test]
    fn test_evaluate_stack_errors() {
        let table = students();
        let row = &table.rows[0];

        let condition = unchecked(vec![
            Term::Operand("age".into()),
            Term::Operator(Operator::Greater),
        ]);
        assert!(matches!(
            condition.evaluate(&table, row),
            Err(DbError::StackUnderflow('>'))
        ));

        let condition = unchecked(vec![
            Term::Operand("age".into()),
            Term::Operand("20".into()),
            Term::Operator(Operator::And),
        ]);
        assert!(matches!(
            condition.evaluate(&table, row),
            Err(DbError::NonBooleanOperand(ref token)) if token == "age"
        ));

        let condition = unchecked(vec![Term::Operand("age".into())]);
        assert!(matches!(
            condition.evaluate(&table, row),
            Err(DbError::UnresolvedCondition)
        ));

        let condition = unchecked(vec![
            Term::Operand("age".into()),
            Term::Operand("20".into()),
            Term::Operator(Operator::Equal),
            Term::Operand("age".into()),
            Term::Operand("20".into()),
            Term::Operator(Operator::Equal),
        ]);
        assert!(matches!(
            condition.evaluate(&table, row),
            Err(DbError::UnresolvedCondition)
        ));
    }

    #[test]
    fn test_evaluate_is_pure() {
        let table = students();
        let condition = Condition::compile("(age>20) OR (name='Ann')").unwrap();
        for row in &table.rows {
            let first = condition.evaluate(&table, row).unwrap();
            let second = condition.evaluate(&table, row).unwrap();
            assert_eq!(first, second);
        }
    }
}
