use std::path::PathBuf;

use thiserror::Error;

/// Result type for every parse, storage and evaluation step.
pub type Result<T> = std::result::Result<T, DbError>;

/// The four families a statement failure can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong or missing keyword, malformed literal, list or condition.
    Syntax,
    /// Well-formed statement referring to something that does not fit the stored state.
    Semantic,
    /// Filesystem failure or unreadable table files.
    Storage,
    /// Failure while running a compiled condition against a row.
    Evaluation,
}

/// Every way a statement can fail.
#[derive(Debug, Error)]
pub enum DbError {
    // --- Syntax ---
    #[error("Command was empty")]
    EmptyStatement,

    #[error("Statement did not end with a semicolon")]
    UnterminatedStatement,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },

    #[error("Unexpected input after statement: {0}")]
    TrailingInput(String),

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("{0} is a reserved word and cannot be used as a name")]
    ReservedName(String),

    #[error("Value {0} is not a string, boolean, integer or float literal")]
    InvalidLiteral(String),

    #[error("Malformed list: {0}")]
    MalformedList(String),

    #[error("Malformed condition: {0}")]
    MalformedCondition(String),

    #[error("Condition contains reserved character {0:?}")]
    ReservedCharacter(char),

    #[error("Unterminated string literal")]
    UnterminatedString,

    #[error("{0} requires a WHERE condition")]
    ConditionRequired(&'static str),

    // --- Semantic ---
    #[error("No working database has been selected")]
    NoWorkingDatabase,

    #[error("Database {0} does not exist")]
    DatabaseNotFound(String),

    #[error("Database {0} already exists")]
    DatabaseExists(String),

    #[error("Table {0} does not exist")]
    TableNotFound(String),

    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Attribute {attribute} does not exist in table {table}")]
    AttributeNotFound { table: String, attribute: String },

    #[error("Attribute {0} appears more than once")]
    DuplicateAttribute(String),

    #[error("Attribute {0} cannot be changed")]
    ProtectedAttribute(String),

    #[error("Number of values didn't match number of attributes: expected {expected}, found {found}")]
    WidthMismatch { expected: usize, found: usize },

    // --- Storage ---
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Table file {path} is corrupt: {reason}")]
    CorruptTable { path: PathBuf, reason: String },

    // --- Evaluation ---
    #[error("Condition stack underflow at operator {0}")]
    StackUnderflow(char),

    #[error("Condition did not reduce to a single boolean result")]
    UnresolvedCondition,

    #[error("Cannot use non-number {0} for inequality expressions")]
    NonNumericOperand(String),

    #[error("LIKE operator requires string literals, found {0}")]
    NonStringOperand(String),

    #[error("Boolean operator applied to unevaluated operand {0}")]
    NonBooleanOperand(String),
}

impl DbError {
    /// Wraps an I/O failure with a short description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn unexpected(expected: impl Into<String>, found: impl ToString) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyStatement
            | Self::UnterminatedStatement
            | Self::UnknownCommand(_)
            | Self::UnexpectedToken { .. }
            | Self::TrailingInput(_)
            | Self::InvalidName(_)
            | Self::ReservedName(_)
            | Self::InvalidLiteral(_)
            | Self::MalformedList(_)
            | Self::MalformedCondition(_)
            | Self::ReservedCharacter(_)
            | Self::UnterminatedString
            | Self::ConditionRequired(_) => ErrorKind::Syntax,

            Self::NoWorkingDatabase
            | Self::DatabaseNotFound(_)
            | Self::DatabaseExists(_)
            | Self::TableNotFound(_)
            | Self::TableExists(_)
            | Self::AttributeNotFound { .. }
            | Self::DuplicateAttribute(_)
            | Self::ProtectedAttribute(_)
            | Self::WidthMismatch { .. } => ErrorKind::Semantic,

            Self::Io { .. } | Self::CorruptTable { .. } => ErrorKind::Storage,

            Self::StackUnderflow(_)
            | Self::UnresolvedCondition
            | Self::NonNumericOperand(_)
            | Self::NonStringOperand(_)
            | Self::NonBooleanOperand(_) => ErrorKind::Evaluation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(DbError::EmptyStatement.kind(), ErrorKind::Syntax);
        assert_eq!(
            DbError::unexpected("FROM", "WHERE").kind(),
            ErrorKind::Syntax
        );
        assert_eq!(DbError::NoWorkingDatabase.kind(), ErrorKind::Semantic);
        assert_eq!(
            DbError::io("write", std::io::Error::other("disk full")).kind(),
            ErrorKind::Storage
        );
        assert_eq!(DbError::UnresolvedCondition.kind(), ErrorKind::Evaluation);
    }

    #[test]
    fn test_messages_name_the_problem() {
        let err = DbError::unexpected("FROM", "WHERE");
        assert_eq!(err.to_string(), "Expected FROM, found WHERE");

        let err = DbError::AttributeNotFound {
            table: "students".into(),
            attribute: "height".into(),
        };
        assert!(err.to_string().contains("height"));
        assert!(err.to_string().contains("students"));
    }
}
