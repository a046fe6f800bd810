use std::fmt;

use crate::error::{DbError, Result};

/// Statement terminator required at the end of every command.
pub const TERMINATOR: char = ';';

/// A statement split into its main clause and its trailing parenthetical list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    /// Everything before the first `(` that is not inside a string literal.
    pub main: String,
    /// The first `(` and everything after it, when present.
    pub list: Option<String>,
}

/// Strips the terminator and separates the trailing list from the main clause.
///
/// # Errors
/// Returns [DbError::EmptyStatement] for blank input and
/// [DbError::UnterminatedStatement] when the terminator is missing.
pub fn preprocess(text: &str) -> Result<RawStatement> {
    let trimmed = text.trim_end();
    if trimmed.trim_start().is_empty() {
        return Err(DbError::EmptyStatement);
    }
    let body = trimmed
        .strip_suffix(TERMINATOR)
        .ok_or(DbError::UnterminatedStatement)?
        .trim();
    if body.is_empty() {
        return Err(DbError::EmptyStatement);
    }

    let mut in_quote = false;
    for (idx, ch) in body.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => {
                return Ok(RawStatement {
                    main: body[..idx].trim_end().to_string(),
                    list: Some(body[idx..].to_string()),
                });
            }
            _ => {}
        }
    }

    Ok(RawStatement {
        main: body.to_string(),
        list: None,
    })
}

/// The words a statement's main clause is made of.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // --- Verbs ---
    Use,
    Create,
    Drop,
    Alter,
    Insert,
    Select,
    Update,
    Delete,
    Join,

    // --- Keywords ---
    Table,
    Database,
    Add,
    Into,
    Values,
    From,
    Where,
    Set,
    And,
    On,

    /// Wildcard projection `*`.
    Star,
    /// Any other whitespace-delimited word: a name, a literal, or a fragment
    /// of a list or condition.
    Word(String),

    // --- Special ---
    /// Represents the end of the main clause.
    Eof,
}

impl Token {
    fn from_word(word: String) -> Self {
        match word.to_uppercase().as_str() {
            "USE" => Self::Use,
            "CREATE" => Self::Create,
            "DROP" => Self::Drop,
            "ALTER" => Self::Alter,
            "INSERT" => Self::Insert,
            "SELECT" => Self::Select,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "JOIN" => Self::Join,
            "TABLE" => Self::Table,
            "DATABASE" => Self::Database,
            "ADD" => Self::Add,
            "INTO" => Self::Into,
            "VALUES" => Self::Values,
            "FROM" => Self::From,
            "WHERE" => Self::Where,
            "SET" => Self::Set,
            "AND" => Self::And,
            "ON" => Self::On,
            "*" => Self::Star,
            _ => Self::Word(word),
        }
    }
}

/// Condition words that never become tokens but are rewritten to operators.
const CONDITION_WORDS: [&str; 3] = ["AND", "OR", "LIKE"];

/// Returns `true` if `word` is read as a keyword or a condition operator,
/// in any letter case.
pub fn is_reserved(word: &str) -> bool {
    !matches!(Token::from_word(word.to_string()), Token::Word(_))
        || CONDITION_WORDS
            .iter()
            .any(|reserved| word.eq_ignore_ascii_case(reserved))
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            Self::Use => "USE",
            Self::Create => "CREATE",
            Self::Drop => "DROP",
            Self::Alter => "ALTER",
            Self::Insert => "INSERT",
            Self::Select => "SELECT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Join => "JOIN",
            Self::Table => "TABLE",
            Self::Database => "DATABASE",
            Self::Add => "ADD",
            Self::Into => "INTO",
            Self::Values => "VALUES",
            Self::From => "FROM",
            Self::Where => "WHERE",
            Self::Set => "SET",
            Self::And => "AND",
            Self::On => "ON",
            Self::Star => "*",
            Self::Word(word) => word,
            Self::Eof => "end of statement",
        };
        f.write_str(keyword)
    }
}

/// Splits a main clause into [Token]s on whitespace, keeping string literals whole.
pub struct Tokenizer {
    /// The input string stored as a vector of characters for easy iteration.
    input: Vec<char>,
    /// The current position in the character vector.
    position: usize,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Processes the entire input and returns a vector of tokens ending in [Token::Eof].
    ///
    /// # Errors
    /// Returns [DbError::UnterminatedString] if a quote is never closed.
    ///
    /// # Example
    /// ```
    /// # use tsvdb::tokenizer::{Tokenizer, Token};
    /// let tokens = Tokenizer::new("select * from users").tokenize().unwrap();
    /// assert_eq!(tokens[0], Token::Select);
    /// assert_eq!(tokens[1], Token::Star);
    /// ```
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while !self.is_at_end() {
            self.skip_whitespace();

            if self.is_at_end() {
                break;
            }

            let word = self.read_word()?;
            tokens.push(Token::from_word(word));
        }

        tokens.push(Token::Eof);
        Ok(tokens)
    }

    // --- Navigation Helpers ---

    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    // --- Extraction Logic ---

    /// Reads up to the next whitespace that is not inside a string literal.
    fn read_word(&mut self) -> Result<String> {
        let mut word = String::new();
        let mut in_quote = false;

        while !self.is_at_end() {
            let ch = self.current_char();
            if ch.is_whitespace() && !in_quote {
                break;
            }
            if ch == '\'' {
                in_quote = !in_quote;
            }
            word.push(ch);
            self.advance();
        }

        if in_quote {
            return Err(DbError::UnterminatedString);
        }
        Ok(word)
    }
}
