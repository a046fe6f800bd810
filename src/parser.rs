use crate::ast::*;
use crate::condition::Condition;
use crate::error::{DbError, Result};
use crate::list::{
    parse_assignments, parse_attribute_list, parse_projection, parse_value_list, validate_name,
};
use crate::tokenizer::{Token, Tokenizer, preprocess};

/// Preprocesses, tokenizes and parses one raw statement.
///
/// # Example
/// ```
/// # use tsvdb::ast::Statement;
/// # use tsvdb::parser::parse_statement;
/// let statement = parse_statement("USE school;").unwrap();
/// assert_eq!(statement, Statement::Use("school".into()));
/// ```
pub fn parse_statement(text: &str) -> Result<Statement> {
    let raw = preprocess(text)?;
    let tokens = Tokenizer::new(&raw.main).tokenize()?;
    Parser::new(tokens, raw.list).parse()
}

/// Per-verb grammar over the tokens of a main clause and its split-off list.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    /// The trailing parenthetical list, until a grammar rule takes it.
    list: Option<String>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>, list: Option<String>) -> Self {
        Self {
            tokens,
            position: 0,
            list,
        }
    }

    /// Parses a full statement.
    ///
    /// # Errors
    /// Returns [DbError::UnknownCommand] for an unrecognised verb, a syntax
    /// error naming the expected keyword on a token mismatch, and
    /// [DbError::TrailingInput] when tokens or a list are left over.
    pub fn parse(&mut self) -> Result<Statement> {
        let statement = match self.current_token() {
            Token::Use => self.parse_use(),
            Token::Create => self.parse_create(),
            Token::Drop => self.parse_drop(),
            Token::Alter => self.parse_alter(),
            Token::Insert => self.parse_insert(),
            Token::Select => self.parse_select(),
            Token::Update => self.parse_update(),
            Token::Delete => self.parse_delete(),
            Token::Join => self.parse_join(),
            _ => Err(DbError::UnknownCommand(
                self.current_token().to_string(),
            )),
        }?;

        if !self.is_at_end() {
            return Err(DbError::TrailingInput(self.current_token().to_string()));
        }
        if let Some(list) = self.list.take() {
            return Err(DbError::TrailingInput(list));
        }

        Ok(statement)
    }

    //helpers
    fn current_token(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    fn consume(&mut self, expected: Token) -> Result<()> {
        if *self.current_token() == expected {
            self.advance();
            Ok(())
        } else {
            Err(DbError::unexpected(expected.to_string(), self.current_token()))
        }
    }

    fn consume_name(&mut self) -> Result<String> {
        match self.current_token() {
            Token::Word(word) => {
                let name = word.clone();
                validate_name(&name)?;
                self.advance();
                Ok(name)
            }
            _ => Err(DbError::unexpected("a name", self.current_token())),
        }
    }

    /// Joins the words up to (not including) the first token in `stop` or the end.
    fn collect_until(&mut self, stop: &[Token]) -> String {
        let mut words = Vec::new();
        while !self.is_at_end() && !stop.contains(self.current_token()) {
            words.push(self.current_token().to_string());
            self.advance();
        }
        words.join(" ")
    }

    /// Everything left in the clause plus the split-off list, compiled.
    fn parse_condition(&mut self) -> Result<Condition> {
        let mut text = self.collect_until(&[]);
        if let Some(list) = self.list.take() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&list);
        }
        Condition::compile(&text)
    }

    // --- Grammar ---

    fn parse_use(&mut self) -> Result<Statement> {
        self.consume(Token::Use)?;
        Ok(Statement::Use(self.consume_name()?))
    }

    fn parse_create(&mut self) -> Result<Statement> {
        self.consume(Token::Create)?;
        match self.current_token() {
            Token::Database => {
                self.advance();
                Ok(Statement::CreateDatabase(self.consume_name()?))
            }
            Token::Table => {
                self.advance();
                let name = self.consume_name()?;
                let attributes = match self.list.take() {
                    Some(list) => parse_attribute_list(&list)?,
                    None => Vec::new(),
                };
                Ok(Statement::CreateTable(CreateTable { name, attributes }))
            }
            _ => Err(DbError::unexpected(
                "TABLE or DATABASE",
                self.current_token(),
            )),
        }
    }

    fn parse_drop(&mut self) -> Result<Statement> {
        self.consume(Token::Drop)?;
        match self.current_token() {
            Token::Database => {
                self.advance();
                Ok(Statement::DropDatabase(self.consume_name()?))
            }
            Token::Table => {
                self.advance();
                Ok(Statement::DropTable(self.consume_name()?))
            }
            _ => Err(DbError::unexpected(
                "TABLE or DATABASE",
                self.current_token(),
            )),
        }
    }

    fn parse_alter(&mut self) -> Result<Statement> {
        self.consume(Token::Alter)?;
        self.consume(Token::Table)?;
        let table = self.consume_name()?;
        let action = match self.current_token() {
            Token::Add => {
                self.advance();
                AlterAction::Add(self.consume_name()?)
            }
            Token::Drop => {
                self.advance();
                AlterAction::Drop(self.consume_name()?)
            }
            _ => return Err(DbError::unexpected("ADD or DROP", self.current_token())),
        };
        Ok(Statement::AlterTable(AlterTable { table, action }))
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        self.consume(Token::Insert)?;
        self.consume(Token::Into)?;
        let table = self.consume_name()?;
        self.consume(Token::Values)?;
        let list = self
            .list
            .take()
            .ok_or_else(|| DbError::MalformedList("INSERT requires a value list".to_string()))?;
        let values = parse_value_list(&list)?;
        Ok(Statement::InsertInto(InsertInto { table, values }))
    }

    fn parse_select(&mut self) -> Result<Statement> {
        self.consume(Token::Select)?;
        let projection = self.collect_until(&[Token::From]);
        self.consume(Token::From)?;
        let columns = parse_projection(&projection)?;
        let table = self.consume_name()?;

        let where_clause = if matches!(self.current_token(), Token::Where) {
            self.advance();
            Some(self.parse_condition()?)
        } else {
            None
        };

        Ok(Statement::Select(Select {
            columns,
            table,
            where_clause,
        }))
    }

    fn parse_update(&mut self) -> Result<Statement> {
        self.consume(Token::Update)?;
        let table = self.consume_name()?;
        self.consume(Token::Set)?;
        let assignments = parse_assignments(&self.collect_until(&[Token::Where]))?;
        if self.is_at_end() {
            return Err(DbError::ConditionRequired("UPDATE"));
        }
        self.consume(Token::Where)?;
        let where_clause = self.parse_condition()?;

        Ok(Statement::Update(Update {
            table,
            assignments,
            where_clause,
        }))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.consume(Token::Delete)?;
        self.consume(Token::From)?;
        let table = self.consume_name()?;
        if self.is_at_end() {
            return Err(DbError::ConditionRequired("DELETE"));
        }
        self.consume(Token::Where)?;
        let where_clause = self.parse_condition()?;

        Ok(Statement::Delete(Delete {
            table,
            where_clause,
        }))
    }

    fn parse_join(&mut self) -> Result<Statement> {
        self.consume(Token::Join)?;
        let primary_table = self.consume_name()?;
        self.consume(Token::And)?;
        let secondary_table = self.consume_name()?;
        self.consume(Token::On)?;
        let primary_attribute = self.consume_name()?;
        self.consume(Token::And)?;
        let secondary_attribute = self.consume_name()?;

        Ok(Statement::Join(Join {
            primary_table,
            secondary_table,
            primary_attribute,
            secondary_attribute,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_use_and_databases() {
        assert_eq!(
            parse_statement("use school;").unwrap(),
            Statement::Use("school".into())
        );
        assert_eq!(
            parse_statement("CREATE DATABASE school;").unwrap(),
            Statement::CreateDatabase("school".into())
        );
        assert_eq!(
            parse_statement("drop database school;").unwrap(),
            Statement::DropDatabase("school".into())
        );
    }

    #[test]
    fn test_parse_create_table() {
        let statement = parse_statement("CREATE TABLE students (name, age);").unwrap();

        match statement {
            Statement::CreateTable(ct) => {
                assert_eq!(ct.name, "students");
                assert_eq!(ct.attributes, vec!["name", "age"]);
            }
            _ => panic!("Expected CreateTable"),
        }

        let statement = parse_statement("CREATE TABLE marks;").unwrap();
        assert_eq!(
            statement,
            Statement::CreateTable(CreateTable {
                name: "marks".into(),
                attributes: vec![],
            })
        );
    }

    #[test]
    fn test_parse_create_errors() {
        assert!(matches!(
            parse_statement("CREATE TABLE students ();"),
            Err(DbError::MalformedList(_))
        ));
        assert!(matches!(
            parse_statement("CREATE TABLE students (a, a);"),
            Err(DbError::DuplicateAttribute(_))
        ));
        assert!(matches!(
            parse_statement("CREATE DATABASE school (a);"),
            Err(DbError::TrailingInput(_))
        ));
        assert!(matches!(
            parse_statement("CREATE INDEX students;"),
            Err(DbError::UnexpectedToken { .. })
        ));
        assert!(matches!(
            parse_statement("CREATE TABLE students_;"),
            Err(DbError::InvalidName(_))
        ));
    }

    #[test]
    fn test_parse_alter() {
        assert_eq!(
            parse_statement("ALTER TABLE students ADD email;").unwrap(),
            Statement::AlterTable(AlterTable {
                table: "students".into(),
                action: AlterAction::Add("email".into()),
            })
        );
        assert_eq!(
            parse_statement("alter table students drop age;").unwrap(),
            Statement::AlterTable(AlterTable {
                table: "students".into(),
                action: AlterAction::Drop("age".into()),
            })
        );
        let err = parse_statement("ALTER TABLE students RENAME age;").unwrap_err();
        assert_eq!(err.to_string(), "Expected ADD or DROP, found RENAME");
    }

    #[test]
    fn test_parse_insert() {
        assert_eq!(
            parse_statement("INSERT INTO students VALUES ('Ann Lee', 20);").unwrap(),
            Statement::InsertInto(InsertInto {
                table: "students".into(),
                values: vec!["'Ann Lee'".into(), "20".into()],
            })
        );
        assert!(matches!(
            parse_statement("INSERT INTO students VALUES;"),
            Err(DbError::MalformedList(_))
        ));
        let err = parse_statement("INSERT students VALUES (1);").unwrap_err();
        assert_eq!(err.to_string(), "Expected INTO, found students");
    }

    #[test]
    fn test_parse_select() {
        let statement = parse_statement("SELECT * FROM students WHERE (age>19);").unwrap();
        match statement {
            Statement::Select(select) => {
                assert_eq!(select.columns, ColumnsSelect::Star);
                assert_eq!(select.table, "students");
                let condition = select.where_clause.unwrap();
                assert_eq!(condition.to_string(), "age 19 >");
            }
            _ => panic!("Expected Select"),
        }

        let statement = parse_statement("select name, age from students;").unwrap();
        assert_eq!(
            statement,
            Statement::Select(Select {
                columns: ColumnsSelect::ColumnsNames(vec!["name".into(), "age".into()]),
                table: "students".into(),
                where_clause: None,
            })
        );
    }

    #[test]
    fn test_parse_select_condition_spanning_list() {
        let statement =
            parse_statement("SELECT name FROM students WHERE age > 19 AND (name = 'Bo');");
        // the unparenthesized comparison cannot be combined
        assert!(matches!(statement, Err(DbError::MalformedCondition(_))));

        let statement =
            parse_statement("SELECT name FROM students WHERE (age > 19) AND (name = 'Bo');")
                .unwrap();
        let Statement::Select(select) = statement else {
            panic!("Expected Select");
        };
        assert_eq!(
            select.where_clause.unwrap().to_string(),
            "age 19 > name 'Bo' = &"
        );
    }

    #[test]
    fn test_parse_select_errors() {
        let err = parse_statement("SELECT * students;").unwrap_err();
        assert_eq!(err.to_string(), "Expected FROM, found end of statement");
        assert!(matches!(
            parse_statement("SELECT * FROM students WHERE;"),
            Err(DbError::MalformedCondition(_))
        ));
        assert!(matches!(
            parse_statement("SELECT * FROM students (x);"),
            Err(DbError::TrailingInput(_))
        ));
    }

    #[test]
    fn test_parse_update() {
        let statement = parse_statement("UPDATE students SET age=22 WHERE (name='Bo');").unwrap();
        match statement {
            Statement::Update(update) => {
                assert_eq!(update.table, "students");
                assert_eq!(
                    update.assignments,
                    vec![Assignment {
                        attribute: "age".into(),
                        value: "22".into()
                    }]
                );
                assert_eq!(update.where_clause.to_string(), "name 'Bo' =");
            }
            _ => panic!("Expected Update"),
        }

        assert!(matches!(
            parse_statement("UPDATE students SET age=22;"),
            Err(DbError::ConditionRequired("UPDATE"))
        ));
    }

    #[test]
    fn test_parse_delete() {
        assert!(matches!(
            parse_statement("DELETE FROM students WHERE (age < 20);"),
            Ok(Statement::Delete(_))
        ));
        assert!(matches!(
            parse_statement("DELETE FROM students;"),
            Err(DbError::ConditionRequired("DELETE"))
        ));
    }

    #[test]
    fn test_parse_join() {
        assert_eq!(
            parse_statement("JOIN students AND classes ON classId AND id;").unwrap(),
            Statement::Join(Join {
                primary_table: "students".into(),
                secondary_table: "classes".into(),
                primary_attribute: "classId".into(),
                secondary_attribute: "id".into(),
            })
        );
        let err = parse_statement("JOIN students classes ON classId AND id;").unwrap_err();
        assert_eq!(err.to_string(), "Expected AND, found classes");
    }

    #[test]
    fn test_parse_unknown_and_trailing() {
        assert!(matches!(
            parse_statement("TRUNCATE students;"),
            Err(DbError::UnknownCommand(_))
        ));
        assert!(matches!(
            parse_statement("USE school now;"),
            Err(DbError::TrailingInput(_))
        ));
        assert!(matches!(
            parse_statement("USE school"),
            Err(DbError::UnterminatedStatement)
        ));
    }
}
